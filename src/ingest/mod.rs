//! Ingestion pipeline
//!
//! Sits between providers and the fact store. Bounds memory for large or
//! unbounded producers with auto-bulk batching, reservoir sampling, and a
//! streaming mode whose batch size doubles after every flush.

mod pipeline;
mod reservoir;
mod stream;

pub use pipeline::{IngestError, IngestPipeline, IngestResult, IngestStats};
pub use reservoir::Reservoir;
pub use stream::{FactSender, StreamClosed, StreamSummary};
