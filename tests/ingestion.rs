//! Write modes, streaming, sampling, and query caps against real stores

mod common;

use common::{memory_graph, numbered_facts};
use pbg::{BehaviorGraph, EngineKind, FactSender, GraphError, IngestConfig, StorageError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

#[test]
fn auto_bulk_two_n_plus_one() {
    const N: usize = 50;
    let mut graph = memory_graph();
    graph.set_auto_bulk(N).unwrap();

    for (s, p, o) in numbered_facts(2 * N + 1) {
        graph.add_fact(s, p, o).unwrap();
    }

    assert_eq!(graph.ingest_stats().auto_flushes, 2);
    assert_eq!(graph.pipeline().pending(), 1);
    assert_eq!(graph.fact_count().unwrap(), 2 * N);

    graph.set_auto_bulk(0).unwrap();
    assert_eq!(graph.pipeline().pending(), 0);
    assert_eq!(graph.fact_count().unwrap(), 2 * N + 1);
}

#[tokio::test]
async fn stream_commits_every_fact_in_doubling_batches() {
    let mut graph = memory_graph();
    graph
        .configure(&IngestConfig {
            stream_base_batch: 10,
            ..IngestConfig::default()
        })
        .unwrap();

    const F: usize = 185;
    let summary = graph
        .add_facts_from_stream(|tx: FactSender| async move {
            for fact in numbered_facts(F) {
                tx.send(fact).await?;
            }
            Ok::<_, pbg::ingest::StreamClosed>(())
        })
        .await
        .unwrap();

    assert_eq!(graph.fact_count().unwrap(), F);
    assert_eq!(summary.facts, F);
    // 10 + 20 + 40 + 80 = 150, remainder 35
    assert_eq!(summary.batches, vec![10, 20, 40, 80, 35]);
    assert_eq!(graph.ingest_stats().batch_sizes, summary.batches);
}

#[tokio::test]
async fn stream_from_blocking_producer() {
    let mut graph = memory_graph();

    graph
        .add_facts_from_stream(|tx: FactSender| async move {
            tokio::task::spawn_blocking(move || {
                for fact in numbered_facts(25) {
                    tx.blocking_send(fact)?;
                }
                Ok::<_, pbg::ingest::StreamClosed>(())
            })
            .await
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        })
        .await
        .unwrap();

    assert_eq!(graph.fact_count().unwrap(), 25);
}

#[test]
fn reservoir_keeps_exactly_k() {
    const K: usize = 16;
    let mut graph = memory_graph();
    graph.set_reservoir(K).unwrap();

    graph.add_facts_bulk(numbered_facts(1000)).unwrap();
    for (s, p, o) in numbered_facts(10) {
        graph.add_fact(s, p, o).unwrap();
    }
    assert_eq!(graph.fact_count().unwrap(), 0);

    graph.set_reservoir(0).unwrap();
    assert_eq!(graph.fact_count().unwrap(), K);
}

#[test]
fn reservoir_frequency_close_to_k_over_m() {
    use pbg::ingest::Reservoir;
    use pbg::Fact;

    const K: usize = 10;
    const M: usize = 100;
    const TRIALS: usize = 3000;

    let mut seeds = StdRng::seed_from_u64(7);
    let mut hits: HashMap<String, usize> = HashMap::new();
    for _ in 0..TRIALS {
        let mut reservoir = Reservoir::with_seed(K, seeds.gen());
        for (s, p, o) in numbered_facts(M) {
            reservoir.offer(Fact::new(s, p, o));
        }
        assert_eq!(reservoir.len(), K);
        for fact in reservoir.into_sample() {
            *hits.entry(fact.subject).or_default() += 1;
        }
    }

    let expected = (TRIALS * K) as f64 / M as f64;
    assert_eq!(hits.len(), M);
    for (subject, count) in hits {
        let ratio = count as f64 / expected;
        assert!(
            (0.7..1.3).contains(&ratio),
            "{} kept {} times, expected about {}",
            subject,
            count,
            expected
        );
    }
}

#[test]
fn query_truncates_to_limit_silently() {
    let mut graph = memory_graph();
    graph
        .add_facts_bulk((0..3000).map(|i| ("hub", "edge", format!("n{}", i))))
        .unwrap();

    let results = graph.query("g.V('hub').Out('edge').All()").unwrap();
    assert_eq!(results.len(), 2500);
    assert_eq!(results[0], "n0");
    assert_eq!(results[2499], "n2499");
}

#[test]
fn sqlite_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("pbg.db");

    {
        let mut graph = BehaviorGraph::open(EngineKind::Sqlite, &path, true).unwrap();
        graph.set_auto_bulk(3).unwrap();
        for (s, p, o) in numbered_facts(4) {
            graph.add_fact(s, p, o).unwrap();
        }
        graph.add_fact("pc-0", "read-address", "0x0").unwrap();
        graph.close().unwrap();
    }

    let graph = BehaviorGraph::open(EngineKind::Sqlite, &path, false).unwrap();
    assert_eq!(graph.fact_count().unwrap(), 5);
    // Duplicate facts stay parallel edges
    assert_eq!(
        graph.query("g.V('pc-0').Out('read-address').All()").unwrap(),
        vec!["0x0", "0x0"]
    );
}

#[test]
fn opening_missing_sqlite_store_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = BehaviorGraph::open(EngineKind::Sqlite, dir.path().join("absent.db"), false)
        .err()
        .unwrap();
    assert!(matches!(err, GraphError::Storage(StorageError::OpenFailed { .. })));
}
