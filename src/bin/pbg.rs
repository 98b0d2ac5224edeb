//! pbg CLI: build and query program behavior graphs.
//!
//! Usage:
//!   pbg database init|add|query [--db path]
//!   pbg project create|plan|query [--db path]

use clap::{Parser, Subcommand};
use pbg::{
    export, parse_whitelist, register_builtin, BehaviorGraph, EngineKind, ProjectConfig,
    ProviderOptions, ProviderRegistry, Scheduler,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pbg", version, about = "Program behavior graph builder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work with a fact store directly
    Database {
        #[command(subcommand)]
        action: DatabaseAction,
        /// Path to the store
        #[arg(long, global = true)]
        db: Option<PathBuf>,
        /// Store engine (sqlite or memory)
        #[arg(long, global = true, default_value = "sqlite")]
        backend: EngineKind,
    },
    /// Run providers and query their output
    Project {
        #[command(subcommand)]
        action: ProjectAction,
        /// Path to the store
        #[arg(long, global = true)]
        db: Option<PathBuf>,
        /// Store engine (sqlite or memory)
        #[arg(long, global = true, default_value = "sqlite")]
        backend: EngineKind,
    },
}

#[derive(Subcommand)]
enum DatabaseAction {
    /// Initialize an empty store
    Init,
    /// Add one fact
    Add {
        /// Subject
        #[arg(short = 's')]
        subject: String,
        /// Predicate (verb)
        #[arg(short = 'v')]
        predicate: String,
        /// Object
        #[arg(short = 'o')]
        object: String,
    },
    /// Evaluate a traversal and print the results
    Query {
        /// Traversal expression
        #[arg(long)]
        cmd: String,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Create a store and fill it by running the configured providers
    Create {
        /// Project file (JSON or YAML)
        #[arg(long)]
        config: PathBuf,
        /// Comma separated providers to run (default: all)
        #[arg(long)]
        whitelist: Option<String>,
    },
    /// Print the provider execution order
    Plan,
    /// Evaluate a traversal read from a file
    Query {
        /// File holding the traversal expression
        #[arg(long)]
        query: PathBuf,
        /// Write the result triplets as a Graphviz graph
        #[arg(long)]
        draw: Option<PathBuf>,
        /// Write the result triplets as Datalog facts
        #[arg(long)]
        datalog: Option<PathBuf>,
    },
}

/// Get the default store path (~/.local/share/pbg/pbg.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("pbg").join("pbg.db")
}

fn open_graph(kind: EngineKind, db: Option<PathBuf>, create_new: bool) -> Result<BehaviorGraph, String> {
    let path = db.unwrap_or_else(default_db_path);
    BehaviorGraph::open(kind, &path, create_new)
        .map_err(|e| format!("failed to open {}: {}", path.display(), e))
}

fn builtin_registry() -> Result<ProviderRegistry, String> {
    let registry = ProviderRegistry::new();
    register_builtin(&registry).map_err(|e| e.to_string())?;
    Ok(registry)
}

fn print_results(results: &[String]) {
    for (i, result) in results.iter().enumerate() {
        println!("{}: {}", i, result);
    }
}

fn cmd_database(action: DatabaseAction, kind: EngineKind, db: Option<PathBuf>) -> Result<(), String> {
    match action {
        DatabaseAction::Init => {
            let graph = open_graph(kind, db, true)?;
            graph.close().map_err(|e| e.to_string())?;
            println!("Initialized store");
        }
        DatabaseAction::Add {
            subject,
            predicate,
            object,
        } => {
            let mut graph = open_graph(kind, db, false)?;
            graph
                .add_fact(subject, predicate, object)
                .map_err(|e| e.to_string())?;
            graph.close().map_err(|e| e.to_string())?;
        }
        DatabaseAction::Query { cmd } => {
            let graph = open_graph(kind, db, false)?;
            let results = graph.query(&cmd).map_err(|e| e.to_string())?;
            print_results(&results);
        }
    }
    Ok(())
}

async fn cmd_project_create(
    kind: EngineKind,
    db: Option<PathBuf>,
    config: &Path,
    whitelist: Option<String>,
) -> Result<(), String> {
    let project = ProjectConfig::load(config).map_err(|e| e.to_string())?;
    let registry = builtin_registry()?;

    let mut graph = open_graph(kind, db, true)?;
    graph.configure(&project.ingest).map_err(|e| e.to_string())?;
    for (name, options) in project.providers {
        graph.set_options(name, ProviderOptions::from(options));
    }

    let whitelist = match whitelist {
        Some(raw) => parse_whitelist(&raw),
        None => project.whitelist,
    };

    let report = Scheduler::new(&registry)
        .execute(&mut graph, &whitelist)
        .await
        .map_err(|e| e.to_string())?;
    graph.close().map_err(|e| e.to_string())?;

    for run in &report.runs {
        println!(
            "{:<12} {:>10} facts  {:>8.2?}",
            run.name, run.facts_added, run.elapsed
        );
    }
    if !report.skipped.is_empty() {
        println!("skipped: {}", report.skipped.join(", "));
    }
    Ok(())
}

fn cmd_project_plan() -> Result<(), String> {
    let registry = builtin_registry()?;
    let plan = Scheduler::new(&registry).plan().map_err(|e| e.to_string())?;
    print!("{}", plan);
    Ok(())
}

fn cmd_project_query(
    kind: EngineKind,
    db: Option<PathBuf>,
    query: &Path,
    draw: Option<PathBuf>,
    datalog: Option<PathBuf>,
) -> Result<(), String> {
    let expr = std::fs::read_to_string(query)
        .map_err(|e| format!("failed to read {}: {}", query.display(), e))?;
    let graph = open_graph(kind, db, false)?;

    if draw.is_none() && datalog.is_none() {
        let results = graph.query(&expr).map_err(|e| e.to_string())?;
        print_results(&results);
        return Ok(());
    }

    let triplets = graph.query_triplets(&expr).map_err(|e| e.to_string())?;
    if let Some(path) = draw {
        std::fs::write(&path, export::to_dot(&triplets))
            .map_err(|e| format!("failed to write {}: {}", path.display(), e))?;
    }
    if let Some(path) = datalog {
        std::fs::write(&path, export::to_datalog(&triplets))
            .map_err(|e| format!("failed to write {}: {}", path.display(), e))?;
    }
    println!("Exported {} triplets", triplets.len());
    Ok(())
}

#[tokio::main]
async fn main() {
    let directive = match "pbg=info".parse::<Directive>() {
        Ok(directive) => directive,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Database { action, db, backend } => cmd_database(action, backend, db),
        Commands::Project {
            action,
            db,
            backend,
        } => match action {
            ProjectAction::Create { config, whitelist } => {
                cmd_project_create(backend, db, &config, whitelist).await
            }
            ProjectAction::Plan => cmd_project_plan(),
            ProjectAction::Query {
                query,
                draw,
                datalog,
            } => cmd_project_query(backend, db, &query, draw, datalog),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
