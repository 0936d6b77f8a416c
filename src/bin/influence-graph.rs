//! influence-graph CLI: query and save against a seeded in-memory store.
//!
//! Usage:
//!   influence-graph [--seed store.json] [--config config.yaml] similar <name> [--creator c]
//!   influence-graph [--seed store.json] show <name> [--scope macro --scope micro]
//!   influence-graph [--seed store.json] expand <name> [--incoming] [--outgoing] [--depth N]
//!   influence-graph [--seed store.json] save <payload.json> [--choices choices.json]

use clap::{Parser, Subcommand};
use influence_graph::conflict::InfluenceResolutions;
use influence_graph::{
    load_config, Config, Direction, GraphSession, ItemId, LoadReport, MainItemChoice,
    MemoryStore, SaveError, SaveOutcome, SavePayload,
};
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "influence-graph",
    version,
    about = "Deduplicated influence graph with conflict-aware saves"
)]
struct Cli {
    /// JSON seed file for the in-memory store
    #[arg(long, global = true)]
    seed: Option<PathBuf>,

    /// YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored items similar to a name
    Similar {
        name: String,
        /// Creator to match as well
        #[arg(long)]
        creator: Option<String>,
    },
    /// Load an item and its influences
    Show {
        name: String,
        /// Only show influences in this scope (repeatable; default all)
        #[arg(long = "scope")]
        scopes: Vec<String>,
    },
    /// Load an item, then expand its neighborhood
    Expand {
        name: String,
        /// Follow incoming influences
        #[arg(long)]
        incoming: bool,
        /// Follow outgoing influences
        #[arg(long)]
        outgoing: bool,
        /// Hops to follow (defaults to config)
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Save a structured payload, resolving conflicts from a choices file
    Save {
        payload: PathBuf,
        /// JSON file with the main-item choice and per-influence resolutions
        #[arg(long)]
        choices: Option<PathBuf>,
    },
}

/// Decisions supplied up front for a save that needs review
#[derive(Debug, Default, Deserialize)]
struct Choices {
    #[serde(default)]
    main_item: Option<MainItemChoice>,
    #[serde(default)]
    influences: InfluenceResolutions,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("cannot parse {}: {}", path.display(), e))
}

fn open_store(seed: Option<&Path>, config: &Config) -> Result<MemoryStore, String> {
    match seed {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
            MemoryStore::from_seed_json(&content, config.similarity.clone())
                .map_err(|e| format!("cannot load seed {}: {}", path.display(), e))
        }
        None => Ok(MemoryStore::new().with_similarity(config.similarity.clone())),
    }
}

fn print_json(value: &serde_json::Value) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn report_json(report: &LoadReport) -> serde_json::Value {
    json!({
        "accumulated": report.accumulated,
        "nodes_added": report.nodes_added,
        "links_added": report.links_added,
        "links_replaced": report.links_replaced,
        "warnings": report.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "available_scopes": report.available_scopes,
    })
}

fn cmd_similar(store: &MemoryStore, name: &str, creator: Option<&str>) -> i32 {
    let similar = store.find_similar(name, creator);
    print_json(&json!({ "query": name, "similar": similar }))
}

async fn cmd_show(session: &mut GraphSession, name: &str) -> i32 {
    match session.search_by_name(name).await {
        Ok(Some((item_id, report))) => print_json(&json!({
            "item_id": item_id,
            "load": report_json(&report),
            "graph": session.graph(),
        })),
        Ok(None) => {
            eprintln!("Error: no item matches '{}'", name);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_expand(session: &mut GraphSession, name: &str, direction: Direction) -> i32 {
    let item_id = match session.search_by_name(name).await {
        Ok(Some((item_id, _))) => item_id,
        Ok(None) => {
            eprintln!("Error: no item matches '{}'", name);
            return 1;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match session.expand(&item_id, direction).await {
        Ok(report) => print_json(&json!({
            "item_id": item_id,
            "expansion": report.as_ref().map(report_json),
            "graph": session.graph(),
        })),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn apply_choices(session: &mut GraphSession, choices: Choices) -> Result<(), SaveError> {
    let orchestrator = session.pending_save_mut().ok_or(SaveError::NoPendingReview)?;
    let resolver = orchestrator.resolver_mut();
    if let Some(choice) = choices.main_item {
        resolver.select_main_item(choice)?;
    }
    for (index, resolution) in choices.influences {
        resolver.resolve_influence(index, resolution)?;
    }
    Ok(())
}

/// Print the error; if the write already happened, load the saved item instead.
async fn report_save_error(session: &mut GraphSession, err: SaveError) -> i32 {
    eprintln!("Error: {}", err.user_message());
    if !matches!(err, SaveError::Committed { .. }) {
        return 1;
    }
    match session.reload_saved().await {
        Ok(item_id) => print_json(&saved_json(session, &item_id)),
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            1
        }
    }
}

fn saved_json(session: &GraphSession, item_id: &ItemId) -> serde_json::Value {
    json!({
        "status": "saved",
        "item_id": item_id,
        "graph": session.graph(),
    })
}

async fn cmd_save(
    session: &mut GraphSession,
    payload: SavePayload,
    choices: Option<Choices>,
) -> i32 {
    let (conflicts, preview) = match session.save(payload).await {
        Ok(SaveOutcome::Saved(saved)) => return print_json(&saved_json(session, &saved.item_id)),
        Ok(SaveOutcome::RequiresReview { preview, .. }) => {
            let conflicts = session
                .pending_save()
                .and_then(|o| o.resolver().candidates().cloned());
            (conflicts, preview)
        }
        Err(e) => return report_save_error(session, e).await,
    };

    let Some(choices) = choices else {
        let code = print_json(&json!({
            "status": "requires_review",
            "conflicts": conflicts,
            "preview": preview,
        }));
        return if code == 0 { 2 } else { code };
    };

    if let Err(e) = apply_choices(session, choices) {
        eprintln!("Error: {}", e.user_message());
        return 1;
    }
    match session.submit_resolution().await {
        Ok(item_id) => print_json(&saved_json(session, &item_id)),
        Err(e) => report_save_error(session, e).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let store = match open_store(cli.seed.as_deref(), &config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Similar { name, creator } => cmd_similar(&store, &name, creator.as_deref()),
        Commands::Show { name, scopes } => {
            let mut session = GraphSession::new(store, config);
            session.set_scopes(scopes);
            cmd_show(&mut session, &name).await
        }
        Commands::Expand {
            name,
            incoming,
            outgoing,
            depth,
        } => {
            if let Some(depth) = depth {
                config.expansion.max_depth = depth;
            }
            if incoming || outgoing {
                config.expansion.include_incoming = incoming;
                config.expansion.include_outgoing = outgoing;
            }
            let mut session = GraphSession::new(store, config);
            let direction = session.configured_direction();
            cmd_expand(&mut session, &name, direction).await
        }
        Commands::Save { payload, choices } => {
            let payload: SavePayload = match read_json(&payload) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let choices = choices.as_deref().map(read_json::<Choices>).transpose();
            let choices: Option<Choices> = match choices {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let mut session = GraphSession::new(store, config);
            cmd_save(&mut session, payload, choices).await
        }
    };
    std::process::exit(code);
}
