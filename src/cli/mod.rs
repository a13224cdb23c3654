//! Command-line interface

use crate::core::config::{IndexOptions, HEARTBEAT_INTERVAL_SECS};
use crate::index::{IndexCoordinator, IndexResult};
use crate::project::boundaries::discover_boundaries;
use crate::query::QueryEngine;
use crate::store::symbols::SymbolQuery;
use crate::store::{owner, OwnerRole, Store};
use crate::watch::FileWatcher;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "symdex")]
#[command(author, version)]
#[command(about = "Persistent code intelligence index for TypeScript/JavaScript monorepos")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root (defaults to the current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index the project tree; by default only what changed since the
    /// last run is re-indexed
    Index {
        /// Force a full rebuild under a single transaction
        #[arg(short, long)]
        full: bool,
    },

    /// Index, then watch for changes until interrupted
    Watch,

    /// Search indexed symbols
    Search {
        /// Name query (prefix match)
        query: String,

        /// Restrict to one symbol kind
        #[arg(short, long)]
        kind: Option<String>,

        /// Exported symbols only
        #[arg(short, long)]
        exported: bool,

        /// Search every project, not just the root one
        #[arg(long)]
        all_projects: bool,

        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show per-project totals, or stats for one file
    Stats {
        /// Indexed file path (root-relative)
        file: Option<String>,
    },

    /// Enumerate import cycles
    Cycles {
        /// Cap the number of reported cycles
        #[arg(short, long)]
        max: Option<usize>,
    },

    /// Files transitively affected by changes to the given files
    Affected {
        /// Root-relative file paths
        files: Vec<String>,
    },

    /// Direct or transitive dependencies of a file
    Deps {
        /// Root-relative file path
        file: String,

        /// Show dependents instead of dependencies
        #[arg(short, long)]
        reverse: bool,

        /// Follow edges transitively
        #[arg(short, long)]
        transitive: bool,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let root = match cli.project {
        Some(path) => path.canonicalize().context("project root not found")?,
        None => std::env::current_dir()?,
    };
    let options = IndexOptions::load(&root)?;

    match cli.command {
        Commands::Index { full } => index(root, options, full, cli.json).await,
        Commands::Watch => watch(root, options).await,
        Commands::Search {
            query,
            kind,
            exported,
            all_projects,
            limit,
        } => {
            let engine = reader_engine(&root, &options)?;
            let symbol_query = SymbolQuery {
                name: Some(query),
                kind,
                exported_only: exported,
                limit: Some(limit),
                ..Default::default()
            };
            let results = if all_projects {
                engine.search_all_symbols(symbol_query)?
            } else {
                engine.search_symbols(symbol_query)?
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for row in &results {
                    println!(
                        "{}:{}:{} {} {}{}",
                        row.file_path,
                        row.span_start_line,
                        row.span_start_col,
                        row.kind,
                        row.name,
                        if row.is_exported { " (exported)" } else { "" }
                    );
                }
                println!("{} result(s)", results.len());
            }
            Ok(())
        }
        Commands::Stats { file } => {
            let engine = reader_engine(&root, &options)?;
            match file {
                Some(file) => {
                    let stats = engine.get_file_stats(&file)?;
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&stats)?);
                    } else {
                        println!("{} [{}]", stats.file_path, stats.project);
                        println!("  lines:     {}", stats.line_count);
                        println!("  symbols:   {}", stats.symbol_count);
                        println!("  outgoing:  {}", stats.outgoing_relations);
                        println!("  incoming:  {}", stats.incoming_relations);
                    }
                }
                None => {
                    let stats = engine.get_stats()?;
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&stats)?);
                    } else {
                        for project in &stats {
                            println!(
                                "{}: {} files, {} symbols, {} relations",
                                project.project, project.files, project.symbols, project.relations
                            );
                        }
                    }
                }
            }
            Ok(())
        }
        Commands::Cycles { max } => {
            let engine = reader_engine(&root, &options)?;
            let cycles = engine.get_cycle_paths(max)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&cycles)?);
            } else if cycles.is_empty() {
                println!("No import cycles.");
            } else {
                for cycle in &cycles {
                    println!("{}", cycle.join(" -> "));
                }
                println!("{} cycle(s)", cycles.len());
            }
            Ok(())
        }
        Commands::Affected { files } => {
            let engine = reader_engine(&root, &options)?;
            let affected = engine.get_affected(&files)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&affected)?);
            } else {
                for file in &affected {
                    println!("{}", file);
                }
                println!("{} affected file(s)", affected.len());
            }
            Ok(())
        }
        Commands::Deps {
            file,
            reverse,
            transitive,
        } => {
            let engine = reader_engine(&root, &options)?;
            let deps = match (reverse, transitive) {
                (false, false) => engine.get_dependencies(&file)?,
                (true, false) => engine.get_dependents(&file)?,
                (false, true) => engine.get_transitive_dependencies(&file)?,
                (true, true) => {
                    let affected = engine.get_affected(&[file.clone()])?;
                    affected
                }
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&deps)?);
            } else {
                for dep in &deps {
                    println!("{}", dep);
                }
            }
            Ok(())
        }
    }
}

fn reader_engine(root: &PathBuf, options: &IndexOptions) -> anyhow::Result<QueryEngine> {
    let db_path = options.db_path(root);
    if !db_path.exists() {
        bail!("no index found; run `symdex index` first");
    }
    let store = Store::open(&db_path)?;
    let boundaries = discover_boundaries(root, options)?;
    let default_project = boundaries
        .iter()
        .find(|b| b.dir == ".")
        .map(|b| b.name.clone())
        .unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "root".to_string())
        });

    Ok(QueryEngine::new(
        Arc::new(parking_lot::Mutex::new(store)),
        Arc::new(parking_lot::Mutex::new(HashMap::new())),
        default_project,
    ))
}

async fn index(root: PathBuf, options: IndexOptions, full: bool, json: bool) -> anyhow::Result<()> {
    let coordinator = IndexCoordinator::new(root, options)?;
    let pid = std::process::id() as i64;
    acquire_or_bail(&coordinator, pid)?;

    let result = if full {
        coordinator.full_index().await
    } else {
        coordinator.scan_index().await
    };
    let store = coordinator.store();
    owner::release(store.lock().conn(), pid)?;
    print_summary(&result?, json)?;
    Ok(())
}

async fn watch(root: PathBuf, options: IndexOptions) -> anyhow::Result<()> {
    let coordinator = IndexCoordinator::new(root.clone(), options.clone())?;
    let pid = std::process::id() as i64;
    acquire_or_bail(&coordinator, pid)?;

    let result = coordinator.full_index().await?;
    info!(
        "Indexed {} files, {} symbols, {} relations in {} ms",
        result.indexed_files, result.total_symbols, result.total_relations, result.duration_ms
    );

    coordinator.on_indexed(|summary: &IndexResult| {
        info!(
            "Reindexed {} files ({} failed) in {} ms",
            summary.indexed_files,
            summary.failed_files.len(),
            summary.duration_ms
        );
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    let watcher = match FileWatcher::new(root, options, tx) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            // Scan-only degradation: queries and manual reindexing still work
            warn!("Watcher failed to start ({}); running scan-only", e);
            None
        }
    };

    let mut heartbeat = tokio::time::interval(std::time::Duration::from_secs(
        HEARTBEAT_INTERVAL_SECS,
    ));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                coordinator.handle_watcher_event(event);
            }
            _ = heartbeat.tick() => {
                let store = coordinator.store();
                let conn_result = owner::update_heartbeat(store.lock().conn(), pid, chrono::Utc::now());
                if let Err(e) = conn_result {
                    warn!("Heartbeat failed: {}", e);
                }
            }
            _ = &mut ctrl_c => {
                info!("Shutting down");
                break;
            }
        }
    }

    if let Some(watcher) = watcher {
        watcher.stop();
    }
    coordinator.shutdown().await;
    let store = coordinator.store();
    owner::release(store.lock().conn(), pid)?;
    Ok(())
}

fn acquire_or_bail(coordinator: &IndexCoordinator, pid: i64) -> anyhow::Result<()> {
    let store = coordinator.store();
    let role = owner::acquire_default(&mut store.lock(), pid)?;
    if role != OwnerRole::Owner {
        bail!("another process owns this index; try again later or stop it first");
    }
    Ok(())
}

fn print_summary(result: &IndexResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!(
            "Indexed {} files ({} removed, {} failed): {} symbols, {} relations in {} ms",
            result.indexed_files,
            result.removed_files,
            result.failed_files.len(),
            result.total_symbols,
            result.total_relations,
            result.duration_ms
        );
        let changes = &result.changed_symbols;
        if !changes.is_empty() {
            println!(
                "Symbols: +{} ~{} -{}",
                changes.added.len(),
                changes.modified.len(),
                changes.removed.len()
            );
        }
    }
    Ok(())
}
