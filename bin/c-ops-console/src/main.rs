//! ---
//! cops_section: "06-console-frontend"
//! cops_subsection: "binary"
//! cops_type: "source"
//! cops_scope: "code"
//! cops_description: "Binary entrypoint for the operator console."
//! cops_version: "v0.0.0-prealpha"
//! cops_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use c_ops_backend::HttpFleetBackend;
use c_ops_common::config::AppConfig;
use c_ops_common::logging::init_tracing;
use c_ops_common::time::local_stamp;
use c_ops_core::{ConsoleSession, EnrichmentError};
use c_ops_feed::{new_registry, FeedMetrics};
use c_ops_model::RunRecord;
use c_ops_view::DisplayMode;
use clap::{ArgAction, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::info;

mod exporter;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "C-OPS operator console",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "URL", help = "Override the twin feed stream url")]
    feed_url: Option<String>,

    #[arg(long, value_name = "URL", help = "Override the analysis backend base url")]
    backend_url: Option<String>,

    #[arg(long, help = "Run without the interactive prompt (feed and log only)")]
    headless: bool,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("C-OPS console {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/console.toml"));
    candidates.push(PathBuf::from("configs/example.toml"));

    let (mut config, source) = match AppConfig::load_with_source(&candidates) {
        Ok(loaded) => (loaded.config, Some(loaded.source)),
        Err(_) => (AppConfig::default(), None),
    };
    if let Some(url) = cli.feed_url {
        config.feed.stream_url = url;
    }
    if let Some(url) = cli.backend_url {
        config.backend.base_url = url;
    }
    config.validate()?;

    init_tracing("c-ops-console", &config.logging)?;
    match &source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using built-in defaults"),
    }

    let registry = new_registry();
    let feed_metrics = FeedMetrics::new(registry.clone())?;
    let metrics_server = if config.metrics.enabled {
        let server = exporter::spawn_http_server(registry.clone(), config.metrics.listen)?;
        info!(address = %server.addr(), "metrics exporter enabled");
        Some(server)
    } else {
        None
    };

    let backend = Arc::new(
        HttpFleetBackend::from_config(&config.backend)
            .context("failed to construct backend client")?,
    );
    let session = Arc::new(ConsoleSession::init(config, backend));
    session.spawn_feed(Some(feed_metrics))?;

    if let Some(mut health) = session.feed_health() {
        tokio::spawn(async move {
            let mut last = *health.borrow();
            while health.changed().await.is_ok() {
                let current = *health.borrow();
                if current != last {
                    info!(health = ?current, "feed health changed");
                    last = current;
                }
            }
        });
    }

    if cli.headless {
        info!("console running headless; waiting for termination signal");
        signal::ctrl_c().await?;
    } else {
        run_prompt(&session).await?;
    }

    session.teardown().await?;
    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    Ok(())
}

async fn run_prompt(session: &Arc<ConsoleSession>) -> Result<()> {
    println!("C-OPS operator console. Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                println!();
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if handle_command(session, line.trim()).await {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Execute one prompt command. Returns true when the console should exit.
async fn handle_command(session: &Arc<ConsoleSession>, line: &str) -> bool {
    let (command, argument) = match line.split_once(' ') {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "help" => print_help(),
        "autopilot" => match session.dispatch_autopilot(None).await {
            Ok(receipt) => {
                if let Some(record) = session
                    .run_log_snapshot()
                    .into_iter()
                    .find(|record| record.id == receipt.run)
                {
                    println!("{}", record.title);
                    print_cases(&record, 5);
                }
                println!("map switched to filtered view; 'explain' for a summary");
            }
            Err(err) => println!("autopilot failed: {err}"),
        },
        "explain" => match session.request_enrichment(None).await {
            Ok(id) => {
                let log = session.run_log_snapshot();
                match log
                    .iter()
                    .find(|record| record.id == id)
                    .and_then(|record| record.enrichment())
                {
                    Some(enrichment) => {
                        println!("summary: {}", enrichment.summary);
                        for reason in &enrichment.top_reasons {
                            println!("  - {reason}");
                        }
                        if !enrichment.risks.is_empty() {
                            println!("risks: {}", enrichment.risks.join("; "));
                        }
                        for group in &enrichment.suggested_groups {
                            println!("group {}: {}", group.name, group.items.join(", "));
                        }
                    }
                    None => println!("explanation arrived after the run was removed; dropped"),
                }
            }
            Err(EnrichmentError::Correlation(err)) => println!("{err}"),
            Err(err) => println!("explain failed: {err}"),
        },
        "procure" => match session.dispatch_procurement(None).await {
            Ok(id) => {
                if let Some(record) = session
                    .run_log_snapshot()
                    .into_iter()
                    .find(|record| record.id == id)
                {
                    println!("{}", record.title);
                }
            }
            Err(err) => println!("procurement failed: {err}"),
        },
        "runs" => {
            let log = session.run_log_snapshot();
            if log.is_empty() {
                println!("run log is empty");
            }
            for (index, record) in log.iter().enumerate() {
                let marker = if session.active_run() == Some(record.id) {
                    '*'
                } else {
                    ' '
                };
                println!(
                    "{marker}[{index}] {:<11} {} {} ({})",
                    record.kind(),
                    local_stamp(record.created_at),
                    record.title,
                    record.id
                );
            }
        }
        "view" => {
            let view = session.derived_view();
            println!(
                "mode {:?}, {} visible, {} highlighted",
                session.display_mode(),
                view.visible_twins.len(),
                view.highlight_keys.len()
            );
            for key in view.highlight_keys.iter().take(10) {
                println!("  ! {key}");
            }
        }
        "twins" => {
            let twins = session.twins_snapshot();
            println!("{} twins live", twins.len());
            for twin in twins.iter().take(5) {
                println!(
                    "  {} {} health={:?} risk={:?}",
                    twin.key(),
                    twin.name,
                    twin.derived.health,
                    twin.derived.risk
                );
            }
        }
        "mode" => match argument {
            "all" => session.set_display_mode(DisplayMode::All),
            "filtered" => session.set_display_mode(DisplayMode::Filtered),
            other => println!("unknown mode '{other}' (use: all | filtered)"),
        },
        "select" => match find_run(session, argument) {
            Some(id) => {
                session.select_run(id);
                session.set_display_mode(DisplayMode::Filtered);
                println!("run {id} selected; map filtered to its cases");
            }
            None => println!("no run matching '{argument}'"),
        },
        "remove" => match find_run(session, argument) {
            Some(id) => {
                session.remove_run(id);
                println!("run {id} removed");
            }
            None => println!("no run matching '{argument}'"),
        },
        "reset" => {
            session.reset_view();
            println!("map reset to all twins");
        }
        "clear" => {
            session.clear_runs();
            println!("run log cleared");
        }
        "health" => match session.feed_health() {
            Some(health) => println!("feed: {:?}", *health.borrow()),
            None => println!("feed: not attached"),
        },
        "quit" | "exit" => return true,
        other => println!("unknown command '{other}'; try 'help'"),
    }
    false
}

fn find_run(session: &Arc<ConsoleSession>, prefix: &str) -> Option<c_ops_model::RunId> {
    if prefix.is_empty() {
        return None;
    }
    session
        .run_log_snapshot()
        .into_iter()
        .map(|record| record.id)
        .find(|id| id.to_string().starts_with(prefix))
}

fn print_cases(record: &RunRecord, limit: usize) {
    let Some(cases) = record.cases() else {
        return;
    };
    for (index, case) in cases.iter().take(limit).enumerate() {
        println!(
            "  {}. {} score {:.3} down {}m prob {:.2}",
            index + 1,
            case.key(),
            case.score,
            case.down_minutes.unwrap_or(0),
            case.down_prob_6h
        );
        if let Some(step) = case.plan.first() {
            println!("     plan: {:?} ({})", step.action, step.reason);
        }
    }
    if cases.len() > limit {
        println!("  ... {} more cases", cases.len() - limit);
    }
}

fn print_help() {
    println!(
        "commands:\n  autopilot        run a fleet autopilot scan\n  explain          summarise the latest autopilot run\n  procure          run a provider recommendation\n  runs             list the run log (newest first, * = active)\n  view             show the derived map view\n  twins            show the live twin collection\n  mode all|filtered  set the map display mode\n  select <id>      filter the map by a run's cases\n  remove <id>      delete one run\n  reset            show all twins again\n  clear            clear the run log\n  health           feed connection health\n  quit             exit"
    );
}
