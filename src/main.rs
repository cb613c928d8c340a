//! Lock Dashboard - terminal front end for a laser lock server

use anyhow::Result;
use clap::Parser;
use colored::*;
use lock_dashboard::backend::HttpBackend;
use lock_dashboard::cli::{self, ReplCommand};
use lock_dashboard::config::{watcher::ConfigWatcher, LoggingConfig};
use lock_dashboard::paths::AppPaths;
use lock_dashboard::session::DashboardSession;
use lock_dashboard::view::ConsoleView;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Supervise and command the lock channels of a lock server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to the detected location)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Channel to select on startup (overrides the config)
    #[arg(long)]
    channel: Option<String>,

    /// Log as JSON lines
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let paths = AppPaths::detect();
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| paths.config.display().to_string());

    // Peek at the logging section before the subscriber exists
    let logging = lock_dashboard::config::DashboardConfig::load(&config_path)
        .await
        .map(|c| c.logging)
        .unwrap_or_default();
    let _log_guard = init_logging(
        &args.log_level,
        args.json || logging.json,
        &logging,
        &paths.logs_dir,
    )?;

    paths.ensure_directories()?;
    info!(config = %config_path, local = paths.is_local, "Starting Lock Dashboard");

    let (mut config_watcher, config) = ConfigWatcher::new(config_path).await?;

    let backend = Arc::new(HttpBackend::connect(&config.server).await?);
    let (session, mut view_rx) = DashboardSession::spawn(config.polling, backend).await?;

    let initial = args
        .channel
        .clone()
        .or_else(|| config.dashboard.initial_channel.clone());
    session.initialize(initial).await?;

    let mut view = ConsoleView::new(Some(paths.plot_file()));
    if config.dashboard.watch_streams {
        view.toggle_watch();
    }

    println!(
        "{} connected to {} (type 'help')",
        "Lock Dashboard".bold().cyan(),
        config.server.base_url
    );

    let mut lines = cli::spawn_repl(Some(paths.history_file()))?;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = view_rx.recv() => view.render(&event),

            line = lines.recv() => {
                let Some(line) = line else { break };
                match ReplCommand::parse(&line) {
                    Ok(Some(cmd)) => match cli::execute(&session, &mut view, cmd).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => println!("{} {:#}", "error:".red(), e),
                    },
                    Ok(None) => {}
                    Err(e) => println!("{} {:#}", "error:".red(), e),
                }
            }

            Some(polling) = config_watcher.next_polling() => {
                session.apply_settings(polling);
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    session.shutdown();
    info!("Lock Dashboard stopped");
    Ok(())
}

/// Console (or JSON) output, plus a daily log file when enabled
fn init_logging(
    level: &str,
    json: bool,
    logging: &LoggingConfig,
    logs_dir: &Path,
) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let console = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file, guard) = if logging.file {
        std::fs::create_dir_all(logs_dir)?;
        let appender = tracing_appender::rolling::daily(logs_dir, "lock-dashboard.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    Ok(guard)
}
