//! Command-line interface and REPL
//!
//! Lines are read by rustyline on a dedicated thread and handed to the main
//! loop, which runs them against the session one at a time.

use crate::session::{parse_piezo_input, DashboardSession};
use crate::state::EditField;
use crate::view::console::form_lines;
use crate::view::ConsoleView;
use anyhow::{anyhow, bail, Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One parsed prompt command
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Select(String),
    Lock(Option<String>),
    Unlock(Option<String>),
    Activate(Option<String>),
    Deactivate(Option<String>),
    ToggleLock(Option<String>),
    ToggleActive(Option<String>),
    Piezo(String),
    Edit,
    Set(EditField, f64),
    Form,
    Commit,
    Poll,
    Channels,
    Table,
    Watch,
    Plot,
    PlotTimer(Option<u64>),
    ClearPlot,
    Calibration(Option<(f64, i64)>),
    WmToggle,
    WmCalibrate,
    Help,
    Quit,
}

impl ReplCommand {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();
        let name = || args.first().map(|s| s.to_string());

        let cmd = match head.to_ascii_lowercase().as_str() {
            "select" | "sel" => ReplCommand::Select(
                name().ok_or_else(|| anyhow!("usage: select <channel>"))?,
            ),
            "lock" => ReplCommand::Lock(name()),
            "unlock" => ReplCommand::Unlock(name()),
            "activate" | "on" => ReplCommand::Activate(name()),
            "deactivate" | "off" => ReplCommand::Deactivate(name()),
            "toggle-lock" | "tl" => ReplCommand::ToggleLock(name()),
            "toggle-active" | "ta" => ReplCommand::ToggleActive(name()),
            "piezo" => ReplCommand::Piezo(
                args.first()
                    .ok_or_else(|| anyhow!("usage: piezo <volts>"))?
                    .to_string(),
            ),
            "edit" => ReplCommand::Edit,
            "set" => {
                let [field, value] = args.as_slice() else {
                    bail!("usage: set <field> <value>");
                };
                let field: EditField = field.parse()?;
                let value: f64 = value
                    .parse()
                    .with_context(|| format!("'{}' is not a number", value))?;
                ReplCommand::Set(field, value)
            }
            "form" => ReplCommand::Form,
            "commit" | "write" => ReplCommand::Commit,
            "poll" | "status" => ReplCommand::Poll,
            "channels" | "ls" => ReplCommand::Channels,
            "table" => ReplCommand::Table,
            "watch" => ReplCommand::Watch,
            "plot" => ReplCommand::Plot,
            "plot-timer" => ReplCommand::PlotTimer(match args.first() {
                Some(ms) => {
                    let ms: u64 = ms
                        .parse()
                        .with_context(|| format!("'{}' is not a number of milliseconds", ms))?;
                    if ms == 0 {
                        bail!("plot-timer period must be greater than 0 ms");
                    }
                    Some(ms)
                }
                None => None,
            }),
            "clear-plot" => ReplCommand::ClearPlot,
            "calibration" => match args.as_slice() {
                [] => ReplCommand::Calibration(None),
                [frequency, interval] => ReplCommand::Calibration(Some((
                    frequency.parse().context("frequency is not a number")?,
                    interval.parse().context("interval is not an integer")?,
                ))),
                _ => bail!("usage: calibration [<frequency> <interval>]"),
            },
            "wm-toggle" => ReplCommand::WmToggle,
            "wm-calibrate" => ReplCommand::WmCalibrate,
            "help" | "?" => ReplCommand::Help,
            "quit" | "exit" => ReplCommand::Quit,
            other => bail!("unknown command '{}' (try 'help')", other),
        };
        Ok(Some(cmd))
    }
}

/// Read prompt lines on a blocking thread until EOF, Ctrl-C or `quit`
pub fn spawn_repl(history: Option<PathBuf>) -> Result<mpsc::UnboundedReceiver<String>> {
    let mut rl = DefaultEditor::new()?;
    if let Some(path) = &history {
        if rl.load_history(path).is_err() {
            debug!("No REPL history at {}", path.display());
        }
    }

    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("repl".to_string())
        .spawn(move || {
            loop {
                match rl.readline("lock> ") {
                    Ok(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let _ = rl.add_history_entry(line.as_str());
                        let quit = matches!(line.trim(), "quit" | "exit");
                        if tx.send(line).is_err() || quit {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                        let _ = tx.send("quit".to_string());
                        break;
                    }
                    Err(e) => {
                        warn!("Prompt error: {}", e);
                        break;
                    }
                }
            }
            if let Some(path) = &history {
                if let Err(e) = rl.save_history(path) {
                    warn!("Failed to save REPL history: {}", e);
                }
            }
        })?;

    Ok(rx)
}

/// Run one command; returns false when the user asked to quit
pub async fn execute(
    session: &Arc<DashboardSession>,
    view: &mut ConsoleView,
    cmd: ReplCommand,
) -> Result<bool> {
    match cmd {
        ReplCommand::Select(name) => {
            session.select(&name).await?;
        }
        ReplCommand::Lock(name) => {
            session.lock(&target(session, name).await?).await?;
        }
        ReplCommand::Unlock(name) => {
            session.unlock(&target(session, name).await?).await?;
        }
        ReplCommand::Activate(name) => {
            session.activate(&target(session, name).await?).await?;
        }
        ReplCommand::Deactivate(name) => {
            session.deactivate(&target(session, name).await?).await?;
        }
        ReplCommand::ToggleLock(name) => {
            session.toggle_lock(&target(session, name).await?).await?;
        }
        ReplCommand::ToggleActive(name) => {
            session.toggle_activate(&target(session, name).await?).await?;
        }
        ReplCommand::Piezo(text) => {
            let value = parse_piezo_input(&text)?;
            let name = target(session, None).await?;
            session.set_piezo_value(&name, value).await?;
        }
        ReplCommand::Edit => {
            let name = target(session, None).await?;
            session.begin_edit(&name).await?;
        }
        ReplCommand::Set(field, value) => {
            session.set_field(field, value)?;
        }
        ReplCommand::Form => match session.edit_form() {
            Some((name, form)) => {
                println!("{} {}", "Staged parameters of".bold(), name.cyan());
                for line in form_lines(&form) {
                    println!("{}", line);
                }
            }
            None => println!("nothing staged (use 'edit' or 'select')"),
        },
        ReplCommand::Commit => {
            session.commit_staged().await?;
        }
        ReplCommand::Poll => session.poll_status().await,
        ReplCommand::Channels => {
            let selected = session.selection().await;
            for channel in session.store().get_all().await {
                let marker = if selected.as_deref() == Some(channel.name.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{}{:<16} active={:<5} lock={:<5} via {}",
                    marker,
                    channel.name,
                    channel.status.active,
                    channel.status.lock,
                    channel.last_updated_by
                );
            }
        }
        ReplCommand::Table => {
            for line in view.table_lines() {
                println!("{}", line);
            }
        }
        ReplCommand::Watch => {
            let on = view.toggle_watch();
            println!("stream echo {}", if on { "on" } else { "off" });
        }
        ReplCommand::Plot => session.refresh_plot().await?,
        ReplCommand::PlotTimer(ms) => {
            let running = session.toggle_plot_refresh(ms.map(Duration::from_millis))?;
            println!("plot timer {}", if running { "started" } else { "stopped" });
        }
        ReplCommand::ClearPlot => session.clear_plot().await?,
        ReplCommand::Calibration(None) => {
            session.load_calibration_settings().await?;
        }
        ReplCommand::Calibration(Some((frequency, interval))) => {
            session.update_calibration_settings(frequency, interval).await?;
        }
        ReplCommand::WmToggle => {
            session.toggle_wavemeter_calibration().await?;
        }
        ReplCommand::WmCalibrate => session.calibrate_wavemeter().await?,
        ReplCommand::Help => print_help(),
        ReplCommand::Quit => return Ok(false),
    }
    Ok(true)
}

/// Explicit channel, else the selected one
async fn target(session: &DashboardSession, name: Option<String>) -> Result<String> {
    match name {
        Some(name) => Ok(name),
        None => session
            .selection()
            .await
            .ok_or_else(|| anyhow!("no channel selected (use 'select <channel>')")),
    }
}

fn print_help() {
    println!("{}", "Commands".bold());
    let rows = [
        ("select <channel>", "select a channel and load its parameters"),
        ("lock|unlock [channel]", "engage or release the lock"),
        ("activate|deactivate [channel]", "switch the channel output"),
        ("toggle-lock|toggle-active [channel]", "flip the current state"),
        ("piezo <volts>", "unlock the selected channel and set its piezo"),
        ("edit | set <field> <value> | form | commit", "edit parameters"),
        ("poll | channels", "poll status now / list known channels"),
        ("table | watch", "show the channel table / echo stream events"),
        ("plot | plot-timer [ms] | clear-plot", "fetch, auto-refresh or clear the plot"),
        ("calibration [<freq> <interval>]", "show or set wavemeter calibration"),
        ("wm-toggle | wm-calibrate", "initialize/abort or run a calibration"),
        ("quit", "leave"),
    ];
    for (cmd, what) in rows {
        println!("  {:<44} {}", cmd.cyan(), what);
    }
    println!(
        "  fields: {}",
        EditField::all()
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
}
