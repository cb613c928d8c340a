//! Terminal renderer for view events

use super::table::{format_digit, reference_lock_text, table_rows};
use super::ViewEvent;
use crate::state::{EditField, EditForm, StreamSnapshot, UpdateSource};
use colored::*;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Prints view events; stream traffic is cached and only echoed when watched
pub struct ConsoleView {
    /// Print every table/digit event as it arrives
    watch_streams: bool,
    /// Where plots are written as SVG
    plot_path: Option<PathBuf>,
    last_table: Option<StreamSnapshot>,
    last_digit: Option<f64>,
    /// Last printed (active, lock) per channel
    shown_indicators: HashMap<String, (bool, bool)>,
}

impl ConsoleView {
    pub fn new(plot_path: Option<PathBuf>) -> Self {
        Self {
            watch_streams: false,
            plot_path,
            last_table: None,
            last_digit: None,
            shown_indicators: HashMap::new(),
        }
    }

    /// Flip stream echo; returns the new setting
    pub fn toggle_watch(&mut self) -> bool {
        self.watch_streams = !self.watch_streams;
        self.watch_streams
    }

    pub fn render(&mut self, event: &ViewEvent) {
        for line in self.lines(event) {
            println!("{}", line);
        }
    }

    /// Lines printed for one event
    pub fn lines(&mut self, event: &ViewEvent) -> Vec<String> {
        match event {
            ViewEvent::Indicator(change) => {
                // polls repeat the same state every few seconds; acks always print
                let state = (change.active, change.lock);
                let previous = self.shown_indicators.insert(change.name.clone(), state);
                if previous == Some(state) && change.source != UpdateSource::Command {
                    return Vec::new();
                }
                let marker = if change.is_selected { "*" } else { " " };
                vec![format!(
                    "{} {}{:<16} active {}  lock {}  ({})",
                    timestamp(),
                    marker,
                    change.name,
                    dot(change.active),
                    dot(change.lock),
                    change.source
                )]
            }
            ViewEvent::ParameterSetLoaded { name, parameters } => {
                let mut lines = vec![format!(
                    "{} {} {}",
                    timestamp(),
                    "Parameters of".bold(),
                    name.cyan()
                )];
                lines.extend(form_lines(&EditForm::from_parameters(parameters)));
                lines.push(format!("  {:<10} {}", "reading", parameters.reading_state));
                lines
            }
            ViewEvent::TableSnapshot(snapshot) => {
                self.last_table = Some(snapshot.clone());
                if self.watch_streams {
                    self.table_lines()
                } else {
                    Vec::new()
                }
            }
            ViewEvent::DigitValue(value) => {
                self.last_digit = Some(*value);
                if self.watch_streams {
                    vec![format!("{} wavemeter {} THz", timestamp(), format_digit(*value))]
                } else {
                    Vec::new()
                }
            }
            ViewEvent::CommandFailure { kind, name, reason } => vec![format!(
                "{} {} {} {}: {}",
                timestamp(),
                "✗".red(),
                kind,
                name,
                reason.red()
            )],
            ViewEvent::CommandAcknowledged { kind, name } => {
                vec![format!("{} {} {} {}", timestamp(), "✓".green(), kind, name)]
            }
            ViewEvent::FetchFailure { what, name, reason } => vec![format!(
                "{} {} {} {}: {}",
                timestamp(),
                "✗".red(),
                what,
                name,
                reason.red()
            )],
            ViewEvent::PlotLoaded { name, svg } => {
                let Some(path) = &self.plot_path else {
                    return vec![format!("{} plot of {} ({} bytes)", timestamp(), name, svg.len())];
                };
                match std::fs::write(path, svg) {
                    Ok(()) => {
                        debug!(path = %path.display(), "Plot written");
                        vec![format!(
                            "{} plot of {} written to {}",
                            timestamp(),
                            name,
                            path.display()
                        )]
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to write plot");
                        vec![format!("{} {} {}", timestamp(), "✗".red(), e)]
                    }
                }
            }
            ViewEvent::PlotCleared => vec![format!("{} plot cleared", timestamp())],
            ViewEvent::CalibrationSettings(settings) => vec![format!(
                "{} calibration every {} at {:.6} THz",
                timestamp(),
                settings.wm_calibration_interval,
                settings.wm_calibration_frequency
            )],
            ViewEvent::WavemeterCalibration(running) => {
                let state = if *running {
                    "initialized".green()
                } else {
                    "aborted".yellow()
                };
                vec![format!("{} wavemeter calibration {}", timestamp(), state)]
            }
        }
    }

    /// Latest cached table, formatted
    pub fn table_lines(&self) -> Vec<String> {
        let Some(snapshot) = &self.last_table else {
            return vec!["(no table received yet)".dimmed().to_string()];
        };

        let mut lines = vec![format!(
            "{:<16} {:>18} {:>10}",
            "Channel".bold(),
            "Frequency (THz)".bold(),
            "Piezo (V)".bold()
        )];
        for row in table_rows(snapshot) {
            lines.push(format!("{:<16} {:>18} {:>10}", row.name, row.frequency, row.piezo));
        }

        let text = reference_lock_text(snapshot);
        let colored_text = if snapshot.reference_locked() {
            text.green()
        } else {
            text.red()
        };
        lines.push(format!("Reference Laser Lock State: {}", colored_text));
        if let Some(value) = self.last_digit {
            lines.push(format!("Wavemeter: {} THz", format_digit(value)));
        }
        lines
    }
}

/// Edit fields as `name value` lines
pub fn form_lines(form: &EditForm) -> Vec<String> {
    EditField::all()
        .iter()
        .map(|field| {
            let value = form
                .get(*field)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            format!("  {:<10} {}", field, value)
        })
        .collect()
}

fn dot(on: bool) -> ColoredString {
    if on {
        "●".green()
    } else {
        "○".dimmed()
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}
