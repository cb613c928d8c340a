//! Text formatting of the channel table and wavemeter readings

use crate::state::{Reading, StreamSnapshot};

/// Label of the reference laser row
pub const REFERENCE_ROW: &str = "650 nm";

/// One rendered row of the channel table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub name: String,
    /// THz, 6 decimals
    pub frequency: String,
    /// Volts, 3 decimals; empty when not reported
    pub piezo: String,
}

/// Rows in server order, with the reference laser appended when reported
pub fn table_rows(snapshot: &StreamSnapshot) -> Vec<TableRow> {
    let mut rows: Vec<TableRow> = snapshot
        .active_frequencies
        .iter()
        .map(|(name, reading)| TableRow {
            name: name.clone(),
            frequency: match reading {
                Reading::Number(value) => format!("{:.6}", value),
                Reading::Other(text) => text.clone(),
            },
            piezo: snapshot
                .piezo(name)
                .map(|v| format!("{:.3}", v))
                .unwrap_or_default(),
        })
        .collect();

    if let Some(freq) = snapshot.freq_650 {
        rows.push(TableRow {
            name: REFERENCE_ROW.to_string(),
            frequency: format!("{:.6}", freq),
            piezo: String::new(),
        });
    }

    rows
}

pub fn reference_lock_text(snapshot: &StreamSnapshot) -> &'static str {
    if snapshot.reference_locked() {
        "LOCKED"
    } else {
        "NOT LOCKED"
    }
}

pub fn format_digit(value: f64) -> String {
    format!("{:.6}", value)
}
