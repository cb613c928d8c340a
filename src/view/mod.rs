//! View surface of the dashboard core
//!
//! The session publishes [`ViewEvent`]s on an unbounded channel; whatever
//! renders them (the console here) only reads.

pub mod console;
pub mod table;

pub use console::ConsoleView;
pub use table::{format_digit, reference_lock_text, table_rows, TableRow};

use crate::backend::{CalibrationSettings, CommandKind};
use crate::state::{IndicatorChange, ParameterSet, StreamSnapshot};

/// Everything the core tells the view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// Channel status changed in the store
    Indicator(IndicatorChange),
    /// Parameters fetched for the selected channel
    ParameterSetLoaded {
        name: String,
        parameters: ParameterSet,
    },
    TableSnapshot(StreamSnapshot),
    DigitValue(f64),
    /// Command rejected by the server or lost in transport
    CommandFailure {
        kind: CommandKind,
        name: String,
        reason: String,
    },
    CommandAcknowledged {
        kind: CommandKind,
        name: String,
    },
    /// A read request failed (selection, plot, settings)
    FetchFailure {
        what: &'static str,
        name: String,
        reason: String,
    },
    PlotLoaded {
        name: String,
        svg: String,
    },
    PlotCleared,
    CalibrationSettings(CalibrationSettings),
    /// Wavemeter calibration run started (`true`) or aborted (`false`)
    WavemeterCalibration(bool),
}
