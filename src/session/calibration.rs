//! Wavemeter calibration commands

use crate::backend::{CalibrationSettings, Command, CommandKind};
use crate::error::{DashboardError, Result};
use crate::view::ViewEvent;
use serde_json::json;
use std::sync::atomic::Ordering;
use tracing::info;

impl super::DashboardSession {
    pub async fn load_calibration_settings(&self) -> Result<CalibrationSettings> {
        match self.backend.fetch_calibration_settings().await {
            Ok(settings) => {
                self.emit(ViewEvent::CalibrationSettings(settings));
                Ok(settings)
            }
            Err(e) => {
                self.emit(ViewEvent::FetchFailure {
                    what: "calibration settings",
                    name: String::new(),
                    reason: e.reason(),
                });
                Err(e)
            }
        }
    }

    pub async fn update_calibration_settings(&self, frequency: f64, interval: i64) -> Result<()> {
        if !frequency.is_finite() {
            return Err(DashboardError::InvalidInput(format!(
                "calibration frequency must be finite (got {})",
                frequency
            )));
        }
        if interval <= 0 {
            return Err(DashboardError::InvalidInput(format!(
                "calibration interval must be positive (got {})",
                interval
            )));
        }

        let settings = CalibrationSettings {
            wm_calibration_frequency: frequency,
            wm_calibration_interval: interval,
        };
        let command = Command::global(CommandKind::CalibrationSettings)
            .with("wm_calibration_frequency", json!(frequency))
            .with("wm_calibration_interval", json!(interval));
        self.execute(command).await?;

        self.emit(ViewEvent::CalibrationSettings(settings));
        info!(frequency, interval, "Calibration settings updated");
        Ok(())
    }

    /// Initialize a calibration run, or abort the running one
    ///
    /// Returns whether a run is initialized afterwards. The local flag only
    /// flips on acknowledgment.
    pub async fn toggle_wavemeter_calibration(&self) -> Result<bool> {
        let initialized = self.wm_initialized.load(Ordering::SeqCst);
        let kind = if initialized {
            CommandKind::WmAbort
        } else {
            CommandKind::WmInitialize
        };

        self.execute(Command::global(kind)).await?;

        let now = !initialized;
        self.wm_initialized.store(now, Ordering::SeqCst);
        self.emit(ViewEvent::WavemeterCalibration(now));
        Ok(now)
    }

    pub async fn calibrate_wavemeter(&self) -> Result<()> {
        self.execute(Command::global(CommandKind::WmCalibrate))
            .await?;
        info!("Wavemeter calibration requested");
        Ok(())
    }

    pub fn wavemeter_initialized(&self) -> bool {
        self.wm_initialized.load(Ordering::SeqCst)
    }
}
