//! Lock/activate commands, toggles and the piezo set
//!
//! The store only ever sees acknowledged effects: a rejected or failed
//! command leaves it exactly as it was.

use crate::backend::{Command, CommandKind, CommandResult};
use crate::error::{DashboardError, Result};
use crate::state::{Channel, StatusField, UpdateSource};
use crate::view::ViewEvent;
use serde_json::json;
use tracing::{debug, info, warn};

/// Result of the read half of a toggle
///
/// `observed` is the value seen by the fresh status read. The command sent by
/// [`DashboardSession::apply_toggle`](super::DashboardSession::apply_toggle)
/// is its opposite, whatever the channel looks like by then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleIntent {
    pub name: String,
    pub field: StatusField,
    pub observed: bool,
}

impl ToggleIntent {
    /// Command the toggle will send
    pub fn command(&self) -> CommandKind {
        command_for(self.field, !self.observed)
    }
}

fn command_for(field: StatusField, value: bool) -> CommandKind {
    match (field, value) {
        (StatusField::Lock, true) => CommandKind::Lock,
        (StatusField::Lock, false) => CommandKind::Unlock,
        (StatusField::Active, true) => CommandKind::Activate,
        (StatusField::Active, false) => CommandKind::Deactivate,
    }
}

/// Parse piezo voltage text typed by the user
pub fn parse_piezo_input(input: &str) -> Result<f64> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| DashboardError::InvalidInput(format!("'{}' is not a number", input.trim())))?;
    if !value.is_finite() {
        return Err(DashboardError::InvalidInput(format!(
            "piezo value must be finite (got {})",
            value
        )));
    }
    Ok(value)
}

impl super::DashboardSession {
    pub async fn lock(&self, name: &str) -> Result<Channel> {
        self.set_status(name, StatusField::Lock, true).await
    }

    pub async fn unlock(&self, name: &str) -> Result<Channel> {
        self.set_status(name, StatusField::Lock, false).await
    }

    pub async fn activate(&self, name: &str) -> Result<Channel> {
        self.set_status(name, StatusField::Active, true).await
    }

    pub async fn deactivate(&self, name: &str) -> Result<Channel> {
        self.set_status(name, StatusField::Active, false).await
    }

    /// Fresh status read for the toggle of `field`
    pub async fn read_toggle(&self, name: &str, field: StatusField) -> Result<ToggleIntent> {
        let statuses = self.backend.fetch_status(Some(name)).await?;
        let status = statuses
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, status)| status)
            .ok_or_else(|| DashboardError::NotFound(name.to_string()))?;

        let intent = ToggleIntent {
            name: name.to_string(),
            field,
            observed: status.get(field),
        };
        debug!(?intent, "Toggle read");
        Ok(intent)
    }

    /// Send the opposite of what the read observed
    pub async fn apply_toggle(&self, intent: &ToggleIntent) -> Result<Channel> {
        self.set_status(&intent.name, intent.field, !intent.observed)
            .await
    }

    pub async fn toggle_lock(&self, name: &str) -> Result<Channel> {
        let intent = self.read_toggle(name, StatusField::Lock).await?;
        self.apply_toggle(&intent).await
    }

    pub async fn toggle_activate(&self, name: &str) -> Result<Channel> {
        let intent = self.read_toggle(name, StatusField::Active).await?;
        self.apply_toggle(&intent).await
    }

    /// Unlock `name`, then set its piezo voltage
    ///
    /// The unlock is not undone when the piezo set fails.
    pub async fn set_piezo_value(&self, name: &str, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(DashboardError::InvalidInput(format!(
                "piezo value must be finite (got {})",
                value
            )));
        }

        self.unlock(name).await?;

        let command = Command::channel(CommandKind::SetPiezo, name).with("piezo_value", json!(value));
        self.execute(command).await?;
        info!(channel = name, value, "Piezo value set");
        Ok(())
    }

    async fn set_status(&self, name: &str, field: StatusField, value: bool) -> Result<Channel> {
        let kind = command_for(field, value);
        self.execute(Command::channel(kind, name)).await?;
        self.store
            .apply_acknowledged(name, field, value, UpdateSource::Command)
            .await
    }

    /// Send one command and report the outcome to the view
    ///
    /// `status=false` becomes `CommandRejected`. No retry.
    pub(crate) async fn execute(&self, command: Command) -> Result<CommandResult> {
        let kind = command.kind;
        let name = command.target().to_string();

        let outcome = match self.backend.send_command(command).await {
            Ok(result) if result.status => Ok(result),
            Ok(result) => Err(DashboardError::CommandRejected {
                kind,
                name: name.clone(),
                reason: result.reason(),
            }),
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(_) => {
                debug!(%kind, channel = %name, "Command acknowledged");
                self.emit(ViewEvent::CommandAcknowledged { kind, name });
            }
            Err(e) => {
                warn!(%kind, channel = %name, "Command failed: {}", e);
                self.emit(ViewEvent::CommandFailure {
                    kind,
                    name,
                    reason: e.reason(),
                });
            }
        }

        outcome
    }
}
