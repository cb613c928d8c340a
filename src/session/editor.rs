//! Parameter editing
//!
//! A commit always writes the complete set: the staged base with every form
//! field written over it. Changes made on the server after the fetch are
//! overwritten.

use super::EditSession;
use crate::backend::{Command, CommandKind};
use crate::error::{DashboardError, Result};
use crate::state::{EditField, EditForm, ParameterSet, UpdateSource};
use crate::view::ViewEvent;
use tracing::{debug, info};

impl super::DashboardSession {
    /// Fetch `name`'s parameters and stage them for editing
    pub async fn begin_edit(&self, name: &str) -> Result<EditForm> {
        let parameters = self.load_parameters(name).await?;
        Ok(EditForm::from_parameters(&parameters))
    }

    /// Staged form, if any
    pub fn edit_form(&self) -> Option<(String, EditForm)> {
        self.edit
            .lock()
            .as_ref()
            .map(|s| (s.name.clone(), s.form.clone()))
    }

    /// Overwrite one field of the staged form
    pub fn set_field(&self, field: EditField, value: f64) -> Result<()> {
        let mut edit = self.edit.lock();
        let session = edit
            .as_mut()
            .ok_or_else(|| DashboardError::InvalidInput("no parameters staged for editing".into()))?;
        session.form.set(field, value)
    }

    /// Commit the staged form of the selected edit session
    pub async fn commit_staged(&self) -> Result<ParameterSet> {
        let (name, form) = self
            .edit_form()
            .ok_or_else(|| DashboardError::InvalidInput("no parameters staged for editing".into()))?;
        self.commit_edit(&name, &form).await
    }

    /// Write the complete parameter set built from `form`
    pub async fn commit_edit(&self, name: &str, form: &EditForm) -> Result<ParameterSet> {
        let staged = self
            .edit
            .lock()
            .as_ref()
            .filter(|s| s.name == name)
            .map(|s| s.base.clone());
        let base = staged.ok_or_else(|| {
            DashboardError::InvalidInput(format!("no parameters staged for '{}'", name))
        })?;
        form.validate()?;

        let written = form.apply_to(&base);
        let data = serde_json::to_value(&written)
            .map_err(|e| DashboardError::InvalidInput(e.to_string()))?;
        self.execute(Command::channel(CommandKind::WriteParameters, name).with("data", data))
            .await?;

        self.store
            .apply_parameters(name, written.clone(), UpdateSource::Command)
            .await?;
        self.stage(name, written.clone());
        info!(channel = name, "Parameters written");

        Ok(written)
    }

    /// Fetch, stage and announce a parameter set
    pub(crate) async fn load_parameters(&self, name: &str) -> Result<ParameterSet> {
        let parameters = match self.backend.fetch_parameters(name).await {
            Ok(p) => p,
            Err(e) => {
                self.emit(ViewEvent::FetchFailure {
                    what: "parameters",
                    name: name.to_string(),
                    reason: e.reason(),
                });
                return Err(e);
            }
        };

        self.stage(name, parameters.clone());
        self.emit(ViewEvent::ParameterSetLoaded {
            name: name.to_string(),
            parameters: parameters.clone(),
        });
        Ok(parameters)
    }

    fn stage(&self, name: &str, base: ParameterSet) {
        debug!(channel = name, "Parameters staged");
        *self.edit.lock() = Some(EditSession {
            name: name.to_string(),
            form: EditForm::from_parameters(&base),
            base,
        });
    }
}
