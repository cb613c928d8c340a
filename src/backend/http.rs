//! HTTP backend for the lock server
//!
//! Requests go to `<base_url>/get/..` and `<base_url>/post/..` and answer with
//! the `{status, data}` envelope. Streams are plain SSE on `/stream/..`.

use super::sse::event_stream;
use super::{Backend, CalibrationSettings, Command, CommandResult, EventStream, StatusMap};
use crate::config::ServerConfig;
use crate::error::{DashboardError, Result};
use crate::state::{ChannelStatus, ParameterSet};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(DashboardError::transport)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the client and log in when credentials are configured
    pub async fn connect(config: &ServerConfig) -> Result<Self> {
        let backend = Self::new(
            &config.base_url,
            Duration::from_millis(config.connect_timeout_ms),
        )?;

        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            backend.login(user, password).await?;
        }

        info!(base_url = %backend.base_url, "HTTP backend ready");
        Ok(backend)
    }

    /// Post the login form; the session cookie is kept by the client
    ///
    /// The server redirects away from `/login` on success. Bad credentials
    /// answer 200 with an HTML page on `/login` itself.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("login"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(DashboardError::transport)?
            .error_for_status()
            .map_err(DashboardError::transport)?;

        if response.url().path().trim_end_matches('/').ends_with("/login") {
            warn!(user = username, "Lock server rejected the credentials");
            return Err(DashboardError::Transport("login rejected".to_string()));
        }

        debug!(status = %response.status(), user = username, "Logged in");
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_envelope(&self, path: &str, name: Option<&str>) -> Result<CommandResult> {
        let mut request = self.client.get(self.url(path));
        if let Some(name) = name {
            request = request.query(&[("name", name)]);
        }
        debug!(path, name, "GET");
        let response = request
            .send()
            .await
            .map_err(DashboardError::transport)?
            .error_for_status()
            .map_err(DashboardError::transport)?;
        response
            .json::<CommandResult>()
            .await
            .map_err(DashboardError::transport)
    }

    /// Fetch and unwrap `data`; `status=false` counts as a failed fetch
    async fn fetch_data(&self, path: &str, name: Option<&str>) -> Result<Value> {
        let envelope = self.get_envelope(path, name).await?;
        if !envelope.status {
            return Err(DashboardError::Transport(format!(
                "{} failed: {}",
                path,
                envelope.reason()
            )));
        }
        Ok(envelope.data)
    }

    async fn open_stream(&self, path: &str, label: &'static str) -> Result<EventStream> {
        let response = self
            .client
            .get(self.url(path))
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(DashboardError::transport)?
            .error_for_status()
            .map_err(DashboardError::transport)?;
        info!(stream = label, "Stream opened");
        Ok(event_stream(response, label))
    }
}

fn decode_status_map(data: Value) -> Result<StatusMap> {
    let Value::Object(entries) = data else {
        return Err(DashboardError::Transport(format!(
            "status data is not an object: {}",
            data
        )));
    };

    Ok(entries
        .into_iter()
        .map(|(name, entry)| {
            let flag = |key: &str| entry.get(key).and_then(Value::as_bool).unwrap_or(false);
            let status = ChannelStatus::new(flag("active"), flag("lock"));
            (name, status)
        })
        .collect())
}

#[async_trait]
impl Backend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_status(&self, name: Option<&str>) -> Result<StatusMap> {
        let data = self.fetch_data("get/status", name).await?;
        decode_status_map(data)
    }

    async fn fetch_parameters(&self, name: &str) -> Result<ParameterSet> {
        let data = self.fetch_data("get/parameter", Some(name)).await?;
        let parameters: ParameterSet =
            serde_json::from_value(data).map_err(DashboardError::transport)?;
        if let Err(e) = parameters.validate() {
            warn!(channel = name, error = %e, "Server returned inconsistent parameters");
        }
        Ok(parameters)
    }

    async fn fetch_plot(&self, name: &str) -> Result<String> {
        match self.fetch_data("get/graph", Some(name)).await? {
            Value::String(svg) => Ok(svg),
            other => Err(DashboardError::Transport(format!(
                "graph data is not a string: {}",
                other
            ))),
        }
    }

    async fn fetch_channel_list(&self) -> Result<Vec<String>> {
        let data = self.fetch_data("get/list", None).await?;
        serde_json::from_value(data).map_err(DashboardError::transport)
    }

    async fn fetch_calibration_settings(&self) -> Result<CalibrationSettings> {
        let data = self.fetch_data("get/calibration_settings", None).await?;
        serde_json::from_value(data).map_err(DashboardError::transport)
    }

    async fn send_command(&self, command: Command) -> Result<CommandResult> {
        let path = format!("post/{}", command.kind.path());
        debug!(%path, channel = command.target(), "POST");

        let response = self
            .client
            .post(self.url(&path))
            .json(&command.body())
            .send()
            .await
            .map_err(DashboardError::transport)?
            .error_for_status()
            .map_err(DashboardError::transport)?;
        response
            .json::<CommandResult>()
            .await
            .map_err(DashboardError::transport)
    }

    async fn subscribe_channel_table(&self) -> Result<EventStream> {
        self.open_stream("stream/values", "values").await
    }

    async fn subscribe_digit_value(&self) -> Result<EventStream> {
        self.open_stream("stream/digit", "digit").await
    }
}
