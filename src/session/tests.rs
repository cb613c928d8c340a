//! Tests for DashboardSession

use super::*;
use crate::backend::{CalibrationSettings, Command, CommandKind, CommandResult, EventStream, StatusMap};
use crate::error::DashboardError;
use crate::state::{ChannelStatus, ChannelUpdate, EditField, StatusField, UpdateSource};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;

type CommandHook = Box<dyn Fn(&Command) + Send + Sync>;

/// Scripted backend recording every call
#[derive(Default)]
struct MockBackend {
    calls: Mutex<Vec<String>>,
    sent: Mutex<Vec<Command>>,
    statuses: Mutex<Vec<(String, ChannelStatus)>>,
    parameters: Mutex<HashMap<String, Value>>,
    rejections: Mutex<HashMap<CommandKind, String>>,
    before_reply: Mutex<Option<CommandHook>>,
    table_events: Mutex<Vec<String>>,
    digit_events: Mutex<Vec<String>>,
}

impl MockBackend {
    fn with_channel(name: &str, active: bool, lock: bool) -> Arc<Self> {
        let backend = Self::default();
        backend
            .statuses
            .lock()
            .push((name.to_string(), ChannelStatus::new(active, lock)));
        backend
            .parameters
            .lock()
            .insert(name.to_string(), parameters_json(active, lock));
        Arc::new(backend)
    }

    fn set_status(&self, name: &str, active: bool, lock: bool) {
        let mut statuses = self.statuses.lock();
        if let Some(entry) = statuses.iter_mut().find(|(n, _)| n == name) {
            entry.1 = ChannelStatus::new(active, lock);
        }
    }

    fn reject(&self, kind: CommandKind, reason: &str) {
        self.rejections.lock().insert(kind, reason.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn sent(&self) -> Vec<Command> {
        self.sent.lock().clone()
    }
}

fn parameters_json(active: bool, lock: bool) -> Value {
    json!({
        "setpoint": 384.230484,
        "offset": 0.1,
        "P": 1.5,
        "I": 0.2,
        "D": 0.0,
        "range_center": 0.5,
        "range_span": 1.0,
        "ramp_rate": null,
        "limits": [-1.0, 1.0],
        "WM_Exposure": 10,
        "WM_Reading_State": "WM Readout Working",
        "active": active,
        "lock": lock,
        "type": "ecdl",
        "trace_length": 500
    })
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_status(&self, name: Option<&str>) -> Result<StatusMap> {
        self.calls
            .lock()
            .push(format!("fetch_status({})", name.unwrap_or("*")));
        let statuses = self.statuses.lock().clone();
        Ok(match name {
            Some(n) => statuses.into_iter().filter(|(s, _)| s == n).collect(),
            None => statuses,
        })
    }

    async fn fetch_parameters(&self, name: &str) -> Result<ParameterSet> {
        self.calls.lock().push(format!("fetch_parameters({})", name));
        let raw = self
            .parameters
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| DashboardError::Transport(format!("unknown channel {}", name)))?;
        serde_json::from_value(raw).map_err(DashboardError::transport)
    }

    async fn fetch_plot(&self, name: &str) -> Result<String> {
        self.calls.lock().push(format!("fetch_plot({})", name));
        Ok(format!("<svg id=\"{}\"/>", name))
    }

    async fn fetch_channel_list(&self) -> Result<Vec<String>> {
        self.calls.lock().push("fetch_channel_list".to_string());
        Ok(self.statuses.lock().iter().map(|(n, _)| n.clone()).collect())
    }

    async fn fetch_calibration_settings(&self) -> Result<CalibrationSettings> {
        self.calls.lock().push("fetch_calibration_settings".to_string());
        Ok(CalibrationSettings {
            wm_calibration_frequency: 384.23,
            wm_calibration_interval: 600,
        })
    }

    async fn send_command(&self, command: Command) -> Result<CommandResult> {
        self.calls
            .lock()
            .push(format!("send({} {})", command.kind, command.target()));
        self.sent.lock().push(command.clone());

        if let Some(hook) = self.before_reply.lock().as_ref() {
            hook(&command);
        }

        Ok(match self.rejections.lock().get(&command.kind) {
            Some(reason) => CommandResult {
                status: false,
                data: json!(reason),
            },
            None => CommandResult {
                status: true,
                data: Value::Null,
            },
        })
    }

    async fn subscribe_channel_table(&self) -> Result<EventStream> {
        self.calls.lock().push("subscribe_channel_table".to_string());
        let events: Vec<Result<String>> = self.table_events.lock().drain(..).map(Ok).collect();
        Ok(Box::pin(tokio_stream::iter(events)))
    }

    async fn subscribe_digit_value(&self) -> Result<EventStream> {
        self.calls.lock().push("subscribe_digit_value".to_string());
        let events: Vec<Result<String>> = self.digit_events.lock().drain(..).map(Ok).collect();
        Ok(Box::pin(tokio_stream::iter(events)))
    }
}

async fn make_session(
    backend: &Arc<MockBackend>,
) -> (Arc<DashboardSession>, mpsc::UnboundedReceiver<ViewEvent>) {
    let backend: Arc<dyn Backend> = backend.clone();
    DashboardSession::spawn(PollingConfig::default(), backend)
        .await
        .unwrap()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ViewEvent>) -> Vec<ViewEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_toggle_activate_reads_then_activates() {
    let backend = MockBackend::with_channel("A", false, true);
    let (session, _rx) = make_session(&backend).await;
    session
        .store()
        .upsert("A", ChannelUpdate::status(false, true), UpdateSource::Poll);

    let channel = session.toggle_activate("A").await.unwrap();

    assert_eq!(backend.calls(), vec!["fetch_status(A)", "send(activate A)"]);
    assert_eq!(channel.status, ChannelStatus::new(true, true));
    let stored = session.store().get("A").await.unwrap();
    assert_eq!(stored.status, ChannelStatus::new(true, true));
    assert_eq!(stored.last_updated_by, UpdateSource::Command);
}

#[tokio::test]
async fn test_toggle_lock_unlocks_locked_channel() {
    let backend = MockBackend::with_channel("A", true, true);
    let (session, _rx) = make_session(&backend).await;

    let channel = session.toggle_lock("A").await.unwrap();

    assert_eq!(backend.calls(), vec!["fetch_status(A)", "send(unlock A)"]);
    assert_eq!(channel.status, ChannelStatus::new(false, false));
}

#[tokio::test]
async fn test_poll_between_read_and_ack_loses_to_command() {
    let backend = MockBackend::with_channel("A", false, true);
    let (session, _rx) = make_session(&backend).await;

    let intent = session.read_toggle("A", StatusField::Active).await.unwrap();
    assert!(!intent.observed);

    // A poll result lands while the activate command is in flight
    let store = session.store().clone();
    *backend.before_reply.lock() = Some(Box::new(move |_cmd: &Command| {
        store.upsert("A", ChannelUpdate::status(false, false), UpdateSource::Poll);
    }));

    session.apply_toggle(&intent).await.unwrap();

    let stored = session.store().get("A").await.unwrap();
    assert_eq!(stored.last_updated_by, UpdateSource::Command);
    assert!(stored.status.active);
    // lock comes from the poll that reached the store first
    assert!(!stored.status.lock);
}

#[tokio::test]
async fn test_toggle_acts_on_stale_read() {
    let backend = MockBackend::with_channel("A", false, false);
    let (session, _rx) = make_session(&backend).await;

    let intent = session.read_toggle("A", StatusField::Active).await.unwrap();

    // Another client activates the channel after our read
    backend.set_status("A", true, false);
    session.poll_status().await;
    assert!(session.store().get("A").await.unwrap().status.active);

    // The toggle still sends what the read implied
    assert_eq!(intent.command(), CommandKind::Activate);
    session.apply_toggle(&intent).await.unwrap();
    assert_eq!(backend.sent().last().unwrap().kind, CommandKind::Activate);
}

#[tokio::test]
async fn test_read_toggle_unknown_channel() {
    let backend = MockBackend::with_channel("A", false, false);
    let (session, _rx) = make_session(&backend).await;

    let err = session.read_toggle("ghost", StatusField::Lock).await.unwrap_err();
    assert!(matches!(err, DashboardError::NotFound(ref n) if n == "ghost"));
    assert_eq!(backend.count("send"), 0);
}

#[tokio::test]
async fn test_rejected_lock_leaves_store_unchanged() {
    let backend = MockBackend::with_channel("A", true, false);
    backend.reject(CommandKind::Lock, "channel not active");
    let (session, mut rx) = make_session(&backend).await;
    session
        .store()
        .upsert("A", ChannelUpdate::status(true, false), UpdateSource::Poll);
    let before = session.store().get("A").await.unwrap();
    drain(&mut rx);

    let err = session.lock("A").await.unwrap_err();
    assert!(matches!(
        err,
        DashboardError::CommandRejected { kind: CommandKind::Lock, ref name, .. } if name == "A"
    ));

    let after = session.store().get("A").await.unwrap();
    assert_eq!(after, before);
    assert_eq!(
        drain(&mut rx),
        vec![ViewEvent::CommandFailure {
            kind: CommandKind::Lock,
            name: "A".to_string(),
            reason: "channel not active".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_acknowledged_command_notifies_indicator() {
    let backend = MockBackend::with_channel("A", false, false);
    let (session, mut rx) = make_session(&backend).await;

    session.activate("A").await.unwrap();

    let events = drain(&mut rx);
    assert!(events.contains(&ViewEvent::CommandAcknowledged {
        kind: CommandKind::Activate,
        name: "A".to_string(),
    }));
    assert!(events.iter().any(|e| matches!(
        e,
        ViewEvent::Indicator(change) if change.name == "A" && change.active && change.source == UpdateSource::Command
    )));
}

#[tokio::test]
async fn test_nan_piezo_is_rejected_without_network() {
    let backend = MockBackend::with_channel("A", true, true);
    let (session, _rx) = make_session(&backend).await;

    let err = session.set_piezo_value("A", f64::NAN).await.unwrap_err();
    assert!(matches!(err, DashboardError::InvalidInput(_)));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_piezo_unlocks_then_sets_value() {
    let backend = MockBackend::with_channel("A", true, true);
    let (session, _rx) = make_session(&backend).await;

    session.set_piezo_value("A", 2.5).await.unwrap();

    assert_eq!(backend.calls(), vec!["send(unlock A)", "send(set_piezo A)"]);
    assert_eq!(
        backend.sent()[1].body(),
        json!({"name": "A", "piezo_value": 2.5})
    );
}

#[tokio::test]
async fn test_rejected_piezo_leaves_channel_unlocked() {
    let backend = MockBackend::with_channel("A", true, true);
    backend.reject(CommandKind::SetPiezo, "out of range");
    let (session, _rx) = make_session(&backend).await;
    session
        .store()
        .upsert("A", ChannelUpdate::status(true, true), UpdateSource::Poll);

    let err = session.set_piezo_value("A", 99.0).await.unwrap_err();
    assert!(matches!(
        err,
        DashboardError::CommandRejected { kind: CommandKind::SetPiezo, .. }
    ));

    let stored = session.store().get("A").await.unwrap();
    assert_eq!(stored.status, ChannelStatus::new(true, false));
    // no re-lock attempted
    assert_eq!(backend.count("send(lock"), 0);
}

#[tokio::test]
async fn test_rejected_unlock_skips_piezo() {
    let backend = MockBackend::with_channel("A", true, true);
    backend.reject(CommandKind::Unlock, "busy");
    let (session, _rx) = make_session(&backend).await;

    let err = session.set_piezo_value("A", 1.0).await.unwrap_err();
    assert!(matches!(
        err,
        DashboardError::CommandRejected { kind: CommandKind::Unlock, .. }
    ));
    assert_eq!(backend.count("send(set_piezo"), 0);
}

#[tokio::test]
async fn test_select_twice_refetches() {
    let backend = MockBackend::with_channel("A", true, false);
    let (session, _rx) = make_session(&backend).await;

    session.select("A").await.unwrap();
    session.select("A").await.unwrap();

    assert_eq!(backend.count("fetch_parameters(A)"), 2);
}

#[tokio::test]
async fn test_select_updates_store_and_view() {
    let backend = MockBackend::with_channel("A", true, false);
    let (session, mut rx) = make_session(&backend).await;

    let parameters = session.select("A").await.unwrap();

    let stored = session.store().get("A").await.unwrap();
    assert_eq!(stored.status, ChannelStatus::new(true, false));
    assert_eq!(stored.last_updated_by, UpdateSource::Poll);
    assert_eq!(stored.parameters.as_ref(), Some(&parameters));
    assert_eq!(session.selection().await.as_deref(), Some("A"));

    let events = drain(&mut rx);
    assert!(matches!(&events[0], ViewEvent::ParameterSetLoaded { name, .. } if name == "A"));
    assert!(events.iter().any(|e| matches!(
        e,
        ViewEvent::Indicator(change) if change.is_selected
    )));
}

#[tokio::test]
async fn test_failed_select_keeps_selection_and_store() {
    let backend = MockBackend::with_channel("A", true, false);
    let (session, mut rx) = make_session(&backend).await;

    assert!(session.select("ghost").await.is_err());

    assert_eq!(session.selection().await.as_deref(), Some("ghost"));
    assert!(session.store().get_all().await.is_empty());
    assert!(matches!(
        drain(&mut rx).as_slice(),
        [ViewEvent::FetchFailure { what: "parameters", .. }]
    ));
}

#[tokio::test]
async fn test_commit_writes_whole_object() {
    let backend = MockBackend::with_channel("A", true, false);
    let (session, _rx) = make_session(&backend).await;

    session.begin_edit("A").await.unwrap();
    session.set_field(EditField::P, 2.0).unwrap();
    session.set_field(EditField::UpperLimit, 3.0).unwrap();
    let written = session.commit_staged().await.unwrap();

    let sent = backend.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, CommandKind::WriteParameters);

    let mut expected = parameters_json(true, false);
    expected["P"] = json!(2.0);
    expected["limits"] = json!([-1.0, 3.0]);
    expected["WM_Exposure"] = json!(10.0);
    assert_eq!(sent[0].body(), json!({"name": "A", "data": expected}));

    let stored = session.store().get("A").await.unwrap();
    assert_eq!(stored.parameters, Some(written));
    assert_eq!(stored.last_updated_by, UpdateSource::Command);
}

#[tokio::test]
async fn test_select_and_commit_with_unset_limits() {
    let backend = MockBackend::with_channel("A", true, true);
    {
        let mut parameters = backend.parameters.lock();
        let raw = parameters.get_mut("A").unwrap();
        raw["limits"] = json!([null, null]);
        raw["range_center"] = Value::Null;
        raw["range_span"] = Value::Null;
    }
    let (session, mut rx) = make_session(&backend).await;

    let parameters = session.select("A").await.unwrap();
    assert_eq!(parameters.limits, [None, None]);
    let stored = session.store().get("A").await.unwrap();
    assert_eq!(stored.status, ChannelStatus::new(true, true));
    assert!(!drain(&mut rx)
        .iter()
        .any(|e| matches!(e, ViewEvent::FetchFailure { .. })));

    session.set_field(EditField::LowerLimit, -2.0).unwrap();
    session.commit_staged().await.unwrap();

    let data = &backend.sent()[0].body()["data"];
    assert_eq!(data["limits"], json!([-2.0, null]));
    assert_eq!(data["range_center"], Value::Null);
    assert_eq!(data["range_span"], Value::Null);
}

#[tokio::test]
async fn test_commit_clobbers_remote_change() {
    let backend = MockBackend::with_channel("A", true, false);
    let (session, _rx) = make_session(&backend).await;

    let form = session.begin_edit("A").await.unwrap();

    // Someone else changes the setpoint on the server meanwhile
    backend.parameters.lock().get_mut("A").unwrap()["setpoint"] = json!(400.0);

    session.commit_edit("A", &form).await.unwrap();
    let data = &backend.sent()[0].body()["data"];
    assert_eq!(data["setpoint"], json!(384.230484));
}

#[tokio::test]
async fn test_commit_validates_before_sending() {
    let backend = MockBackend::with_channel("A", true, false);
    let (session, _rx) = make_session(&backend).await;

    let mut form = session.begin_edit("A").await.unwrap();
    form.lower_limit = Some(5.0);
    assert!(matches!(
        session.commit_edit("A", &form).await,
        Err(DashboardError::InvalidInput(_))
    ));

    // nothing staged for another channel
    assert!(matches!(
        session.commit_edit("B", &form).await,
        Err(DashboardError::InvalidInput(_))
    ));
    assert_eq!(backend.count("send"), 0);
}

#[tokio::test]
async fn test_rejected_commit_keeps_store() {
    let backend = MockBackend::with_channel("A", true, false);
    backend.reject(CommandKind::WriteParameters, "locked");
    let (session, _rx) = make_session(&backend).await;

    session.begin_edit("A").await.unwrap();
    assert!(session.commit_staged().await.is_err());
    assert!(session.store().get("A").await.is_err());
}

#[tokio::test]
async fn test_malformed_table_event_is_dropped() {
    let backend = MockBackend::with_channel("A", true, false);
    backend.table_events.lock().extend([
        "{\"active_values\": ".to_string(),
        r#"{"active_values":{"A":1.234567},"piezo_values":{"A":2.5}}"#.to_string(),
    ]);
    let (session, mut rx) = make_session(&backend).await;

    session.run_table_stream().await;

    let table = session.store().table().await.unwrap();
    assert_eq!(table.snapshot.piezo("A"), Some(2.5));
    assert_eq!(table.last_updated_by, UpdateSource::Stream);

    let snapshots: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, ViewEvent::TableSnapshot(_)))
        .collect();
    assert_eq!(snapshots.len(), 1);

    // table events never touch channel status
    assert!(session.store().get("A").await.is_err());
}

#[tokio::test]
async fn test_digit_stream_skips_null_and_garbage() {
    let backend = MockBackend::with_channel("A", true, false);
    backend
        .digit_events
        .lock()
        .extend(["384.1".to_string(), "null".to_string(), "x".to_string(), "384.2".to_string()]);
    let (session, mut rx) = make_session(&backend).await;

    session.run_digit_stream().await;

    let values: Vec<f64> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            ViewEvent::DigitValue(v) => Some(v),
            _ => None,
        })
        .collect();
    assert_eq!(values, vec![384.1, 384.2]);
}

#[tokio::test]
async fn test_poll_status_upserts_every_channel() {
    let backend = MockBackend::with_channel("A", true, false);
    backend
        .statuses
        .lock()
        .push(("B".to_string(), ChannelStatus::new(false, true)));
    let (session, _rx) = make_session(&backend).await;

    session.poll_status().await;

    let all = session.store().get_all().await;
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].status, ChannelStatus::new(false, true));
    assert!(all.iter().all(|c| c.last_updated_by == UpdateSource::Poll));
}

#[tokio::test]
async fn test_wavemeter_toggle_flips_only_on_ack() {
    let backend = MockBackend::with_channel("A", true, false);
    let (session, _rx) = make_session(&backend).await;

    assert!(session.toggle_wavemeter_calibration().await.unwrap());
    assert!(session.wavemeter_initialized());

    backend.reject(CommandKind::WmAbort, "not running");
    assert!(session.toggle_wavemeter_calibration().await.is_err());
    assert!(session.wavemeter_initialized());

    assert_eq!(
        backend.calls(),
        vec!["send(wm_initialize )", "send(wm_abort )"]
    );
}

#[tokio::test]
async fn test_calibration_settings_validation() {
    let backend = MockBackend::with_channel("A", true, false);
    let (session, _rx) = make_session(&backend).await;

    assert!(session.update_calibration_settings(f64::NAN, 10).await.is_err());
    assert!(session.update_calibration_settings(384.0, 0).await.is_err());
    assert_eq!(backend.count("send"), 0);

    session.update_calibration_settings(384.0, 60).await.unwrap();
    assert_eq!(
        backend.sent()[0].body(),
        json!({"wm_calibration_frequency": 384.0, "wm_calibration_interval": 60})
    );
}

#[tokio::test]
async fn test_plot_requires_selection() {
    let backend = MockBackend::with_channel("A", true, false);
    let (session, mut rx) = make_session(&backend).await;

    assert!(matches!(
        session.refresh_plot().await,
        Err(DashboardError::InvalidInput(_))
    ));

    session.select("A").await.unwrap();
    drain(&mut rx);
    session.refresh_plot().await.unwrap();
    session.clear_plot().await.unwrap();

    let events = drain(&mut rx);
    assert!(events.contains(&ViewEvent::PlotLoaded {
        name: "A".to_string(),
        svg: "<svg id=\"A\"/>".to_string(),
    }));
    assert!(events.contains(&ViewEvent::PlotCleared));
}

#[tokio::test(start_paused = true)]
async fn test_initialize_selects_first_channel_and_starts_poll() {
    let backend = MockBackend::with_channel("A", true, false);
    let (session, _rx) = make_session(&backend).await;

    session.initialize(None).await.unwrap();

    assert!(session.scheduler.is_running(crate::scheduler::STATUS_POLL));
    assert_eq!(session.selection().await.as_deref(), Some("A"));
    assert_eq!(backend.count("fetch_status(*)"), 1);

    tokio::time::sleep(std::time::Duration::from_millis(5100)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(backend.count("fetch_status(*)"), 2);
    assert_eq!(backend.count("subscribe_channel_table"), 1);
    assert_eq!(backend.count("subscribe_digit_value"), 1);

    session.shutdown();
    assert!(!session.scheduler.is_running(crate::scheduler::STATUS_POLL));
}

#[tokio::test(start_paused = true)]
async fn test_plot_refresh_toggle_runs_immediately() {
    let backend = MockBackend::with_channel("A", true, false);
    let (session, _rx) = make_session(&backend).await;
    session.select("A").await.unwrap();

    assert!(session
        .toggle_plot_refresh(Some(std::time::Duration::from_millis(200)))
        .unwrap());
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(backend.count("fetch_plot"), 1);

    assert!(!session.toggle_plot_refresh(None).unwrap());
    tokio::time::sleep(std::time::Duration::from_millis(1000)).await;
    assert_eq!(backend.count("fetch_plot"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_plot_period_is_rejected() {
    let backend = MockBackend::with_channel("A", true, false);
    let (session, _rx) = make_session(&backend).await;
    session.select("A").await.unwrap();

    let err = session
        .toggle_plot_refresh(Some(std::time::Duration::ZERO))
        .unwrap_err();
    assert!(matches!(err, DashboardError::InvalidInput(_)));
    assert!(!session.scheduler.is_running(crate::scheduler::PLOT_REFRESH));

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(backend.count("fetch_plot"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_apply_settings_restarts_status_poll() {
    let backend = MockBackend::with_channel("A", true, false);
    let (session, _rx) = make_session(&backend).await;
    session.initialize(Some("A".to_string())).await.unwrap();

    session.apply_settings(PollingConfig {
        status_interval_ms: 1000,
        plot_interval_ms: 1000,
    });
    assert_eq!(session.settings().status_interval_ms, 1000);

    tokio::time::sleep(std::time::Duration::from_millis(1050)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(backend.count("fetch_status(*)"), 2);
    session.shutdown();
}
