//! Boots the draw mode from its bundled package and drives it over an
//! in-memory host channel.

use async_trait::async_trait;
use robopaint_core::BridgeResult;
use robopaint_draw_mode::{ids, mode_dir, page, DrawMode};
use robopaint_mode_api::{CommandBatch, IpcMessage, ModeState};
use robopaint_mode_runtime::{
    boot, channel_pair, BootOptions, ChannelTransport, Coordinator, DeviceInfoSource, HostEndpoint, Prerequisites,
};
use robopaint_settings::{FileBackend, MemoryBackend, SettingsBackend};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

struct FixedDevice;

#[async_trait]
impl DeviceInfoSource for FixedDevice {
    async fn fetch(&self) -> BridgeResult<Value> {
        Ok(json!({"name": "WaterColorBot", "type": "watercolorbot"}))
    }
}

fn options() -> BootOptions {
    BootOptions {
        mode_dir: mode_dir(),
        shared_resources: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../resources/_i18n"),
        resource_dir_name: "_i18n".to_string(),
        map_suffix: ".map.json".to_string(),
        language: "en-US".to_string(),
        fallback_language: Some("en-US".to_string()),
    }
}

async fn start(mode: &DrawMode, backend: Arc<dyn SettingsBackend>) -> (Coordinator<ChannelTransport>, HostEndpoint) {
    let prerequisites = Prerequisites {
        device: Arc::new(FixedDevice),
        library: None,
    };
    let (transport, host) = channel_pair();
    let mut coordinator = boot(&options(), backend, &prerequisites, page(), mode.callbacks(), transport)
        .await
        .unwrap();
    coordinator.start();
    (coordinator, host)
}

fn text(coordinator: &Coordinator<ChannelTransport>, id: &str) -> String {
    let doc = coordinator.context().document();
    doc.direct_text(doc.get_element_by_id(id).unwrap())
}

fn device_event(name: &str, data: Value) -> IpcMessage {
    IpcMessage::new("cncserver", json!([name, data]))
}

#[tokio::test]
async fn test_boot_translates_and_binds() {
    let mode = DrawMode::new();
    let (coordinator, _host) = start(&mode, Arc::new(MemoryBackend::new())).await;

    assert_eq!(coordinator.state(), ModeState::Ready);
    assert_eq!(text(&coordinator, ids::TITLE), "Draw");
    assert_eq!(text(&coordinator, ids::CANCEL), "Cancel");
    assert_eq!(text(&coordinator, ids::STATUS), "Ready to draw");
    assert!(mode.state().ready);
    assert_eq!(mode.state().translations, 1);

    let settings = coordinator.context().settings().borrow();
    assert_eq!(settings.get(ids::SPEED), Some(&json!("5")));
    assert_eq!(settings.get(ids::AUTOPAINT), Some(&json!(true)));
    assert_eq!(settings.get(ids::FILL), Some(&json!("hatch")));
}

#[tokio::test]
async fn test_close_waits_for_buffer_to_drain() {
    let mode = DrawMode::new();
    let (mut coordinator, mut host) = start(&mode, Arc::new(MemoryBackend::new())).await;

    mode.draw_path(coordinator.context_mut(), &[(0.0, 0.0), (10.0, 5.0)]);
    for message in [
        device_event("langChange", json!("de")),
        device_event("bufferUpdate", json!([1, 2, 3])),
        IpcMessage::new("globalclose", Value::Null),
        device_event("bufferUpdate", json!([])),
    ] {
        host.inbound.send(message).unwrap();
    }

    assert_eq!(coordinator.run().await.unwrap(), ModeState::Terminal);

    let mut sent = Vec::new();
    while let Ok(message) = host.outbound.try_recv() {
        sent.push(message);
    }
    let channels: Vec<_> = sent.iter().map(|m| m.channel.as_str()).collect();
    assert_eq!(channels, vec!["cncserver-run", "pausetillempty", "cncserver-run", "globalclose"]);
    assert_eq!(sent[0].payload[0].as_array().map(Vec::len), Some(7));
    assert_eq!(sent[1].payload, json!(true));
    assert_eq!(
        sent[2].payload,
        serde_json::to_value(CommandBatch::full_cancel("Wird beendet")).unwrap()
    );

    assert_eq!(text(&coordinator, ids::TITLE), "Zeichnen");
    assert_eq!(text(&coordinator, ids::CANCEL), "Abbrechen");
    assert_eq!(text(&coordinator, ids::STATUS), "Zeichne 2 Punkte");
    let doc = coordinator.context().document();
    let start_button = doc.get_element_by_id(ids::START).unwrap();
    assert_eq!(doc.element(start_button).attr("title"), Some("Send the current path to the robot"));
    assert!(!mode.state().close_pending());
}

#[tokio::test]
async fn test_pause_resume_and_unknown_events() {
    let mode = DrawMode::new();
    let (mut coordinator, host) = start(&mode, Arc::new(MemoryBackend::new())).await;

    for message in [
        device_event("fullyPaused", Value::Null),
        device_event("penUpdate", json!({"state": "up"})),
        device_event("callbackEvent", json!("autoPaintComplete")),
        device_event("toolChange", json!("water0")),
    ] {
        host.inbound.send(message).unwrap();
    }
    drop(host);

    assert_eq!(coordinator.run().await.unwrap(), ModeState::Pausing);
    assert!(mode.state().paused);
    assert_eq!(text(&coordinator, ids::PAUSE), "Resume");
    assert_eq!(text(&coordinator, ids::STATUS), "Paused");
    assert_eq!(text(&coordinator, ids::PEN), "\"up\"");
    assert_eq!(mode.state().callback_events, vec![json!("autoPaintComplete")]);
    assert_eq!(mode.state().messages, vec!["toolChange".to_string()]);
}

#[tokio::test]
async fn test_settings_survive_a_reboot() {
    let dir = tempfile::tempdir().unwrap();
    let backend: Arc<dyn SettingsBackend> = Arc::new(FileBackend::new(dir.path()).unwrap());

    let mode = DrawMode::new();
    let (mut coordinator, _host) = start(&mode, Arc::clone(&backend)).await;
    let doc = coordinator.context_mut().document_mut();
    let speed = doc.get_element_by_id(ids::SPEED).unwrap();
    assert!(doc.user_input(speed, &json!("8")));

    let mode = DrawMode::new();
    let (coordinator, _host) = start(&mode, backend).await;
    let doc = coordinator.context().document();
    assert_eq!(doc.control_value(doc.get_element_by_id(ids::SPEED).unwrap()), Some(json!("8")));
}
