//! Integration tests for IPC command dispatch against a fake-backed session.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;

use sim_teleop::config::GlobalConfig;
use sim_teleop::ipc::server::{dispatch_command, IpcRequest, IpcState};

use super::test_helpers::{fake_session, Probe, SceneCall};

fn ipc_state() -> (IpcState, Probe) {
    let (session, probe) = fake_session();
    let mut config = GlobalConfig::default();
    config.scene.auth_key = "configured-key".into();
    let state = IpcState {
        session: Arc::new(Mutex::new(session)),
        config: Arc::new(config),
    };
    (state, probe)
}

fn request(command: &str) -> IpcRequest {
    IpcRequest {
        command: command.into(),
        ..IpcRequest::default()
    }
}

#[tokio::test]
async fn status_reports_snapshot() {
    let (state, _probe) = ipc_state();

    let response = dispatch_command(&request("status"), &state).await;

    assert!(response.ok);
    let data = response.data.expect("data");
    assert_eq!(data["scene_status"], "disconnected");
    assert_eq!(data["messaging_status"], "disconnected");
    assert_eq!(data["following"], false);
    assert_eq!(data["speed"], 0.5);
}

#[tokio::test]
async fn connect_uses_configured_defaults() {
    let (state, probe) = ipc_state();

    let response = dispatch_command(&request("connect"), &state).await;

    assert!(response.ok);
    assert_eq!(response.data, Some(json!({ "status": "connected" })));
    match &probe.scene.calls()[0] {
        SceneCall::Open { url, key, .. } => {
            assert_eq!(url, "ws://localhost:9002");
            assert_eq!(key, "configured-key");
        }
        other => panic!("expected open, got {other:?}"),
    }
}

#[tokio::test]
async fn connect_accepts_url_and_key_overrides() {
    let (state, probe) = ipc_state();
    let req = IpcRequest {
        command: "connect".into(),
        url: Some("ws://other:9002".into()),
        key: Some("override".into()),
        ..IpcRequest::default()
    };

    dispatch_command(&req, &state).await;

    assert!(matches!(
        &probe.scene.calls()[0],
        SceneCall::Open { url, key, .. } if url == "ws://other:9002" && key == "override"
    ));
}

#[tokio::test]
async fn connect_messaging_reports_pending() {
    let (state, _probe) = ipc_state();

    let response = dispatch_command(&request("connect_messaging"), &state).await;

    assert_eq!(
        response.data,
        Some(json!({ "status": "disconnected", "pending": true }))
    );
}

#[tokio::test]
async fn select_requires_model() {
    let (state, _probe) = ipc_state();

    let response = dispatch_command(&request("select"), &state).await;

    assert!(!response.ok);
    assert_eq!(
        response.error.as_deref(),
        Some("missing required 'model' field")
    );
}

#[tokio::test]
async fn select_without_scene_is_not_forwarded() {
    let (state, _probe) = ipc_state();
    let req = IpcRequest {
        command: "select".into(),
        model: Some("robot".into()),
        ..IpcRequest::default()
    };

    let response = dispatch_command(&req, &state).await;

    assert!(response.ok);
    assert_eq!(response.data, Some(json!({ "forwarded": false })));
}

#[tokio::test]
async fn follow_then_escape() {
    let (state, probe) = ipc_state();
    dispatch_command(&request("connect"), &state).await;
    let follow = IpcRequest {
        command: "follow".into(),
        model: Some("robot".into()),
        ..IpcRequest::default()
    };

    let response = dispatch_command(&follow, &state).await;
    assert_eq!(
        response.data,
        Some(json!({ "forwarded": true, "following": true }))
    );

    let response = dispatch_command(&request("escape"), &state).await;
    assert_eq!(
        response.data,
        Some(json!({ "forwarded": true, "following": false }))
    );
    assert!(probe.scene.calls().contains(&SceneCall::Follow(None)));
}

#[tokio::test]
async fn key_returns_mapped_command() {
    let (state, _probe) = ipc_state();
    let req = IpcRequest {
        command: "key".into(),
        key: Some("j".into()),
        ..IpcRequest::default()
    };

    let response = dispatch_command(&req, &state).await;

    assert!(response.ok);
    assert_eq!(
        response.data,
        Some(json!({
            "linear": {"x": 0.0, "y": 0.0, "z": 0.0},
            "angular": {"x": 0.0, "y": 0.0, "z": 1.0},
        }))
    );
    assert_eq!(state.session.lock().await.dropped_commands(), 1);
}

#[tokio::test]
async fn key_requires_key_field() {
    let (state, _probe) = ipc_state();

    let response = dispatch_command(&request("key"), &state).await;

    assert_eq!(response.error.as_deref(), Some("missing required 'key' field"));
}

#[tokio::test]
async fn toggle_fullscreen_is_rejected() {
    let (state, _probe) = ipc_state();

    let response = dispatch_command(&request("toggle_fullscreen"), &state).await;

    assert!(!response.ok);
    assert!(response
        .error
        .as_deref()
        .is_some_and(|err| err.contains("display platform")));
}

#[tokio::test]
async fn unknown_command_is_rejected() {
    let (state, _probe) = ipc_state();

    let response = dispatch_command(&request("warp"), &state).await;

    assert_eq!(response.error.as_deref(), Some("unknown command: warp"));
}

#[test]
fn request_parses_with_optional_fields_missing() {
    let req: IpcRequest = serde_json::from_str(r#"{"command":"models"}"#).expect("parse");

    assert_eq!(req.command, "models");
    assert!(req.model.is_none());
    assert!(req.url.is_none());
    assert!(req.key.is_none());
}
