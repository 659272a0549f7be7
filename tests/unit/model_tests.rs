//! Unit tests for velocity, scene and status models.

use serde_json::json;

use sim_teleop::models::scene::{resolve_model_id, SceneModel};
use sim_teleop::models::status::{ConnectionStatus, Notice};
use sim_teleop::models::velocity::{Vector3, VelocityCommand, VelocityState};

#[test]
fn velocity_command_serialises_as_twist() {
    let command = VelocityCommand {
        linear: Vector3::new(0.5, 0.0, 0.0),
        angular: Vector3::new(0.0, 0.0, -1.0),
    };

    assert_eq!(
        serde_json::to_value(command).expect("serialise"),
        json!({
            "linear": {"x": 0.5, "y": 0.0, "z": 0.0},
            "angular": {"x": 0.0, "y": 0.0, "z": -1.0},
        })
    );
}

#[test]
fn default_state_is_stopped_with_initial_gains() {
    let state = VelocityState::default();

    assert!(state.command().is_stop());
    assert!((state.speed - 0.5).abs() < f64::EPSILON);
    assert!((state.turn - 1.0).abs() < f64::EPSILON);
}

#[test]
fn stop_zeroes_vectors_only() {
    let mut state = VelocityState::new(2.0, 3.0);
    state.linear = Vector3::new(1.0, 1.0, 0.0);

    state.stop();

    assert_eq!(state.linear, Vector3::ZERO);
    assert!((state.speed - 2.0).abs() < f64::EPSILON);
}

#[test]
fn resolve_prefers_matching_name() {
    let models = vec![
        SceneModel::new("turtlebot", "tb_1"),
        SceneModel::new("box", "box_1"),
    ];

    assert_eq!(resolve_model_id(&models, "box"), "box_1");
    assert_eq!(resolve_model_id(&models, "tb_1"), "tb_1");
    assert_eq!(resolve_model_id(&[], "anything"), "anything");
}

#[test]
fn connection_status_strings() {
    assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
    assert_eq!(ConnectionStatus::Connected.to_string(), "connected");
    assert_eq!(
        serde_json::to_value(ConnectionStatus::Disconnected).expect("serialise"),
        json!("disconnected")
    );
}

#[test]
fn notice_keeps_message() {
    let notice = Notice::now("scene connection closed");

    assert_eq!(notice.message, "scene connection closed");
}
