use std::io::Write;

use sim_teleop::{config::GlobalConfig, AppError};

fn sample_toml() -> &'static str {
    r#"
ipc_name = "teleop-test"
channel_capacity = 16

[scene]
url = "ws://sim.local:9002"

[messaging]
url = "wss://robot.local:9090"
topic = "/robot/cmd_vel"
message_type = "geometry_msgs/Twist"

[teleop]
initial_speed = 0.25
initial_turn = 0.5
"#
}

#[test]
fn parses_full_config() {
    let config = GlobalConfig::from_toml_str(sample_toml()).expect("config parses");

    assert_eq!(config.scene.url, "ws://sim.local:9002");
    assert_eq!(config.messaging.url, "wss://robot.local:9090");
    assert_eq!(config.messaging.topic, "/robot/cmd_vel");
    assert_eq!(config.messaging.message_type, "geometry_msgs/Twist");
    assert!((config.teleop.initial_speed - 0.25).abs() < f64::EPSILON);
    assert_eq!(config.ipc_name, "teleop-test");
    assert_eq!(config.channel_capacity, 16);
}

#[test]
fn empty_config_uses_defaults() {
    let config = GlobalConfig::from_toml_str("").expect("empty config parses");

    assert_eq!(config, GlobalConfig::default());
    assert_eq!(config.scene.url, "ws://localhost:9002");
    assert_eq!(config.messaging.url, "ws://localhost:9090");
    assert_eq!(config.messaging.topic, "/cmd_vel");
    assert_eq!(config.messaging.message_type, "geometry_msgs/msg/Twist");
    assert_eq!(config.ipc_name, "sim-teleop");
    assert!(config.scene.auth_key.is_empty());
}

#[test]
fn auth_key_is_never_read_from_file() {
    let config = GlobalConfig::from_toml_str(
        r#"
[scene]
url = "ws://sim:9002"
auth_key = "leaked"
"#,
    )
    .expect("config parses");

    assert!(config.scene.auth_key.is_empty());
}

#[test]
fn rejects_non_websocket_url() {
    let err = GlobalConfig::from_toml_str(
        r#"
[messaging]
url = "http://robot:9090"
"#,
    )
    .expect_err("http url rejected");

    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn rejects_empty_topic() {
    let result = GlobalConfig::from_toml_str(
        r#"
[messaging]
topic = "  "
"#,
    );

    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("topic")));
}

#[test]
fn rejects_non_positive_gain() {
    let result = GlobalConfig::from_toml_str(
        r"
[teleop]
initial_speed = 0.0
",
    );

    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("initial_speed")));
}

#[test]
fn rejects_zero_channel_capacity() {
    let result = GlobalConfig::from_toml_str("channel_capacity = 0");

    assert!(result.is_err());
}

#[test]
fn rejects_zero_speed_factor_override() {
    let result = GlobalConfig::from_toml_str(
        r#"
[teleop.speed_bindings]
q = [0.0, 1.1]
"#,
    );

    assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("'q'")));
}

#[test]
fn binding_overrides_reach_mapper() {
    let config = GlobalConfig::from_toml_str(
        r#"
[teleop.move_bindings]
w = [1.0, 0.0, 0.0, 0.0]
a = [0.0, 0.0, 0.0, 1.0]
"#,
    )
    .expect("config parses");

    let mut mapper = config.teleop.build_mapper().expect("mapper");

    assert!((mapper.map_key("w").linear.x - 0.5).abs() < f64::EPSILON);
    // Defaults are replaced, not merged.
    assert!(mapper.map_key("i").command().is_stop());
    // Speed table is still the default one.
    mapper.map_key("q");
    assert!((mapper.state().speed - 0.55).abs() < 1e-9);
}

#[test]
fn invalid_toml_is_config_error() {
    let err = GlobalConfig::from_toml_str("[scene").expect_err("invalid toml");

    assert!(err.to_string().starts_with("config: invalid config"));
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(sample_toml().as_bytes()).expect("write");

    let config = GlobalConfig::load_from_path(file.path()).expect("config loads");

    assert_eq!(config.ipc_name, "teleop-test");
}

#[test]
fn missing_file_is_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");

    let err = GlobalConfig::load_from_path(temp.path().join("absent.toml"))
        .expect_err("missing file");

    assert!(matches!(err, AppError::Config(msg) if msg.starts_with("failed to read config")));
}
