//! Unit tests for `AppError` display format and conversions.

use sim_teleop::AppError;

#[test]
fn each_variant_has_its_own_prefix() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Scene("bad".into()), "scene: bad"),
        (AppError::Messaging("bad".into()), "messaging: bad"),
        (AppError::Ipc("bad".into()), "ipc: bad"),
        (AppError::NotConnected("bad".into()), "not connected: bad"),
        (AppError::Io("bad".into()), "io: bad"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn messages_have_no_trailing_period() {
    let err = AppError::Messaging("outbound queue full".into());
    let s = err.to_string();
    assert!(
        !s.ends_with('.'),
        "error message must not end with a period: {s}"
    );
}

#[test]
fn io_error_converts_to_io_variant() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");

    let err = AppError::from(io);

    assert!(matches!(err, AppError::Io(msg) if msg.contains("pipe closed")));
}

#[test]
fn json_error_converts_to_io_variant() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").expect_err("bad json");

    let err = AppError::from(json_err);

    assert!(err.to_string().starts_with("io: json:"));
}

#[test]
fn websocket_error_converts_to_io_variant() {
    let err = AppError::from(tokio_tungstenite::tungstenite::Error::ConnectionClosed);

    assert!(err.to_string().starts_with("io: websocket:"));
}

#[test]
fn implements_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&AppError::Scene("x".into()));
}
