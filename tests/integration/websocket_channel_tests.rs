//! Integration tests for the websocket connectors against an in-process
//! websocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::task::TaskTracker;

use sim_teleop::channel::messaging::RosbridgeConnector;
use sim_teleop::channel::scene::WsSceneConnector;
use sim_teleop::channel::{
    ChannelEvent, ChannelEventKind, ChannelKind, Generation, MessagingConnector, SceneConnector,
};
use sim_teleop::config::GlobalConfig;
use sim_teleop::models::scene::SceneModel;
use sim_teleop::session::{build_session, wait_for_channels};
use sim_teleop::AppError;

const WAIT: Duration = Duration::from_secs(5);

async fn next_event(rx: &mut mpsc::Receiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("event in time")
        .expect("event channel open")
}

/// Accept one websocket client and forward every text frame it sends.
///
/// Strings sent on the returned sender are pushed to the client; dropping
/// the sender closes the socket.
async fn spawn_recording_server() -> (String, mpsc::Receiver<Value>, mpsc::Sender<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("ws://{}", listener.local_addr().expect("addr"));
    let (frames_tx, frames_rx) = mpsc::channel(32);
    let (push_tx, mut push_rx) = mpsc::channel::<String>(8);

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.expect("accept");
        let ws = tokio_tungstenite::accept_async(tcp).await.expect("handshake");
        let (mut sink, mut stream) = ws.split();
        loop {
            tokio::select! {
                push = push_rx.recv() => {
                    let Some(text) = push else {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        let value: Value = serde_json::from_str(&text).expect("json frame");
                        if frames_tx.send(value).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    });

    (url, frames_rx, push_tx)
}

async fn next_frame(rx: &mut mpsc::Receiver<Value>) -> Value {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("frame in time")
        .expect("server running")
}

#[tokio::test]
async fn rosbridge_advertises_once_then_publishes() {
    let (url, mut frames, _push) = spawn_recording_server().await;
    let (events_tx, mut events_rx) = mpsc::channel(8);
    let mut connector = RosbridgeConnector::new(events_tx, "geometry_msgs/msg/Twist", 8, TaskTracker::new());
    let generation = Generation::from(3);

    let handle = connector.open_channel(&url, generation).expect("open");
    let event = next_event(&mut events_rx).await;
    assert_eq!(
        event,
        ChannelEvent::new(ChannelKind::Messaging, generation, ChannelEventKind::Open)
    );

    let payload = json!({
        "linear": {"x": 0.5, "y": 0.0, "z": 0.0},
        "angular": {"x": 0.0, "y": 0.0, "z": 0.0},
    });
    handle.publish("/cmd_vel", &payload).expect("publish");
    handle.publish("/cmd_vel", &payload).expect("publish");

    assert_eq!(
        next_frame(&mut frames).await,
        json!({"op": "advertise", "topic": "/cmd_vel", "type": "geometry_msgs/msg/Twist"})
    );
    assert_eq!(
        next_frame(&mut frames).await,
        json!({"op": "publish", "topic": "/cmd_vel", "msg": payload})
    );
    assert_eq!(
        next_frame(&mut frames).await,
        json!({"op": "publish", "topic": "/cmd_vel", "msg": payload})
    );

    handle.disconnect();
    assert_eq!(
        next_frame(&mut frames).await,
        json!({"op": "unadvertise", "topic": "/cmd_vel"})
    );
}

#[tokio::test]
async fn rosbridge_reports_connect_failure() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("ws://{}", listener.local_addr().expect("addr"));
    drop(listener);

    let (events_tx, mut events_rx) = mpsc::channel(8);
    let mut connector = RosbridgeConnector::new(events_tx, "geometry_msgs/msg/Twist", 8, TaskTracker::new());
    let _handle = connector
        .open_channel(&url, Generation::from(1))
        .expect("open starts");

    let event = next_event(&mut events_rx).await;
    assert_eq!(event.channel, ChannelKind::Messaging);
    assert!(matches!(event.kind, ChannelEventKind::Error(_)));
}

#[tokio::test]
async fn invalid_url_fails_to_start() {
    let (events_tx, _events_rx) = mpsc::channel(8);
    let mut scene = WsSceneConnector::new(events_tx.clone(), 8, TaskTracker::new());
    let mut messaging = RosbridgeConnector::new(events_tx, "geometry_msgs/msg/Twist", 8, TaskTracker::new());

    assert!(matches!(
        scene.open_session("http://sim:9002", "", Generation::from(1)),
        Err(AppError::Scene(_))
    ));
    assert!(matches!(
        messaging.open_channel("localhost:9090", Generation::from(1)),
        Err(AppError::Messaging(_))
    ));
}

#[tokio::test]
async fn scene_session_authenticates_and_reports_models() {
    let (url, mut frames, push) = spawn_recording_server().await;
    let (events_tx, mut events_rx) = mpsc::channel(8);
    let mut connector = WsSceneConnector::new(events_tx, 8, TaskTracker::new());
    let generation = Generation::from(7);

    let handle = connector
        .open_session(&url, "secret", generation)
        .expect("open");

    assert_eq!(
        next_frame(&mut frames).await,
        json!({"op": "auth", "key": "secret"})
    );
    assert_eq!(next_event(&mut events_rx).await.kind, ChannelEventKind::Open);

    push.send(r#"{"op":"models","models":[{"name":"turtlebot","gz3d_name":"tb_1"}]}"#.into())
        .await
        .expect("push");
    let event = next_event(&mut events_rx).await;
    assert_eq!(event.generation, generation);
    assert_eq!(
        event.kind,
        ChannelEventKind::Models(vec![SceneModel::new("turtlebot", "tb_1")])
    );

    handle.follow(Some("tb_1")).expect("follow");
    handle.follow(None).expect("unfollow");
    assert_eq!(
        next_frame(&mut frames).await,
        json!({"op": "follow", "id": "tb_1"})
    );
    assert_eq!(
        next_frame(&mut frames).await,
        json!({"op": "follow", "id": null})
    );
}

#[tokio::test]
async fn scene_remote_close_is_reported() {
    let (url, _frames, push) = spawn_recording_server().await;
    let (events_tx, mut events_rx) = mpsc::channel(8);
    let mut connector = WsSceneConnector::new(events_tx, 8, TaskTracker::new());

    let _handle = connector
        .open_session(&url, "", Generation::from(1))
        .expect("open");
    assert_eq!(next_event(&mut events_rx).await.kind, ChannelEventKind::Open);

    drop(push);

    assert_eq!(next_event(&mut events_rx).await.kind, ChannelEventKind::Close);
}

#[test]
fn shutdown_waits_for_final_rosbridge_frames() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("runtime");

    let received = runtime.block_on(async {
        let (url, mut frames, _push) = spawn_recording_server().await;
        let mut config = GlobalConfig::default();
        config.messaging.url.clone_from(&url);
        let tracker = TaskTracker::new();
        let (session, mut events) = build_session(&config, &tracker).expect("session");

        let mut guard = session.lock().await;
        guard.connect_messaging(&url);
        let open = next_event(&mut events).await;
        assert_eq!(open.kind, ChannelEventKind::Open);
        assert!(guard.handle_event(open));
        guard.handle_key("i");
        guard.teardown();
        drop(guard);

        // The session task has sent its close frame once the tracker drains.
        assert!(wait_for_channels(&tracker, WAIT).await);
        assert!(tracker.is_empty());

        let mut received = Vec::new();
        for _ in 0..4 {
            received.push(next_frame(&mut frames).await);
        }
        received
    });
    drop(runtime);

    let stop = json!({
        "linear": {"x": 0.0, "y": 0.0, "z": 0.0},
        "angular": {"x": 0.0, "y": 0.0, "z": 0.0},
    });
    assert_eq!(
        received,
        vec![
            json!({"op": "advertise", "topic": "/cmd_vel", "type": "geometry_msgs/msg/Twist"}),
            json!({"op": "publish", "topic": "/cmd_vel", "msg": {
                "linear": {"x": 0.5, "y": 0.0, "z": 0.0},
                "angular": {"x": 0.0, "y": 0.0, "z": 0.0},
            }}),
            json!({"op": "publish", "topic": "/cmd_vel", "msg": stop}),
            json!({"op": "unadvertise", "topic": "/cmd_vel"}),
        ]
    );
}
