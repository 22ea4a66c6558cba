//! End-to-end tests: channel client against a live hub

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::time::timeout;

use wpanel_realtime::api::{spawn_hub, HubHandle};
use wpanel_realtime::types::ClientMessage;
use wpanel_realtime::{
    endpoint_from_origin, CacheInvalidator, CacheTarget, ChannelConfig, ConnectionState,
    HubConfig, Notification, Notifier, RealtimeChannel, RealtimeMessage,
};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Recorder {
    targets: Mutex<Vec<CacheTarget>>,
    notifications: Mutex<Vec<Notification>>,
}

impl CacheInvalidator for Recorder {
    fn invalidate(&self, target: &CacheTarget) {
        self.targets.lock().push(target.clone());
    }
}

impl Notifier for Recorder {
    fn show(&self, notification: &Notification) {
        self.notifications.lock().push(notification.clone());
    }
}

async fn start_hub() -> HubHandle {
    let config = HubConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        capacity: 64,
    };
    spawn_hub(&config).await.unwrap()
}

fn client_for(hub: &HubHandle, recorder: &Arc<Recorder>) -> RealtimeChannel {
    let origin = url::Url::parse(&format!("http://{}", hub.local_addr())).unwrap();
    let mut config = ChannelConfig::new(endpoint_from_origin(&origin).unwrap());
    config.reconnect_delay = Duration::from_millis(100);
    config.connect_failure_delay = Duration::from_millis(100);

    RealtimeChannel::websocket(config, recorder.clone(), recorder.clone())
}

async fn wait_for_state(channel: &RealtimeChannel, wanted: ConnectionState) {
    let mut states = channel.subscribe_state();
    timeout(WAIT, states.wait_for(|state| *state == wanted))
        .await
        .expect("timed out waiting for connection state")
        .unwrap();
}

async fn wait_for_message(channel: &RealtimeChannel, msg_type: &str) -> RealtimeMessage {
    let mut messages = channel.subscribe_messages();
    let message = timeout(
        WAIT,
        messages.wait_for(|msg| msg.as_ref().is_some_and(|m| m.msg_type == msg_type)),
    )
    .await
    .expect("timed out waiting for message")
    .unwrap()
    .clone();
    message.unwrap()
}

#[tokio::test]
async fn test_client_receives_greeting_and_events() {
    let hub = start_hub().await;
    let recorder = Arc::new(Recorder::default());
    let channel = client_for(&hub, &recorder);

    channel.connect();
    wait_for_state(&channel, ConnectionState::Connected).await;
    wait_for_message(&channel, "connection").await;

    let delivered = hub.state().publish(RealtimeMessage::new(
        "client_created",
        Some(json!({"name": "Acme"})),
    ));
    assert_eq!(delivered, 1);

    let event = wait_for_message(&channel, "client_created").await;
    assert!(event.timestamp.is_some());
    assert_eq!(*recorder.targets.lock(), vec![CacheTarget::from("clients")]);
    assert!(recorder.notifications.lock()[0].body.contains("Acme"));
    assert!(channel.is_receiving());

    channel.disconnect();
    hub.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_ping_is_answered_with_pong() {
    let hub = start_hub().await;
    let recorder = Arc::new(Recorder::default());
    let channel = client_for(&hub, &recorder);

    channel.connect();
    wait_for_state(&channel, ConnectionState::Connected).await;
    wait_for_message(&channel, "connection").await;

    assert!(channel.send_message(&ClientMessage::Ping));
    wait_for_message(&channel, "pong").await;
    assert!(recorder.targets.lock().is_empty());

    channel.disconnect();
    assert!(!channel.send_message(&ClientMessage::Ping));
    hub.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_client_reconnects_when_hub_appears() {
    // Reserve a port, then release it so the first attempt is refused
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let recorder = Arc::new(Recorder::default());
    let mut config = ChannelConfig::new(format!("ws://{addr}/ws").parse().unwrap());
    config.reconnect_delay = Duration::from_millis(100);
    let channel = RealtimeChannel::websocket(config, recorder.clone(), recorder.clone());

    channel.connect();
    wait_for_state(&channel, ConnectionState::Error).await;

    let hub = spawn_hub(&HubConfig {
        bind_addr: addr,
        capacity: 16,
    })
    .await
    .unwrap();

    wait_for_state(&channel, ConnectionState::Connected).await;
    assert!(!channel.reconnect_pending());

    channel.disconnect();
    assert_eq!(channel.state(), ConnectionState::Disconnected);
    hub.shutdown().await.unwrap();
}
