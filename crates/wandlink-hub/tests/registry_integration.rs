//! Integration tests for the device registry lifecycle.
//!
//! These tests drive a [`DeviceRegistry`] through the public API only, with
//! the in-memory [`MockConnector`] standing in for the gateway.  Time is
//! paused, so the 1 Hz prune task advances only when a test sleeps.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use wandlink_core::{encode_frame, CommandSchema, DecodedFrame, DeviceId, Rgb, SensorFrame};
use wandlink_hub::domain::CommandLink;
use wandlink_hub::infrastructure::link::mock::{MockConnector, MockRemote};
use wandlink_hub::{
    ConnectionState, DeviceRegistry, RegistryConfig, RegistryEvent, RemovalReason, SendError,
};

const URL: &str = "ws://gateway.test/";

// ── Helpers ───────────────────────────────────────────────────────────────────

fn frame(id: &str, tap: bool) -> String {
    encode_frame(&DecodedFrame {
        id: DeviceId::new(id),
        sensors: SensorFrame {
            ax: 0x7f,
            ay: 0x80,
            az: 0x81,
            tap,
            ..SensorFrame::default()
        },
    })
}

fn new_registry() -> (DeviceRegistry, MockConnector) {
    let connector = MockConnector::new();
    let registry = DeviceRegistry::new(
        Arc::new(CommandSchema::builtin()),
        RegistryConfig::default(),
        Arc::new(connector.clone()),
    );
    (registry, connector)
}

/// Lets spawned tasks run until they are all waiting.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn wait_for_state(events: &mut broadcast::Receiver<RegistryEvent>, wanted: ConnectionState) {
    loop {
        match events.recv().await {
            Ok(RegistryEvent::ConnectionChanged(state)) if state == wanted => return,
            Ok(_) => continue,
            Err(e) => panic!("event stream ended before {wanted}: {e}"),
        }
    }
}

/// Connects and waits until the session is open.
async fn connected() -> (DeviceRegistry, MockConnector, MockRemote) {
    let (registry, connector) = new_registry();
    let mut events = registry.subscribe();
    registry.connect(URL);
    wait_for_state(&mut events, ConnectionState::Open).await;
    let remote = connector.last_remote().expect("session opened");
    (registry, connector, remote)
}

// ── Connection ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_handshake_is_first_message_after_open() {
    let (registry, _, remote) = connected().await;

    assert_eq!(registry.connection_state(), ConnectionState::Open);
    assert_eq!(remote.url(), URL);
    assert_eq!(remote.sent(), vec!["s"]);
}

#[tokio::test(start_paused = true)]
async fn test_connection_events_follow_state_machine() {
    // Arrange
    let (registry, connector) = new_registry();
    let mut events = registry.subscribe();

    // Act
    registry.connect(URL);
    settle().await;
    connector.last_remote().unwrap().close();
    settle().await;

    // Assert
    let states: Vec<ConnectionState> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|e| match e {
            RegistryEvent::ConnectionChanged(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Disconnected
        ]
    );
}

// ── Ingestion ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_two_joined_frames_yield_two_devices() {
    // Arrange
    let (registry, _, remote) = connected().await;

    // Act
    remote.push(format!("{}\n{}", frame("0001", true), frame("0002", false)));
    settle().await;

    // Assert
    let devices = registry.get_all_devices();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id.as_str(), "0001");
    assert!(devices[0].sensor_data().tap);
    assert_eq!(devices[1].id.as_str(), "0002");
    assert!(!devices[1].sensor_data().tap);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_frames_do_not_duplicate_devices() {
    let (registry, _, remote) = connected().await;

    for _ in 0..5 {
        remote.push(frame("0001", false));
    }
    remote.push(frame("0001", true));
    settle().await;

    assert_eq!(registry.get_device_count(), 1);
    assert!(registry.get_device("0001").unwrap().sensors.tap);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_leave_registry_unchanged() {
    let (registry, _, remote) = connected().await;
    remote.push(frame("0001", false));
    settle().await;
    let before = registry.get_all_devices();

    remote.push("0001ff");
    remote.push("zz017f80817f80817fff");
    remote.push("\r\n\r\n");
    settle().await;

    assert_eq!(registry.get_all_devices(), before);
}

// ── Pruning ───────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_silent_device_is_pruned_after_timeout() {
    // Arrange
    let (registry, _, remote) = connected().await;
    let mut events = registry.subscribe();
    remote.push(frame("0001", false));
    settle().await;

    // Act: 5 s timeout, checked once per second
    tokio::time::sleep(Duration::from_millis(6500)).await;

    // Assert
    assert_eq!(registry.get_device_count(), 0);
    let removed = std::iter::from_fn(|| events.try_recv().ok()).find(|e| {
        matches!(e, RegistryEvent::DeviceRemoved { reason: RemovalReason::Pruned, .. })
    });
    assert!(removed.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_device_seen_within_window_survives() {
    let (registry, _, remote) = connected().await;
    remote.push(frame("0001", false));
    remote.push(frame("0002", false));
    settle().await;

    // Only 0001 keeps reporting.
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(2000)).await;
        remote.push(frame("0001", false));
        settle().await;
    }

    assert!(registry.get_device("0001").is_some());
    assert!(registry.get_device("0002").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_pruning_continues_after_remote_close() {
    let (registry, _, remote) = connected().await;
    remote.push(frame("0001", false));
    settle().await;

    remote.close();
    settle().await;
    tokio::time::sleep(Duration::from_secs(7)).await;

    assert_eq!(registry.connection_state(), ConnectionState::Disconnected);
    assert_eq!(registry.get_device_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_pruning() {
    let (registry, _, remote) = connected().await;
    remote.push(frame("0001", false));
    settle().await;

    registry.disconnect();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(registry.get_device_count(), 1);
    assert!(!registry.get_device("0001").unwrap().connected);
}

// ── Commands ──────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_send_to_all_skips_device_without_open_link() {
    // Arrange: 0003 reports before the connection exists, so it has no link
    let (registry, connector) = new_registry();
    registry.handle_message(&frame("0003", false));
    let mut events = registry.subscribe();
    registry.connect(URL);
    wait_for_state(&mut events, ConnectionState::Open).await;
    let remote = connector.last_remote().unwrap();
    remote.push(format!("{}\n{}", frame("0001", false), frame("0002", false)));
    settle().await;
    assert_eq!(registry.get_device_count(), 3);

    // Act
    let sent = registry.send_command_to_all("led", &["ff0000"]);

    // Assert
    assert_eq!(sent, 2);
    assert_eq!(
        remote.sent(),
        vec!["s", "cmd:0001:led:ff0000", "cmd:0002:led:ff0000"]
    );
    assert_eq!(registry.get_device("0001").unwrap().led_color, Rgb::new(255, 0, 0));
    assert_eq!(registry.get_device("0003").unwrap().led_color, Rgb::WHITE);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_commands_send_nothing() {
    let (registry, _, remote) = connected().await;
    remote.push(frame("0001", false));
    settle().await;

    assert!(!registry.send_command_to_device("0001", "brightness", &["300"]));
    assert!(!registry.send_command_to_device("0001", "led", &["red", "extra"]));
    assert!(!registry.send_command_to_device("0001", "teleport", &["now"]));
    assert!(!registry.send_command_to_device("ffff", "led", &["red"]));

    assert_eq!(remote.sent(), vec!["s"]);
}

#[tokio::test(start_paused = true)]
async fn test_commands_fail_after_disconnect() {
    let (registry, _, remote) = connected().await;
    remote.push(frame("0001", false));
    settle().await;

    registry.disconnect();

    assert!(!registry.send_command_to_device("0001", "led", &["red"]));
    assert!(!remote.link().is_open());
    assert_eq!(remote.sent(), vec!["s"]);
}

#[tokio::test(start_paused = true)]
async fn test_vibrate_echo_turns_motor_off_after_duration() {
    let (registry, _, remote) = connected().await;
    remote.push(frame("0001", false));
    settle().await;

    assert!(registry.send_command_to_device("0001", "vibrate", &["250"]));
    assert!(registry.get_device("0001").unwrap().motor_on);

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(!registry.get_device("0001").unwrap().motor_on);
    assert_eq!(remote.sent().last().map(String::as_str), Some("cmd:0001:vibrate:250"));
}

#[tokio::test(start_paused = true)]
async fn test_looked_up_device_reads_sensors_and_sends_commands() {
    // Arrange
    let (registry, _, remote) = connected().await;
    remote.push(frame("0001", true));
    settle().await;

    // Act
    let handle = registry.device("0001").expect("device registered");
    let sent = handle.send_command("led", &["blue"]);

    // Assert
    assert!(registry.device("00ab").is_none());
    assert!(handle.sensor_data().unwrap().tap);
    assert!(sent);
    assert_eq!(remote.sent(), vec!["s", "cmd:0001:led:blue"]);
    assert_eq!(handle.snapshot().unwrap().led_color, Rgb::new(0, 0, 255));
}

#[tokio::test(start_paused = true)]
async fn test_device_handle_outlived_by_pruning_reports_unknown() {
    let (registry, _, remote) = connected().await;
    remote.push(frame("0001", false));
    settle().await;
    let handle = registry.devices().pop().expect("one device");

    tokio::time::sleep(Duration::from_secs(7)).await;

    assert!(handle.sensor_data().is_none());
    assert_eq!(
        handle.try_send_command("led", &["red"]),
        Err(SendError::UnknownDevice(DeviceId::new("0001")))
    );
    assert_eq!(remote.sent(), vec!["s"]);
}
