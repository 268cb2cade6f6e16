//! DeviceRegistry: the session manager for one controller gateway.
//!
//! The registry owns everything with a lifetime longer than one frame:
//!
//! - the connection state machine (`Disconnected → Connecting → Open →
//!   Disconnected`, with close and error both collapsing to `Disconnected`),
//! - the device map and the last-seen map, which always share a key set,
//! - the 1 Hz prune task that evicts devices silent for longer than the
//!   inactive timeout,
//! - command fan-out to one device or all of them.
//!
//! # Concurrency model
//!
//! [`DeviceRegistry`] is a cheap, cloneable handle over shared state.  All
//! mutable state sits behind one `std::sync::Mutex` that is never held across
//! an `.await`.  Every inbound message and every prune sweep runs under a
//! single lock acquisition, so they are atomic with respect to each other.
//!
//! Inbound messages are processed by one session driver task, in arrival
//! order.  Background tasks (session driver, prune timer) hold only a `Weak`
//! reference and are aborted when their handles drop, so no task outlives
//! the last registry handle.
//!
//! Each `connect()` bumps a session generation counter.  Callbacks from a
//! session that has since been replaced or disconnected carry a stale
//! generation and are ignored.
//!
//! # Time
//!
//! Last-seen instants use `tokio::time::Instant`, so tests under
//! `#[tokio::test(start_paused = true)]` control the clock.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use wandlink_core::{
    decode_frame, split_frames, CommandSchema, CommandSpec, DeviceId, SensorFrame, HANDSHAKE,
};

use super::session::{Connector, InboundEvent};
use crate::domain::config::HubConfig;
use crate::domain::connection::ConnectionState;
use crate::domain::device::{DeviceRecord, DeviceSnapshot, SendError};
use crate::domain::link::CommandLink;
use crate::infrastructure::scheduler::{RepeatingTask, TaskHandle};
use crate::infrastructure::ws_client::WsConnector;

/// How often inactive devices are swept.
pub const PRUNE_INTERVAL: Duration = Duration::from_millis(1000);

/// Default silence after which a device is pruned.
pub const DEFAULT_INACTIVE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 256;

// ── Configuration and events ──────────────────────────────────────────────────

/// Registry tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// A device whose last frame is older than this is pruned.
    pub inactive_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            inactive_timeout: DEFAULT_INACTIVE_TIMEOUT,
        }
    }
}

impl From<&HubConfig> for RegistryConfig {
    fn from(config: &HubConfig) -> Self {
        Self {
            inactive_timeout: config.inactive_timeout(),
        }
    }
}

/// Why a device left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalReason {
    /// Silent for longer than the inactive timeout.
    Pruned,
    /// Removed through [`DeviceRegistry::remove_device`].
    Explicit,
}

/// Lifecycle notifications for registry consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    DeviceAdded(DeviceId),
    DeviceRemoved { id: DeviceId, reason: RemovalReason },
    ConnectionChanged(ConnectionState),
}

// ── Shared state ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct State {
    devices: BTreeMap<DeviceId, DeviceRecord>,
    last_seen: HashMap<DeviceId, Instant>,
    connection: ConnectionState,
    /// Incremented by every `connect()` and `disconnect()`.
    generation: u64,
    /// The link of the current session, present only while `Open`.
    link: Option<Arc<dyn CommandLink>>,
    session_task: Option<TaskHandle>,
    prune_task: Option<RepeatingTask>,
}

struct Shared {
    state: Mutex<State>,
    schema: Arc<CommandSchema>,
    config: RegistryConfig,
    connector: Arc<dyn Connector>,
    events: broadcast::Sender<RegistryEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: RegistryEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

// ── DeviceRegistry ────────────────────────────────────────────────────────────

/// Live registry of controllers behind one gateway connection.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use wandlink_core::CommandSchema;
/// use wandlink_hub::infrastructure::link::mock::MockConnector;
/// use wandlink_hub::{DeviceRegistry, RegistryConfig};
///
/// let registry = DeviceRegistry::new(
///     Arc::new(CommandSchema::builtin()),
///     RegistryConfig::default(),
///     Arc::new(MockConnector::new()),
/// );
///
/// // Frames can be fed directly, e.g. from a recorded session.
/// registry.handle_message("00017f80817f80817fff\n00027f80817f80817f00");
/// assert_eq!(registry.get_device_count(), 2);
/// assert!(registry.get_device("0001").unwrap().sensors.tap);
/// ```
#[derive(Clone)]
pub struct DeviceRegistry {
    shared: Arc<Shared>,
}

impl DeviceRegistry {
    /// Creates a disconnected registry.
    pub fn new(
        schema: Arc<CommandSchema>,
        config: RegistryConfig,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                schema,
                config,
                connector,
                events,
            }),
        }
    }

    /// Creates a registry that connects over WebSocket.
    pub fn with_websocket(schema: Arc<CommandSchema>, config: RegistryConfig) -> Self {
        Self::new(schema, config, Arc::new(WsConnector::new()))
    }

    fn upgrade(weak: &Weak<Shared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    // ── Connection lifecycle ──────────────────────────────────────────────────

    /// Starts connecting to `url` and returns immediately.
    ///
    /// Does nothing unless the registry is `Disconnected`.  Readiness is
    /// reported through [`RegistryEvent::ConnectionChanged`].  Starts the
    /// prune task if it is not already running.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn connect(&self, url: impl Into<String>) {
        let url = url.into();
        let mut state = self.shared.lock();
        if state.connection != ConnectionState::Disconnected {
            debug!("connect({url}) ignored: registry is {}", state.connection);
            return;
        }

        state.generation += 1;
        let generation = state.generation;
        state.connection = ConnectionState::Connecting;

        if state.prune_task.is_none() {
            state.prune_task = Some(self.spawn_prune_task());
        }

        let weak = Arc::downgrade(&self.shared);
        let connector = Arc::clone(&self.shared.connector);
        let driver = drive_session(weak, connector, url, generation);
        state.session_task = Some(TaskHandle::spawn(driver));

        self.shared.emit(RegistryEvent::ConnectionChanged(ConnectionState::Connecting));
    }

    /// Closes the connection and stops pruning.  Idempotent.
    ///
    /// Devices stay in the registry; their links now report closed.
    pub fn disconnect(&self) {
        let mut state = self.shared.lock();
        state.generation += 1;
        state.session_task = None;
        state.prune_task = None;
        if let Some(link) = state.link.take() {
            link.close();
        }

        let previous = std::mem::replace(&mut state.connection, ConnectionState::Disconnected);
        if previous != ConnectionState::Disconnected {
            info!("disconnected (was {previous})");
            self.shared.emit(RegistryEvent::ConnectionChanged(ConnectionState::Disconnected));
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.lock().connection
    }

    /// `true` while the prune task is scheduled.
    pub fn is_pruning(&self) -> bool {
        self.shared.lock().prune_task.is_some()
    }

    /// Called by the session driver once the transport is up.  Returns
    /// `false` if the session is stale.
    fn on_open(&self, generation: u64, link: Arc<dyn CommandLink>) -> bool {
        let mut state = self.shared.lock();
        if state.generation != generation || state.connection != ConnectionState::Connecting {
            return false;
        }

        if let Err(e) = link.send_text(HANDSHAKE) {
            warn!("handshake failed: {e}");
        }
        state.link = Some(link);
        state.connection = ConnectionState::Open;
        self.shared.emit(RegistryEvent::ConnectionChanged(ConnectionState::Open));
        true
    }

    /// Called by the session driver when the transport ends or fails to open.
    fn on_transport_closed(&self, generation: u64) {
        let mut state = self.shared.lock();
        if state.generation != generation || state.connection == ConnectionState::Disconnected {
            return;
        }

        // The driver is the caller and returns right after this; aborting
        // its own handle does not cut that short.
        state.session_task = None;
        state.link = None;
        state.connection = ConnectionState::Disconnected;
        self.shared.emit(RegistryEvent::ConnectionChanged(ConnectionState::Disconnected));
    }

    // ── Inbound ───────────────────────────────────────────────────────────────

    /// Ingests one raw inbound message, which may hold several frames.
    ///
    /// Each segment is decoded on its own; malformed segments are dropped
    /// without touching any device.  Returns the number of frames applied.
    pub fn handle_message(&self, raw: &str) -> usize {
        let now = Instant::now();
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let mut applied = 0;

        for segment in split_frames(raw) {
            let decoded = match decode_frame(segment) {
                Ok(decoded) => decoded,
                Err(e) => {
                    debug!("dropping frame {segment:?}: {e}");
                    continue;
                }
            };

            match state.devices.entry(decoded.id.clone()) {
                Entry::Occupied(mut entry) => {
                    let record = entry.get_mut();
                    if !record.has_open_link() {
                        if let Some(link) = &state.link {
                            record.bind_link(Arc::clone(link));
                        }
                    }
                    record.apply_frame(decoded.sensors);
                }
                Entry::Vacant(entry) => {
                    let mut record = DeviceRecord::new(
                        decoded.id.clone(),
                        Arc::clone(&self.shared.schema),
                        state.link.clone(),
                    );
                    record.apply_frame(decoded.sensors);
                    entry.insert(record);
                    info!("device {} added", decoded.id);
                    self.shared.emit(RegistryEvent::DeviceAdded(decoded.id.clone()));
                }
            }
            state.last_seen.insert(decoded.id, now);
            applied += 1;
        }

        applied
    }

    // ── Pruning ───────────────────────────────────────────────────────────────

    /// Removes every device silent for longer than the inactive timeout.
    /// Returns the removed ids.
    pub fn prune_inactive(&self) -> Vec<DeviceId> {
        self.prune_inactive_at(Instant::now())
    }

    /// [`prune_inactive`](Self::prune_inactive) against an explicit clock
    /// reading.
    pub fn prune_inactive_at(&self, now: Instant) -> Vec<DeviceId> {
        let timeout = self.shared.config.inactive_timeout;
        let mut guard = self.shared.lock();
        let state = &mut *guard;

        let stale: Vec<DeviceId> = state
            .last_seen
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) > timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            state.last_seen.remove(id);
            state.devices.remove(id);
            info!("device {id} silent for more than {timeout:?}; removed");
            self.shared.emit(RegistryEvent::DeviceRemoved {
                id: id.clone(),
                reason: RemovalReason::Pruned,
            });
        }

        stale
    }

    /// Removes one device.  Returns `false` if it was not registered.
    pub fn remove_device(&self, id: &str) -> bool {
        let id = DeviceId::new(id);
        let mut state = self.shared.lock();
        state.last_seen.remove(&id);
        if state.devices.remove(&id).is_none() {
            return false;
        }
        info!("device {id} removed");
        self.shared.emit(RegistryEvent::DeviceRemoved {
            id,
            reason: RemovalReason::Explicit,
        });
        true
    }

    fn spawn_prune_task(&self) -> RepeatingTask {
        let weak = Arc::downgrade(&self.shared);
        RepeatingTask::spawn(PRUNE_INTERVAL, move || match Self::upgrade(&weak) {
            Some(registry) => {
                registry.prune_inactive();
                true
            }
            None => false,
        })
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    /// Sends a command to one device.  Returns `false` for an unknown id, a
    /// closed link, or a command the schema rejects.
    pub fn send_command_to_device<S: AsRef<str>>(
        &self,
        id: &str,
        command: &str,
        params: &[S],
    ) -> bool {
        match self.try_send_command_to_device(id, command, params) {
            Ok(()) => true,
            Err(e) => {
                debug!("command `{command}` for device {id} not sent: {e}");
                false
            }
        }
    }

    /// Like [`send_command_to_device`](Self::send_command_to_device) but
    /// returns the failure reason.
    ///
    /// # Errors
    ///
    /// [`SendError::UnknownDevice`] if `id` is not registered, otherwise
    /// whatever [`DeviceRecord::try_send_command`] reports.
    pub fn try_send_command_to_device<S: AsRef<str>>(
        &self,
        id: &str,
        command: &str,
        params: &[S],
    ) -> Result<(), SendError> {
        let id = DeviceId::new(id);
        let now = Instant::now().into_std();
        let mut state = self.shared.lock();
        match state.devices.get_mut(&id) {
            Some(record) => record.try_send_command_at(command, params, now),
            None => Err(SendError::UnknownDevice(id)),
        }
    }

    /// Sends a command to every device.  Returns how many accepted it.
    pub fn send_command_to_all<S: AsRef<str>>(&self, command: &str, params: &[S]) -> usize {
        let now = Instant::now().into_std();
        let mut state = self.shared.lock();
        let mut sent = 0;
        for (id, record) in state.devices.iter_mut() {
            match record.try_send_command_at(command, params, now) {
                Ok(()) => sent += 1,
                Err(e) => debug!("device {id}: command `{command}` not sent: {e}"),
            }
        }
        sent
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Snapshots of every device, ordered by id.
    pub fn get_all_devices(&self) -> Vec<DeviceSnapshot> {
        let now = Instant::now().into_std();
        let state = self.shared.lock();
        state.devices.values().map(|r| r.snapshot_at(now)).collect()
    }

    pub fn get_device(&self, id: &str) -> Option<DeviceSnapshot> {
        let id = DeviceId::new(id);
        let now = Instant::now().into_std();
        self.shared.lock().devices.get(&id).map(|r| r.snapshot_at(now))
    }

    /// A live handle to one device, if it is registered.
    pub fn device(&self, id: &str) -> Option<DeviceHandle> {
        let id = DeviceId::new(id);
        self.shared.lock().devices.contains_key(&id).then(|| DeviceHandle {
            registry: self.clone(),
            id,
        })
    }

    /// Handles to every device, ordered by id.
    pub fn devices(&self) -> Vec<DeviceHandle> {
        let state = self.shared.lock();
        state
            .devices
            .keys()
            .map(|id| DeviceHandle {
                registry: self.clone(),
                id: id.clone(),
            })
            .collect()
    }

    pub fn get_device_count(&self) -> usize {
        self.shared.lock().devices.len()
    }

    /// Command names from the schema, sorted.
    pub fn get_available_commands(&self) -> Vec<String> {
        self.shared.schema.command_names()
    }

    pub fn get_command_info(&self, command: &str) -> Option<CommandSpec> {
        self.shared.schema.command_info(command).cloned()
    }

    pub fn is_valid_command<S: AsRef<str>>(&self, command: &str, params: &[S]) -> bool {
        self.shared.schema.is_valid(command, params)
    }

    /// Subscribes to lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.shared.events.subscribe()
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("DeviceRegistry")
            .field("connection", &state.connection)
            .field("devices", &state.devices.len())
            .field("inactive_timeout", &self.shared.config.inactive_timeout)
            .finish()
    }
}

// ── DeviceHandle ──────────────────────────────────────────────────────────────

/// One registered device, as seen by a consumer such as a visualizer.
///
/// The handle holds only the id.  Every call goes through the registry lock,
/// so once the device is pruned or removed the handle reads `None` and its
/// sends fail with [`SendError::UnknownDevice`].
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    registry: DeviceRegistry,
    id: DeviceId,
}

impl DeviceHandle {
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// The latest decoded sensor values.
    pub fn sensor_data(&self) -> Option<SensorFrame> {
        let state = self.registry.shared.lock();
        state.devices.get(&self.id).map(DeviceRecord::sensor_data)
    }

    pub fn snapshot(&self) -> Option<DeviceSnapshot> {
        self.registry.get_device(self.id.as_str())
    }

    /// Sends a command to this device.  Returns `true` if it was transmitted.
    pub fn send_command<S: AsRef<str>>(&self, command: &str, params: &[S]) -> bool {
        self.registry.send_command_to_device(self.id.as_str(), command, params)
    }

    /// # Errors
    ///
    /// Same as [`DeviceRegistry::try_send_command_to_device`].
    pub fn try_send_command<S: AsRef<str>>(
        &self,
        command: &str,
        params: &[S],
    ) -> Result<(), SendError> {
        self.registry.try_send_command_to_device(self.id.as_str(), command, params)
    }
}

// ── Session driver ────────────────────────────────────────────────────────────

/// Opens the transport and feeds inbound messages to the registry in order.
async fn drive_session(
    shared: Weak<Shared>,
    connector: Arc<dyn Connector>,
    url: String,
    generation: u64,
) {
    let mut session = match connector.open(&url).await {
        Ok(session) => session,
        Err(e) => {
            warn!("connection to {url} failed: {e}");
            if let Some(registry) = DeviceRegistry::upgrade(&shared) {
                registry.on_transport_closed(generation);
            }
            return;
        }
    };

    match DeviceRegistry::upgrade(&shared) {
        Some(registry) if registry.on_open(generation, Arc::clone(&session.link)) => {
            info!("connected to {url}");
        }
        _ => {
            session.link.close();
            return;
        }
    }

    while let Some(event) = session.inbound.recv().await {
        let Some(registry) = DeviceRegistry::upgrade(&shared) else {
            break;
        };
        match event {
            InboundEvent::Message(text) => {
                registry.handle_message(&text);
            }
            InboundEvent::Closed => {
                info!("connection to {url} closed by remote");
                break;
            }
            InboundEvent::Error(reason) => {
                warn!("connection to {url} failed: {reason}");
                break;
            }
        }
    }

    session.link.close();
    if let Some(registry) = DeviceRegistry::upgrade(&shared) {
        registry.on_transport_closed(generation);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
