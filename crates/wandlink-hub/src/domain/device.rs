//! Device record: the hub's view of one physical controller.
//!
//! A record owns two kinds of state:
//!
//! - **Sensor state** – the latest decoded [`SensorFrame`].  Replaced
//!   wholesale by every successfully decoded frame; nothing else touches it.
//! - **Shadow actuator state** – the LED colour and motor flag the hub
//!   *predicts* the controller has, updated optimistically after each
//!   transmitted `led` / `vibrate` command.  Controllers never acknowledge
//!   commands, so this is a best guess for UIs, not a confirmed value.
//!
//! The vibration reset is modelled as a deadline rather than a timer: the
//! motor reads as on until `now` passes `sent_at + duration`.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use wandlink_core::{
    encode_command, resolve_color, CommandError, CommandSchema, DeviceId, Rgb, SensorFrame,
};

use super::link::{CommandLink, LinkError};

/// Reasons a command was not sent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    /// No device with this id is registered.
    #[error("unknown device {0}")]
    UnknownDevice(DeviceId),

    /// The record has no link, or its link is closed.
    #[error("transport not open")]
    TransportNotOpen,

    /// The command failed schema validation.
    #[error(transparent)]
    Invalid(#[from] CommandError),

    /// The transport failed while sending.
    #[error(transparent)]
    Transport(LinkError),
}

impl From<LinkError> for SendError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::NotOpen => SendError::TransportNotOpen,
            other => SendError::Transport(other),
        }
    }
}

/// Owned, read-only copy of a record handed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub id: DeviceId,
    pub sensors: SensorFrame,
    pub led_color: Rgb,
    pub motor_on: bool,
    /// Whether the record currently holds an open link.
    pub connected: bool,
}

impl DeviceSnapshot {
    pub fn sensor_data(&self) -> SensorFrame {
        self.sensors
    }
}

/// One controller tracked by the registry.
pub struct DeviceRecord {
    id: DeviceId,
    sensors: SensorFrame,
    led_color: Rgb,
    motor_until: Option<Instant>,
    link: Option<Arc<dyn CommandLink>>,
    schema: Arc<CommandSchema>,
}

impl fmt::Debug for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRecord")
            .field("id", &self.id)
            .field("sensors", &self.sensors)
            .field("led_color", &self.led_color)
            .field("motor_until", &self.motor_until)
            .field("link_open", &self.has_open_link())
            .finish()
    }
}

impl DeviceRecord {
    /// Creates a record with default state: zeroed sensors, white LED, motor off.
    pub fn new(
        id: DeviceId,
        schema: Arc<CommandSchema>,
        link: Option<Arc<dyn CommandLink>>,
    ) -> Self {
        Self {
            id,
            sensors: SensorFrame::default(),
            led_color: Rgb::WHITE,
            motor_until: None,
            link,
            schema,
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// The latest decoded sensor values.
    pub fn sensor_data(&self) -> SensorFrame {
        self.sensors
    }

    /// Predicted LED colour.
    pub fn led_color(&self) -> Rgb {
        self.led_color
    }

    /// Predicted motor state right now.
    pub fn motor_state(&self) -> bool {
        self.motor_state_at(Instant::now())
    }

    /// Predicted motor state at `now`.
    pub fn motor_state_at(&self, now: Instant) -> bool {
        self.motor_until.is_some_and(|until| now < until)
    }

    /// `true` if the record holds a link that is currently open.
    pub fn has_open_link(&self) -> bool {
        self.link.as_ref().is_some_and(|link| link.is_open())
    }

    /// Replaces the link this record sends through.
    pub fn bind_link(&mut self, link: Arc<dyn CommandLink>) {
        self.link = Some(link);
    }

    /// Replaces the stored sensor state.
    pub fn apply_frame(&mut self, frame: SensorFrame) {
        self.sensors = frame;
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> DeviceSnapshot {
        DeviceSnapshot {
            id: self.id.clone(),
            sensors: self.sensors,
            led_color: self.led_color,
            motor_on: self.motor_state_at(now),
            connected: self.has_open_link(),
        }
    }

    /// Validates, encodes and transmits a command, returning `true` on success.
    ///
    /// Failures are logged at `debug` level and reported as `false`; use
    /// [`try_send_command`](Self::try_send_command) to get the reason.
    pub fn send_command<S: AsRef<str>>(&mut self, command: &str, params: &[S]) -> bool {
        match self.try_send_command(command, params) {
            Ok(()) => true,
            Err(e) => {
                debug!("device {}: command `{command}` not sent: {e}", self.id);
                false
            }
        }
    }

    /// Like [`send_command`](Self::send_command) but returns the failure reason.
    ///
    /// # Errors
    ///
    /// - [`SendError::TransportNotOpen`] if there is no open link.
    /// - [`SendError::Invalid`] if schema validation fails.
    /// - [`SendError::Transport`] if the link fails mid-send.
    pub fn try_send_command<S: AsRef<str>>(
        &mut self,
        command: &str,
        params: &[S],
    ) -> Result<(), SendError> {
        self.try_send_command_at(command, params, Instant::now())
    }

    /// [`try_send_command`](Self::try_send_command) with an explicit clock
    /// reading for the vibration deadline.
    ///
    /// # Errors
    ///
    /// Same as [`try_send_command`](Self::try_send_command).
    pub fn try_send_command_at<S: AsRef<str>>(
        &mut self,
        command: &str,
        params: &[S],
        now: Instant,
    ) -> Result<(), SendError> {
        let link = match &self.link {
            Some(link) if link.is_open() => Arc::clone(link),
            _ => return Err(SendError::TransportNotOpen),
        };

        self.schema.validate(command, params)?;

        link.send_text(&encode_command(&self.id, command, params))?;

        self.echo(command, params, now);
        Ok(())
    }

    /// Optimistic local update after a command went out.
    fn echo<S: AsRef<str>>(&mut self, command: &str, params: &[S], now: Instant) {
        let first = params.first().map(AsRef::as_ref);
        match (command, first) {
            ("led", Some(color)) => self.led_color = resolve_color(color),
            ("vibrate", Some(duration)) => {
                if let Ok(ms) = duration.parse::<u64>() {
                    self.motor_until = Some(deadline_after(now, Duration::from_millis(ms)));
                }
            }
            _ => {}
        }
    }
}

/// `now + duration`, clamped to the latest instant the platform can represent.
fn deadline_after(now: Instant, duration: Duration) -> Instant {
    let mut step = duration;
    loop {
        if let Some(deadline) = now.checked_add(step) {
            return deadline;
        }
        step /= 2;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
