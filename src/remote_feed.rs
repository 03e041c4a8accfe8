//! The thread-safe slot where the latest [`RemoteAxes`] from the peripheral
//! are kept, along with the connection status.
//!
//! Writers are the peripheral worker and its notification handler; the only
//! reader is the main loop, once per tick. All four axis values are written
//! and read under one lock, so a tick never sees half of one payload and half
//! of the next. Axis values are latest-wins; status changes and scan results
//! are additionally posted as [`FeedEvent`]s for the main loop to drain.

use crate::notification_decoder::RemoteAxes;
use crate::peripheral::DeviceInfo;

use log::debug;
use std::{
    fmt,
    sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError},
};

/// Where the peripheral connection stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Everything the peripheral side shares with the main loop.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteFeedState {
    pub axes: RemoteAxes,
    pub status: ConnectionStatus,
    pub status_text: String,
    /// How many payloads have been accepted since start-up.
    pub accepted: u64,
}

/// Messages from the background side, drained by the main loop every tick.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    ConnectionStatusChanged {
        status: ConnectionStatus,
        message: String,
    },
    DevicesFound(Vec<DeviceInfo>),
}

/// A cloneable handle onto the shared feed. This is all the peripheral side
/// ever gets to see of the simulation.
#[derive(Debug, Clone)]
pub struct RemoteFeedHandle {
    state: Arc<Mutex<RemoteFeedState>>,
    events: mpsc::Sender<FeedEvent>,
}

impl RemoteFeedHandle {
    /// Creates an empty, disconnected feed together with the receiving end of
    /// its event channel.
    pub fn new() -> (Self, mpsc::Receiver<FeedEvent>) {
        let (events, rx) = mpsc::channel();
        let handle = RemoteFeedHandle {
            state: Arc::new(Mutex::new(RemoteFeedState {
                status_text: "Not connected".to_owned(),
                ..RemoteFeedState::default()
            })),
            events,
        };
        (handle, rx)
    }

    // A writer that panicked mid-update cannot leave the axes torn (they are
    // a single Copy assignment), so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, RemoteFeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decodes a raw notification and, if it is well formed, makes it the
    /// latest value. Malformed payloads are dropped and the previous value
    /// stays in place. Returns whether the payload was accepted.
    pub fn apply_payload(&self, bytes: &[u8]) -> bool {
        match RemoteAxes::from_bytes(bytes) {
            Ok(axes) => {
                let mut state = self.lock();
                state.axes = axes;
                state.accepted += 1;
                true
            }
            Err(e) => {
                debug!("Discarding remote payload {:?}: {}", bytes, e);
                false
            }
        }
    }

    /// Overwrites the latest axes.
    pub fn set_axes(&self, axes: RemoteAxes) {
        self.lock().axes = axes;
    }

    /// Zeroes all four axes.
    pub fn reset_axes(&self) {
        self.set_axes(RemoteAxes::default());
    }

    /// Records a new connection status and tells the main loop about it.
    pub fn set_status(&self, status: ConnectionStatus, message: impl Into<String>) {
        let message = message.into();
        {
            let mut state = self.lock();
            state.status = status;
            state.status_text = message.clone();
        }
        // The main loop has gone away; nobody is left to tell.
        let _ = self
            .events
            .send(FeedEvent::ConnectionStatusChanged { status, message });
    }

    /// Hands the result of a scan to the main loop.
    pub fn post_devices(&self, devices: Vec<DeviceInfo>) {
        let _ = self.events.send(FeedEvent::DevicesFound(devices));
    }

    /// A consistent copy of the whole feed, taken under a single lock.
    pub fn snapshot(&self) -> RemoteFeedState {
        self.lock().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.lock().status
    }
}
