//! The background worker that owns a [`Peripheral`] and at most one live
//! [`Connection`].
//!
//! The main loop never talks to the peripheral directly. It sends
//! [`LinkCommand`]s, and the worker reports back by writing the
//! [`RemoteFeedHandle`]: decoded axes go into the guarded slot, status changes
//! and scan results go out as events.

use crate::peripheral::{Connection, Peripheral};
use crate::remote_feed::{ConnectionStatus, RemoteFeedHandle};

use log::{debug, info, warn};
use std::{
    sync::mpsc::{self, TryRecvError},
    thread,
    time::Duration,
};

/// Requests for the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCommand {
    Scan,
    /// Drop any current connection and open one to this address.
    Connect(String),
    Disconnect,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkSettings {
    /// How long a connection attempt may take before it counts as failed.
    pub connect_timeout: Duration,
    /// How long one poll for a notification may block the worker.
    pub poll: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            poll: Duration::from_millis(100),
        }
    }
}

/// Handle onto the running worker. Dropping it shuts the worker down.
#[derive(Debug)]
pub struct PeripheralLink {
    tx: mpsc::Sender<LinkCommand>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PeripheralLink {
    pub fn spawn(
        peripheral: Box<dyn Peripheral>,
        feed: RemoteFeedHandle,
        settings: LinkSettings,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            Worker {
                peripheral,
                feed,
                settings,
                conn: None,
            }
            .run(rx)
        });
        PeripheralLink {
            tx,
            handle: Some(handle),
        }
    }

    fn send(&self, cmd: LinkCommand) {
        if self.tx.send(cmd).is_err() {
            warn!("Peripheral worker is gone");
        }
    }

    pub fn scan(&self) {
        self.send(LinkCommand::Scan);
    }

    pub fn connect(&self, address: impl Into<String>) {
        self.send(LinkCommand::Connect(address.into()));
    }

    pub fn disconnect(&self) {
        self.send(LinkCommand::Disconnect);
    }

    /// Closes any connection and waits for the worker to exit.
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.handle.take() {
            let _ = self.tx.send(LinkCommand::Shutdown);
            if thread.join().is_err() {
                warn!("Peripheral worker panicked");
            }
        }
    }
}

impl Drop for PeripheralLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    peripheral: Box<dyn Peripheral>,
    feed: RemoteFeedHandle,
    settings: LinkSettings,
    conn: Option<Box<dyn Connection>>,
}

impl Worker {
    fn run(mut self, rx: mpsc::Receiver<LinkCommand>) {
        loop {
            // Idle, there is nothing to poll, so block on the next command.
            // Connected, take whatever commands are queued and go back to
            // polling the device.
            let cmd = if self.conn.is_none() {
                match rx.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                }
            } else {
                match rx.try_recv() {
                    Ok(cmd) => Some(cmd),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            };

            match cmd {
                Some(LinkCommand::Shutdown) => break,
                Some(cmd) => self.handle(cmd),
                None => self.poll(),
            }
        }
        self.close();
        debug!("Peripheral worker exiting");
    }

    fn handle(&mut self, cmd: LinkCommand) {
        match cmd {
            LinkCommand::Scan => match self.peripheral.scan() {
                Ok(devices) => {
                    info!("Scan found {} device(s)", devices.len());
                    self.feed.post_devices(devices);
                }
                Err(e) => {
                    warn!("Scan failed: {}", e);
                    self.feed
                        .set_status(self.feed.status(), format!("Scan error: {}", e));
                }
            },
            LinkCommand::Connect(address) => self.connect(&address),
            LinkCommand::Disconnect => {
                if self.conn.is_some() {
                    self.close();
                } else {
                    self.feed
                        .set_status(ConnectionStatus::Disconnected, "No device");
                }
            }
            LinkCommand::Shutdown => {}
        }
    }

    fn connect(&mut self, address: &str) {
        self.close();
        self.feed
            .set_status(ConnectionStatus::Connecting, format!("Connecting to {}", address));

        match self
            .peripheral
            .connect(address, self.settings.connect_timeout)
        {
            Ok(conn) => {
                info!("Connected to {}", address);
                self.conn = Some(conn);
                self.feed
                    .set_status(ConnectionStatus::Connected, format!("Connected to {}", address));
            }
            Err(e) => {
                warn!("Could not connect to {}: {}", address, e);
                self.feed.reset_axes();
                self.feed
                    .set_status(ConnectionStatus::Error, format!("Conn error: {}", e));
            }
        }
    }

    fn poll(&mut self) {
        let Some(conn) = self.conn.as_mut() else {
            return;
        };
        match conn.next_notification(self.settings.poll) {
            Ok(Some(payload)) => {
                self.feed.apply_payload(&payload);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Lost the peripheral: {}", e);
                // The connection is already dead, nothing to close cleanly.
                self.conn = None;
                self.feed.reset_axes();
                self.feed
                    .set_status(ConnectionStatus::Error, format!("Link error: {}", e));
            }
        }
    }

    /// Drops the current connection, if any, and zeroes the axes.
    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.disconnect() {
                warn!("Error while disconnecting: {}", e);
            }
            info!("Peripheral disconnected");
            self.feed.reset_axes();
            self.feed.set_status(ConnectionStatus::Disconnected, "Disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy_peripheral::{DummyPeripheral, DUMMY_ADDRESS};
    use crate::notification_decoder::RemoteAxes;
    use crate::peripheral::{DeviceInfo, PeripheralError};
    use crate::remote_feed::FeedEvent;
    use std::sync::mpsc::RecvTimeoutError;
    use std::time::Instant;

    fn settings() -> LinkSettings {
        LinkSettings {
            connect_timeout: Duration::from_millis(200),
            poll: Duration::from_millis(10),
        }
    }

    fn dummy() -> Box<dyn Peripheral> {
        Box::new(
            DummyPeripheral::builder()
                .period(Duration::from_millis(5))
                .build(),
        )
    }

    /// Waits for the first status event matching `want`.
    fn wait_for_status(rx: &mpsc::Receiver<FeedEvent>, want: ConnectionStatus) -> String {
        let deadline = Instant::now() + Duration::from_secs(5);
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(left) {
                Ok(FeedEvent::ConnectionStatusChanged { status, message }) if status == want => {
                    return message
                }
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        panic!("never saw status {}", want);
    }

    #[test]
    fn scan_posts_devices() {
        let (feed, rx) = RemoteFeedHandle::new();
        let mut link = PeripheralLink::spawn(dummy(), feed, settings());
        link.scan();

        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            FeedEvent::DevicesFound(devices) => {
                assert_eq!(devices.len(), 1);
                assert_eq!(devices[0].address, DUMMY_ADDRESS);
            }
            other => panic!("unexpected event {:?}", other),
        }
        link.shutdown();
    }

    #[test]
    fn connect_streams_into_the_feed() {
        let (feed, rx) = RemoteFeedHandle::new();
        let mut link = PeripheralLink::spawn(dummy(), feed.clone(), settings());
        link.connect(DUMMY_ADDRESS);

        wait_for_status(&rx, ConnectionStatus::Connecting);
        wait_for_status(&rx, ConnectionStatus::Connected);

        let deadline = Instant::now() + Duration::from_secs(5);
        while feed.snapshot().accepted == 0 {
            assert!(Instant::now() < deadline, "no payload reached the feed");
            thread::sleep(Duration::from_millis(5));
        }

        link.disconnect();
        wait_for_status(&rx, ConnectionStatus::Disconnected);
        let state = feed.snapshot();
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert_eq!(state.axes, RemoteAxes::default());
        link.shutdown();
    }

    #[test]
    fn failed_connect_reports_an_error() {
        let (feed, rx) = RemoteFeedHandle::new();
        let peripheral = DummyPeripheral::builder().unreachable().build();
        let mut link = PeripheralLink::spawn(Box::new(peripheral), feed.clone(), settings());
        link.connect(DUMMY_ADDRESS);

        let message = wait_for_status(&rx, ConnectionStatus::Error);
        assert!(message.starts_with("Conn error"), "{}", message);
        assert_eq!(feed.status(), ConnectionStatus::Error);
        link.shutdown();
    }

    #[test]
    fn disconnect_without_a_device() {
        let (feed, rx) = RemoteFeedHandle::new();
        let mut link = PeripheralLink::spawn(dummy(), feed, settings());
        link.disconnect();
        assert_eq!(
            wait_for_status(&rx, ConnectionStatus::Disconnected),
            "No device"
        );
        link.shutdown();
    }

    struct FlakyConnection {
        sent: bool,
    }

    impl Connection for FlakyConnection {
        fn next_notification(
            &mut self,
            _wait: Duration,
        ) -> Result<Option<Vec<u8>>, PeripheralError> {
            if self.sent {
                Err(PeripheralError::Disconnected)
            } else {
                self.sent = true;
                Ok(Some(b"[50, 50, 50, 50]".to_vec()))
            }
        }

        fn disconnect(self: Box<Self>) -> Result<(), PeripheralError> {
            Ok(())
        }
    }

    struct FlakyPeripheral;

    impl Peripheral for FlakyPeripheral {
        fn scan(&mut self) -> Result<Vec<DeviceInfo>, PeripheralError> {
            Ok(Vec::new())
        }

        fn connect(
            &mut self,
            _address: &str,
            _timeout: Duration,
        ) -> Result<Box<dyn Connection>, PeripheralError> {
            Ok(Box::new(FlakyConnection { sent: false }))
        }
    }

    #[test]
    fn lost_link_zeroes_the_axes() {
        let (feed, rx) = RemoteFeedHandle::new();
        let mut link = PeripheralLink::spawn(Box::new(FlakyPeripheral), feed.clone(), settings());
        link.connect("flaky");

        let message = wait_for_status(&rx, ConnectionStatus::Error);
        assert!(message.starts_with("Link error"), "{}", message);
        let state = feed.snapshot();
        assert_eq!(state.accepted, 1);
        assert_eq!(state.axes, RemoteAxes::default());
        link.shutdown();
    }

    #[test]
    fn dropping_the_link_stops_the_worker() {
        let (feed, rx) = RemoteFeedHandle::new();
        let link = PeripheralLink::spawn(dummy(), feed.clone(), settings());
        link.connect(DUMMY_ADDRESS);
        wait_for_status(&rx, ConnectionStatus::Connected);

        drop(link);
        assert_eq!(feed.status(), ConnectionStatus::Disconnected);
    }
}
