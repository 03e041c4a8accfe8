//! A stand-in remote controller that lives entirely in this process. Once
//! connected, a generator thread produces notification payloads that sweep
//! the pitch/roll knob around in a circle and bob the thrust axis up and
//! down, which is handy for demos and for exercising the remote path
//! without hardware.

use crate::peripheral::{Connection, DeviceInfo, Peripheral, PeripheralError};

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::sync::{mpsc, Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// The address the dummy device answers to.
pub const DUMMY_ADDRESS: &str = "dummy:0";

/// How many payloads the generator keeps before dropping the oldest.
const QUEUE_LIMIT: usize = 64;

#[derive(Debug, Clone)]
struct Settings {
    period: Duration,
    amplitude: f64,
    glitch_every: Option<usize>,
    unreachable: bool,
}

/// Builds a [`DummyPeripheral`].
#[derive(Debug, Clone)]
pub struct DummyPeripheralBuilder {
    settings: Settings,
}

impl DummyPeripheralBuilder {
    /// Time between two payloads.
    pub fn period(mut self, period: Duration) -> Self {
        self.settings.period = period;
        self
    }

    /// Peak deflection of the generated sweeps, in percent.
    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.settings.amplitude = amplitude;
        self
    }

    /// Every `n`th payload is sent truncated, the way a flaky radio would.
    pub fn glitch_every(mut self, n: usize) -> Self {
        self.settings.glitch_every = Some(n.max(1));
        self
    }

    /// The device shows up in scans but never answers a connection attempt.
    pub fn unreachable(mut self) -> Self {
        self.settings.unreachable = true;
        self
    }

    pub fn build(self) -> DummyPeripheral {
        DummyPeripheral {
            settings: self.settings,
        }
    }
}

/// A [`Peripheral`] with exactly one, simulated, device.
#[derive(Debug, Clone)]
pub struct DummyPeripheral {
    settings: Settings,
}

impl Default for DummyPeripheral {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DummyPeripheral {
    pub fn builder() -> DummyPeripheralBuilder {
        DummyPeripheralBuilder {
            settings: Settings {
                period: Duration::from_millis(50),
                amplitude: 60.0,
                glitch_every: None,
                unreachable: false,
            },
        }
    }
}

impl Peripheral for DummyPeripheral {
    fn scan(&mut self) -> Result<Vec<DeviceInfo>, PeripheralError> {
        Ok(vec![DeviceInfo {
            name: "Dummy controller".to_owned(),
            address: DUMMY_ADDRESS.to_owned(),
        }])
    }

    fn connect(
        &mut self,
        address: &str,
        timeout: Duration,
    ) -> Result<Box<dyn Connection>, PeripheralError> {
        if address != DUMMY_ADDRESS {
            return Err(PeripheralError::NotFound(address.to_owned()));
        }
        if self.settings.unreachable {
            return Err(PeripheralError::Timeout(timeout));
        }
        Ok(Box::new(DummyConnection::start(self.settings.clone())))
    }
}

enum Signal {
    Stop,
}

type PayloadQueue = Arc<(Mutex<VecDeque<Vec<u8>>>, Condvar)>;

/// A live link to the dummy device.
pub struct DummyConnection {
    handle: Option<thread::JoinHandle<()>>,
    tx: mpsc::Sender<Signal>,
    msgs: PayloadQueue,
}

impl DummyConnection {
    fn start(settings: Settings) -> Self {
        let (tx, rx) = mpsc::channel::<Signal>();
        let msgs: PayloadQueue = Arc::new((Mutex::new(VecDeque::new()), Condvar::new()));
        let th_msgs = Arc::clone(&msgs);

        let handle = thread::spawn(move || {
            let mut step = 0usize;
            loop {
                match rx.try_recv() {
                    Ok(Signal::Stop) | Err(mpsc::TryRecvError::Disconnected) => break,
                    Err(mpsc::TryRecvError::Empty) => {}
                }

                let t = step as f64 * settings.period.as_secs_f64();
                let mut payload = generate_payload(t, settings.amplitude);
                if let Some(n) = settings.glitch_every {
                    if step % n == n - 1 {
                        payload.pop();
                    }
                }

                let (lock, cvar) = &*th_msgs;
                {
                    let mut queue = lock.lock().unwrap_or_else(PoisonError::into_inner);
                    if queue.len() >= QUEUE_LIMIT {
                        queue.pop_front();
                    }
                    queue.push_back(payload.into_bytes());
                }
                cvar.notify_one();

                step += 1;
                spin_sleep::sleep(settings.period);
            }
        });

        DummyConnection {
            handle: Some(handle),
            tx,
            msgs,
        }
    }

    fn stop(&mut self) {
        let _ = self.tx.send(Signal::Stop);
        if let Some(thread) = self.handle.take() {
            let _ = thread.join();
        }
    }
}

impl Connection for DummyConnection {
    fn next_notification(&mut self, wait: Duration) -> Result<Option<Vec<u8>>, PeripheralError> {
        let deadline = Instant::now() + wait;
        let (lock, cvar) = &*self.msgs;
        let mut queue = lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(payload) = queue.pop_front() {
                return Ok(Some(payload));
            }
            if self.handle.is_none() {
                return Err(PeripheralError::Disconnected);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            queue = cvar
                .wait_timeout(queue, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn disconnect(mut self: Box<Self>) -> Result<(), PeripheralError> {
        self.stop();
        Ok(())
    }
}

impl Drop for DummyConnection {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One payload at time `t`: pitch/roll runs a full circle every 8 seconds,
/// thrust rises and falls at half that rate, yaw stays centered.
fn generate_payload(t: f64, amplitude: f64) -> String {
    let omega = 2.0 * PI / 8.0;
    let pitch_roll_x = amplitude * (omega * t).cos();
    let pitch_roll_y = amplitude * (omega * t).sin();
    let thrust = 0.5 * amplitude * (0.5 * omega * t).sin();
    format!(
        "[{:.1}, {:.1}, {:.1}, {:.1}]",
        pitch_roll_x, pitch_roll_y, 0.0, thrust
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification_decoder::RemoteAxes;

    #[test]
    fn generated_payloads_decode() {
        for step in 0..100 {
            let payload = generate_payload(step as f64 * 0.05, 60.0);
            let axes = RemoteAxes::from_bytes(payload.as_bytes()).unwrap();
            assert!(axes.pitch_roll.norm() <= 0.6 + 1e-3);
            assert!(axes.thrust_yaw.y.abs() <= 0.3 + 1e-3);
        }
    }

    #[test]
    fn sweep_starts_pointing_along_x() {
        let axes = RemoteAxes::from_bytes(generate_payload(0.0, 50.0).as_bytes()).unwrap();
        assert_eq!(axes.to_array(), [0.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn scan_finds_the_dummy() {
        let mut peripheral = DummyPeripheral::default();
        let devices = peripheral.scan().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].address, DUMMY_ADDRESS);
    }

    #[test]
    fn connection_streams_payloads_until_disconnected() {
        let mut peripheral = DummyPeripheral::builder()
            .period(Duration::from_millis(5))
            .build();
        let mut conn = peripheral
            .connect(DUMMY_ADDRESS, Duration::from_secs(1))
            .unwrap();

        let payload = conn
            .next_notification(Duration::from_secs(1))
            .unwrap()
            .expect("the generator should have produced something");
        assert!(RemoteAxes::from_bytes(&payload).is_ok());

        conn.disconnect().unwrap();
    }

    #[test]
    fn glitches_are_truncated() {
        let mut peripheral = DummyPeripheral::builder()
            .period(Duration::from_millis(5))
            .glitch_every(2)
            .build();
        let mut conn = peripheral
            .connect(DUMMY_ADDRESS, Duration::from_secs(1))
            .unwrap();

        // The queue may have shed its oldest entries, but what is left is
        // still consecutive, so good and broken payloads alternate.
        let first = conn.next_notification(Duration::from_secs(1)).unwrap().unwrap();
        let second = conn.next_notification(Duration::from_secs(1)).unwrap().unwrap();
        assert_ne!(
            RemoteAxes::from_bytes(&first).is_ok(),
            RemoteAxes::from_bytes(&second).is_ok()
        );
    }

    #[test]
    fn unknown_and_unreachable_devices_fail() {
        let mut peripheral = DummyPeripheral::default();
        assert!(matches!(
            peripheral.connect("nowhere", Duration::from_millis(10)),
            Err(PeripheralError::NotFound(_))
        ));

        let mut peripheral = DummyPeripheral::builder().unreachable().build();
        assert!(matches!(
            peripheral.connect(DUMMY_ADDRESS, Duration::from_millis(10)),
            Err(PeripheralError::Timeout(_))
        ));
    }
}
