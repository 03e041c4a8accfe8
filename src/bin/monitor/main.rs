//! Bring-up tool for new controllers: pick a device, connect to it, and
//! watch the four decoded axes scroll by.

mod gui;

use droneknob::config::SimConfig;
use droneknob::dummy_peripheral::{DummyPeripheral, DUMMY_ADDRESS};
use droneknob::gui::device_selector;
use droneknob::peripheral::{DeviceInfo, Peripheral};
use droneknob::peripheral_link::{LinkSettings, PeripheralLink};
use droneknob::remote_feed::RemoteFeedHandle;
use droneknob::serial_peripheral::SerialPeripheral;
use droneknob::signals;
use gui::engage_gui;

use log::warn;

fn main() {
    env_logger::init();
    signals::install();
    let baud_rate = SimConfig::default().baud_rate;

    let mut devices = SerialPeripheral::new(baud_rate)
        .scan()
        .unwrap_or_else(|e| {
            warn!("Could not list serial ports: {}", e);
            Vec::new()
        });
    devices.push(DeviceInfo {
        name: "Dummy controller".to_owned(),
        address: DUMMY_ADDRESS.to_owned(),
    });

    let device = match device_selector(devices) {
        Ok(Some(device)) => device,
        Ok(None) => return,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    let peripheral: Box<dyn Peripheral> = if device.address == DUMMY_ADDRESS {
        Box::new(DummyPeripheral::default())
    } else {
        Box::new(SerialPeripheral::new(baud_rate))
    };
    let (feed, feed_events) = RemoteFeedHandle::new();
    let mut link = PeripheralLink::spawn(peripheral, feed.clone(), LinkSettings::default());
    link.connect(device.address.clone());

    if let Err(e) = engage_gui(&device, feed, feed_events) {
        eprintln!("{}", e);
    }

    link.shutdown();
}
