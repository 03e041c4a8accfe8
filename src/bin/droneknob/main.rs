//! The droneknob command line: fly, plot logs, or check the environment.

use clap::Parser;
use droneknob::{
    args::{CommandTask, FlyCommand, KnobArgs, PeripheralKind, PlotCommand},
    config::SimConfig,
    context::SimulationContext,
    data_source::{CsvLog, DataSource},
    dummy_peripheral::DummyPeripheral,
    envcheck::EnvReport,
    gui,
    peripheral::Peripheral,
    peripheral_link::{LinkSettings, PeripheralLink},
    remote_feed::RemoteFeedHandle,
    serial_peripheral::SerialPeripheral,
    signals,
};

use log::{error, info};
use std::{error::Error, process::ExitCode};

// Example:
// cargo run --bin droneknob -- fly --peripheral dummy --difficult
// cargo run --bin droneknob -- --config knob.ron fly -p serial -d /dev/ttyACM0
// cargo run --bin droneknob -- plot --files flight1.csv flight2.csv --select thrust yaw

fn main() -> ExitCode {
    env_logger::init();
    let args = KnobArgs::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("droneknob: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: KnobArgs) -> Result<(), Box<dyn Error>> {
    let config = SimConfig::load(args.config.as_deref())?;
    signals::install();

    match args.command {
        CommandTask::Fly(fly_args) => fly(config, fly_args),
        CommandTask::Plot(plot_args) => plot(plot_args),
        CommandTask::Check => {
            print!("{}", EnvReport::collect());
            Ok(())
        }
    }
}

fn fly(mut config: SimConfig, args: FlyCommand) -> Result<(), Box<dyn Error>> {
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let (feed, feed_events) = RemoteFeedHandle::new();
    let peripheral: Option<Box<dyn Peripheral>> = match args.peripheral {
        PeripheralKind::Serial => Some(Box::new(SerialPeripheral::new(config.baud_rate))),
        PeripheralKind::Dummy => Some(Box::new(DummyPeripheral::default())),
        PeripheralKind::Off => None,
    };
    let link = peripheral.map(|p| {
        PeripheralLink::spawn(
            p,
            feed.clone(),
            LinkSettings {
                connect_timeout: config.connect_timeout(),
                ..LinkSettings::default()
            },
        )
    });

    info!("Flying with {:?} peripheral", args.peripheral);
    let ctx = SimulationContext::new(&config, feed, feed_events, link);
    gui::fly(ctx, &config, args.difficult, args.device)?;
    Ok(())
}

fn plot(args: PlotCommand) -> Result<(), Box<dyn Error>> {
    let table = CsvLog::new(&args.filenames).load()?;
    info!(
        "Loaded {} rows of [{}]",
        table.rows.len(),
        table.attributes.join(", ")
    );
    gui::plot(&table, &args.select)?;
    Ok(())
}
