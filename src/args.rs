// Commandline argument parser using clap for droneknob

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct KnobArgs {
    #[command(subcommand, long_about)]
    /// What to run: the flight game, the log plotter, or the environment check
    pub command: CommandTask,

    /// RON file with tunables; anything it leaves out keeps its default
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CommandTask {
    /// Fly the quadcopter with the on-screen knobs or a remote controller
    #[command(about)]
    Fly(FlyCommand),

    /// Plot attributes of one or more CSV flight logs
    #[command(about)]
    Plot(PlotCommand),

    /// Print version, platform, terminal and serial port information
    #[command(about)]
    Check,
}

/// Where remote control input comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PeripheralKind {
    /// Controllers on a serial line
    Serial,
    /// A built-in simulated controller
    Dummy,
    /// Knobs only
    #[value(name = "none")]
    Off,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct FlyCommand {
    /// Which kind of remote controller to look for
    #[arg(short = 'p', long = "peripheral", value_enum, default_value_t = PeripheralKind::Dummy)]
    pub peripheral: PeripheralKind,

    /// Connect to this address on start-up instead of waiting to be asked
    #[arg(short = 'd', long = "device")]
    pub device: Option<String>,

    /// Start each game facing away from the targets
    #[arg(long)]
    pub difficult: bool,

    /// Seed for target placement, overrides the config file
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct PlotCommand {
    /// CSV logs to plot; they must all have the same columns
    #[arg(short = 'f', long = "files", required = true)]
    #[clap(num_args = 1..)]
    pub filenames: Vec<PathBuf>,

    /// Attributes to start with checked; all of them if none are given
    #[arg(short = 's', long = "select")]
    #[clap(num_args = 1..)]
    pub select: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_line_is_well_formed() {
        KnobArgs::command().debug_assert();
    }

    #[test]
    fn fly_defaults() {
        let args = KnobArgs::parse_from(["droneknob", "fly"]);
        match args.command {
            CommandTask::Fly(fly) => {
                assert_eq!(fly.peripheral, PeripheralKind::Dummy);
                assert!(!fly.difficult);
                assert_eq!(fly.device, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(args.config, None);
    }

    #[test]
    fn fly_with_everything() {
        let args = KnobArgs::parse_from([
            "droneknob",
            "fly",
            "--peripheral",
            "serial",
            "--device",
            "/dev/ttyACM0",
            "--difficult",
            "--seed",
            "42",
            "--config",
            "knob.ron",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("knob.ron")));
        match args.command {
            CommandTask::Fly(fly) => {
                assert_eq!(fly.peripheral, PeripheralKind::Serial);
                assert_eq!(fly.device.as_deref(), Some("/dev/ttyACM0"));
                assert!(fly.difficult);
                assert_eq!(fly.seed, Some(42));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn plot_takes_several_files() {
        let args =
            KnobArgs::parse_from(["droneknob", "plot", "-f", "a.csv", "b.csv", "-s", "thrust"]);
        match args.command {
            CommandTask::Plot(plot) => {
                assert_eq!(plot.filenames.len(), 2);
                assert_eq!(plot.select, vec!["thrust"]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(KnobArgs::try_parse_from(["droneknob", "plot"]).is_err());
    }
}
