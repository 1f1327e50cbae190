#![deny(unsafe_code)]

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use clap::ArgAction::Set;
use clap::Parser;
use tracing::{event, Level};
use tracing_subscriber::prelude::*;

use base::prelude::*;
use cpu::{
    AltoSystem, Configuration, ExecutionController, NullPeripherals, RomDirectory,
    DEFAULT_ETHERNET_ADDRESS,
};

mod registers;
mod sleep;

use registers::RegisterWriter;
use sleep::MinimalSleeper;

/// How many cycles to run between checks of the wall-clock time.
const PACING_INTERVAL: u64 = 10_000;

/// Run the microcode of the Xerox Alto
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the AltoI and AltoII ROM images
    #[clap(action = Set, long)]
    rom_dir: PathBuf,

    /// AltoI, OneKRom, TwoKRom or ThreeKRam
    #[clap(action = Set, long, default_value = "OneKRom")]
    system_type: SystemType,

    /// Stop after this many cycles (by default, run until an alarm)
    #[clap(action = Set, long)]
    cycles: Option<u64>,

    /// Run this many times faster than real-time ('MAX' for as-fast-as-possible)
    #[clap(action = Set, long)]
    speed_multiplier: Option<String>,

    /// The Alto's Ethernet host address (octal with a leading 0)
    #[clap(action = Set, long, value_parser = parse_host_address)]
    ethernet_address: Option<u8>,
}

fn parse_host_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0o").or_else(|| s.strip_prefix('0')) {
        Some("") => Ok(0),
        Some(octal) => u8::from_str_radix(octal, 8),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("'{s}' is not a valid host address: {e}"))
}

#[derive(Debug)]
struct BadSpeedMultiplier(String);

impl Display for BadSpeedMultiplier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "--speed-multiplier={} should be a positive number or MAX",
            self.0
        )
    }
}

impl Error for BadSpeedMultiplier {}

fn speed_multiplier(arg: Option<&str>) -> Result<Option<f64>, BadSpeedMultiplier> {
    match arg {
        None => {
            event!(
                Level::INFO,
                "No --speed-multiplier option specified, using multiplier of 1.0"
            );
            Ok(Some(1.0))
        }
        Some("MAX") => {
            event!(
                Level::INFO,
                "--speed-multiplier=MAX, running at maximum speed"
            );
            Ok(None)
        }
        Some(s) => match s.parse::<f64>() {
            Ok(x) if x.is_finite() && x > 0.0 => {
                event!(
                    Level::INFO,
                    "--speed-multiplier={}, running at speed multiplier {}",
                    s,
                    x
                );
                Ok(Some(x))
            }
            _ => Err(BadSpeedMultiplier(s.to_owned())),
        },
    }
}

/// Run the system until it reaches `limit` cycles or raises an
/// alarm.  Returns the exit status.
fn run(system: AltoSystem, limit: Option<u64>, multiplier: Option<f64>) -> i32 {
    let mut controller = ExecutionController::new(system);
    let (alarm_tx, alarm_rx) = mpsc::channel();
    controller.set_error_callback(Box::new(move |alarm| {
        // Nobody is listening once main has given up.
        let _ = alarm_tx.send(alarm.clone());
    }));
    let mut sleeper = multiplier.map(|m| MinimalSleeper::new(Duration::from_millis(10), m));
    controller.set_step_callback(Box::new(move |sys| {
        if sys.cycles() % PACING_INTERVAL == 0 {
            if let Some(sleeper) = sleeper.as_mut() {
                sleeper.time_passes(sys.elapsed());
            }
        }
        limit.is_some_and(|limit| sys.cycles() >= limit)
    }));
    if limit != Some(0) {
        controller.start();
        controller.wait();
    }

    let status = match alarm_rx.try_recv() {
        Ok(alarm) => {
            event!(Level::ERROR, "Execution stopped: {}", alarm);
            1
        }
        Err(_) => 0,
    };
    let system = controller.system();
    let system = system.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Err(e) = RegisterWriter::new().write_system(&system) {
        event!(Level::ERROR, "Failed to print the registers: {}", e);
    }
    status
}

fn run_simulator() -> Result<i32, Box<dyn Error>> {
    let cli = Cli::parse();

    // See
    // https://docs.rs/tracing-subscriber/0.3/tracing_subscriber/filter/struct.EnvFilter.html
    // for instructions on how to select which trace messages get
    // printed.
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let multiplier = speed_multiplier(cli.speed_multiplier.as_deref())?;
    let config = Configuration {
        system_type: cli.system_type,
        rom_dir: cli.rom_dir,
        ethernet_address: cli.ethernet_address.unwrap_or(DEFAULT_ETHERNET_ADDRESS),
    };
    let roms = RomDirectory::new(&config.rom_dir);
    let peripherals = Box::new(NullPeripherals::new(config.ethernet_address));
    let system = AltoSystem::new(config, &roms, peripherals)?;
    event!(Level::DEBUG, "Initial system state is {:?}", &system);
    Ok(run(system, cli.cycles, multiplier))
}

fn main() {
    match run_simulator() {
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        Ok(status) => {
            std::process::exit(status);
        }
    }
}

#[test]
fn test_parse_host_address() {
    assert_eq!(parse_host_address("042"), Ok(0o42));
    assert_eq!(parse_host_address("0o42"), Ok(0o42));
    assert_eq!(parse_host_address("34"), Ok(34));
    assert_eq!(parse_host_address("0"), Ok(0));
    assert!(parse_host_address("0400").is_err());
    assert!(parse_host_address("09").is_err());
}

#[test]
fn test_speed_multiplier() {
    assert_eq!(speed_multiplier(None).ok(), Some(Some(1.0)));
    assert_eq!(speed_multiplier(Some("MAX")).ok(), Some(None));
    assert_eq!(speed_multiplier(Some("2.5")).ok(), Some(Some(2.5)));
    assert!(speed_multiplier(Some("0")).is_err());
    assert!(speed_multiplier(Some("fast")).is_err());
}
