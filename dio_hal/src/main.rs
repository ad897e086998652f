//! # dio HAL Binary
//!
//! Provision pins from the board catalog and drive them from the command
//! line.
//!
//! # Usage
//!
//! ```bash
//! # List the catalog
//! dio_hal --config /etc/dio/hal.toml pins
//!
//! # Blink GPIO 17 five times against the simulation provider
//! dio_hal -s blink --gpio 17 --on 0.2 --off 0.2 -n 5
//!
//! # 25% duty on GPIO 18 at 1 kHz until Ctrl-C, verbose
//! dio_hal -v pwm --gpio 18 --duty 0.25 --frequency 1000
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use crossbeam::channel;
use dio_common::hal::provider::HalError;
use dio_common::hal::types::{EventTrigger, PullUpDown};
use dio_hal::blink::{BlinkSpec, INFINITE_ITERATIONS, Iterations};
use dio_hal::core::HalCore;
use dio_hal::provider_registry::ProviderRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

const HOLD_POLL: Duration = Duration::from_millis(100);

/// dio HAL - GPIO and PWM provisioning over pluggable providers
#[derive(Parser, Debug)]
#[command(name = "dio_hal")]
#[command(version)]
#[command(about = "GPIO and PWM provisioning over pluggable providers")]
#[command(long_about = None)]
struct Args {
    /// Path to the HAL configuration (hal.toml)
    #[arg(short, long, default_value = dio_common::consts::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Force the simulation provider
    #[arg(short = 's', long)]
    simulate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the pin catalog
    Pins,
    /// Switch an output on and hold it until Ctrl-C
    On {
        /// GPIO number
        #[arg(long)]
        gpio: u32,
        /// "On" drives the line low
        #[arg(long)]
        active_low: bool,
    },
    /// Switch an output off and hold it until Ctrl-C
    Off {
        /// GPIO number
        #[arg(long)]
        gpio: u32,
        /// "On" drives the line low
        #[arg(long)]
        active_low: bool,
    },
    /// Blink an output
    Blink {
        /// GPIO number
        #[arg(long)]
        gpio: u32,
        /// On time [s]
        #[arg(long, default_value_t = 0.5)]
        on: f32,
        /// Off time [s]
        #[arg(long, default_value_t = 0.5)]
        off: f32,
        /// Number of cycles, endless if omitted
        #[arg(short = 'n', long)]
        count: Option<i64>,
        /// "On" drives the line low
        #[arg(long)]
        active_low: bool,
    },
    /// Drive a PWM output until Ctrl-C
    Pwm {
        /// GPIO number
        #[arg(long)]
        gpio: u32,
        /// Duty fraction in [0, 1]
        #[arg(long)]
        duty: f32,
        /// Frequency [Hz], configured default if omitted
        #[arg(long)]
        frequency: Option<u32>,
    },
    /// Watch an input until Ctrl-C
    Input {
        /// GPIO number
        #[arg(long)]
        gpio: u32,
        /// Edge to configure
        #[arg(long, value_enum, default_value_t = TriggerArg::None)]
        trigger: TriggerArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TriggerArg {
    None,
    Rising,
    Falling,
    Both,
}

impl From<TriggerArg> for EventTrigger {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::None => Self::None,
            TriggerArg::Rising => Self::Rising,
            TriggerArg::Falling => Self::Falling,
            TriggerArg::Both => Self::Both,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        error!("dio_hal failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("dio HAL v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = HalCore::load_config(&args.config)?;
    if args.simulate {
        info!("Simulation mode enabled");
        config.provider = "simulation".to_string();
    }
    let hal = HalCore::new(config, &ProviderRegistry::with_builtin())?;

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(true, Ordering::SeqCst);
    })?;

    match args.command {
        Command::Pins => {
            for pin in hal.catalog().iter() {
                println!("{pin}");
            }
        }
        Command::On { gpio, active_low } => hold_output(&hal, gpio, active_low, true, &stop)?,
        Command::Off { gpio, active_low } => hold_output(&hal, gpio, active_low, false, &stop)?,
        Command::Blink {
            gpio,
            on,
            off,
            count,
            active_low,
        } => {
            let iterations = Iterations::from_count(count.unwrap_or(INFINITE_ITERATIONS))?;
            let spec = BlinkSpec::from_secs_f32(on, off, iterations)?;
            let out = hal.provision_digital_output(gpio, !active_low, false)?;
            let (done_tx, done_rx) = channel::bounded(1);
            out.blink(
                spec,
                true,
                Some(Box::new(move || {
                    let _ = done_tx.send(());
                })),
            )?;
            while !stop.load(Ordering::SeqCst) {
                if done_rx.recv_timeout(HOLD_POLL).is_ok() {
                    break;
                }
            }
            out.close()?;
        }
        Command::Pwm {
            gpio,
            duty,
            frequency,
        } => {
            let mut pwm = hal.provision_pwm_output(gpio, frequency, duty)?;
            info!("gpio {}: {} Hz, duty {}", gpio, pwm.frequency(), pwm.get_value()?);
            hold(&stop);
            pwm.close()?;
        }
        Command::Input { gpio, trigger } => {
            let mut input = hal.provision_digital_input(gpio, PullUpDown::None, trigger.into())?;
            let mut last = input.get_value()?;
            info!("gpio {} = {}", gpio, last);
            while !stop.load(Ordering::SeqCst) {
                thread::sleep(HOLD_POLL);
                let value = input.get_value()?;
                if value != last {
                    info!("gpio {} = {}", gpio, value);
                    last = value;
                }
            }
            input.close()?;
        }
    }

    hal.shutdown()?;
    info!("dio HAL shutdown complete");
    Ok(())
}

fn hold_output(
    hal: &HalCore,
    gpio: u32,
    active_low: bool,
    on: bool,
    stop: &AtomicBool,
) -> Result<(), HalError> {
    let out = hal.provision_digital_output(gpio, !active_low, on)?;
    info!("gpio {} {}", gpio, if on { "on" } else { "off" });
    hold(stop);
    out.close()
}

fn hold(stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        thread::sleep(HOLD_POLL);
    }
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
