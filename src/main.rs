//! `ledtoggle` - GPIO LED toggle controller
//!
//! Reads line commands from stdin (`on`, `off`, `quit`, and `press` /
//! `release` with the simulated backend) and prints the indicator image
//! whenever the button toggles.

use anyhow::{Context, Result};
use ledtoggle::{
    config::{AppConfig, BackendKind, ConfigManager, IndicatorConfig, IndicatorSink},
    controller::{ControllerCommand, ToggleController},
    display::{ChannelIndicator, DisplayIndicator, LogIndicator},
    error::get_user_friendly_error,
    gpio::{PeripheralService, SimulatedPeripheralService, SysfsPeripheralService},
    utils,
};
use std::io::BufRead;
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// Frames buffered between the controller and the render thread
const INDICATOR_CHANNEL_CAPACITY: usize = 32;

/// Peripheral backend chosen by configuration
enum Backend {
    Sysfs(SysfsPeripheralService),
    Simulated(SimulatedPeripheralService),
}

impl Backend {
    fn from_config(config: &AppConfig) -> Self {
        match config.backend.kind {
            BackendKind::Sysfs => {
                info!(
                    "Using sysfs GPIO backend at {}",
                    config.backend.sysfs_root.display()
                );
                Self::Sysfs(SysfsPeripheralService::new(
                    config.backend.sysfs_root.clone(),
                    config.backend.poll_interval(),
                    config.backend.pin_numbers.clone(),
                ))
            }
            BackendKind::Simulated => {
                info!("Using simulated GPIO backend");
                Self::Simulated(SimulatedPeripheralService::new([
                    config.pins.led.clone(),
                    config.pins.button.clone(),
                ]))
            }
        }
    }

    fn service(&self) -> &dyn PeripheralService {
        match self {
            Self::Sysfs(service) => service,
            Self::Simulated(service) => service,
        }
    }

    fn simulated(&self) -> Option<&SimulatedPeripheralService> {
        match self {
            Self::Simulated(service) => Some(service),
            Self::Sysfs(_) => None,
        }
    }
}

/// Build the configured indicator and the render thread draining it, if any
fn build_indicator(
    config: &IndicatorConfig,
) -> Result<(Arc<dyn DisplayIndicator>, Option<JoinHandle<()>>)> {
    match config.sink {
        IndicatorSink::Log => {
            info!("Indicator frames go to the log");
            Ok((Arc::new(LogIndicator::new(config.clone())), None))
        }
        IndicatorSink::Stdout => {
            let (indicator, frames) = ChannelIndicator::new(INDICATOR_CHANNEL_CAPACITY);
            let render_config = config.clone();
            let handle = thread::Builder::new()
                .name("indicator".into())
                .spawn(move || {
                    for image in frames {
                        println!("indicator: {}", image.resource_name(&render_config));
                    }
                })
                .context("Failed to spawn indicator thread")?;
            Ok((Arc::new(indicator), Some(handle)))
        }
    }
}

fn main() -> Result<()> {
    utils::init_logging().context("Failed to initialize logging system")?;

    let config = ConfigManager::load()
        .inspect_err(|e| error!("{}", get_user_friendly_error(e)))
        .context("Failed to load application configuration")?;
    info!(
        "Configuration loaded: LED {}, button {}",
        config.pins.led, config.pins.button
    );

    let backend = Backend::from_config(&config);

    let (indicator, render_handle) = build_indicator(&config.indicator)?;

    let controller = Arc::new(ToggleController::new(backend.service(), &config, indicator));
    if !controller.is_led_available() {
        warn!("LED is unavailable; on/off commands will only log errors");
    }

    let (command_tx, command_rx) = mpsc::channel::<ControllerCommand>();
    let command_controller = Arc::clone(&controller);
    let command_handle = thread::Builder::new()
        .name("commands".into())
        .spawn(move || command_controller.run_commands(&command_rx))
        .context("Failed to spawn command thread")?;

    read_stdin_commands(&command_tx, backend.simulated(), &config);

    // Loop already exited if the command thread hung up
    if command_tx.send(ControllerCommand::Shutdown).is_err() {
        warn!("Command thread exited before shutdown was requested");
    }
    if command_handle.join().is_err() {
        error!("Command thread panicked");
    }

    // Last handle closes the indicator channel and ends the render thread
    drop(controller);
    if let Some(handle) = render_handle
        && handle.join().is_err()
    {
        error!("Indicator thread panicked");
    }

    info!("ledtoggle shutting down");
    Ok(())
}

/// Forward stdin lines to the command thread until `quit` or EOF
fn read_stdin_commands(
    commands: &mpsc::Sender<ControllerCommand>,
    simulated: Option<&SimulatedPeripheralService>,
    config: &AppConfig,
) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Error reading stdin: {e}");
                break;
            }
        };

        let command = match line.trim() {
            "" => continue,
            "on" => ControllerCommand::TurnOn,
            "off" => ControllerCommand::TurnOff,
            "quit" | "exit" => break,
            "press" | "release" if simulated.is_none() => {
                eprintln!("press/release need the simulated backend");
                continue;
            }
            "press" => {
                if let Some(board) = simulated {
                    board.press(&config.pins.button);
                }
                continue;
            }
            "release" => {
                if let Some(board) = simulated {
                    board.release(&config.pins.button);
                }
                continue;
            }
            other => {
                eprintln!("unknown command '{other}' (expected on, off, quit, press, release)");
                continue;
            }
        };

        if commands.send(command).is_err() {
            warn!("Command thread is gone, stopping input");
            break;
        }
    }
    info!("Input closed");
}
