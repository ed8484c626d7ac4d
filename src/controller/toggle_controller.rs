//! Toggle controller implementation
//!
//! Owns the LED and button lines and the toggle state. Construction and every
//! command are infallible: peripheral errors are logged and swallowed, and a
//! line that failed to open leaves its feature inert for the session.

use crate::config::{AppConfig, PinConfig};
use crate::controller::state::LedState;
use crate::display::{DisplayIndicator, IndicatorImage};
use crate::error::PeripheralOp;
use crate::gpio::{
    ActiveLevel, CallbackAction, EdgeTrigger, InputLine, LevelSource, OutputLine,
    PeripheralService, Subscription,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Commands accepted by [`ToggleController::run_commands`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerCommand {
    /// Drive the LED high
    TurnOn,
    /// Drive the LED low
    TurnOff,
    /// Tear down and leave the command loop
    Shutdown,
}

/// Toggle state and its edge counter
#[derive(Debug, Default, Clone, Copy)]
struct ToggleSnapshot {
    led: LedState,
    /// Bumped on every computed state; orders indicator frames
    seq: u64,
}

/// Toggle state shared with the edge callback
struct ToggleCell {
    state: Mutex<ToggleSnapshot>,
    /// Sequence number of the last frame handed to the indicator
    shown: Mutex<u64>,
    indicator: Arc<dyn DisplayIndicator>,
    slow_call: Duration,
}

impl ToggleCell {
    fn new(indicator: Arc<dyn DisplayIndicator>, slow_call: Duration) -> Self {
        Self {
            state: Mutex::new(ToggleSnapshot::default()),
            shown: Mutex::new(0),
            indicator,
            slow_call,
        }
    }

    fn handle_edge(&self, line: &dyn LevelSource) -> CallbackAction {
        let pin = line.pin_name();
        let value = match timed(self.slow_call, PeripheralOp::Read, pin, || line.read()) {
            Ok(value) => value,
            Err(e) => {
                // Transient glitch: keep state and indicator as they were
                warn!("Error reading button GPIO {pin}: {e}");
                return CallbackAction::Continue;
            }
        };
        info!("GPIO changed, button {pin} = {value}");

        let snapshot = {
            let mut state = self.state.lock();
            let next = state.led.after_edge(value);
            if next != state.led {
                debug!("LED state {:?} -> {:?}", state.led, next);
            }
            state.led = next;
            state.seq += 1;
            *state
        };
        self.present(snapshot);

        CallbackAction::Continue
    }

    /// Show `snapshot` unless a newer state has already been shown
    ///
    /// Runs outside the state lock so a slow indicator never stalls readers
    /// of the state.
    fn present(&self, snapshot: ToggleSnapshot) {
        let mut shown = self.shown.lock();
        if snapshot.seq <= *shown {
            debug!("Skipping stale indicator frame #{}", snapshot.seq);
            return;
        }
        *shown = snapshot.seq;
        self.indicator.show(IndicatorImage::for_state(snapshot.led.is_on()));
    }
}

/// Button line with its callback subscription
struct ButtonLine {
    line: Box<dyn InputLine>,
    subscription: Subscription,
}

/// Event-driven LED toggle controller
///
/// Thread-safe: commands may arrive on one thread while edges arrive on the
/// peripheral's callback thread.
pub struct ToggleController {
    cell: Arc<ToggleCell>,
    led: Mutex<Option<Box<dyn OutputLine>>>,
    button: Mutex<Option<ButtonLine>>,
    pins: PinConfig,
    shut_down: AtomicBool,
}

impl ToggleController {
    /// Open the LED and button lines and register the edge callback
    ///
    /// Never fails. An LED that cannot be opened makes `turn_on`/`turn_off`
    /// log errors; a button that cannot be opened never produces edges.
    pub fn new(
        service: &dyn PeripheralService,
        config: &AppConfig,
        indicator: Arc<dyn DisplayIndicator>,
    ) -> Self {
        let pins = config.pins.clone();
        let slow_call = config.io.slow_call_threshold();
        debug!("Available GPIO: {:?}", service.line_names());

        let led = match timed(slow_call, PeripheralOp::Open, &pins.led, || {
            service.open_output_line(&pins.led, false)
        }) {
            Ok(line) => {
                info!("LED GPIO {} opened, initially low", pins.led);
                Some(line)
            }
            Err(e) => {
                error!("Error opening LED GPIO {}: {}", pins.led, e);
                None
            }
        };

        let cell = Arc::new(ToggleCell::new(indicator, slow_call));
        let button = Self::open_button(service, &pins.button, &cell);

        Self {
            cell,
            led: Mutex::new(led),
            button: Mutex::new(button),
            pins,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Open the active-low button on both edges and subscribe the toggle callback
    fn open_button(
        service: &dyn PeripheralService,
        pin: &str,
        cell: &Arc<ToggleCell>,
    ) -> Option<ButtonLine> {
        let mut line = match service.open_input_line(pin, EdgeTrigger::Both, ActiveLevel::Low) {
            Ok(line) => line,
            Err(e) => {
                warn!("Error opening button GPIO {pin}: {e}");
                return None;
            }
        };

        let callback_cell = Arc::clone(cell);
        let registered = line.register_edge_callback(Box::new(move |source: &dyn LevelSource| {
            callback_cell.handle_edge(source)
        }));

        match registered {
            Ok(subscription) => {
                info!("Button GPIO {pin} opened, listening on both edges");
                Some(ButtonLine { line, subscription })
            }
            Err(e) => {
                warn!("Error registering edge callback on {pin}: {e}");
                if let Err(e) = line.close() {
                    error!("Error closing button GPIO {pin}: {e}");
                }
                None
            }
        }
    }

    /// Drive the LED high
    pub fn turn_on(&self) {
        self.set_led(true);
    }

    /// Drive the LED low
    pub fn turn_off(&self) {
        self.set_led(false);
    }

    fn set_led(&self, value: bool) {
        let pin = &self.pins.led;
        let mut led = self.led.lock();
        let Some(line) = led.as_mut() else {
            error!("Cannot set LED GPIO {pin} to {value}: line is not open");
            return;
        };

        match timed(self.cell.slow_call, PeripheralOp::Write, pin, || line.write(value)) {
            Ok(()) => debug!("LED GPIO {pin} set to {value}"),
            Err(e) => error!("Error setting LED GPIO {pin}: {e}"),
        }
    }

    /// Handle one edge notification from `line`
    ///
    /// This is the body of the registered callback; it is public so hosts
    /// with their own interrupt plumbing can forward edges directly.
    pub fn on_edge(&self, line: &dyn LevelSource) -> CallbackAction {
        self.cell.handle_edge(line)
    }

    /// Current toggle state as a boolean
    pub fn button_state(&self) -> bool {
        self.led_state().is_on()
    }

    /// Current toggle state
    pub fn led_state(&self) -> LedState {
        self.cell.state.lock().led
    }

    /// Whether the LED line is open
    pub fn is_led_available(&self) -> bool {
        self.led.lock().is_some()
    }

    /// Whether the button line is open and subscribed
    pub fn is_button_available(&self) -> bool {
        self.button.lock().is_some()
    }

    /// Serialize user commands on the calling thread until `Shutdown` or
    /// the sender hangs up, then tear down
    pub fn run_commands(&self, commands: &mpsc::Receiver<ControllerCommand>) {
        info!("Entering controller command loop");
        loop {
            match commands.recv() {
                Ok(ControllerCommand::TurnOn) => self.turn_on(),
                Ok(ControllerCommand::TurnOff) => self.turn_off(),
                Ok(ControllerCommand::Shutdown) => {
                    info!("Shutdown command received");
                    break;
                }
                Err(mpsc::RecvError) => {
                    warn!("Command channel disconnected. Exiting command loop.");
                    break;
                }
            }
        }
        self.shutdown();
        info!("Controller command loop exited");
    }

    /// Release both lines
    ///
    /// The edge callback is unregistered before the button closes. Each close
    /// failure is logged and does not stop the other line from closing.
    /// Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down toggle controller");

        if let Some(mut led) = self.led.lock().take()
            && let Err(e) = led.close()
        {
            error!("Error closing LED GPIO {}: {}", self.pins.led, e);
        }

        if let Some(ButtonLine {
            mut line,
            subscription,
        }) = self.button.lock().take()
        {
            if let Err(e) = line.unregister_edge_callback(subscription) {
                error!(
                    "Error unregistering edge callback on {}: {}",
                    self.pins.button, e
                );
            }
            if let Err(e) = line.close() {
                error!("Error closing button GPIO {}: {}", self.pins.button, e);
            }
        }
    }
}

impl Drop for ToggleController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Run a peripheral call, warning if it exceeds `threshold`
///
/// Peripheral calls cannot be cancelled, so slow calls are reported rather
/// than aborted.
fn timed<T>(threshold: Duration, op: PeripheralOp, pin: &str, call: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = call();
    let elapsed = start.elapsed();
    if elapsed > threshold {
        warn!("Slow GPIO {op} on {pin}: took {elapsed:?} (threshold {threshold:?})");
    }
    result
}
