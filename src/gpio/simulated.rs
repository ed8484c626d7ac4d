//! In-memory GPIO board
//!
//! Simulates a board with named pins. Tests and the demo mode drive the
//! physical level of input pins and inspect what outputs were driven to.
//! Faults can be injected per pin and per operation to exercise the error
//! paths of the controller.
//!
//! Edge callbacks run synchronously on the thread that changed the level,
//! after the board lock is released.

use crate::error::{PeripheralIoError, PeripheralOp, PeripheralResult};
use crate::gpio::line::{
    CallbackRegistry, EdgeCallback, InputLine, LevelSource, OutputLine, PeripheralService,
    Subscription,
};
use crate::gpio::types::{ActiveLevel, EdgeTrigger, Level};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PinMode {
    Unconfigured,
    Input {
        edge: EdgeTrigger,
        active: ActiveLevel,
    },
    Output,
}

struct SimPin {
    claimed: bool,
    level: Level,
    mode: PinMode,
    faults: HashSet<PeripheralOp>,
    writes: Vec<bool>,
    /// Successful line operations since the pin was last opened
    ops: Vec<PeripheralOp>,
    callbacks: Arc<CallbackRegistry>,
}

impl SimPin {
    fn new() -> Self {
        // Buttons on the board are wired with pull-ups
        Self {
            claimed: false,
            level: Level::High,
            mode: PinMode::Unconfigured,
            faults: HashSet::new(),
            writes: Vec::new(),
            ops: Vec::new(),
            callbacks: Arc::new(CallbackRegistry::new()),
        }
    }

    fn check_fault(&self, op: PeripheralOp, name: &str) -> PeripheralResult<()> {
        if self.faults.contains(&op) {
            return Err(PeripheralIoError::new(
                op,
                name,
                io::Error::other(format!("simulated {op} fault")),
            ));
        }
        Ok(())
    }

    fn logical(&self) -> bool {
        match self.mode {
            PinMode::Input { active, .. } => active.logical(self.level),
            PinMode::Output | PinMode::Unconfigured => self.level.is_high(),
        }
    }
}

type Board = Arc<Mutex<BTreeMap<String, SimPin>>>;

/// Simulated peripheral service
///
/// Cloning yields another handle to the same board.
#[derive(Clone)]
pub struct SimulatedPeripheralService {
    board: Board,
}

impl SimulatedPeripheralService {
    /// Create a board with the given pin names, all unclaimed and pulled high
    pub fn new<I, S>(pin_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pins = pin_names
            .into_iter()
            .map(|name| (name.into(), SimPin::new()))
            .collect();
        Self {
            board: Arc::new(Mutex::new(pins)),
        }
    }

    /// Make `op` fail on `pin` until cleared
    pub fn inject_fault(&self, pin: &str, op: PeripheralOp) {
        if let Some(sim) = self.board.lock().get_mut(pin) {
            sim.faults.insert(op);
        } else {
            warn!("Cannot inject {op} fault: no simulated pin {pin}");
        }
    }

    /// Stop failing `op` on `pin`
    pub fn clear_fault(&self, pin: &str, op: PeripheralOp) {
        if let Some(sim) = self.board.lock().get_mut(pin) {
            sim.faults.remove(&op);
        }
    }

    /// Set the physical level of `pin`, dispatching edge callbacks if the
    /// change matches the line's trigger
    ///
    /// Returns the number of callbacks invoked.
    pub fn set_level(&self, pin: &str, level: Level) -> usize {
        let registry = {
            let mut board = self.board.lock();
            let Some(sim) = board.get_mut(pin) else {
                warn!("Ignoring level change on unknown simulated pin {pin}");
                return 0;
            };
            let previous = sim.logical();
            sim.level = level;
            let current = sim.logical();
            debug!("Simulated {pin} -> {level:?} (logical {previous} -> {current})");

            match sim.mode {
                PinMode::Input { edge, .. } if sim.claimed && edge.fires(previous, current) => {
                    Arc::clone(&sim.callbacks)
                }
                _ => return 0,
            }
        };

        let probe = SimLevelProbe {
            pin: pin.to_string(),
            board: Arc::clone(&self.board),
        };
        registry.dispatch(&probe)
    }

    /// Drive `pin` to its active level (button pressed)
    pub fn press(&self, pin: &str) -> usize {
        let level = self.active_level(pin).physical(true);
        self.set_level(pin, level)
    }

    /// Drive `pin` to its inactive level (button released)
    pub fn release(&self, pin: &str) -> usize {
        let level = self.active_level(pin).physical(false);
        self.set_level(pin, level)
    }

    fn active_level(&self, pin: &str) -> ActiveLevel {
        match self.board.lock().get(pin).map(|sim| sim.mode) {
            Some(PinMode::Input { active, .. }) => active,
            _ => ActiveLevel::Low,
        }
    }

    /// Value an output pin is currently driven to; `None` if not an open output
    pub fn output_value(&self, pin: &str) -> Option<bool> {
        let board = self.board.lock();
        let sim = board.get(pin)?;
        (sim.claimed && sim.mode == PinMode::Output).then(|| sim.level.is_high())
    }

    /// Every value written to `pin` since it was opened
    pub fn write_history(&self, pin: &str) -> Vec<bool> {
        self.board
            .lock()
            .get(pin)
            .map(|sim| sim.writes.clone())
            .unwrap_or_default()
    }

    /// Successful open, register, unregister and close calls on `pin`, in
    /// order, since it was last opened
    pub fn op_history(&self, pin: &str) -> Vec<PeripheralOp> {
        self.board
            .lock()
            .get(pin)
            .map(|sim| sim.ops.clone())
            .unwrap_or_default()
    }

    /// Whether `pin` is currently held by a line handle
    pub fn is_claimed(&self, pin: &str) -> bool {
        self.board.lock().get(pin).is_some_and(|sim| sim.claimed)
    }

    /// Number of edge callbacks registered on `pin`
    pub fn subscriber_count(&self, pin: &str) -> usize {
        let registry = self
            .board
            .lock()
            .get(pin)
            .map(|sim| Arc::clone(&sim.callbacks));
        registry.map_or(0, |registry| registry.len())
    }

    fn claim(&self, name: &str, mode: PinMode, level: Option<Level>) -> PeripheralResult<()> {
        let mut board = self.board.lock();
        let sim = board
            .get_mut(name)
            .ok_or_else(|| PeripheralIoError::no_such_pin(PeripheralOp::Open, name))?;
        sim.check_fault(PeripheralOp::Open, name)?;
        if sim.claimed {
            return Err(PeripheralIoError::already_claimed(name));
        }
        sim.check_fault(PeripheralOp::Configure, name)?;

        sim.claimed = true;
        sim.mode = mode;
        sim.writes.clear();
        sim.ops.clear();
        sim.ops.push(PeripheralOp::Open);
        if let Some(level) = level {
            sim.level = level;
        }
        Ok(())
    }
}

impl PeripheralService for SimulatedPeripheralService {
    fn line_names(&self) -> Vec<String> {
        self.board.lock().keys().cloned().collect()
    }

    fn open_input_line(
        &self,
        name: &str,
        edge: EdgeTrigger,
        active: ActiveLevel,
    ) -> PeripheralResult<Box<dyn InputLine>> {
        self.claim(name, PinMode::Input { edge, active }, None)?;
        let callbacks = self
            .board
            .lock()
            .get(name)
            .map(|sim| Arc::clone(&sim.callbacks))
            .ok_or_else(|| PeripheralIoError::no_such_pin(PeripheralOp::Open, name))?;

        debug!("Opened simulated input {name} (edge={edge:?}, active={active:?})");
        Ok(Box::new(SimInputLine {
            probe: SimLevelProbe {
                pin: name.to_string(),
                board: Arc::clone(&self.board),
            },
            callbacks,
            closed: false,
        }))
    }

    fn open_output_line(&self, name: &str, initial: bool) -> PeripheralResult<Box<dyn OutputLine>> {
        self.claim(name, PinMode::Output, Some(Level::from(initial)))?;

        debug!("Opened simulated output {name} (initial={initial})");
        Ok(Box::new(SimOutputLine {
            pin: name.to_string(),
            board: Arc::clone(&self.board),
            closed: false,
        }))
    }
}

/// Reads a simulated pin through the shared board
struct SimLevelProbe {
    pin: String,
    board: Board,
}

impl LevelSource for SimLevelProbe {
    fn pin_name(&self) -> &str {
        &self.pin
    }

    fn read(&self) -> PeripheralResult<bool> {
        let board = self.board.lock();
        let sim = board
            .get(&self.pin)
            .ok_or_else(|| PeripheralIoError::no_such_pin(PeripheralOp::Read, &self.pin))?;
        if !sim.claimed {
            return Err(PeripheralIoError::closed(PeripheralOp::Read, &self.pin));
        }
        sim.check_fault(PeripheralOp::Read, &self.pin)?;
        Ok(sim.logical())
    }
}

struct SimInputLine {
    probe: SimLevelProbe,
    callbacks: Arc<CallbackRegistry>,
    closed: bool,
}

impl SimInputLine {
    fn ensure_open(&self, op: PeripheralOp) -> PeripheralResult<()> {
        if self.closed {
            return Err(PeripheralIoError::closed(op, &self.probe.pin));
        }
        Ok(())
    }

    fn check_fault(&self, op: PeripheralOp) -> PeripheralResult<()> {
        match self.probe.board.lock().get(&self.probe.pin) {
            Some(sim) => sim.check_fault(op, &self.probe.pin),
            None => Ok(()),
        }
    }

    fn record(&self, op: PeripheralOp) {
        if let Some(sim) = self.probe.board.lock().get_mut(&self.probe.pin) {
            sim.ops.push(op);
        }
    }
}

impl LevelSource for SimInputLine {
    fn pin_name(&self) -> &str {
        &self.probe.pin
    }

    fn read(&self) -> PeripheralResult<bool> {
        self.ensure_open(PeripheralOp::Read)?;
        self.probe.read()
    }
}

impl InputLine for SimInputLine {
    fn register_edge_callback(&mut self, callback: EdgeCallback) -> PeripheralResult<Subscription> {
        self.ensure_open(PeripheralOp::RegisterCallback)?;
        self.check_fault(PeripheralOp::RegisterCallback)?;
        let subscription = self.callbacks.register(callback);
        self.record(PeripheralOp::RegisterCallback);
        Ok(subscription)
    }

    fn unregister_edge_callback(&mut self, subscription: Subscription) -> PeripheralResult<()> {
        self.ensure_open(PeripheralOp::UnregisterCallback)?;
        self.check_fault(PeripheralOp::UnregisterCallback)?;
        if !self.callbacks.unregister(subscription) {
            debug!(
                "Subscription {} on {} was already gone",
                subscription.id(),
                self.probe.pin
            );
        }
        self.record(PeripheralOp::UnregisterCallback);
        Ok(())
    }

    fn close(&mut self) -> PeripheralResult<()> {
        self.ensure_open(PeripheralOp::Close)?;
        let mut board = self.probe.board.lock();
        if let Some(sim) = board.get_mut(&self.probe.pin) {
            sim.check_fault(PeripheralOp::Close, &self.probe.pin)?;
            sim.claimed = false;
            sim.mode = PinMode::Unconfigured;
            sim.ops.push(PeripheralOp::Close);
        }
        drop(board);

        self.callbacks.clear();
        self.closed = true;
        Ok(())
    }
}

struct SimOutputLine {
    pin: String,
    board: Board,
    closed: bool,
}

impl OutputLine for SimOutputLine {
    fn pin_name(&self) -> &str {
        &self.pin
    }

    fn write(&mut self, value: bool) -> PeripheralResult<()> {
        if self.closed {
            return Err(PeripheralIoError::closed(PeripheralOp::Write, &self.pin));
        }
        let mut board = self.board.lock();
        let sim = board
            .get_mut(&self.pin)
            .ok_or_else(|| PeripheralIoError::no_such_pin(PeripheralOp::Write, &self.pin))?;
        sim.check_fault(PeripheralOp::Write, &self.pin)?;
        sim.level = Level::from(value);
        sim.writes.push(value);
        Ok(())
    }

    fn close(&mut self) -> PeripheralResult<()> {
        if self.closed {
            return Err(PeripheralIoError::closed(PeripheralOp::Close, &self.pin));
        }
        let mut board = self.board.lock();
        if let Some(sim) = board.get_mut(&self.pin) {
            sim.check_fault(PeripheralOp::Close, &self.pin)?;
            sim.claimed = false;
            sim.mode = PinMode::Unconfigured;
            sim.ops.push(PeripheralOp::Close);
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::line::CallbackAction;
    use std::sync::mpsc;

    fn board() -> SimulatedPeripheralService {
        SimulatedPeripheralService::new(["GPIO_32", "GPIO_37"])
    }

    #[test]
    fn test_line_names_sorted() {
        assert_eq!(board().line_names(), vec!["GPIO_32", "GPIO_37"]);
    }

    #[test]
    fn test_open_unknown_pin_fails_not_found() {
        let Err(err) = board().open_output_line("GPIO_99", false) else {
            panic!("opening an unknown pin should fail");
        };
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(err.op, PeripheralOp::Open);
    }

    #[test]
    fn test_double_open_fails_busy() {
        let service = board();
        let _led = service.open_output_line("GPIO_37", false).unwrap();
        let Err(err) = service.open_output_line("GPIO_37", false) else {
            panic!("second open should fail");
        };
        assert_eq!(err.kind(), io::ErrorKind::ResourceBusy);
    }

    #[test]
    fn test_output_initial_value_and_writes() {
        let service = board();
        let mut led = service.open_output_line("GPIO_37", false).unwrap();
        assert_eq!(service.output_value("GPIO_37"), Some(false));

        led.write(true).unwrap();
        led.write(false).unwrap();
        assert_eq!(service.output_value("GPIO_37"), Some(false));
        assert_eq!(service.write_history("GPIO_37"), vec![true, false]);
    }

    #[test]
    fn test_closed_output_rejects_writes() {
        let service = board();
        let mut led = service.open_output_line("GPIO_37", false).unwrap();
        led.close().unwrap();

        let err = led.write(true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(!service.is_claimed("GPIO_37"));
        assert_eq!(service.output_value("GPIO_37"), None);
    }

    #[test]
    fn test_active_low_read() {
        let service = board();
        let button = service
            .open_input_line("GPIO_32", EdgeTrigger::Both, ActiveLevel::Low)
            .unwrap();
        assert!(!button.read().unwrap(), "pulled-up line reads released");

        service.set_level("GPIO_32", Level::Low);
        assert!(button.read().unwrap());
    }

    #[test]
    fn test_both_edges_dispatch_with_current_value() {
        let service = board();
        let mut button = service
            .open_input_line("GPIO_32", EdgeTrigger::Both, ActiveLevel::Low)
            .unwrap();
        let (tx, rx) = mpsc::channel();
        button
            .register_edge_callback(Box::new(move |line: &dyn LevelSource| {
                tx.send(line.read().unwrap()).unwrap();
                CallbackAction::Continue
            }))
            .unwrap();

        assert_eq!(service.press("GPIO_32"), 1);
        assert_eq!(service.release("GPIO_32"), 1);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![true, false]);
    }

    #[test]
    fn test_same_level_does_not_dispatch() {
        let service = board();
        let mut button = service
            .open_input_line("GPIO_32", EdgeTrigger::Both, ActiveLevel::Low)
            .unwrap();
        button
            .register_edge_callback(Box::new(|_: &dyn LevelSource| CallbackAction::Continue))
            .unwrap();

        assert_eq!(service.release("GPIO_32"), 0);
    }

    #[test]
    fn test_rising_trigger_ignores_falling_edge() {
        let service = board();
        let mut button = service
            .open_input_line("GPIO_32", EdgeTrigger::Rising, ActiveLevel::Low)
            .unwrap();
        button
            .register_edge_callback(Box::new(|_: &dyn LevelSource| CallbackAction::Continue))
            .unwrap();

        assert_eq!(service.press("GPIO_32"), 1);
        assert_eq!(service.release("GPIO_32"), 0);
    }

    #[test]
    fn test_injected_faults() {
        let service = board();
        service.inject_fault("GPIO_37", PeripheralOp::Open);
        assert!(service.open_output_line("GPIO_37", false).is_err());
        assert!(!service.is_claimed("GPIO_37"));

        service.clear_fault("GPIO_37", PeripheralOp::Open);
        let mut led = service.open_output_line("GPIO_37", false).unwrap();

        service.inject_fault("GPIO_37", PeripheralOp::Write);
        assert_eq!(led.write(true).unwrap_err().op, PeripheralOp::Write);
        assert!(service.write_history("GPIO_37").is_empty());
    }

    #[test]
    fn test_close_clears_callbacks() {
        let service = board();
        let mut button = service
            .open_input_line("GPIO_32", EdgeTrigger::Both, ActiveLevel::Low)
            .unwrap();
        button
            .register_edge_callback(Box::new(|_: &dyn LevelSource| CallbackAction::Continue))
            .unwrap();
        assert_eq!(service.subscriber_count("GPIO_32"), 1);

        button.close().unwrap();
        assert_eq!(service.subscriber_count("GPIO_32"), 0);
        assert_eq!(service.press("GPIO_32"), 0);
    }

    #[test]
    fn test_op_history_records_successful_calls_in_order() {
        let service = board();
        let mut button = service
            .open_input_line("GPIO_32", EdgeTrigger::Both, ActiveLevel::Low)
            .unwrap();
        let subscription = button
            .register_edge_callback(Box::new(|_: &dyn LevelSource| CallbackAction::Continue))
            .unwrap();

        service.inject_fault("GPIO_32", PeripheralOp::Close);
        assert!(button.close().is_err());
        service.clear_fault("GPIO_32", PeripheralOp::Close);
        button.unregister_edge_callback(subscription).unwrap();
        button.close().unwrap();

        assert_eq!(
            service.op_history("GPIO_32"),
            vec![
                PeripheralOp::Open,
                PeripheralOp::RegisterCallback,
                PeripheralOp::UnregisterCallback,
                PeripheralOp::Close,
            ]
        );
    }
}
