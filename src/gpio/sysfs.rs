//! Linux sysfs GPIO backend
//!
//! Drives pins through `/sys/class/gpio` (or any directory with the same
//! layout). Logical pin names map to sysfs numbers through an explicit table
//! or, failing that, the trailing digits of the name (`GPIO_37` → `gpio37`).
//!
//! Edge callbacks are delivered by one watcher thread per input line that
//! polls the `value` attribute. Edges shorter than the polling interval are
//! not observed.

use crate::error::{PeripheralIoError, PeripheralOp, PeripheralResult};
use crate::gpio::line::{
    CallbackRegistry, EdgeCallback, InputLine, LevelSource, OutputLine, PeripheralService,
    Subscription,
};
use crate::gpio::types::{ActiveLevel, EdgeTrigger};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default sysfs GPIO root
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

type ClaimSet = Arc<Mutex<HashSet<String>>>;

/// Peripheral service backed by the sysfs GPIO interface
pub struct SysfsPeripheralService {
    root: PathBuf,
    poll_interval: Duration,
    pin_numbers: BTreeMap<String, u32>,
    claimed: ClaimSet,
}

impl SysfsPeripheralService {
    /// Create a service rooted at `root`
    pub fn new(
        root: impl Into<PathBuf>,
        poll_interval: Duration,
        pin_numbers: BTreeMap<String, u32>,
    ) -> Self {
        Self {
            root: root.into(),
            poll_interval,
            pin_numbers,
            claimed: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Resolve a logical pin name to its sysfs number
    pub fn gpio_number(&self, name: &str) -> Option<u32> {
        self.pin_numbers
            .get(name)
            .copied()
            .or_else(|| gpio_number_from_name(name))
    }

    /// Claim `name`, export it if needed and run `configure` on its directory
    ///
    /// The claim is released again if any step fails.
    fn open_pin<F>(&self, name: &str, configure: F) -> PeripheralResult<PinHandle>
    where
        F: FnOnce(&Path) -> PeripheralResult<()>,
    {
        let number = self
            .gpio_number(name)
            .ok_or_else(|| PeripheralIoError::no_such_pin(PeripheralOp::Open, name))?;

        if !self.claimed.lock().insert(name.to_string()) {
            return Err(PeripheralIoError::already_claimed(name));
        }

        let result = self.export(name, number).and_then(|(dir, exported)| {
            let handle = PinHandle {
                name: name.to_string(),
                number,
                dir,
                root: self.root.clone(),
                exported,
                claimed: Arc::clone(&self.claimed),
            };
            match configure(&handle.dir) {
                Ok(()) => Ok(handle),
                Err(e) => {
                    if let Err(release_err) = handle.release() {
                        debug!("Release after failed configure of {name}: {release_err}");
                    }
                    Err(e)
                }
            }
        });

        if result.is_err() {
            self.claimed.lock().remove(name);
        }
        result
    }

    fn export(&self, name: &str, number: u32) -> PeripheralResult<(PathBuf, bool)> {
        let dir = self.root.join(format!("gpio{number}"));
        if dir.is_dir() {
            return Ok((dir, false));
        }

        fs::write(self.root.join("export"), number.to_string())
            .map_err(|e| PeripheralIoError::new(PeripheralOp::Open, name, e))?;
        if !dir.is_dir() {
            return Err(PeripheralIoError::no_such_pin(PeripheralOp::Open, name));
        }
        debug!("Exported {name} as gpio{number}");
        Ok((dir, true))
    }
}

impl PeripheralService for SysfsPeripheralService {
    fn line_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pin_numbers.keys().cloned().collect();
        let Ok(entries) = fs::read_dir(&self.root) else {
            return names;
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(number) = file_name
                .to_str()
                .and_then(|n| n.strip_prefix("gpio"))
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            if !self.pin_numbers.values().any(|&n| n == number) {
                names.push(format!("GPIO_{number}"));
            }
        }
        names.sort();
        names
    }

    fn open_input_line(
        &self,
        name: &str,
        edge: EdgeTrigger,
        active: ActiveLevel,
    ) -> PeripheralResult<Box<dyn InputLine>> {
        let handle = self.open_pin(name, |dir| {
            write_attr(dir, "direction", "in", name)?;
            write_attr(dir, "edge", edge.sysfs_name(), name)?;
            let active_low = if active == ActiveLevel::Low { "1" } else { "0" };
            write_attr(dir, "active_low", active_low, name)
        })?;

        info!("Opened sysfs input {name} (gpio{})", handle.number);
        Ok(Box::new(SysfsInputLine {
            probe: SysfsProbe::new(name, &handle.dir),
            handle: Some(handle),
            edge,
            poll_interval: self.poll_interval,
            callbacks: Arc::new(CallbackRegistry::new()),
            watcher: None,
        }))
    }

    fn open_output_line(&self, name: &str, initial: bool) -> PeripheralResult<Box<dyn OutputLine>> {
        let handle = self.open_pin(name, |dir| {
            // "low"/"high" set direction and initial value in one glitch-free step
            let direction = if initial { "high" } else { "low" };
            write_attr(dir, "direction", direction, name)?;
            write_attr(dir, "active_low", "0", name)
        })?;

        info!("Opened sysfs output {name} (gpio{})", handle.number);
        Ok(Box::new(SysfsOutputLine {
            value_path: handle.dir.join("value"),
            handle: Some(handle),
        }))
    }
}

/// Extract the sysfs number from names like `GPIO_37` or `gpio37`
pub fn gpio_number_from_name(name: &str) -> Option<u32> {
    let digits_start = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    name[digits_start..].parse().ok()
}

fn write_attr(dir: &Path, attr: &str, value: &str, pin: &str) -> PeripheralResult<()> {
    fs::write(dir.join(attr), value)
        .map_err(|e| PeripheralIoError::new(PeripheralOp::Configure, pin, e))
}

/// Ownership of one exported pin
struct PinHandle {
    name: String,
    number: u32,
    dir: PathBuf,
    root: PathBuf,
    exported: bool,
    claimed: ClaimSet,
}

impl PinHandle {
    /// Unexport (if this handle exported the pin) and drop the claim
    fn release(self) -> PeripheralResult<()> {
        let result = if self.exported {
            fs::write(self.root.join("unexport"), self.number.to_string())
                .map_err(|e| PeripheralIoError::new(PeripheralOp::Close, &self.name, e))
        } else {
            Ok(())
        };
        self.claimed.lock().remove(&self.name);
        result
    }
}

/// Reads the `value` attribute of one pin
#[derive(Clone)]
struct SysfsProbe {
    pin: String,
    value_path: PathBuf,
}

impl SysfsProbe {
    fn new(pin: &str, dir: &Path) -> Self {
        Self {
            pin: pin.to_string(),
            value_path: dir.join("value"),
        }
    }
}

impl LevelSource for SysfsProbe {
    fn pin_name(&self) -> &str {
        &self.pin
    }

    fn read(&self) -> PeripheralResult<bool> {
        let raw = fs::read_to_string(&self.value_path)
            .map_err(|e| PeripheralIoError::new(PeripheralOp::Read, &self.pin, e))?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(PeripheralIoError::new(
                PeripheralOp::Read,
                &self.pin,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unexpected GPIO value {other:?}"),
                ),
            )),
        }
    }
}

/// Background thread polling an input line for edges
struct EdgeWatcher {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl EdgeWatcher {
    fn start(
        probe: SysfsProbe,
        edge: EdgeTrigger,
        interval: Duration,
        callbacks: Arc<CallbackRegistry>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            debug!("Edge watcher started for {}", probe.pin);
            let mut last = probe.read().ok();
            let mut read_failing = false;

            while !stop_flag.load(Ordering::Acquire) {
                thread::sleep(interval);
                match probe.read() {
                    Ok(current) => {
                        read_failing = false;
                        let fired = last.is_some_and(|previous| edge.fires(previous, current));
                        last = Some(current);
                        if fired && !stop_flag.load(Ordering::Acquire) {
                            callbacks.dispatch(&probe);
                        }
                    }
                    Err(e) => {
                        // Only report the first failure of a run
                        if !read_failing {
                            warn!("Edge watcher cannot read {}: {}", probe.pin, e);
                        }
                        read_failing = true;
                    }
                }
            }
            debug!("Edge watcher stopped for {}", probe.pin);
        });

        Self { stop, handle }
    }

    fn stop(self) {
        self.stop.store(true, Ordering::Release);
        if self.handle.join().is_err() {
            warn!("Edge watcher thread panicked");
        }
    }
}

struct SysfsInputLine {
    probe: SysfsProbe,
    handle: Option<PinHandle>,
    edge: EdgeTrigger,
    poll_interval: Duration,
    callbacks: Arc<CallbackRegistry>,
    watcher: Option<EdgeWatcher>,
}

impl SysfsInputLine {
    fn ensure_open(&self, op: PeripheralOp) -> PeripheralResult<()> {
        if self.handle.is_none() {
            return Err(PeripheralIoError::closed(op, &self.probe.pin));
        }
        Ok(())
    }
}

impl LevelSource for SysfsInputLine {
    fn pin_name(&self) -> &str {
        &self.probe.pin
    }

    fn read(&self) -> PeripheralResult<bool> {
        self.ensure_open(PeripheralOp::Read)?;
        self.probe.read()
    }
}

impl InputLine for SysfsInputLine {
    fn register_edge_callback(&mut self, callback: EdgeCallback) -> PeripheralResult<Subscription> {
        self.ensure_open(PeripheralOp::RegisterCallback)?;
        let subscription = self.callbacks.register(callback);
        if self.watcher.is_none() && self.edge != EdgeTrigger::None {
            self.watcher = Some(EdgeWatcher::start(
                self.probe.clone(),
                self.edge,
                self.poll_interval,
                Arc::clone(&self.callbacks),
            ));
        }
        Ok(subscription)
    }

    fn unregister_edge_callback(&mut self, subscription: Subscription) -> PeripheralResult<()> {
        self.ensure_open(PeripheralOp::UnregisterCallback)?;
        self.callbacks.unregister(subscription);
        Ok(())
    }

    fn close(&mut self) -> PeripheralResult<()> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| PeripheralIoError::closed(PeripheralOp::Close, &self.probe.pin))?;
        if let Some(watcher) = self.watcher.take() {
            watcher.stop();
        }
        self.callbacks.clear();
        handle.release()
    }
}

impl Drop for SysfsInputLine {
    fn drop(&mut self) {
        if self.handle.is_none() {
            return;
        }
        if let Err(e) = self.close() {
            warn!("Failed to release {} on drop: {}", self.probe.pin, e);
        }
    }
}

struct SysfsOutputLine {
    value_path: PathBuf,
    handle: Option<PinHandle>,
}

impl SysfsOutputLine {
    fn name(&self) -> &str {
        self.handle.as_ref().map_or("<closed>", |h| h.name.as_str())
    }
}

impl OutputLine for SysfsOutputLine {
    fn pin_name(&self) -> &str {
        self.name()
    }

    fn write(&mut self, value: bool) -> PeripheralResult<()> {
        let Some(handle) = &self.handle else {
            return Err(PeripheralIoError::closed(PeripheralOp::Write, self.name()));
        };
        fs::write(&self.value_path, if value { "1" } else { "0" })
            .map_err(|e| PeripheralIoError::new(PeripheralOp::Write, &handle.name, e))
    }

    fn close(&mut self) -> PeripheralResult<()> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| PeripheralIoError::closed(PeripheralOp::Close, "<closed>"))?;
        handle.release()
    }
}

impl Drop for SysfsOutputLine {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let name = handle.name.clone();
            if let Err(e) = handle.release() {
                warn!("Failed to release {name} on drop: {e}");
            }
        }
    }
}
