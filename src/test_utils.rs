//! Shared test utilities for `ledtoggle` unit tests.
//!
//! This module provides common test infrastructure used across multiple test modules.
//! It is only compiled during testing (`#[cfg(test)]`).

use crate::config::manager::HOME_ENV_VAR;
use crate::display::{DisplayIndicator, IndicatorImage};
use parking_lot::Mutex as FrameMutex;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Global mutex to serialize tests that modify the `LEDTOGGLE_HOME` environment variable.
static HOME_LOCK: Mutex<()> = Mutex::new(());

/// Helper function to create a temporary test directory using tempfile.
/// Returns a `TempDir` that automatically cleans up when dropped.
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// RAII guard that points `LEDTOGGLE_HOME` at a temp directory for a test scope
/// and restores the original value when dropped.
///
/// **Safety Invariants:**
/// 1. Each test gets its own unique `TempDir`, so parallel tests write to different paths
/// 2. The guard restores the original value on drop, even on panic
/// 3. The `HOME_LOCK` mutex ensures tests modify the variable serially
pub struct HomeGuard {
    original: Option<String>,
    // Held for the lifetime of the guard
    _lock: std::sync::MutexGuard<'static, ()>,
}

#[expect(
    unsafe_code,
    reason = "Test-only code that modifies environment variables with documented safety invariants"
)]
impl HomeGuard {
    /// Create a new guard that sets `LEDTOGGLE_HOME` to the given temp directory path.
    pub fn new(temp_dir: &TempDir) -> Self {
        // A panicking test poisons the lock; the guarded data is `()`
        let lock = HOME_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let original = std::env::var(HOME_ENV_VAR).ok();
        // SAFETY: modifications are serialized by HOME_LOCK and undone on drop.
        unsafe {
            std::env::set_var(HOME_ENV_VAR, temp_dir.path());
        }
        Self {
            original,
            _lock: lock,
        }
    }
}

#[expect(
    unsafe_code,
    reason = "Test-only code that restores environment variables with documented safety invariants"
)]
impl Drop for HomeGuard {
    fn drop(&mut self) {
        // SAFETY: still holding HOME_LOCK; restores the state seen in new().
        if let Some(ref original) = self.original {
            unsafe {
                std::env::set_var(HOME_ENV_VAR, original);
            }
        } else {
            unsafe {
                std::env::remove_var(HOME_ENV_VAR);
            }
        }
    }
}

/// Indicator that records every frame it is asked to show
#[derive(Default)]
pub struct RecordingIndicator {
    frames: FrameMutex<Vec<IndicatorImage>>,
}

impl RecordingIndicator {
    /// Create an empty recorder behind an `Arc`
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Frames shown so far
    pub fn frames(&self) -> Vec<IndicatorImage> {
        self.frames.lock().clone()
    }

    /// Most recent frame
    pub fn last(&self) -> Option<IndicatorImage> {
        self.frames.lock().last().copied()
    }
}

impl DisplayIndicator for RecordingIndicator {
    fn show_on(&self) {
        self.frames.lock().push(IndicatorImage::On);
    }

    fn show_off(&self) {
        self.frames.lock().push(IndicatorImage::Off);
    }
}

/// Tracing layer counting events at a given level
pub struct LevelCounter {
    level: Level,
    count: Arc<AtomicUsize>,
}

impl LevelCounter {
    /// Create a layer and the shared counter it increments
    pub fn new(level: Level) -> (Self, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        (
            Self {
                level,
                count: Arc::clone(&count),
            },
            count,
        )
    }
}

impl<S: Subscriber> Layer<S> for LevelCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == self.level {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Run `f` with a subscriber counting events at `level` on this thread
pub fn count_events<F: FnOnce()>(level: Level, f: F) -> usize {
    use tracing_subscriber::layer::SubscriberExt;

    let (layer, count) = LevelCounter::new(level);
    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::with_default(subscriber, f);
    count.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_events_counts_only_level() {
        let errors = count_events(Level::ERROR, || {
            tracing::error!("one");
            tracing::warn!("not counted");
            tracing::error!("two");
        });
        assert_eq!(errors, 2);
    }

    #[test]
    fn test_recording_indicator_keeps_order() {
        let indicator = RecordingIndicator::shared();
        indicator.show(IndicatorImage::On);
        indicator.show_off();
        assert_eq!(
            indicator.frames(),
            vec![IndicatorImage::On, IndicatorImage::Off]
        );
        assert_eq!(indicator.last(), Some(IndicatorImage::Off));
    }
}
