//! Peripheral service and line traits
//!
//! These are the seams between the controller and the hardware. Every
//! operation that touches a pin returns [`PeripheralResult`].

use crate::error::PeripheralResult;
use crate::gpio::types::{ActiveLevel, EdgeTrigger};
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Result of an edge callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Keep the callback registered for future edges
    Continue,
    /// Remove the callback after this invocation
    Unsubscribe,
}

/// Handle for a registered edge callback
///
/// Returned by [`InputLine::register_edge_callback`] and passed back to
/// [`InputLine::unregister_edge_callback`] to revoke it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(Uuid);

impl Subscription {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Unique id of this subscription
    pub fn id(&self) -> Uuid {
        self.0
    }
}

/// Something whose logical level can be read
///
/// Edge callbacks receive the line that fired through this trait.
pub trait LevelSource {
    /// Logical pin name
    fn pin_name(&self) -> &str;

    /// Read the logical value (after active-level inversion)
    fn read(&self) -> PeripheralResult<bool>;
}

/// Callback invoked once per detected edge
///
/// Callbacks must not register or unregister on the line they are invoked
/// for; return [`CallbackAction::Unsubscribe`] instead.
pub type EdgeCallback = Box<dyn FnMut(&dyn LevelSource) -> CallbackAction + Send>;

/// Digital input line
pub trait InputLine: LevelSource + Send {
    /// Register a callback for edges matching the line's trigger
    fn register_edge_callback(&mut self, callback: EdgeCallback) -> PeripheralResult<Subscription>;

    /// Revoke a subscription; waits for an in-flight callback to return
    fn unregister_edge_callback(&mut self, subscription: Subscription) -> PeripheralResult<()>;

    /// Release the line
    fn close(&mut self) -> PeripheralResult<()>;
}

/// Digital output line
pub trait OutputLine: Send {
    /// Logical pin name
    fn pin_name(&self) -> &str;

    /// Drive the line
    fn write(&mut self, value: bool) -> PeripheralResult<()>;

    /// Release the line
    fn close(&mut self) -> PeripheralResult<()>;
}

/// Opens named GPIO lines
pub trait PeripheralService: Send + Sync {
    /// Names of all lines this service knows about
    fn line_names(&self) -> Vec<String>;

    /// Open `name` as an input with the given edge trigger and active level
    fn open_input_line(
        &self,
        name: &str,
        edge: EdgeTrigger,
        active: ActiveLevel,
    ) -> PeripheralResult<Box<dyn InputLine>>;

    /// Open `name` as an output driven to `initial`
    fn open_output_line(&self, name: &str, initial: bool) -> PeripheralResult<Box<dyn OutputLine>>;
}

/// Registered edge callbacks for one input line
///
/// Shared by both backends. Dispatch holds the registry lock for the whole
/// pass, which serializes edges on the line and makes unregistering wait for
/// a running callback.
#[derive(Default)]
pub struct CallbackRegistry {
    entries: Mutex<Vec<(Subscription, EdgeCallback)>>,
}

impl CallbackRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback and return its subscription
    pub fn register(&self, callback: EdgeCallback) -> Subscription {
        let subscription = Subscription::new();
        self.entries.lock().push((subscription, callback));
        subscription
    }

    /// Remove a callback; returns `false` if it was not registered
    pub fn unregister(&self, subscription: Subscription) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(sub, _)| *sub != subscription);
        entries.len() != before
    }

    /// Drop every callback
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// `true` when no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Invoke every callback with `source`, dropping those that unsubscribe
    ///
    /// Returns the number of callbacks invoked.
    pub fn dispatch(&self, source: &dyn LevelSource) -> usize {
        let mut entries = self.entries.lock();
        let invoked = entries.len();
        entries.retain_mut(|(subscription, callback)| match callback(source) {
            CallbackAction::Continue => true,
            CallbackAction::Unsubscribe => {
                debug!(
                    "Edge callback {} on {} unsubscribed itself",
                    subscription.id(),
                    source.pin_name()
                );
                false
            }
        });
        invoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedLevel(bool);

    impl LevelSource for FixedLevel {
        fn pin_name(&self) -> &str {
            "GPIO_TEST"
        }

        fn read(&self) -> PeripheralResult<bool> {
            Ok(self.0)
        }
    }

    fn counting_callback(counter: &Arc<AtomicUsize>, action: CallbackAction) -> EdgeCallback {
        let counter = Arc::clone(counter);
        Box::new(move |_: &dyn LevelSource| {
            counter.fetch_add(1, Ordering::SeqCst);
            action
        })
    }

    #[test]
    fn test_continue_keeps_callback() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(counting_callback(&counter, CallbackAction::Continue));

        assert_eq!(registry.dispatch(&FixedLevel(true)), 1);
        assert_eq!(registry.dispatch(&FixedLevel(false)), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unsubscribe_removes_callback() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        registry.register(counting_callback(&counter, CallbackAction::Unsubscribe));

        registry.dispatch(&FixedLevel(true));
        registry.dispatch(&FixedLevel(true));

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister_by_subscription() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let first = registry.register(counting_callback(&counter, CallbackAction::Continue));
        let _second = registry.register(counting_callback(&counter, CallbackAction::Continue));

        assert!(registry.unregister(first));
        assert!(!registry.unregister(first), "second revoke is a no-op");
        assert_eq!(registry.dispatch(&FixedLevel(true)), 1);
    }

    #[test]
    fn test_subscriptions_are_unique() {
        let registry = CallbackRegistry::new();
        let a = registry.register(Box::new(|_: &dyn LevelSource| CallbackAction::Continue));
        let b = registry.register(Box::new(|_: &dyn LevelSource| CallbackAction::Continue));
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }
}
