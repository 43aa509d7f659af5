//! Broadcast of pattern changes to live actors.
//!
//! A channel remembers the last pattern it carried, drops repeats, and
//! replays the current value to late subscribers so an actor that appears
//! after a change still starts with the right behaviour.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::trace;

use crate::pattern::PackedPattern;

/// Subscriber key, usually the id of the subscribing actor.
pub type SubscriberKey = u64;

type Listener = Box<dyn FnMut(PackedPattern)>;

#[derive(Default)]
pub struct PatternChannel {
    last: Option<PackedPattern>,
    listeners: BTreeMap<SubscriberKey, Listener>,
}

/// A channel shared between the interpreter, the trajectory driving an actor
/// and the host.
pub type SharedChannel = Rc<RefCell<PatternChannel>>;

impl PatternChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel that already carries `pattern`.
    pub fn with_pattern(pattern: PackedPattern) -> Self {
        Self {
            last: Some(pattern),
            listeners: BTreeMap::new(),
        }
    }

    pub fn shared(pattern: PackedPattern) -> SharedChannel {
        Rc::new(RefCell::new(Self::with_pattern(pattern)))
    }

    pub fn last_pattern(&self) -> Option<PackedPattern> {
        self.last
    }

    /// Pushes `pattern` to every listener unless it equals the last one.
    /// Returns whether anything was broadcast.
    pub fn publish(&mut self, pattern: PackedPattern) -> bool {
        if self.last == Some(pattern) {
            return false;
        }
        trace!(%pattern, listeners = self.listeners.len(), "pattern changed");
        self.last = Some(pattern);
        for listener in self.listeners.values_mut() {
            listener(pattern);
        }
        true
    }

    /// Registers `listener` under `key`, replacing any previous one, and
    /// replays the current pattern to it.
    pub fn subscribe(&mut self, key: SubscriberKey, listener: impl FnMut(PackedPattern) + 'static) {
        let mut listener: Listener = Box::new(listener);
        if let Some(pattern) = self.last {
            listener(pattern);
        }
        self.listeners.insert(key, listener);
    }

    pub fn unsubscribe(&mut self, key: SubscriberKey) -> bool {
        self.listeners.remove(&key).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for PatternChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternChannel")
            .field("last", &self.last)
            .field("subscribers", &self.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}
