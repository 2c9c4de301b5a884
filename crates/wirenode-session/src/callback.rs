//! The callback registry used to multiplex a single socket between
//! unsolicited notifications and synchronous request/response calls.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use wirenode_core::Node;

use crate::error::SessionError;

/// The concrete return shapes a registered callback can latch, the
/// Rust analogue of the original's dynamically-typed callback result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackValue {
    /// No meaningful payload; the callback merely fired.
    Unit,
    /// An opaque auth blob, e.g. from a `success` stanza.
    AuthBlob(Vec<u8>),
    /// A duration in seconds, e.g. from a `last_seen` query.
    Seconds(u64),
}

/// What a callback's action produced: a value, or a session-level error
/// to surface to whoever is waiting on it.
pub type CallbackOutcome = Result<CallbackValue, SessionError>;

/// One registered callback: a predicate deciding participation, an
/// action producing the outcome, and a latch storing the first result.
pub struct Callback {
    /// The stanza name this callback is registered under.
    pub name: String,
    test: Box<dyn FnMut(&Node) -> bool>,
    call: Box<dyn FnMut(&Node) -> CallbackOutcome>,
    latch: RefCell<Option<CallbackOutcome>>,
}

impl Callback {
    /// Build a callback registered under `name` that only participates
    /// when `test` returns true, and whose outcome is produced by `call`.
    pub fn new(
        name: impl Into<String>,
        test: impl FnMut(&Node) -> bool + 'static,
        call: impl FnMut(&Node) -> CallbackOutcome + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            test: Box::new(test),
            call: Box::new(call),
            latch: RefCell::new(None),
        }
    }

    /// Offer `node` to this callback: if it has already latched, or the
    /// predicate declines, do nothing. Otherwise run the action and
    /// store its outcome.
    fn offer(&mut self, node: &Node) {
        if self.latch.borrow().is_some() {
            return;
        }
        if !(self.test)(node) {
            return;
        }
        let outcome = (self.call)(node);
        *self.latch.borrow_mut() = Some(outcome);
    }

    /// Whether this callback has latched a result.
    pub fn is_latched(&self) -> bool {
        self.latch.borrow().is_some()
    }

    /// Take the latched outcome, if any.
    pub fn take_outcome(&self) -> Option<CallbackOutcome> {
        self.latch.borrow_mut().take()
    }
}

/// Maps stanza name to an ordered list of callbacks, head-first so newer
/// registrations preempt older ones sharing a name.
#[derive(Default)]
pub struct CallbackRegistry {
    by_name: HashMap<String, VecDeque<Callback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`, inserting it at the head of its name's queue.
    pub fn register(&mut self, callback: Callback) {
        self.by_name.entry(callback.name.clone()).or_default().push_front(callback);
    }

    /// Offer `node` to every callback registered under its name, in
    /// head-first order, draining any that have latched by the time the
    /// offer pass is over is left to the caller via [`Self::drain_latched`].
    pub fn dispatch(&mut self, node: &Node) {
        if let Some(queue) = self.by_name.get_mut(&node.name) {
            for callback in queue.iter_mut() {
                callback.offer(node);
            }
        }
    }

    /// Remove and return every latched callback's outcome under `name`.
    pub fn drain_latched(&mut self, name: &str) -> Vec<CallbackOutcome> {
        let Some(queue) = self.by_name.get_mut(name) else {
            return Vec::new();
        };
        let mut outcomes = Vec::new();
        queue.retain(|cb| {
            if let Some(outcome) = cb.take_outcome() {
                outcomes.push(outcome);
                false
            } else {
                true
            }
        });
        outcomes
    }

    /// Drop every callback registered under `name` that has not latched,
    /// used to unregister a request/response wait once it is satisfied.
    pub fn clear(&mut self, name: &str) {
        self.by_name.remove(name);
    }
}
