//! Lifecycle notifications.
//!
//! The application publishes three events, synchronously and in dispatch
//! order: [`Event::ApplicationStarted`] once after boot,
//! [`Event::RequestReceived`] before routing and [`Event::ResponseSent`] after
//! the response is final (including error responses). Listeners cannot
//! influence dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;

use crate::config::Config;
use crate::core::{Request, Response};

/// Event discriminant, used to register listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    ApplicationStarted,
    RequestReceived,
    ResponseSent,
}

/// A lifecycle event borrowing the objects it describes.
#[derive(Debug)]
pub enum Event<'a> {
    ApplicationStarted {
        started_at: SystemTime,
        config: &'a Config,
    },
    RequestReceived {
        request: &'a Request,
        timestamp: SystemTime,
    },
    ResponseSent {
        request: &'a Request,
        response: &'a Response,
        timestamp: SystemTime,
        duration: Duration,
    },
}

impl Event<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ApplicationStarted { .. } => EventKind::ApplicationStarted,
            Event::RequestReceived { .. } => EventKind::RequestReceived,
            Event::ResponseSent { .. } => EventKind::ResponseSent,
        }
    }
}

/// Receiver of lifecycle events. Fire-and-forget.
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, event: &Event<'_>);
}

/// Listener callback.
pub type Listener = dyn Fn(&Event<'_>) + Send + Sync;

/// Listener registry keyed by [`EventKind`].
#[derive(Default)]
pub struct Listeners {
    listeners: RwLock<HashMap<EventKind, Vec<Arc<Listener>>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one kind of event.
    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Number of listeners for `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }
}

impl EventDispatcher for Listeners {
    fn dispatch(&self, event: &Event<'_>) {
        // Clone out so listeners may register more listeners.
        let listeners = match self.listeners.read().get(&event.kind()) {
            Some(listeners) => listeners.clone(),
            None => return,
        };
        for listener in listeners {
            listener(event);
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read();
        let counts: HashMap<_, _> = listeners.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("Listeners").field("counts", &counts).finish()
    }
}
