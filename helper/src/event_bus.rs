//! Ordered, synchronous publish/subscribe owned by each helper.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::events::{EventKind, HelperEvent, HelperObserver, dispatch};
use crate::lock;

type Handler = Arc<dyn Fn(&HelperEvent) + Send + Sync>;

struct Listener {
    id: u64,
    kind: EventKind,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    listeners: Arc<Mutex<Vec<Listener>>>,
    next_id: AtomicU64,
}

/// Disposer returned by [`EventBus::on`]. Dropping it keeps the handler attached.
pub struct Subscription {
    detachers: Vec<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        for detach in self.detachers {
            detach();
        }
    }

    pub fn join(subscriptions: impl IntoIterator<Item = Subscription>) -> Subscription {
        Subscription {
            detachers: subscriptions.into_iter().flat_map(|s| s.detachers).collect(),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("handlers", &self.detachers.len()).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, kind: EventKind, handler: impl Fn(&HelperEvent) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push(Listener { id, kind, handler: Arc::new(handler) });
        let listeners = Arc::downgrade(&self.listeners);
        Subscription {
            detachers: vec![Box::new(move || {
                if let Some(listeners) = listeners.upgrade() {
                    lock(&listeners).retain(|listener| listener.id != id);
                }
            })],
        }
    }

    /// Subscribes `observer` to every event kind.
    pub fn observe(&self, observer: Arc<dyn HelperObserver>) -> Subscription {
        Subscription::join(EventKind::ALL.into_iter().map(|kind| {
            let observer = observer.clone();
            self.on(kind, move |event| dispatch(observer.as_ref(), event))
        }))
    }

    /// Calls every handler registered for the event's kind, in subscription order.
    /// A panicking handler is logged and skipped. Returns the number of handlers invoked.
    pub fn emit(&self, event: &HelperEvent) -> usize {
        let kind = event.kind();
        // handlers run without the lock held so they may subscribe or unsubscribe
        let handlers = lock(&self.listeners)
            .iter()
            .filter(|listener| listener.kind == kind)
            .map(|listener| listener.handler.clone())
            .collect::<Vec<_>>();
        for handler in &handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                tracing::error!(event = %kind, "event handler panicked");
            }
        }
        handlers.len()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        lock(&self.listeners).iter().filter(|listener| listener.kind == kind).count()
    }

    pub fn clear(&self) {
        lock(&self.listeners).clear();
    }
}
