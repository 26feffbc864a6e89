//! Keeps tracked helpers and a route history in step.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use helper::{EventKind, Helper, Subscription};

use crate::history::RouteHistory;
use crate::route_param::RouteParam;
use crate::state_mapping::StateMapping;
use crate::ui_state::{IndexUiState, UiState};

pub struct RouteSync<M: StateMapping> {
    inner: Arc<SyncInner<M>>,
}

struct SyncInner<M> {
    mapping: M,
    history: Arc<dyn RouteHistory>,
    helpers: Mutex<BTreeMap<String, Helper>>,
    subscriptions: Mutex<Vec<Subscription>>,
    restoring: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<M: StateMapping> RouteSync<M> {
    pub fn new(mapping: M, history: Arc<dyn RouteHistory>) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                mapping,
                history,
                helpers: Mutex::new(BTreeMap::new()),
                subscriptions: Mutex::new(Vec::new()),
                restoring: AtomicBool::new(false),
            }),
        }
    }

    /// Writes a route whenever `helper` changes. `index_id` keys its entry in the UI state.
    pub fn track(&self, index_id: impl Into<String>, helper: &Helper) {
        let sync: Weak<SyncInner<M>> = Arc::downgrade(&self.inner);
        let subscription = helper.on(EventKind::Change, move |_| {
            if let Some(sync) = sync.upgrade() {
                sync.write();
            }
        });
        lock(&self.inner.helpers).insert(index_id.into(), helper.clone());
        lock(&self.inner.subscriptions).push(subscription);
    }

    /// Restores the tracked helpers from the current location.
    pub fn start(&self) {
        self.restore();
    }

    /// Applies the current location to every tracked helper, e.g. after back/forward.
    /// Indices missing from the route, or whose route cannot be applied, go back
    /// to their initial state. Nothing is written to the history meanwhile.
    pub fn restore(&self) {
        let ui_state = self.inner.read_ui_state();
        let helpers = lock(&self.inner.helpers).clone();

        self.inner.restoring.store(true, Ordering::SeqCst);
        for (index_id, helper) in &helpers {
            let initial = helper.initial_state();
            let target = match ui_state.get(index_id) {
                Some(index_state) => index_state.apply_to(initial).unwrap_or_else(|err| {
                    tracing::warn!(index = %index_id, error = %err, "route does not apply, using initial state");
                    initial.clone()
                }),
                None => initial.clone(),
            };
            helper.set_state(target);
        }
        self.inner.restoring.store(false, Ordering::SeqCst);
    }

    pub fn ui_state(&self) -> UiState {
        self.inner.ui_state()
    }

    pub fn route(&self) -> M::Route {
        self.inner.mapping.state_to_route(&self.inner.ui_state())
    }

    /// Detaches from every tracked helper.
    pub fn stop(&self) {
        let subscriptions = std::mem::take(&mut *lock(&self.inner.subscriptions));
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
    }
}

impl<M: StateMapping> SyncInner<M> {
    fn ui_state(&self) -> UiState {
        lock(&self.helpers)
            .iter()
            .map(|(index_id, helper)| (index_id.clone(), IndexUiState::from_parameters(&helper.state())))
            .collect()
    }

    fn read_ui_state(&self) -> UiState {
        let Some(location) = self.history.read() else {
            return UiState::new();
        };
        match location.parse::<RouteParam<M::Route>>() {
            Ok(route) => self.mapping.route_to_state(&route.0),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring undecodable route");
                UiState::new()
            }
        }
    }

    /// Replaces an empty location, pushes a different route and skips an identical one.
    fn write(&self) {
        if self.restoring.load(Ordering::SeqCst) {
            return;
        }
        let route = self.mapping.state_to_route(&self.ui_state());
        let encoded = match RouteParam(route).encode() {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(error = %err, "cannot encode route");
                return;
            }
        };
        match self.history.read() {
            None => self.history.replace(encoded),
            Some(current) if current == encoded => {}
            Some(_) => self.history.push(encoded),
        }
    }
}
