//! Secondary queries computed from a parent helper's state.
//!
//! A derived helper never searches on its own. Its parameters ride along in the
//! parent's batch and its results arrive with the parent's accepted response.

use std::sync::{Arc, Mutex, Weak};

use common::{ParametersValue, SearchResponse, SearchResults};

use crate::event_bus::{EventBus, Subscription};
use crate::events::{EventKind, HelperEvent, HelperObserver};
use crate::helper::{Helper, HelperInner};
use crate::lock;

pub(crate) type DeriveFn = Box<dyn Fn(&ParametersValue) -> ParametersValue + Send + Sync>;

#[derive(Clone)]
pub struct DerivedHelper {
    inner: Arc<DerivedInner>,
}

struct DerivedInner {
    id: u64,
    parent: Weak<HelperInner>,
    derive: DeriveFn,
    events: EventBus,
    state: Mutex<DerivedState>,
}

#[derive(Default)]
struct DerivedState {
    parameters: Option<ParametersValue>,
    last_results: Option<Arc<SearchResults>>,
    last_sequence: u64,
    detached: bool,
}

impl std::fmt::Debug for DerivedHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("DerivedHelper")
            .field("id", &self.inner.id)
            .field("parameters", &state.parameters)
            .field("detached", &state.detached)
            .finish()
    }
}

impl DerivedHelper {
    pub(crate) fn new(id: u64, parent: Weak<HelperInner>, derive: DeriveFn) -> Self {
        Self {
            inner: Arc::new(DerivedInner {
                id,
                parent,
                derive,
                events: EventBus::new(),
                state: Mutex::new(DerivedState::default()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Parameters derived from the parent's current state.
    pub fn state(&self) -> Option<ParametersValue> {
        lock(&self.inner.state).parameters.clone()
    }

    pub fn last_results(&self) -> Option<Arc<SearchResults>> {
        lock(&self.inner.state).last_results.clone()
    }

    pub fn is_detached(&self) -> bool {
        lock(&self.inner.state).detached
    }

    pub fn on(&self, kind: EventKind, handler: impl Fn(&HelperEvent) + Send + Sync + 'static) -> Subscription {
        self.inner.events.on(kind, handler)
    }

    pub fn observe(&self, observer: Arc<dyn HelperObserver>) -> Subscription {
        self.inner.events.observe(observer)
    }

    /// Removes this derived query from the parent's future batches and drops its listeners.
    pub fn detach(&self) {
        Helper::remove_derived(&self.inner.parent, self.inner.id);
        self.mark_detached();
    }

    pub(crate) fn mark_detached(&self) {
        lock(&self.inner.state).detached = true;
        self.inner.events.clear();
    }

    /// Recomputes the derived parameters silently after a parent mutation.
    pub(crate) fn refresh(&self, parent: &ParametersValue) {
        let parameters = (self.inner.derive)(parent);
        let mut state = lock(&self.inner.state);
        if !state.detached {
            state.parameters = Some(parameters);
        }
    }

    /// Derives the parameters for the parent's search `sequence` and emits `search`.
    pub(crate) fn prepare(&self, parent: &ParametersValue, sequence: u64) -> ParametersValue {
        let parameters = (self.inner.derive)(parent);
        {
            let mut state = lock(&self.inner.state);
            state.parameters = Some(parameters.clone());
            state.last_sequence = state.last_sequence.max(sequence);
        }
        self.inner.events.emit(&HelperEvent::Search { state: parameters.clone(), sequence });
        parameters
    }

    pub(crate) fn accept(&self, sequence: u64, parameters: ParametersValue, response: SearchResponse) {
        let results = Arc::new(SearchResults::new(parameters, response));
        {
            let mut state = lock(&self.inner.state);
            if state.detached || sequence < state.last_sequence {
                return;
            }
            state.last_results = Some(results.clone());
        }
        self.inner.events.emit(&HelperEvent::Result { results, sequence });
    }

    pub(crate) fn reject(&self, sequence: u64, parameters: ParametersValue, error: Arc<anyhow::Error>) {
        {
            let state = lock(&self.inner.state);
            if state.detached || sequence < state.last_sequence {
                return;
            }
        }
        self.inner.events.emit(&HelperEvent::Error { error, state: parameters, sequence });
    }
}
