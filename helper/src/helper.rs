//! The search-state orchestrator.
//!
//! Mutations replace the current [`ParametersValue`] and emit `change`
//! synchronously; they never search. [`Helper::search`] snapshots the state,
//! batches it with every derived helper's parameters and spawns the request.
//! Only the response to the most recently issued search is applied.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use common::{IndexConfig, NumericOperator, ParametersValue, SearchRequest, SearchResponse, SearchResults, StateError};
use futures::FutureExt;
use tokio::runtime::Handle;

use crate::derived_helper::DerivedHelper;
use crate::error::HelperError;
use crate::event_bus::{EventBus, Subscription};
use crate::events::{EventKind, HelperEvent, HelperObserver};
use crate::lock;
use crate::search_client::SearchClient;

#[derive(Clone)]
pub struct Helper {
    inner: Arc<HelperInner>,
}

pub(crate) struct HelperInner {
    client: Option<Arc<dyn SearchClient>>,
    events: EventBus,
    initial: ParametersValue,
    state: Mutex<HelperState>,
    next_derived_id: AtomicU64,
}

struct HelperState {
    parameters: ParametersValue,
    last_results: Option<Arc<SearchResults>>,
    derived: Vec<DerivedHelper>,
    last_sequence: u64,
    pending: usize,
    destroyed: bool,
}

/// Everything one `search()` call sent, kept until its response settles.
struct Batch {
    sequence: u64,
    parameters: ParametersValue,
    derived: Vec<(DerivedHelper, ParametersValue)>,
}

impl std::fmt::Debug for Helper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("Helper")
            .field("parameters", &state.parameters)
            .field("pending", &state.pending)
            .field("derived", &state.derived.len())
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

impl Helper {
    pub fn new(client: impl SearchClient, config: IndexConfig) -> Result<Self, HelperError> {
        Ok(Self::from_parameters(Some(Arc::new(client)), ParametersValue::new(config)?))
    }

    /// A helper that tracks state but fails fast on `search()`.
    pub fn without_client(config: IndexConfig) -> Result<Self, HelperError> {
        Ok(Self::from_parameters(None, ParametersValue::new(config)?))
    }

    pub fn from_parameters(client: Option<Arc<dyn SearchClient>>, parameters: ParametersValue) -> Self {
        Self {
            inner: Arc::new(HelperInner {
                client,
                events: EventBus::new(),
                initial: parameters.clone(),
                state: Mutex::new(HelperState {
                    parameters,
                    last_results: None,
                    derived: Vec::new(),
                    last_sequence: 0,
                    pending: 0,
                    destroyed: false,
                }),
                next_derived_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn state(&self) -> ParametersValue {
        lock(&self.inner.state).parameters.clone()
    }

    /// The parameters the helper was created with.
    pub fn initial_state(&self) -> &ParametersValue {
        &self.inner.initial
    }

    pub fn last_results(&self) -> Option<Arc<SearchResults>> {
        lock(&self.inner.state).last_results.clone()
    }

    pub fn has_pending_requests(&self) -> bool {
        lock(&self.inner.state).pending > 0
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.inner.state).destroyed
    }

    pub fn derived_helpers(&self) -> Vec<DerivedHelper> {
        lock(&self.inner.state).derived.clone()
    }

    pub fn on(&self, kind: EventKind, handler: impl Fn(&HelperEvent) + Send + Sync + 'static) -> Subscription {
        self.inner.events.on(kind, handler)
    }

    pub fn observe(&self, observer: Arc<dyn HelperObserver>) -> Subscription {
        self.inner.events.observe(observer)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.events.listener_count(kind)
    }

    pub fn set_query(&self, query: impl Into<String>) -> &Self {
        self.set(true, |p| p.set_query(query))
    }

    pub fn set_page(&self, page: u32) -> &Self {
        self.set(false, |p| p.set_page(page))
    }

    pub fn next_page(&self) -> &Self {
        self.set(false, |p| p.set_page(p.page().saturating_add(1)))
    }

    pub fn previous_page(&self) -> &Self {
        self.set(false, |p| p.set_page(p.page().saturating_sub(1)))
    }

    pub fn set_index(&self, index: impl Into<String>) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.set_index(index))
    }

    pub fn set_hits_per_page(&self, hits_per_page: Option<u32>) -> &Self {
        self.set(true, |p| p.set_hits_per_page(hits_per_page))
    }

    pub fn set_relevancy_strictness(&self, relevancy_strictness: Option<u32>) -> &Self {
        self.set(false, |p| p.set_relevancy_strictness(relevancy_strictness))
    }

    /// Replaces the whole state, e.g. when restoring from a route.
    pub fn set_state(&self, parameters: ParametersValue) -> &Self {
        self.set(false, |_| parameters)
    }

    pub fn add_refine(&self, attribute: &str, value: impl Into<String>) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.add_refine(attribute, value))
    }

    pub fn remove_refine(&self, attribute: &str, value: impl Into<String>) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.remove_refine(attribute, value))
    }

    pub fn toggle_refine(&self, attribute: &str, value: impl Into<String>) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.toggle_refine(attribute, value))
    }

    pub fn add_exclude(&self, attribute: &str, value: impl Into<String>) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.add_exclude(attribute, value))
    }

    pub fn remove_exclude(&self, attribute: &str, value: impl Into<String>) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.remove_exclude(attribute, value))
    }

    pub fn toggle_exclude(&self, attribute: &str, value: impl Into<String>) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.toggle_exclude(attribute, value))
    }

    pub fn add_disjunctive_refine(&self, attribute: &str, value: impl Into<String>) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.add_disjunctive_refine(attribute, value))
    }

    pub fn remove_disjunctive_refine(&self, attribute: &str, value: impl Into<String>) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.remove_disjunctive_refine(attribute, value))
    }

    pub fn toggle_disjunctive_refine(&self, attribute: &str, value: impl Into<String>) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.toggle_disjunctive_refine(attribute, value))
    }

    pub fn add_hierarchical_refine(&self, attribute: &str, path: impl Into<String>) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.add_hierarchical_refine(attribute, path))
    }

    pub fn remove_hierarchical_refine(&self, attribute: &str) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.remove_hierarchical_refine(attribute))
    }

    pub fn toggle_hierarchical_refine(&self, attribute: &str, path: impl Into<String>) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.toggle_hierarchical_refine(attribute, path))
    }

    pub fn add_numeric_refinement(&self, attribute: &str, operator: NumericOperator, value: f64) -> Result<&Self, HelperError> {
        self.try_set(true, |p| p.add_numeric_refinement(attribute, operator, value))
    }

    pub fn remove_numeric_refinement(&self, attribute: &str, operator: Option<NumericOperator>, value: Option<f64>) -> &Self {
        self.set(true, |p| p.remove_numeric_refinement(attribute, operator, value))
    }

    pub fn add_tag(&self, tag: impl Into<String>) -> &Self {
        self.set(true, |p| p.add_tag(tag))
    }

    pub fn remove_tag(&self, tag: impl Into<String>) -> &Self {
        self.set(true, |p| p.remove_tag(tag))
    }

    pub fn toggle_tag(&self, tag: impl Into<String>) -> &Self {
        self.set(true, |p| p.toggle_tag(tag))
    }

    pub fn clear_tags(&self) -> &Self {
        self.set(true, |p| p.clear_tags())
    }

    pub fn clear_refinements(&self, attribute: Option<&str>) -> &Self {
        self.set(true, |p| p.clear_refinements(attribute))
    }

    /// Attaches a derived query computed from this helper's state on every search.
    pub fn derive(&self, derive: impl Fn(&ParametersValue) -> ParametersValue + Send + Sync + 'static) -> DerivedHelper {
        let id = self.inner.next_derived_id.fetch_add(1, Ordering::Relaxed);
        let derived = DerivedHelper::new(id, Arc::downgrade(&self.inner), Box::new(derive));
        derived.refresh(&self.state());
        let mut state = lock(&self.inner.state);
        if state.destroyed {
            drop(state);
            derived.mark_detached();
        } else {
            state.derived.push(derived.clone());
        }
        derived
    }

    pub(crate) fn remove_derived(inner: &Weak<HelperInner>, id: u64) {
        if let Some(inner) = inner.upgrade() {
            lock(&inner.state).derived.retain(|derived| derived.id() != id);
        }
    }

    /// Issues one batched request for this helper and its derived helpers.
    /// Returns the sequence number of the search.
    pub fn search(&self) -> Result<u64, HelperError> {
        let client = self.inner.client.clone().ok_or(HelperError::MissingSearchClient)?;
        let runtime = Handle::try_current().map_err(|_| HelperError::NoAsyncRuntime)?;

        let (sequence, parameters, derived, was_idle) = {
            let mut state = lock(&self.inner.state);
            if state.destroyed {
                return Err(HelperError::Destroyed);
            }
            state.last_sequence += 1;
            let was_idle = state.pending == 0;
            state.pending += 1;
            (state.last_sequence, state.parameters.clone(), state.derived.clone(), was_idle)
        };

        if was_idle {
            self.inner.events.emit(&HelperEvent::SearchQueueEmpty { is_empty: false });
        }
        self.inner.events.emit(&HelperEvent::Search { state: parameters.clone(), sequence });

        let derived = derived
            .into_iter()
            .map(|helper| {
                let derived_parameters = helper.prepare(&parameters, sequence);
                (helper, derived_parameters)
            })
            .collect::<Vec<_>>();
        let requests = std::iter::once(&parameters)
            .chain(derived.iter().map(|(_, p)| p))
            .map(SearchRequest::from)
            .collect::<Vec<_>>();
        tracing::debug!(sequence, index = parameters.index(), requests = requests.len(), "issuing search");

        let response = client.search(requests);
        let batch = Batch { sequence, parameters, derived };
        let helper = Arc::downgrade(&self.inner);
        runtime.spawn(async move {
            let outcome = AssertUnwindSafe(response)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(anyhow::anyhow!("search client panicked")));
            if let Some(inner) = helper.upgrade() {
                Helper { inner }.settle(batch, outcome);
            }
        });
        Ok(sequence)
    }

    /// Detaches derived helpers, drops every listener and ignores responses still in flight.
    pub fn destroy(&self) {
        let derived = {
            let mut state = lock(&self.inner.state);
            state.destroyed = true;
            std::mem::take(&mut state.derived)
        };
        for helper in derived {
            helper.mark_detached();
        }
        self.inner.events.clear();
    }

    fn set(&self, resets_page: bool, update: impl FnOnce(&ParametersValue) -> ParametersValue) -> &Self {
        let _ = self.apply(resets_page, |p| Ok(update(p)));
        self
    }

    fn try_set(
        &self,
        resets_page: bool,
        update: impl FnOnce(&ParametersValue) -> Result<ParametersValue, StateError>,
    ) -> Result<&Self, HelperError> {
        self.apply(resets_page, update)?;
        Ok(self)
    }

    /// Every mutation emits exactly one `change`. A no-op keeps the current
    /// instance and leaves the page alone, so the payload equals the prior state.
    /// `update` runs under the state lock.
    fn apply(
        &self,
        resets_page: bool,
        update: impl FnOnce(&ParametersValue) -> Result<ParametersValue, StateError>,
    ) -> Result<(), StateError> {
        let (event, parameters, derived) = {
            let mut state = lock(&self.inner.state);
            let next = update(&state.parameters)?;
            let changed = next != state.parameters;
            let is_page_reset = changed && resets_page;
            if changed {
                state.parameters = if is_page_reset { next.reset_page() } else { next };
            }
            if state.destroyed {
                return Ok(());
            }
            let event = HelperEvent::Change {
                state: state.parameters.clone(),
                results: state.last_results.clone(),
                is_page_reset,
            };
            (event, state.parameters.clone(), state.derived.clone())
        };
        for helper in &derived {
            helper.refresh(&parameters);
        }
        self.inner.events.emit(&event);
        Ok(())
    }

    fn settle(&self, batch: Batch, outcome: anyhow::Result<Vec<SearchResponse>>) {
        let expected = 1 + batch.derived.len();
        let outcome = outcome.and_then(|mut responses| {
            if responses.len() != expected {
                anyhow::bail!("search client returned {} responses for {} requests", responses.len(), expected);
            }
            let derived_responses = responses.split_off(1);
            let main = responses.pop().ok_or_else(|| anyhow::anyhow!("search client returned no response"))?;
            Ok((Arc::new(SearchResults::new(batch.parameters.clone(), main)), derived_responses))
        });

        let (is_latest, drained) = {
            let mut state = lock(&self.inner.state);
            if state.destroyed {
                return;
            }
            state.pending = state.pending.saturating_sub(1);
            let is_latest = batch.sequence == state.last_sequence;
            if is_latest {
                if let Ok((results, _)) = &outcome {
                    state.last_results = Some(results.clone());
                }
            }
            (is_latest, state.pending == 0)
        };

        let sequence = batch.sequence;
        if !is_latest {
            tracing::debug!(sequence, "discarding stale search response");
        } else {
            match outcome {
                Ok((results, derived_responses)) => {
                    self.inner.events.emit(&HelperEvent::Result { results, sequence });
                    for ((helper, parameters), response) in batch.derived.into_iter().zip(derived_responses) {
                        helper.accept(sequence, parameters, response);
                    }
                }
                Err(error) => {
                    tracing::warn!(sequence, error = %error, "search failed");
                    let error = Arc::new(error);
                    self.inner.events.emit(&HelperEvent::Error {
                        error: error.clone(),
                        state: batch.parameters,
                        sequence,
                    });
                    for (helper, parameters) in batch.derived {
                        helper.reject(sequence, parameters, error.clone());
                    }
                }
            }
        }

        if drained {
            self.inner.events.emit(&HelperEvent::SearchQueueEmpty { is_empty: true });
        }
    }
}
