//! Pure transforms between nested UI state and compact route state.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ui_state::{IndexUiState, ShareableState, UiState};

/// Route projection of one index: the shareable state with `query` shortened to `q`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexRouteState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(flatten)]
    pub shared: ShareableState,
}

impl IndexRouteState {
    pub fn is_empty(&self) -> bool {
        self.q.is_none() && self.shared == ShareableState::default()
    }
}

impl From<&IndexUiState> for IndexRouteState {
    fn from(ui_state: &IndexUiState) -> Self {
        let normalized = ui_state.normalized();
        IndexRouteState {
            q: normalized.query,
            shared: normalized.shared,
        }
    }
}

impl From<&IndexRouteState> for IndexUiState {
    fn from(route: &IndexRouteState) -> Self {
        IndexUiState {
            query: route.q.clone(),
            shared: route.shared.clone(),
            configure: BTreeMap::new(),
        }
        .normalized()
    }
}

/// Route keyed by index id. Indices without state have no key.
pub type MultiIndexRoute = BTreeMap<String, IndexRouteState>;

pub trait StateMapping: Send + Sync + 'static {
    type Route: Serialize + DeserializeOwned + Clone + PartialEq + Debug + Default + Send + Sync;

    fn state_to_route(&self, ui_state: &UiState) -> Self::Route;

    /// Never reconstructs `configure`; that comes from the index configuration.
    fn route_to_state(&self, route: &Self::Route) -> UiState;
}

/// Maps every tracked index, omitting the ones with nothing to share.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleStateMapping;

impl StateMapping for SimpleStateMapping {
    type Route = MultiIndexRoute;

    fn state_to_route(&self, ui_state: &UiState) -> MultiIndexRoute {
        ui_state
            .iter()
            .map(|(index, state)| (index.clone(), IndexRouteState::from(state)))
            .filter(|(_, route)| !route.is_empty())
            .collect()
    }

    fn route_to_state(&self, route: &MultiIndexRoute) -> UiState {
        route
            .iter()
            .map(|(index, state)| (index.clone(), IndexUiState::from(state)))
            .collect()
    }
}

/// Flat route for an app with one index. The UI state is still nested under the index id.
#[derive(Debug, Clone)]
pub struct SingleIndexStateMapping {
    index_id: String,
}

impl SingleIndexStateMapping {
    pub fn new(index_id: impl Into<String>) -> Self {
        Self { index_id: index_id.into() }
    }

    pub fn index_id(&self) -> &str {
        &self.index_id
    }
}

impl StateMapping for SingleIndexStateMapping {
    type Route = IndexRouteState;

    fn state_to_route(&self, ui_state: &UiState) -> IndexRouteState {
        ui_state.get(&self.index_id).map(IndexRouteState::from).unwrap_or_default()
    }

    fn route_to_state(&self, route: &IndexRouteState) -> UiState {
        UiState::from([(self.index_id.clone(), IndexUiState::from(route))])
    }
}
