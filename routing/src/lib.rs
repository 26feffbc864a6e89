//! Route state for deep-linking: UI state projection, state mappings and history sync.

pub mod history;
pub mod route_param;
pub mod route_sync;
pub mod state_mapping;
pub mod ui_state;

pub use history::{MemoryHistory, RouteHistory};
pub use route_param::{RouteParam, RouteParamError};
pub use route_sync::RouteSync;
pub use state_mapping::{IndexRouteState, MultiIndexRoute, SimpleStateMapping, SingleIndexStateMapping, StateMapping};
pub use ui_state::{IndexUiState, ShareableState, UiState, UiStateError};
