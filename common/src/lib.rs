//! Shared search-state model: parameters, configuration and wire types.

pub mod refinement;
pub mod search_config;
pub mod search_const;
pub mod search_parameters;
pub mod search_request;
pub mod search_result;

pub use refinement::{NumericOperator, RefinementKey, RefinementKind, RefinementValue};
pub use search_config::{HierarchicalFacet, IndexConfig};
pub use search_parameters::{ParametersValue, StateError};
pub use search_request::SearchRequest;
pub use search_result::{SearchResponse, SearchResults};
