//! Per-index UI state and its bridge to helper parameters.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use common::refinement::NumericParseError;
use common::search_const::DEFAULT_HIERARCHICAL_SEPARATOR;
use common::{IndexConfig, ParametersValue, RefinementKind, RefinementValue, StateError};
use serde::{Deserialize, Serialize};

/// Index id to that index's UI state.
pub type UiState = BTreeMap<String, IndexUiState>;

/// The part of an index's UI state that may be shared through a route.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShareableState {
    /// 1-based. Absent means the first page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits_per_page: Option<u32>,
    /// Disjunctive refinements.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub refinement_list: BTreeMap<String, Vec<String>>,
    /// Conjunctive refinements.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub exclusions: BTreeMap<String, Vec<String>>,
    /// Path segments from the root level down.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub hierarchical_menu: BTreeMap<String, Vec<String>>,
    /// Entries such as `>=10`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub numeric: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Replica index to query instead of the configured one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevant_sort: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexUiState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(flatten)]
    pub shared: ShareableState,
    /// Static parameters from the index configuration. Never part of a route.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub configure: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiStateError {
    InvalidState(StateError),
    InvalidNumeric { attribute: String, error: NumericParseError },
}

impl Display for UiStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidState(err) => write!(f, "Cannot apply UI state: {}", err),
            Self::InvalidNumeric { attribute, error } => write!(f, "Cannot apply UI state for {:?}: {}", attribute, error),
        }
    }
}

impl std::error::Error for UiStateError {}

impl From<StateError> for UiStateError {
    fn from(err: StateError) -> Self {
        Self::InvalidState(err)
    }
}

fn separator_for<'a>(config: &'a IndexConfig, attribute: &str) -> &'a str {
    config
        .hierarchical_facet(attribute)
        .map_or(DEFAULT_HIERARCHICAL_SEPARATOR, |facet| facet.separator.as_str())
}

fn dedup_in_order(values: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values.iter().filter(|value| seen.insert(value.as_str())).cloned().collect()
}

fn retain_non_empty(map: &BTreeMap<String, Vec<String>>, normalize: impl Fn(&[String]) -> Vec<String>) -> BTreeMap<String, Vec<String>> {
    map.iter()
        .map(|(attribute, values)| (attribute.clone(), normalize(values)))
        .filter(|(_, values)| !values.is_empty())
        .collect()
}

impl ShareableState {
    /// Drops default values and duplicate entries.
    pub fn normalized(&self) -> Self {
        Self {
            page: self.page.filter(|page| *page > 1),
            hits_per_page: self.hits_per_page,
            refinement_list: retain_non_empty(&self.refinement_list, |values| {
                let mut values = values.to_vec();
                values.sort();
                values.dedup();
                values
            }),
            facets: retain_non_empty(&self.facets, dedup_in_order),
            exclusions: retain_non_empty(&self.exclusions, dedup_in_order),
            hierarchical_menu: retain_non_empty(&self.hierarchical_menu, |segments| segments.to_vec()),
            numeric: retain_non_empty(&self.numeric, dedup_in_order),
            tags: dedup_in_order(&self.tags),
            sort_by: self.sort_by.clone().filter(|index| !index.is_empty()),
            relevant_sort: self.relevant_sort,
        }
    }
}

impl IndexUiState {
    /// Projects a helper state. Only values differing from the configuration are kept.
    pub fn from_parameters(parameters: &ParametersValue) -> Self {
        let config = parameters.config();
        let mut shared = ShareableState {
            page: (parameters.page() > 0).then(|| parameters.page() + 1),
            hits_per_page: parameters.hits_per_page().filter(|size| Some(*size) != config.hits_per_page),
            sort_by: (parameters.index() != config.index_name).then(|| parameters.index().to_string()),
            relevant_sort: parameters.relevancy_strictness(),
            ..Default::default()
        };

        for (key, values) in parameters.iter_refinements() {
            let texts = || values.iter().map(ToString::to_string).collect::<Vec<_>>();
            let attribute = key.attribute.clone();
            match key.kind {
                RefinementKind::Conjunctive => {
                    shared.facets.insert(attribute, texts());
                }
                RefinementKind::Exclude => {
                    shared.exclusions.insert(attribute, texts());
                }
                RefinementKind::Disjunctive => {
                    shared.refinement_list.insert(attribute, texts());
                }
                RefinementKind::Hierarchical => {
                    let Some(path) = values.first() else { continue };
                    let separator = separator_for(config, &key.attribute);
                    let segments = path.to_string().split(separator).map(str::to_string).collect();
                    shared.hierarchical_menu.insert(attribute, segments);
                }
                RefinementKind::Numeric => {
                    shared.numeric.insert(attribute, texts());
                }
                RefinementKind::Tag => {
                    shared.tags = texts();
                }
            }
        }

        IndexUiState {
            query: Some(parameters.query().to_string()).filter(|query| !query.is_empty()),
            shared,
            configure: config.configure.clone(),
        }
    }

    /// Rebuilds a helper state on top of `base`. The shareable fields are taken
    /// entirely from this UI state; configuration always comes from `base`.
    pub fn apply_to(&self, base: &ParametersValue) -> Result<ParametersValue, UiStateError> {
        let config = base.config();
        let shared = &self.shared;
        let index = shared.sort_by.clone().unwrap_or_else(|| config.index_name.clone());

        let mut state = base
            .clear_refinements(None)
            .set_index(index)?
            .set_query(self.query.clone().unwrap_or_default())
            .set_hits_per_page(shared.hits_per_page.or(config.hits_per_page))
            .set_relevancy_strictness(shared.relevant_sort);

        for (attribute, values) in &shared.facets {
            for value in values {
                state = state.add_refine(attribute, value.as_str())?;
            }
        }
        for (attribute, values) in &shared.exclusions {
            for value in values {
                state = state.add_exclude(attribute, value.as_str())?;
            }
        }
        for (attribute, values) in &shared.refinement_list {
            for value in values {
                state = state.add_disjunctive_refine(attribute, value.as_str())?;
            }
        }
        for (attribute, segments) in &shared.hierarchical_menu {
            if !segments.is_empty() {
                state = state.add_hierarchical_refine(attribute, segments.join(separator_for(config, attribute)))?;
            }
        }
        for (attribute, values) in &shared.numeric {
            for value in values {
                let parsed = value.parse::<RefinementValue>().map_err(|error| UiStateError::InvalidNumeric {
                    attribute: attribute.clone(),
                    error,
                })?;
                if let RefinementValue::Numeric { operator, value } = parsed {
                    state = state.add_numeric_refinement(attribute, operator, value.0)?;
                }
            }
        }
        for tag in &shared.tags {
            state = state.add_tag(tag.as_str());
        }

        Ok(state.set_page(shared.page.unwrap_or(1).saturating_sub(1)))
    }

    pub fn normalized(&self) -> Self {
        Self {
            query: self.query.clone().filter(|query| !query.is_empty()),
            shared: self.shared.normalized(),
            configure: self.configure.clone(),
        }
    }

    /// True when nothing shareable differs from the defaults.
    pub fn is_empty(&self) -> bool {
        let normalized = self.normalized();
        normalized.query.is_none() && normalized.shared == ShareableState::default()
    }
}
