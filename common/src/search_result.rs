//! Search responses and the results view tagged with the parameters that produced them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::refinement::RefinementKind;
use crate::search_parameters::ParametersValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchResponse {
    pub hits: Vec<serde_json::Value>,
    pub nb_hits: u64,
    pub page: u32,
    pub nb_pages: u32,
    pub hits_per_page: u32,
    #[serde(rename = "processingTimeMS")]
    pub processing_time_ms: u64,
    pub query: String,
    /// attribute -> value -> count
    pub facets: BTreeMap<String, BTreeMap<String, u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetValueCount {
    pub value: String,
    pub count: u64,
    pub is_refined: bool,
    pub is_excluded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    state: ParametersValue,
    response: SearchResponse,
}

impl SearchResults {
    pub fn new(state: ParametersValue, response: SearchResponse) -> Self {
        Self { state, response }
    }

    /// Parameters of the request this response answers.
    pub fn state(&self) -> &ParametersValue {
        &self.state
    }

    pub fn response(&self) -> &SearchResponse {
        &self.response
    }

    pub fn hits(&self) -> &[serde_json::Value] {
        &self.response.hits
    }

    pub fn nb_hits(&self) -> u64 {
        self.response.nb_hits
    }

    pub fn facet_values(&self, attribute: &str) -> Vec<FacetValueCount> {
        let refined = self
            .state
            .refined_values(attribute, RefinementKind::Conjunctive)
            .into_iter()
            .chain(self.state.refined_values(attribute, RefinementKind::Disjunctive))
            .collect::<Vec<_>>();
        let excluded = self.state.refined_values(attribute, RefinementKind::Exclude);

        let counts = self.response.facets.get(attribute);
        let mut items = counts
            .into_iter()
            .flatten()
            .map(|(value, count)| FacetValueCount {
                value: value.clone(),
                count: *count,
                is_refined: refined.contains(&value.as_str()),
                is_excluded: excluded.contains(&value.as_str()),
            })
            .collect::<Vec<_>>();
        items.sort_by_key(|item| (u64::MAX - item.count, item.value.clone()));

        // keep selected values visible even when the backend stopped returning them
        for value in refined {
            if counts.is_some_and(|c| c.contains_key(value)) || items.iter().any(|i| i.value == value) {
                continue;
            }
            items.push(FacetValueCount {
                value: value.to_string(),
                count: 0,
                is_refined: true,
                is_excluded: false,
            });
        }
        items
    }
}
