//! Wire-format search request built from a parameters value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::refinement::{RefinementKind, RefinementValue};
use crate::search_parameters::ParametersValue;
use crate::search_result::SearchResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub index_name: String,
    pub params: RequestParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestParams {
    pub query: String,
    pub page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits_per_page: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<String>,
    /// AND of OR-groups, each entry `attribute:value`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facet_filters: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub numeric_filters: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tag_filters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevancy_strictness: Option<u32>,
    #[serde(flatten)]
    pub configure: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSearchRequest {
    pub requests: Vec<SearchRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSearchResponse {
    pub results: Vec<SearchResponse>,
}

fn facet_filter(attribute: &str, value: &RefinementValue, negated: bool) -> String {
    let value = value.to_string();
    // a leading '-' would otherwise read as a negation
    let value = if value.starts_with('-') { format!("\\{value}") } else { value };
    if negated {
        format!("{attribute}:-{value}")
    } else {
        format!("{attribute}:{value}")
    }
}

impl From<&ParametersValue> for SearchRequest {
    fn from(parameters: &ParametersValue) -> Self {
        let config = parameters.config();

        let mut facets = config
            .facets
            .iter()
            .chain(config.disjunctive_facets.iter())
            .cloned()
            .collect::<Vec<_>>();
        for facet in &config.hierarchical_facets {
            facets.extend(facet.attributes.iter().cloned());
        }
        facets.sort();
        facets.dedup();

        let mut facet_filters = Vec::new();
        let mut numeric_filters = Vec::new();
        let mut tag_filters = Vec::new();
        for (key, values) in parameters.iter_refinements() {
            let attribute = key.attribute.as_str();
            match key.kind {
                RefinementKind::Conjunctive => {
                    facet_filters.extend(values.iter().map(|v| vec![facet_filter(attribute, v, false)]));
                }
                RefinementKind::Exclude => {
                    facet_filters.extend(values.iter().map(|v| vec![facet_filter(attribute, v, true)]));
                }
                RefinementKind::Disjunctive => {
                    facet_filters.push(values.iter().map(|v| facet_filter(attribute, v, false)).collect());
                }
                RefinementKind::Hierarchical => {
                    let (Some(facet), Some(path)) = (config.hierarchical_facet(attribute), values.first()) else {
                        continue;
                    };
                    let path = path.to_string();
                    if let Some(level_attribute) = facet.attribute_for_depth(facet.depth_of(&path)) {
                        facet_filters.push(vec![format!("{level_attribute}:{path}")]);
                    }
                }
                RefinementKind::Numeric => {
                    numeric_filters.extend(values.iter().map(|v| format!("{attribute}{v}")));
                }
                RefinementKind::Tag => {
                    tag_filters.extend(values.iter().map(|v| v.to_string()));
                }
            }
        }

        SearchRequest {
            index_name: parameters.index().to_string(),
            params: RequestParams {
                query: parameters.query().to_string(),
                page: parameters.page(),
                hits_per_page: parameters.hits_per_page(),
                facets,
                facet_filters,
                numeric_filters,
                tag_filters,
                relevancy_strictness: parameters.relevancy_strictness(),
                configure: config.configure.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::refinement::NumericOperator;
    use crate::search_config::{HierarchicalFacet, IndexConfig};

    fn params() -> ParametersValue {
        let config = IndexConfig::new("products")
            .with_facets(vec!["brand"])
            .with_disjunctive_facets(vec!["city"])
            .with_hierarchical_facet(HierarchicalFacet::new("categories", vec!["cat.lvl0", "cat.lvl1"]))
            .with_configure("attributesToRetrieve", json!(["name", "price"]));
        ParametersValue::new(config).unwrap()
    }

    #[test]
    fn builds_and_of_or_facet_filters() {
        let p = params()
            .set_query("phone")
            .add_refine("brand", "Apple")
            .unwrap()
            .add_exclude("brand", "-Nokia")
            .unwrap()
            .add_disjunctive_refine("city", "Paris")
            .unwrap()
            .add_disjunctive_refine("city", "Lyon")
            .unwrap()
            .add_hierarchical_refine("categories", "Phones > Smart")
            .unwrap()
            .add_numeric_refinement("price", NumericOperator::Gte, 100.0)
            .unwrap()
            .add_tag("promo");
        let request = SearchRequest::from(&p);
        assert_eq!(request.index_name, "products");
        assert_eq!(request.params.query, "phone");
        assert_eq!(request.params.facets, vec!["brand", "cat.lvl0", "cat.lvl1", "city"]);
        assert_eq!(
            request.params.facet_filters,
            vec![
                vec!["brand:Apple".to_string()],
                vec!["brand:-\\-Nokia".to_string()],
                vec!["cat.lvl1:Phones > Smart".to_string()],
                vec!["city:Lyon".to_string(), "city:Paris".to_string()],
            ]
        );
        assert_eq!(request.params.numeric_filters, vec!["price>=100"]);
        assert_eq!(request.params.tag_filters, vec!["promo"]);
    }

    #[test]
    fn configure_block_is_flattened_into_params() {
        let value = serde_json::to_value(SearchRequest::from(&params())).unwrap();
        assert_eq!(
            value,
            json!({
                "indexName": "products",
                "params": {
                    "query": "",
                    "page": 0,
                    "facets": ["brand", "cat.lvl0", "cat.lvl1", "city"],
                    "attributesToRetrieve": ["name", "price"]
                }
            })
        );
    }
}
