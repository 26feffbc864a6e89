//! Static per-index configuration supplied when a helper is created.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::search_const::DEFAULT_HIERARCHICAL_SEPARATOR;
use crate::search_parameters::StateError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexConfig {
    pub index_name: String,
    /// Facets usable for conjunctive refinements and exclusions.
    pub facets: BTreeSet<String>,
    pub disjunctive_facets: BTreeSet<String>,
    pub hierarchical_facets: Vec<HierarchicalFacet>,
    pub hits_per_page: Option<u32>,
    /// Static search parameters. Never part of route state, never touched by UI operations.
    pub configure: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchicalFacet {
    pub name: String,
    pub attributes: Vec<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    DEFAULT_HIERARCHICAL_SEPARATOR.to_string()
}

impl HierarchicalFacet {
    pub fn new(name: impl Into<String>, attributes: Vec<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            attributes: attributes.into_iter().map(|s| s.into()).collect(),
            separator: default_separator(),
        }
    }

    /// Attribute refined by a path of the given depth (0 = root level).
    /// Paths deeper than the declared attributes use the last one.
    pub fn attribute_for_depth(&self, depth: usize) -> Option<&str> {
        self.attributes
            .get(depth)
            .or_else(|| self.attributes.last())
            .map(|s| s.as_str())
    }

    pub fn depth_of(&self, path: &str) -> usize {
        path.matches(self.separator.as_str()).count()
    }
}

impl IndexConfig {
    pub fn new(index_name: impl Into<String>) -> Self {
        Self { index_name: index_name.into(), ..Default::default() }
    }

    pub fn with_facets(mut self, facets: Vec<impl Into<String>>) -> Self {
        self.facets.extend(facets.into_iter().map(|s| s.into()));
        self
    }

    pub fn with_disjunctive_facets(mut self, facets: Vec<impl Into<String>>) -> Self {
        self.disjunctive_facets.extend(facets.into_iter().map(|s| s.into()));
        self
    }

    pub fn with_hierarchical_facet(mut self, facet: HierarchicalFacet) -> Self {
        self.hierarchical_facets.push(facet);
        self
    }

    pub fn with_configure(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.configure.insert(key.into(), value);
        self
    }

    pub fn hierarchical_facet(&self, name: &str) -> Option<&HierarchicalFacet> {
        self.hierarchical_facets.iter().find(|f| f.name == name)
    }

    pub fn validate(&self) -> Result<(), StateError> {
        validate_index_name(&self.index_name)?;
        for facet in &self.hierarchical_facets {
            if facet.attributes.is_empty() {
                return Err(StateError::EmptyHierarchicalFacet(facet.name.clone()));
            }
            if facet.separator.is_empty() {
                return Err(StateError::EmptyHierarchicalSeparator(facet.name.clone()));
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_index_name(name: &str) -> Result<(), StateError> {
    if name.trim().is_empty() {
        return Err(StateError::InvalidIndexName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_config_with_defaults() {
        let config: IndexConfig = serde_json::from_str(
            r#"{
                "indexName": "products",
                "facets": ["brand"],
                "disjunctiveFacets": ["city"],
                "hierarchicalFacets": [{"name": "categories", "attributes": ["cat.lvl0", "cat.lvl1"]}],
                "configure": {"attributesToRetrieve": ["name"]}
            }"#,
        )
        .unwrap();
        assert_eq!(config.index_name, "products");
        assert!(config.facets.contains("brand"));
        assert!(config.disjunctive_facets.contains("city"));
        assert_eq!(config.hierarchical_facets[0].separator, " > ");
        assert_eq!(config.hits_per_page, None);
        assert_eq!(config.configure["attributesToRetrieve"], serde_json::json!(["name"]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_blank_index_and_empty_hierarchy() {
        assert_eq!(IndexConfig::new("  ").validate(), Err(StateError::InvalidIndexName("  ".to_string())));
        let config = IndexConfig::new("products").with_hierarchical_facet(HierarchicalFacet::new("cat", Vec::<String>::new()));
        assert_eq!(config.validate(), Err(StateError::EmptyHierarchicalFacet("cat".to_string())));
    }

    #[test]
    fn rejects_empty_hierarchical_separator() {
        let mut facet = HierarchicalFacet::new("cat", vec!["lvl0", "lvl1"]);
        facet.separator = String::new();
        let config = IndexConfig::new("products").with_hierarchical_facet(facet);
        assert_eq!(config.validate(), Err(StateError::EmptyHierarchicalSeparator("cat".to_string())));
        assert!(crate::ParametersValue::new(config).is_err());
    }

    #[test]
    fn hierarchical_depth_maps_to_attribute() {
        let facet = HierarchicalFacet::new("cat", vec!["lvl0", "lvl1"]);
        assert_eq!(facet.depth_of("Shoes"), 0);
        assert_eq!(facet.depth_of("Shoes > Running"), 1);
        assert_eq!(facet.attribute_for_depth(1), Some("lvl1"));
        assert_eq!(facet.attribute_for_depth(5), Some("lvl1"));
    }
}
