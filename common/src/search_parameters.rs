//! Immutable search parameters value and its pure update operations.
//!
//! Every operation returns a new [`ParametersValue`]. Unchanged containers are
//! shared between the old and the new value, so cloning is cheap and a
//! published value can never change under an observer.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use crate::refinement::{NumericBound, NumericOperator, RefinementKey, RefinementKind, RefinementValue};
use crate::search_config::{validate_index_name, IndexConfig};
use crate::search_const::TAGS_ATTRIBUTE;

pub type RefinementMap = BTreeMap<RefinementKey, Vec<RefinementValue>>;

#[derive(Debug, Clone, PartialEq)]
pub enum StateError {
    InvalidIndexName(String),
    EmptyHierarchicalFacet(String),
    EmptyHierarchicalSeparator(String),
    UndeclaredFacet { attribute: String, kind: RefinementKind },
}

impl Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIndexName(name) => write!(f, "Invalid index name: {:?}", name),
            Self::EmptyHierarchicalFacet(name) => write!(f, "Hierarchical facet {:?} declares no attributes", name),
            Self::EmptyHierarchicalSeparator(name) => write!(f, "Hierarchical facet {:?} has an empty separator", name),
            Self::UndeclaredFacet { attribute, kind } => {
                let list = match kind {
                    RefinementKind::Disjunctive => "disjunctiveFacets",
                    RefinementKind::Hierarchical => "hierarchicalFacets",
                    _ => "facets",
                };
                write!(f, "{} is not declared in {} of the index configuration ({} refinement)", attribute, list, kind)
            }
        }
    }
}

impl std::error::Error for StateError {}

#[derive(Debug, Clone, PartialEq)]
pub struct ParametersValue {
    index: String,
    query: String,
    page: u32,
    hits_per_page: Option<u32>,
    relevancy_strictness: Option<u32>,
    refinements: Arc<RefinementMap>,
    config: Arc<IndexConfig>,
}

impl ParametersValue {
    pub fn new(config: IndexConfig) -> Result<Self, StateError> {
        config.validate()?;
        Ok(Self {
            index: config.index_name.clone(),
            query: String::new(),
            page: 0,
            hits_per_page: config.hits_per_page,
            relevancy_strictness: None,
            refinements: Arc::default(),
            config: Arc::new(config),
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn hits_per_page(&self) -> Option<u32> {
        self.hits_per_page
    }

    pub fn relevancy_strictness(&self) -> Option<u32> {
        self.relevancy_strictness
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// True when both values reuse the same refinement container.
    pub fn shares_refinements_with(&self, other: &ParametersValue) -> bool {
        Arc::ptr_eq(&self.refinements, &other.refinements)
    }

    pub fn set_query(&self, query: impl Into<String>) -> Self {
        let query = query.into();
        if query == self.query {
            return self.clone();
        }
        Self { query, ..self.clone() }
    }

    pub fn set_page(&self, page: u32) -> Self {
        Self { page, ..self.clone() }
    }

    pub fn reset_page(&self) -> Self {
        self.set_page(0)
    }

    pub fn set_index(&self, index: impl Into<String>) -> Result<Self, StateError> {
        let index = index.into();
        validate_index_name(&index)?;
        Ok(Self { index, ..self.clone() })
    }

    /// `None` goes back to the configured page size.
    pub fn set_hits_per_page(&self, hits_per_page: Option<u32>) -> Self {
        let hits_per_page = hits_per_page.or(self.config.hits_per_page);
        Self { hits_per_page, ..self.clone() }
    }

    pub fn set_relevancy_strictness(&self, relevancy_strictness: Option<u32>) -> Self {
        Self { relevancy_strictness, ..self.clone() }
    }

    pub fn iter_refinements(&self) -> impl Iterator<Item = (&RefinementKey, &[RefinementValue])> {
        self.refinements.iter().map(|(key, values)| (key, values.as_slice()))
    }

    pub fn refinements(&self, attribute: &str, kind: RefinementKind) -> &[RefinementValue] {
        self.refinements
            .get(&RefinementKey::new(attribute, kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Text values refined on `attribute` for `kind`, in stored order.
    pub fn refined_values(&self, attribute: &str, kind: RefinementKind) -> Vec<&str> {
        self.refinements(attribute, kind).iter().filter_map(RefinementValue::as_text).collect()
    }

    pub fn is_refined(&self, attribute: &str, kind: RefinementKind, value: &RefinementValue) -> bool {
        self.refinements(attribute, kind).contains(value)
    }

    pub fn has_refinements(&self, attribute: &str) -> bool {
        self.refinements.keys().any(|key| key.attribute == attribute)
    }

    pub fn has_any_refinements(&self) -> bool {
        !self.refinements.is_empty()
    }

    pub fn hierarchical_refinement(&self, attribute: &str) -> Option<&str> {
        self.refinements(attribute, RefinementKind::Hierarchical)
            .first()
            .and_then(RefinementValue::as_text)
    }

    pub fn tags(&self) -> Vec<&str> {
        self.refined_values(TAGS_ATTRIBUTE, RefinementKind::Tag)
    }

    pub fn add_refine(&self, attribute: &str, value: impl Into<String>) -> Result<Self, StateError> {
        self.add_value(attribute, RefinementKind::Conjunctive, RefinementValue::Text(value.into()))
    }

    pub fn remove_refine(&self, attribute: &str, value: impl Into<String>) -> Result<Self, StateError> {
        self.remove_value(attribute, RefinementKind::Conjunctive, &RefinementValue::Text(value.into()))
    }

    pub fn toggle_refine(&self, attribute: &str, value: impl Into<String>) -> Result<Self, StateError> {
        self.toggle_value(attribute, RefinementKind::Conjunctive, RefinementValue::Text(value.into()))
    }

    pub fn add_exclude(&self, attribute: &str, value: impl Into<String>) -> Result<Self, StateError> {
        self.add_value(attribute, RefinementKind::Exclude, RefinementValue::Text(value.into()))
    }

    pub fn remove_exclude(&self, attribute: &str, value: impl Into<String>) -> Result<Self, StateError> {
        self.remove_value(attribute, RefinementKind::Exclude, &RefinementValue::Text(value.into()))
    }

    pub fn toggle_exclude(&self, attribute: &str, value: impl Into<String>) -> Result<Self, StateError> {
        self.toggle_value(attribute, RefinementKind::Exclude, RefinementValue::Text(value.into()))
    }

    pub fn add_disjunctive_refine(&self, attribute: &str, value: impl Into<String>) -> Result<Self, StateError> {
        self.add_value(attribute, RefinementKind::Disjunctive, RefinementValue::Text(value.into()))
    }

    pub fn remove_disjunctive_refine(&self, attribute: &str, value: impl Into<String>) -> Result<Self, StateError> {
        self.remove_value(attribute, RefinementKind::Disjunctive, &RefinementValue::Text(value.into()))
    }

    pub fn toggle_disjunctive_refine(&self, attribute: &str, value: impl Into<String>) -> Result<Self, StateError> {
        self.toggle_value(attribute, RefinementKind::Disjunctive, RefinementValue::Text(value.into()))
    }

    /// Replaces the current path of a hierarchical facet.
    pub fn add_hierarchical_refine(&self, attribute: &str, path: impl Into<String>) -> Result<Self, StateError> {
        self.add_value(attribute, RefinementKind::Hierarchical, RefinementValue::Text(path.into()))
    }

    pub fn remove_hierarchical_refine(&self, attribute: &str) -> Result<Self, StateError> {
        self.check_declared(attribute, RefinementKind::Hierarchical)?;
        Ok(self.without_key(&RefinementKey::new(attribute, RefinementKind::Hierarchical)))
    }

    /// Refining the current path again moves up to its parent level.
    pub fn toggle_hierarchical_refine(&self, attribute: &str, path: impl Into<String>) -> Result<Self, StateError> {
        let path = path.into();
        if self.hierarchical_refinement(attribute) != Some(path.as_str()) {
            return self.add_hierarchical_refine(attribute, path);
        }
        let separator = self
            .config
            .hierarchical_facet(attribute)
            .map(|facet| facet.separator.as_str())
            .ok_or_else(|| StateError::UndeclaredFacet { attribute: attribute.to_string(), kind: RefinementKind::Hierarchical })?;
        match path.rfind(separator) {
            Some(position) => self.add_hierarchical_refine(attribute, &path[..position]),
            None => self.remove_hierarchical_refine(attribute),
        }
    }

    pub fn add_numeric_refinement(&self, attribute: &str, operator: NumericOperator, value: f64) -> Result<Self, StateError> {
        self.add_value(attribute, RefinementKind::Numeric, RefinementValue::numeric(operator, value))
    }

    /// Removes numeric refinements on `attribute` matching the given operator and value.
    /// `None` matches anything.
    pub fn remove_numeric_refinement(&self, attribute: &str, operator: Option<NumericOperator>, value: Option<f64>) -> Self {
        let key = RefinementKey::new(attribute, RefinementKind::Numeric);
        let matches = |candidate: &RefinementValue| match candidate {
            RefinementValue::Numeric { operator: op, value: v } => {
                operator.is_none_or(|o| o == *op) && value.is_none_or(|x| NumericBound::from(x) == *v)
            }
            RefinementValue::Text(_) => false,
        };
        if !self.refinements(attribute, RefinementKind::Numeric).iter().any(|c| matches(c)) {
            return self.clone();
        }
        let mut next = self.clone();
        let map = Arc::make_mut(&mut next.refinements);
        if let Some(values) = map.get_mut(&key) {
            values.retain(|candidate| !matches(candidate));
            if values.is_empty() {
                map.remove(&key);
            }
        }
        next
    }

    pub fn add_tag(&self, tag: impl Into<String>) -> Self {
        self.insert_value(TAGS_ATTRIBUTE, RefinementKind::Tag, RefinementValue::Text(tag.into()))
    }

    pub fn remove_tag(&self, tag: impl Into<String>) -> Self {
        self.delete_value(TAGS_ATTRIBUTE, RefinementKind::Tag, &RefinementValue::Text(tag.into()))
    }

    pub fn toggle_tag(&self, tag: impl Into<String>) -> Self {
        let value = RefinementValue::Text(tag.into());
        if self.is_refined(TAGS_ATTRIBUTE, RefinementKind::Tag, &value) {
            self.delete_value(TAGS_ATTRIBUTE, RefinementKind::Tag, &value)
        } else {
            self.insert_value(TAGS_ATTRIBUTE, RefinementKind::Tag, value)
        }
    }

    pub fn clear_tags(&self) -> Self {
        self.without_key(&RefinementKey::new(TAGS_ATTRIBUTE, RefinementKind::Tag))
    }

    /// Clears every refinement kind of one attribute, or everything when `attribute` is `None`.
    pub fn clear_refinements(&self, attribute: Option<&str>) -> Self {
        match attribute {
            None if self.refinements.is_empty() => self.clone(),
            None => Self { refinements: Arc::default(), ..self.clone() },
            Some(attribute) if !self.has_refinements(attribute) => self.clone(),
            Some(attribute) => {
                let mut next = self.clone();
                Arc::make_mut(&mut next.refinements).retain(|key, _| key.attribute != attribute);
                next
            }
        }
    }

    fn check_declared(&self, attribute: &str, kind: RefinementKind) -> Result<(), StateError> {
        let declared = match kind {
            RefinementKind::Conjunctive | RefinementKind::Exclude => self.config.facets.contains(attribute),
            RefinementKind::Disjunctive => self.config.disjunctive_facets.contains(attribute),
            RefinementKind::Hierarchical => self.config.hierarchical_facet(attribute).is_some(),
            RefinementKind::Numeric | RefinementKind::Tag => true,
        };
        if declared {
            Ok(())
        } else {
            Err(StateError::UndeclaredFacet { attribute: attribute.to_string(), kind })
        }
    }

    fn add_value(&self, attribute: &str, kind: RefinementKind, value: RefinementValue) -> Result<Self, StateError> {
        self.check_declared(attribute, kind)?;
        Ok(self.insert_value(attribute, kind, value))
    }

    fn remove_value(&self, attribute: &str, kind: RefinementKind, value: &RefinementValue) -> Result<Self, StateError> {
        self.check_declared(attribute, kind)?;
        Ok(self.delete_value(attribute, kind, value))
    }

    fn toggle_value(&self, attribute: &str, kind: RefinementKind, value: RefinementValue) -> Result<Self, StateError> {
        if self.is_refined(attribute, kind, &value) {
            self.remove_value(attribute, kind, &value)
        } else {
            self.add_value(attribute, kind, value)
        }
    }

    fn insert_value(&self, attribute: &str, kind: RefinementKind, value: RefinementValue) -> Self {
        if self.is_refined(attribute, kind, &value) {
            return self.clone();
        }
        let mut next = self.clone();
        let values = Arc::make_mut(&mut next.refinements)
            .entry(RefinementKey::new(attribute, kind))
            .or_default();
        if kind == RefinementKind::Hierarchical {
            values.clear();
            values.push(value);
        } else if kind.preserves_insertion_order() {
            values.push(value);
        } else {
            let position = values.binary_search(&value).unwrap_or_else(|p| p);
            values.insert(position, value);
        }
        next
    }

    fn delete_value(&self, attribute: &str, kind: RefinementKind, value: &RefinementValue) -> Self {
        if !self.is_refined(attribute, kind, value) {
            return self.clone();
        }
        let key = RefinementKey::new(attribute, kind);
        let mut next = self.clone();
        let map = Arc::make_mut(&mut next.refinements);
        if let Some(values) = map.get_mut(&key) {
            values.retain(|v| v != value);
            if values.is_empty() {
                map.remove(&key);
            }
        }
        next
    }

    fn without_key(&self, key: &RefinementKey) -> Self {
        if !self.refinements.contains_key(key) {
            return self.clone();
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.refinements).remove(key);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_config::HierarchicalFacet;

    fn params() -> ParametersValue {
        let config = IndexConfig::new("products")
            .with_facets(vec!["tower", "brand"])
            .with_disjunctive_facets(vec!["city"])
            .with_hierarchical_facet(HierarchicalFacet::new("categories", vec!["cat.lvl0", "cat.lvl1", "cat.lvl2"]));
        ParametersValue::new(config).unwrap()
    }

    #[test]
    fn new_value_starts_empty() {
        let p = params();
        assert_eq!(p.index(), "products");
        assert_eq!(p.query(), "");
        assert_eq!(p.page(), 0);
        assert!(!p.has_any_refinements());
        assert!(ParametersValue::new(IndexConfig::new("")).is_err());
    }

    #[test]
    fn operations_never_mutate_the_original() {
        let p = params();
        let q = p.set_query("shoes").set_page(3).add_refine("brand", "Apple").unwrap();
        assert_eq!(p.query(), "");
        assert_eq!(p.page(), 0);
        assert!(!p.has_refinements("brand"));
        assert_eq!(q.query(), "shoes");
        assert_eq!(q.page(), 3);
        assert_eq!(q.refined_values("brand", RefinementKind::Conjunctive), vec!["Apple"]);
    }

    #[test]
    fn unchanged_containers_are_shared() {
        let p = params().add_refine("brand", "Apple").unwrap();
        let q = p.set_query("phone").set_page(2);
        assert!(q.shares_refinements_with(&p));
        let r = q.add_refine("brand", "Samsung").unwrap();
        assert!(!r.shares_refinements_with(&q));
    }

    #[test]
    fn add_and_remove_are_idempotent() {
        let p = params().add_refine("tower", "Empire State Building").unwrap();
        assert_eq!(p.add_refine("tower", "Empire State Building").unwrap(), p);

        let base = params();
        assert_eq!(base.remove_refine("tower", "Chrysler").unwrap(), base);
        assert_eq!(base.remove_disjunctive_refine("city", "Paris").unwrap(), base);
        assert_eq!(base.remove_exclude("tower", "Chrysler").unwrap(), base);
        assert_eq!(base.clear_refinements(Some("city")), base);
        assert_eq!(base.clear_refinements(None), base);
    }

    #[test]
    fn add_then_remove_restores_equal_value() {
        let base = params();
        let p = base
            .add_disjunctive_refine("city", "Paris")
            .unwrap()
            .remove_disjunctive_refine("city", "Paris")
            .unwrap();
        assert_eq!(p, base);
        assert!(p.refinements("city", RefinementKind::Disjunctive).is_empty());
    }

    #[test]
    fn disjunctive_equality_ignores_insertion_order() {
        let a = params().add_disjunctive_refine("city", "Paris").unwrap().add_disjunctive_refine("city", "Lyon").unwrap();
        let b = params().add_disjunctive_refine("city", "Lyon").unwrap().add_disjunctive_refine("city", "Paris").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.refined_values("city", RefinementKind::Disjunctive), vec!["Lyon", "Paris"]);
    }

    #[test]
    fn conjunctive_order_is_preserved() {
        let a = params().add_refine("brand", "Samsung").unwrap().add_refine("brand", "Apple").unwrap();
        let b = params().add_refine("brand", "Apple").unwrap().add_refine("brand", "Samsung").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.refined_values("brand", RefinementKind::Conjunctive), vec!["Samsung", "Apple"]);
    }

    #[test]
    fn undeclared_facets_are_configuration_errors() {
        let p = params();
        assert_eq!(
            p.add_refine("city", "Paris"),
            Err(StateError::UndeclaredFacet { attribute: "city".to_string(), kind: RefinementKind::Conjunctive })
        );
        assert!(p.add_disjunctive_refine("brand", "Apple").is_err());
        assert!(p.remove_exclude("color", "red").is_err());
        assert!(p.add_hierarchical_refine("brand", "x").is_err());
        assert!(p.add_numeric_refinement("price", NumericOperator::Gte, 10.0).is_ok());
    }

    #[test]
    fn clear_refinements_for_one_attribute_covers_all_kinds() {
        let p = params()
            .add_refine("brand", "Apple")
            .unwrap()
            .add_exclude("brand", "Nokia")
            .unwrap()
            .add_disjunctive_refine("city", "Paris")
            .unwrap();
        let cleared = p.clear_refinements(Some("brand"));
        assert!(!cleared.has_refinements("brand"));
        assert!(cleared.has_refinements("city"));
        assert!(!p.clear_refinements(None).has_any_refinements());
    }

    #[test]
    fn hierarchical_toggle_walks_up_the_path() {
        let p = params().add_hierarchical_refine("categories", "Shoes > Running").unwrap();
        assert_eq!(p.hierarchical_refinement("categories"), Some("Shoes > Running"));

        let replaced = p.add_hierarchical_refine("categories", "Bags").unwrap();
        assert_eq!(replaced.hierarchical_refinement("categories"), Some("Bags"));

        let parent = p.toggle_hierarchical_refine("categories", "Shoes > Running").unwrap();
        assert_eq!(parent.hierarchical_refinement("categories"), Some("Shoes"));
        let root = parent.toggle_hierarchical_refine("categories", "Shoes").unwrap();
        assert_eq!(root.hierarchical_refinement("categories"), None);
        assert!(!root.has_any_refinements());
    }

    #[test]
    fn numeric_refinements_remove_by_operator_and_value() {
        let p = params()
            .add_numeric_refinement("price", NumericOperator::Gte, 10.0)
            .unwrap()
            .add_numeric_refinement("price", NumericOperator::Lte, 100.0)
            .unwrap();
        assert_eq!(p.refinements("price", RefinementKind::Numeric).len(), 2);

        let only_upper = p.remove_numeric_refinement("price", Some(NumericOperator::Gte), None);
        assert_eq!(only_upper.refinements("price", RefinementKind::Numeric), &[RefinementValue::numeric(NumericOperator::Lte, 100.0)]);
        assert_eq!(p.remove_numeric_refinement("price", Some(NumericOperator::Gte), Some(99.0)), p);
        assert!(!p.remove_numeric_refinement("price", None, None).has_refinements("price"));
    }

    #[test]
    fn tags_toggle_and_clear() {
        let p = params().add_tag("promo").toggle_tag("new");
        assert_eq!(p.tags(), vec!["promo", "new"]);
        assert_eq!(p.toggle_tag("promo").tags(), vec!["new"]);
        assert!(p.clear_tags().tags().is_empty());
        assert_eq!(p.remove_tag("missing"), p);
    }

    #[test]
    fn negative_zero_matches_zero_bound() {
        let p = params().add_numeric_refinement("price", NumericOperator::Gte, 0.0).unwrap();
        assert_eq!(p.add_numeric_refinement("price", NumericOperator::Gte, -0.0).unwrap(), p);
        let removed = p.remove_numeric_refinement("price", Some(NumericOperator::Gte), Some(-0.0));
        assert!(!removed.has_refinements("price"));
    }

    #[test]
    fn clearing_hits_per_page_restores_configured_size() {
        let mut config = IndexConfig::new("products");
        config.hits_per_page = Some(20);
        let p = ParametersValue::new(config).unwrap();
        assert_eq!(p.hits_per_page(), Some(20));
        assert_eq!(p.set_hits_per_page(Some(50)).hits_per_page(), Some(50));
        assert_eq!(p.set_hits_per_page(Some(50)).set_hits_per_page(None), p);
        assert_eq!(params().set_hits_per_page(None).hits_per_page(), None);
    }

    #[test]
    fn set_index_validates_name() {
        let p = params();
        assert_eq!(p.set_index("products_price_asc").unwrap().index(), "products_price_asc");
        assert_eq!(p.set_index(""), Err(StateError::InvalidIndexName(String::new())));
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        fn cities() -> impl Strategy<Value = Vec<String>> {
            prop::collection::vec("[A-Z][a-z]{0,5}", 0..6)
        }

        proptest! {
            #[test]
            fn disjunctive_order_does_not_matter(values in cities()) {
                let forward = values.iter().try_fold(params(), |p, v| p.add_disjunctive_refine("city", v.as_str())).unwrap();
                let backward = values.iter().rev().try_fold(params(), |p, v| p.add_disjunctive_refine("city", v.as_str())).unwrap();
                prop_assert_eq!(forward, backward);
            }

            #[test]
            fn removing_absent_values_is_a_no_op(values in cities(), absent in "[0-9]{1,3}") {
                let p = values.iter().try_fold(params(), |p, v| p.add_refine("tower", v.as_str())).unwrap();
                prop_assert_eq!(p.remove_refine("tower", absent.as_str()).unwrap(), p.clone());
                prop_assert_eq!(p.remove_disjunctive_refine("city", absent.as_str()).unwrap(), p.clone());
                prop_assert_eq!(p.remove_exclude("tower", absent.as_str()).unwrap(), p);
            }

            #[test]
            fn add_then_remove_restores_equality(values in cities(), extra in "[0-9]{1,3}") {
                let p = values.iter().try_fold(params(), |p, v| p.add_refine("brand", v.as_str())).unwrap();
                let round_trip = p.add_refine("brand", extra.as_str()).unwrap().remove_refine("brand", extra.as_str()).unwrap();
                prop_assert_eq!(round_trip, p);
            }
        }
    }
}
