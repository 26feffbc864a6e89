//! Refinement kinds, keys and values shared by every facet container.

use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RefinementKind {
    Conjunctive,
    Exclude,
    Disjunctive,
    Hierarchical,
    Numeric,
    Tag,
}

impl RefinementKind {
    pub const ALL: [RefinementKind; 6] = [
        RefinementKind::Conjunctive,
        RefinementKind::Exclude,
        RefinementKind::Disjunctive,
        RefinementKind::Hierarchical,
        RefinementKind::Numeric,
        RefinementKind::Tag,
    ];

    /// Whether values keep the order they were added in.
    /// Unordered kinds are stored sorted so equality ignores insertion order.
    pub fn preserves_insertion_order(self) -> bool {
        match self {
            RefinementKind::Conjunctive | RefinementKind::Exclude | RefinementKind::Tag => true,
            RefinementKind::Disjunctive | RefinementKind::Numeric | RefinementKind::Hierarchical => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RefinementKind::Conjunctive => "conjunctive",
            RefinementKind::Exclude => "exclude",
            RefinementKind::Disjunctive => "disjunctive",
            RefinementKind::Hierarchical => "hierarchical",
            RefinementKind::Numeric => "numeric",
            RefinementKind::Tag => "tag",
        }
    }
}

impl Display for RefinementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RefinementKey {
    pub attribute: String,
    pub kind: RefinementKind,
}

impl RefinementKey {
    pub fn new(attribute: impl Into<String>, kind: RefinementKind) -> Self {
        Self { attribute: attribute.into(), kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NumericOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
}

impl NumericOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            NumericOperator::Eq => "=",
            NumericOperator::NotEq => "!=",
            NumericOperator::Lt => "<",
            NumericOperator::Lte => "<=",
            NumericOperator::Gt => ">",
            NumericOperator::Gte => ">=",
        }
    }

    /// Splits `">=10"` into its operator and the remaining text.
    /// Two-character operators are tried first.
    pub fn split_prefix(s: &str) -> Option<(NumericOperator, &str)> {
        const BY_LENGTH: [NumericOperator; 6] = [
            NumericOperator::NotEq,
            NumericOperator::Lte,
            NumericOperator::Gte,
            NumericOperator::Eq,
            NumericOperator::Lt,
            NumericOperator::Gt,
        ];
        BY_LENGTH
            .into_iter()
            .find_map(|op| s.strip_prefix(op.symbol()).map(|rest| (op, rest)))
    }
}

impl Display for NumericOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A float that can live inside ordered sets (IEEE 754 total order, with `-0.0` equal to `0.0`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NumericBound(pub f64);

impl NumericBound {
    fn canonical(self) -> f64 {
        if self.0 == 0.0 { 0.0 } else { self.0 }
    }
}

impl PartialEq for NumericBound {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NumericBound {}

impl PartialOrd for NumericBound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NumericBound {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical().total_cmp(&other.canonical())
    }
}

impl Hash for NumericBound {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().to_bits().hash(state);
    }
}

impl Display for NumericBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<f64> for NumericBound {
    fn from(value: f64) -> Self {
        NumericBound(NumericBound(value).canonical())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RefinementValue {
    Text(String),
    Numeric { operator: NumericOperator, value: NumericBound },
}

impl RefinementValue {
    pub fn numeric(operator: NumericOperator, value: impl Into<NumericBound>) -> Self {
        RefinementValue::Numeric { operator, value: value.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RefinementValue::Text(s) => Some(s),
            RefinementValue::Numeric { .. } => None,
        }
    }
}

impl From<&str> for RefinementValue {
    fn from(value: &str) -> Self {
        RefinementValue::Text(value.to_string())
    }
}

impl From<String> for RefinementValue {
    fn from(value: String) -> Self {
        RefinementValue::Text(value)
    }
}

/// Renders text values as-is and numeric values as `">=10"`.
impl Display for RefinementValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefinementValue::Text(s) => f.write_str(s),
            RefinementValue::Numeric { operator, value } => write!(f, "{operator}{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericParseError(pub String);

impl Display for NumericParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid numeric refinement: {:?}", self.0)
    }
}

impl std::error::Error for NumericParseError {}

/// Parses the `Display` form of a numeric refinement.
impl FromStr for RefinementValue {
    type Err = NumericParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (operator, rest) = NumericOperator::split_prefix(s).ok_or_else(|| NumericParseError(s.to_string()))?;
        let value = rest.trim().parse::<f64>().map_err(|_| NumericParseError(s.to_string()))?;
        Ok(RefinementValue::numeric(operator, value))
    }
}
