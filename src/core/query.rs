//! Query parameters and the query pipeline builder
//!
//! Client query strings arrive as flat `key=value` pairs. [`QueryParams`]
//! groups them (bracket operators, repeated keys) and [`QueryFeatures`] turns
//! them into a [`QuerySpec`] in four stages:
//!
//! ```rust,ignore
//! let spec = QueryFeatures::new(QuerySpec::default(), &params)
//!     .filter()
//!     .sort()
//!     .limit_fields()
//!     .paginate()
//!     .into_spec();
//!
//! // GET /api/v1/tours?difficulty=easy&price[lt]=1500&sort=-price&page=2&limit=5
//! let docs = service.find_many(&spec).await?;
//! ```
//!
//! Nothing here touches storage; backends translate the finished spec.

use crate::core::error::{AppResult, ValidationError};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// Keys that drive the pipeline itself and never become filter predicates
pub const RESERVED_KEYS: &[&str] = &["page", "sort", "limit", "fields"];

/// Fields that may be repeated in a query string to mean "any of"
pub const REPEATABLE_FIELDS: &[&str] = &[
    "duration",
    "ratingsAverage",
    "ratingsQuantity",
    "maxGroupSize",
    "difficulty",
    "price",
];

/// Internal document version field hidden by default
pub const VERSION_KEY: &str = "__v";

pub const DEFAULT_SORT: &str = "-createdAt";
pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 100;

// =============================================================================
// Raw parameters
// =============================================================================

/// One grouped query-string value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// `difficulty=easy`
    Single(String),
    /// `difficulty=easy&difficulty=medium` on a repeatable field
    Many(Vec<String>),
    /// `price[gte]=500&price[lt]=1500`
    Operators(IndexMap<Comparison, String>),
}

impl ParamValue {
    /// Scalar view of the value: the last one for repeated keys
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Single(v) => Some(v),
            ParamValue::Many(vs) => vs.last().map(String::as_str),
            ParamValue::Operators(_) => None,
        }
    }
}

/// Query parameters of a list request, grouped by field
///
/// Keys that start with `$` or contain `.` are dropped on the way in so a
/// client cannot smuggle storage operators or reach into nested documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    entries: IndexMap<String, ParamValue>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group raw `(key, value)` pairs as they appear in the query string
    pub fn from_pairs<I, K, V>(pairs: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::new();

        for (raw_key, value) in pairs {
            let value = value.into();
            let (field, operator) = split_bracket_key(raw_key.as_ref());

            if !is_safe_key(field) {
                continue;
            }

            match operator {
                Some(token) => {
                    if token.starts_with('$') {
                        continue;
                    }
                    let comparison = Comparison::from_token(token).ok_or_else(|| {
                        ValidationError::InvalidQuery {
                            message: format!(
                                "unsupported operator '{}' on field '{}'",
                                token, field
                            ),
                        }
                    })?;
                    params.push_operator(field, comparison, value);
                }
                None => params.push_value(field, value),
            }
        }

        Ok(params)
    }

    fn push_operator(&mut self, field: &str, comparison: Comparison, value: String) {
        match self.entries.get_mut(field) {
            Some(ParamValue::Operators(ops)) => {
                ops.insert(comparison, value);
            }
            _ => {
                let mut ops = IndexMap::new();
                ops.insert(comparison, value);
                self.entries
                    .insert(field.to_string(), ParamValue::Operators(ops));
            }
        }
    }

    fn push_value(&mut self, field: &str, value: String) {
        let repeatable = REPEATABLE_FIELDS.contains(&field);

        match self.entries.get_mut(field) {
            Some(existing) if repeatable => {
                let values = match std::mem::replace(existing, ParamValue::Many(Vec::new())) {
                    ParamValue::Single(previous) => vec![previous, value],
                    ParamValue::Many(mut values) => {
                        values.push(value);
                        values
                    }
                    ParamValue::Operators(_) => vec![value],
                };
                *existing = ParamValue::Many(values);
            }
            _ => {
                self.entries
                    .insert(field.to_string(), ParamValue::Single(value));
            }
        }
    }

    /// Set (or replace) a single value
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .insert(key.to_string(), ParamValue::Single(value.into()));
    }

    /// Builder-style [`set`](Self::set)
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    /// Scalar value of `key`
    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(ParamValue::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `price[gte]` → (`price`, Some(`gte`))
fn split_bracket_key(key: &str) -> (&str, Option<&str>) {
    if let Some(open) = key.find('[')
        && key.ends_with(']')
        && open > 0
    {
        return (&key[..open], Some(&key[open + 1..key.len() - 1]));
    }
    (key, None)
}

/// Rejects keys that would address storage operators or nested paths
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty() && !key.starts_with('$') && !key.contains('.')
}

/// Interpret a query-string value: numbers and booleans become typed JSON,
/// everything else stays a string
pub fn scalar_from_param(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>()
        && f.is_finite()
        && raw.bytes().all(|b| b.is_ascii_digit() || b == b'.' || b == b'-')
    {
        return Value::from(f);
    }

    Value::String(raw.to_string())
}

// =============================================================================
// Query specification
// =============================================================================

/// Comparison operators accepted in `field[op]=value`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Comparison {
    Gte,
    Gt,
    Lte,
    Lt,
}

impl Comparison {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "gte" => Some(Comparison::Gte),
            "gt" => Some(Comparison::Gt),
            "lte" => Some(Comparison::Lte),
            "lt" => Some(Comparison::Lt),
            _ => None,
        }
    }

    /// Operator name understood by document stores (`$gte`, ...)
    pub fn operator(&self) -> &'static str {
        match self {
            Comparison::Gte => "$gte",
            Comparison::Gt => "$gt",
            Comparison::Lte => "$lte",
            Comparison::Lt => "$lt",
        }
    }

    /// Whether `ordering` (document value vs. operand) satisfies the comparison
    pub fn accepts(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Comparison::Gte => matches!(ordering, Greater | Equal),
            Comparison::Gt => ordering == Greater,
            Comparison::Lte => matches!(ordering, Less | Equal),
            Comparison::Lt => ordering == Less,
        }
    }
}

/// A single predicate on one field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Predicate {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Cmp(Comparison, Value),
}

/// `field <predicate>`; a filter is the conjunction of its conditions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub field: String,
    pub predicate: Predicate,
}

impl Condition {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            predicate: Predicate::Eq(value.into()),
        }
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            predicate: Predicate::Ne(value.into()),
        }
    }

    pub fn is_in(field: &str, values: Vec<Value>) -> Self {
        Self {
            field: field.to_string(),
            predicate: Predicate::In(values),
        }
    }

    pub fn cmp(field: &str, comparison: Comparison, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            predicate: Predicate::Cmp(comparison, value.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    /// `-price` → price descending
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (field, descending) = match raw.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (raw.strip_prefix('+').unwrap_or(raw), false),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            descending,
        })
    }
}

/// Which fields come back
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub enum Projection {
    #[default]
    All,
    /// Only these fields (plus `id`)
    Include(Vec<String>),
    /// Everything except these fields
    Exclude(Vec<String>),
}

/// A fully configured, not-yet-executed query
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QuerySpec {
    pub filter: Vec<Condition>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl QuerySpec {
    /// A spec that only filters
    pub fn filtered(filter: Vec<Condition>) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.filter.push(condition);
        self
    }

    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }
}

// =============================================================================
// Pipeline builder
// =============================================================================

/// Chains filter → sort → projection → pagination onto a base [`QuerySpec`]
///
/// Each stage consumes the builder and returns a new one. Stages touch
/// disjoint parts of the spec.
#[derive(Debug, Clone)]
pub struct QueryFeatures<'a> {
    spec: QuerySpec,
    params: &'a QueryParams,
}

impl<'a> QueryFeatures<'a> {
    pub fn new(base: QuerySpec, params: &'a QueryParams) -> Self {
        Self { spec: base, params }
    }

    /// Turn every non-reserved parameter into a condition
    pub fn filter(self) -> Self {
        let Self { mut spec, params } = self;

        for (field, value) in params.iter() {
            if RESERVED_KEYS.contains(&field.as_str()) {
                continue;
            }
            match value {
                ParamValue::Single(raw) => {
                    spec.filter
                        .push(Condition::eq(field, scalar_from_param(raw)));
                }
                ParamValue::Many(raws) => {
                    let values = raws.iter().map(|raw| scalar_from_param(raw)).collect();
                    spec.filter.push(Condition::is_in(field, values));
                }
                ParamValue::Operators(ops) => {
                    for (comparison, raw) in ops {
                        spec.filter
                            .push(Condition::cmp(field, *comparison, scalar_from_param(raw)));
                    }
                }
            }
        }

        Self { spec, params }
    }

    /// `sort=-price,ratingsAverage`; newest first when absent
    pub fn sort(self) -> Self {
        let Self { mut spec, params } = self;

        let raw = params.value("sort").unwrap_or(DEFAULT_SORT);
        let mut keys: Vec<SortKey> = raw.split(',').filter_map(SortKey::parse).collect();
        if keys.is_empty() {
            keys = DEFAULT_SORT.split(',').filter_map(SortKey::parse).collect();
        }
        spec.sort = keys;

        Self { spec, params }
    }

    /// `fields=name,price`; hides the version key when absent
    pub fn limit_fields(self) -> Self {
        let Self { mut spec, params } = self;

        let fields: Vec<&str> = params
            .value("fields")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let included: Vec<String> = fields
            .iter()
            .filter(|f| !f.starts_with('-'))
            .map(|f| f.to_string())
            .collect();

        spec.projection = if !included.is_empty() {
            Projection::Include(included)
        } else if !fields.is_empty() {
            Projection::Exclude(
                fields
                    .iter()
                    .map(|f| f.trim_start_matches('-').to_string())
                    .collect(),
            )
        } else {
            Projection::Exclude(vec![VERSION_KEY.to_string()])
        };

        Self { spec, params }
    }

    /// `skip = (page - 1) * limit`
    pub fn paginate(self) -> Self {
        let Self { mut spec, params } = self;

        let page = positive(params.value("page")).unwrap_or(DEFAULT_PAGE);
        let limit = positive(params.value("limit")).unwrap_or(DEFAULT_LIMIT);

        spec.skip = (page - 1).saturating_mul(limit);
        spec.limit = Some(limit);

        Self { spec, params }
    }

    pub fn into_spec(self) -> QuerySpec {
        self.spec
    }
}

fn positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
}
