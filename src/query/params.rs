//! Query parameters
//!
//! [`QueryParams`] holds every argument a query may carry. It is assembled
//! with [`QueryParamsBuilder`], which accepts any combination of fields;
//! whether the combination is sufficient depends on the [`QueryKind`] it is
//! executed with and is checked by [`QueryParams::is_valid`] at execution time.
//!
//! # Example
//!
//! ```rust
//! use keen_query::query::{FilterOperator, QueryKind, QueryParams, Timeframe};
//!
//! let params = QueryParams::builder()
//!     .event_collection("purchases")
//!     .target_property("price")
//!     .filter("price", FilterOperator::Gte, 10)
//!     .group_by("category")
//!     .timeframe(Timeframe::relative("this_14_days"))
//!     .build();
//!
//! assert!(params.is_valid(QueryKind::SumResource));
//! assert!(!params.is_valid(QueryKind::Percentile));
//! ```

use super::error::{KeenResult, QueryError};
use super::kind::QueryKind;
use super::timeframe::Timeframe;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A property filter applied to the events being analyzed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub property_name: String,
    pub operator: String,
    /// String, number, boolean, list or geo coordinates depending on the operator
    pub property_value: Value,
}

impl Filter {
    /// Create a new filter
    pub fn new(
        property_name: impl Into<String>,
        operator: impl Into<String>,
        property_value: impl Into<Value>,
    ) -> Self {
        Self {
            property_name: property_name.into(),
            operator: operator.into(),
            property_value: property_value.into(),
        }
    }
}

/// Filter operators understood by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Less than
    Lt,
    /// Less than or equal to
    Lte,
    /// Greater than
    Gt,
    /// Greater than or equal to
    Gte,
    /// Property is present (value is a boolean)
    Exists,
    /// Value is one of a list
    In,
    /// String contains
    Contains,
    /// String does not contain
    NotContains,
    /// String starts with
    StartsWith,
    /// Geo point within a radius
    Within,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Exists => "exists",
            Self::In => "in",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::Within => "within",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "eq" | "=" | "==" => Some(Self::Eq),
            "ne" | "!=" => Some(Self::Ne),
            "lt" | "<" => Some(Self::Lt),
            "lte" | "<=" => Some(Self::Lte),
            "gt" | ">" => Some(Self::Gt),
            "gte" | ">=" => Some(Self::Gte),
            "exists" => Some(Self::Exists),
            "in" => Some(Self::In),
            "contains" => Some(Self::Contains),
            "not_contains" => Some(Self::NotContains),
            "starts_with" => Some(Self::StartsWith),
            "within" => Some(Self::Within),
            _ => None,
        }
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        op.as_str().to_string()
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One labelled analysis inside a multi-analysis query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub analysis_type: QueryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile: Option<f64>,
}

impl Analysis {
    pub fn new(analysis_type: QueryKind) -> Self {
        Self {
            analysis_type,
            target_property: None,
            percentile: None,
        }
    }

    pub fn target_property(mut self, property: impl Into<String>) -> Self {
        self.target_property = Some(property.into());
        self
    }

    pub fn percentile(mut self, percentile: impl Into<f64>) -> Self {
        self.percentile = Some(percentile.into());
        self
    }
}

/// One step of a funnel query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStep {
    pub event_collection: String,
    /// Property identifying the actor across steps, e.g. `user.id`
    pub actor_property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Timeframe>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Filter>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub inverted: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub with_actors: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl FunnelStep {
    pub fn new(event_collection: impl Into<String>, actor_property: impl Into<String>) -> Self {
        Self {
            event_collection: event_collection.into(),
            actor_property: actor_property.into(),
            timeframe: None,
            filters: Vec::new(),
            optional: false,
            inverted: false,
            with_actors: false,
        }
    }

    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = Some(timeframe);
        self
    }

    pub fn filter(
        mut self,
        property_name: impl Into<String>,
        operator: impl Into<String>,
        property_value: impl Into<Value>,
    ) -> Self {
        self.filters
            .push(Filter::new(property_name, operator, property_value));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    pub fn with_actors(mut self) -> Self {
        self.with_actors = true;
        self
    }
}

/// Arguments of a single query
///
/// Immutable once built. `interval` is only meaningful together with a
/// timeframe, either embedded here or passed at execution time; that pairing
/// is the caller's responsibility and is not checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    event_collection: Option<String>,
    target_property: Option<String>,
    filters: Vec<Filter>,
    timeframe: Option<Timeframe>,
    interval: Option<String>,
    timezone: Option<String>,
    group_by: Vec<String>,
    max_age: Option<u32>,
    percentile: Option<f64>,
    latest: Option<u64>,
    email: Option<String>,
    analyses: BTreeMap<String, Analysis>,
    funnel_steps: Vec<FunnelStep>,
}

/// Wire shape of [`QueryParams`]; absent fields are omitted, never null
#[derive(Serialize)]
struct WireArgs<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    event_collection: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_property: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<&'a [Filter]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interval: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timezone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_by: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    percentile: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    latest: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    analyses: Option<&'a BTreeMap<String, Analysis>>,
    #[serde(rename = "steps", skip_serializing_if = "Option::is_none")]
    funnel_steps: Option<&'a [FunnelStep]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeframe: Option<&'a Timeframe>,
}

fn non_empty(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

fn populated<T>(items: &[T]) -> Option<&[T]> {
    (!items.is_empty()).then_some(items)
}

impl QueryParams {
    /// Start building query parameters
    pub fn builder() -> QueryParamsBuilder {
        QueryParamsBuilder::default()
    }

    /// Check the populated fields against the required-field schema of `kind`
    pub fn is_valid(&self, kind: QueryKind) -> bool {
        if kind.requires_event_collection() && !non_empty(&self.event_collection) {
            return false;
        }

        if kind.requires_target_property() && !non_empty(&self.target_property) {
            return false;
        }

        // Range is enforced by the service, not here
        if kind == QueryKind::Percentile && self.percentile.is_none() {
            return false;
        }

        if kind == QueryKind::Funnel && self.funnel_steps.is_empty() {
            return false;
        }

        if kind == QueryKind::MultiAnalysis && self.analyses.is_empty() {
            return false;
        }

        true
    }

    /// Fail with [`QueryError::InvalidParameters`] unless valid for `kind`
    pub fn validate(&self, kind: QueryKind) -> KeenResult<()> {
        if self.is_valid(kind) {
            Ok(())
        } else {
            Err(QueryError::InvalidParameters { kind })
        }
    }

    /// Wire-format arguments for the request body.
    ///
    /// Only populated fields are emitted. An embedded timeframe contributes
    /// its `timeframe` key.
    pub fn to_wire_args(&self) -> KeenResult<Map<String, Value>> {
        let wire = WireArgs {
            event_collection: self.event_collection.as_deref(),
            target_property: self.target_property.as_deref(),
            filters: populated(&self.filters),
            interval: self.interval.as_deref(),
            timezone: self.timezone.as_deref(),
            group_by: populated(&self.group_by),
            max_age: self.max_age,
            percentile: self.percentile,
            latest: self.latest,
            email: self.email.as_deref(),
            analyses: (!self.analyses.is_empty()).then_some(&self.analyses),
            funnel_steps: populated(&self.funnel_steps),
            timeframe: self.timeframe.as_ref(),
        };

        match serde_json::to_value(&wire)? {
            Value::Object(args) => Ok(args),
            other => Err(QueryError::Serialization(format!(
                "query arguments encoded as {} instead of an object",
                other
            ))),
        }
    }

    /// Wire arguments with a caller-supplied timeframe merged last.
    ///
    /// The supplied timeframe replaces one embedded in the params.
    pub fn to_wire_args_with(&self, timeframe: Option<&Timeframe>) -> KeenResult<Map<String, Value>> {
        let mut args = self.to_wire_args()?;
        if let Some(timeframe) = timeframe {
            args.extend(timeframe.to_wire_args());
        }
        Ok(args)
    }

    pub fn has_group_by(&self) -> bool {
        !self.group_by.is_empty()
    }

    pub fn has_interval(&self) -> bool {
        self.interval.is_some()
    }

    pub fn event_collection(&self) -> Option<&str> {
        self.event_collection.as_deref()
    }

    pub fn target_property(&self) -> Option<&str> {
        self.target_property.as_deref()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn timeframe(&self) -> Option<&Timeframe> {
        self.timeframe.as_ref()
    }

    pub fn interval(&self) -> Option<&str> {
        self.interval.as_deref()
    }

    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    pub fn max_age(&self) -> Option<u32> {
        self.max_age
    }

    pub fn percentile(&self) -> Option<f64> {
        self.percentile
    }

    pub fn latest(&self) -> Option<u64> {
        self.latest
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn analyses(&self) -> &BTreeMap<String, Analysis> {
        &self.analyses
    }

    pub fn funnel_steps(&self) -> &[FunnelStep] {
        &self.funnel_steps
    }
}

/// Builder for [`QueryParams`]
///
/// Accumulates fields without validation; any combination may be set.
#[derive(Debug, Clone, Default)]
pub struct QueryParamsBuilder {
    params: QueryParams,
}

impl QueryParamsBuilder {
    pub fn event_collection(mut self, collection: impl Into<String>) -> Self {
        self.params.event_collection = Some(collection.into());
        self
    }

    pub fn target_property(mut self, property: impl Into<String>) -> Self {
        self.params.target_property = Some(property.into());
        self
    }

    /// Append a filter
    pub fn add_filter(
        &mut self,
        property_name: impl Into<String>,
        operator: impl Into<String>,
        property_value: impl Into<Value>,
    ) -> &mut Self {
        self.params
            .filters
            .push(Filter::new(property_name, operator, property_value));
        self
    }

    /// Append a filter, consuming the builder
    pub fn filter(
        mut self,
        property_name: impl Into<String>,
        operator: impl Into<String>,
        property_value: impl Into<Value>,
    ) -> Self {
        self.add_filter(property_name, operator, property_value);
        self
    }

    /// Replace the filter list
    pub fn filters(mut self, filters: Vec<Filter>) -> Self {
        self.params.filters = filters;
        self
    }

    pub fn timeframe(mut self, timeframe: Timeframe) -> Self {
        self.params.timeframe = Some(timeframe);
        self
    }

    /// Set a relative timeframe token
    pub fn relative_timeframe(self, token: impl Into<String>) -> Self {
        self.timeframe(Timeframe::relative(token))
    }

    /// Set an absolute timeframe from ISO-8601 strings
    pub fn absolute_timeframe(self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.timeframe(Timeframe::absolute(start, end))
    }

    /// Bucket results by interval (`daily`, `hourly`, `every_6_hours`, ...).
    ///
    /// Requires a timeframe, here or at execution time.
    pub fn interval(mut self, interval: impl Into<String>) -> Self {
        self.params.interval = Some(interval.into());
        self
    }

    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.params.timezone = Some(timezone.into());
        self
    }

    /// Append a group-by property
    pub fn group_by(mut self, property: impl Into<String>) -> Self {
        self.params.group_by.push(property.into());
        self
    }

    /// Replace the group-by properties
    pub fn group_by_all<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params.group_by = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Maximum acceptable age of a cached result, in seconds (30 or more)
    pub fn max_age(mut self, seconds: u32) -> Self {
        self.params.max_age = Some(seconds);
        self
    }

    /// Percentile in `[0, 100]`, two decimal places of precision
    pub fn percentile(mut self, percentile: impl Into<f64>) -> Self {
        self.params.percentile = Some(percentile.into());
        self
    }

    /// Number of most recent events to extract
    pub fn latest(mut self, count: u64) -> Self {
        self.params.latest = Some(count);
        self
    }

    /// Mail extraction results to this address instead of returning them
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.params.email = Some(email.into());
        self
    }

    /// Add one labelled analysis for a multi-analysis query
    pub fn analysis(mut self, label: impl Into<String>, analysis: Analysis) -> Self {
        self.params.analyses.insert(label.into(), analysis);
        self
    }

    pub fn analyses(mut self, analyses: BTreeMap<String, Analysis>) -> Self {
        self.params.analyses = analyses;
        self
    }

    /// Append a funnel step
    pub fn funnel_step(mut self, step: FunnelStep) -> Self {
        self.params.funnel_steps.push(step);
        self
    }

    pub fn funnel_steps(mut self, steps: Vec<FunnelStep>) -> Self {
        self.params.funnel_steps = steps;
        self
    }

    /// Build the parameters without validation
    pub fn build(self) -> QueryParams {
        self.params
    }

    /// Build the parameters, validating them for `kind`
    pub fn build_for(self, kind: QueryKind) -> KeenResult<QueryParams> {
        let params = self.build();
        params.validate(kind)?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal(kind: QueryKind) -> QueryParams {
        let mut builder = QueryParams::builder();
        if kind.requires_event_collection() {
            builder = builder.event_collection("purchases");
        }
        if kind.requires_target_property() {
            builder = builder.target_property("price");
        }
        match kind {
            QueryKind::Percentile => builder = builder.percentile(90),
            QueryKind::Funnel => {
                builder = builder.funnel_step(FunnelStep::new("signups", "user.id"))
            }
            QueryKind::MultiAnalysis => {
                builder = builder.analysis("total", Analysis::new(QueryKind::CountResource))
            }
            _ => {}
        }
        builder.build()
    }

    #[test]
    fn test_minimal_params_are_valid() {
        for kind in QueryKind::ALL {
            assert!(minimal(kind).is_valid(kind), "{} should be valid", kind);
        }
    }

    #[test]
    fn test_empty_params_are_invalid() {
        let empty = QueryParams::default();
        for kind in QueryKind::ALL {
            assert!(!empty.is_valid(kind), "{} should be invalid", kind);
        }
    }

    #[test]
    fn test_missing_target_property() {
        let params = QueryParams::builder().event_collection("purchases").build();
        assert!(params.is_valid(QueryKind::CountResource));
        assert!(params.is_valid(QueryKind::ExtractionResource));
        assert!(!params.is_valid(QueryKind::CountUnique));
        assert!(!params.is_valid(QueryKind::SelectUniqueResource));
    }

    #[test]
    fn test_empty_strings_are_missing() {
        let params = QueryParams::builder()
            .event_collection("")
            .target_property("price")
            .build();
        assert!(!params.is_valid(QueryKind::CountResource));
        assert!(!params.is_valid(QueryKind::SumResource));
    }

    #[test]
    fn test_percentile_required() {
        let params = QueryParams::builder()
            .event_collection("purchases")
            .target_property("price")
            .build();
        assert!(!params.is_valid(QueryKind::Percentile));
        assert!(params.is_valid(QueryKind::Median));

        // Out-of-range values are left to the service
        let params = QueryParams::builder()
            .event_collection("purchases")
            .target_property("price")
            .percentile(250.0)
            .build();
        assert!(params.is_valid(QueryKind::Percentile));
    }

    #[test]
    fn test_percentile_without_target_property() {
        let params = QueryParams::builder()
            .event_collection("purchases")
            .percentile(90)
            .build();
        assert!(!params.is_valid(QueryKind::Percentile));
    }

    #[test]
    fn test_missing_event_collection() {
        let params = QueryParams::builder()
            .target_property("price")
            .percentile(90)
            .build();
        for kind in QueryKind::ALL {
            if kind.requires_target_property() {
                assert!(!params.is_valid(kind), "{} needs a collection", kind);
            }
        }
        assert!(!params.is_valid(QueryKind::CountResource));
        assert!(!params.is_valid(QueryKind::ExtractionResource));
    }

    #[test]
    fn test_multi_analysis_requires_collection_and_analyses() {
        let params = QueryParams::builder()
            .analysis("total", Analysis::new(QueryKind::CountResource))
            .build();
        assert!(!params.is_valid(QueryKind::MultiAnalysis));

        let params = QueryParams::builder().event_collection("purchases").build();
        assert!(!params.is_valid(QueryKind::MultiAnalysis));
    }

    #[test]
    fn test_build_for_rejects_insufficient_params() {
        let result = QueryParams::builder()
            .event_collection("purchases")
            .build_for(QueryKind::Average);
        assert!(matches!(
            result,
            Err(QueryError::InvalidParameters {
                kind: QueryKind::Average
            })
        ));
    }

    #[test]
    fn test_wire_args_omit_absent_fields() {
        let args = QueryParams::builder()
            .event_collection("purchases")
            .build()
            .to_wire_args()
            .unwrap();
        assert_eq!(Value::Object(args), json!({"event_collection": "purchases"}));

        let args = QueryParams::default().to_wire_args().unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_wire_args_full() {
        let params = QueryParams::builder()
            .event_collection("purchases")
            .target_property("price")
            .filter("price", FilterOperator::Gt, 10)
            .filter("country", "eq", "NZ")
            .interval("daily")
            .timezone("UTC")
            .group_by("category")
            .group_by("country")
            .max_age(300)
            .percentile(99.99)
            .relative_timeframe("this_7_days")
            .build();

        let args = Value::Object(params.to_wire_args().unwrap());
        assert_eq!(
            args,
            json!({
                "event_collection": "purchases",
                "target_property": "price",
                "filters": [
                    {"property_name": "price", "operator": "gt", "property_value": 10},
                    {"property_name": "country", "operator": "eq", "property_value": "NZ"}
                ],
                "interval": "daily",
                "timezone": "UTC",
                "group_by": ["category", "country"],
                "max_age": 300,
                "percentile": 99.99,
                "timeframe": "this_7_days"
            })
        );
        assert!(params.has_group_by());
        assert!(params.has_interval());
    }

    #[test]
    fn test_filters_keep_insertion_order() {
        let mut builder = QueryParams::builder();
        builder.add_filter("a", "eq", 1);
        builder.add_filter("b", "exists", true);
        builder.add_filter("c", "in", json!(["x", "y"]));
        let params = builder.build();

        let names: Vec<_> = params
            .filters()
            .iter()
            .map(|f| f.property_name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_execution_timeframe_overrides_embedded() {
        let params = QueryParams::builder()
            .event_collection("purchases")
            .relative_timeframe("this_7_days")
            .build();

        let override_tf = Timeframe::absolute("2020-01-01T00:00:00Z", "2020-01-02T00:00:00Z");
        let args = params.to_wire_args_with(Some(&override_tf)).unwrap();
        assert_eq!(
            args.get("timeframe"),
            Some(&json!({"start": "2020-01-01T00:00:00Z", "end": "2020-01-02T00:00:00Z"}))
        );

        let args = params.to_wire_args_with(None).unwrap();
        assert_eq!(args.get("timeframe"), Some(&json!("this_7_days")));
    }

    #[test]
    fn test_funnel_and_analyses_wire_shape() {
        let params = QueryParams::builder()
            .funnel_step(
                FunnelStep::new("signups", "user.id").timeframe(Timeframe::relative("this_30_days")),
            )
            .funnel_step(
                FunnelStep::new("purchases", "user.id")
                    .filter("price", "gte", 5)
                    .optional(),
            )
            .build();
        let args = params.to_wire_args().unwrap();
        assert_eq!(
            args.get("steps"),
            Some(&json!([
                {"event_collection": "signups", "actor_property": "user.id", "timeframe": "this_30_days"},
                {
                    "event_collection": "purchases",
                    "actor_property": "user.id",
                    "filters": [{"property_name": "price", "operator": "gte", "property_value": 5}],
                    "optional": true
                }
            ]))
        );

        let params = QueryParams::builder()
            .event_collection("purchases")
            .analysis("total", Analysis::new(QueryKind::SumResource).target_property("price"))
            .analysis("p95", Analysis::new(QueryKind::Percentile).target_property("price").percentile(95))
            .build();
        let args = params.to_wire_args().unwrap();
        assert_eq!(
            args.get("analyses"),
            Some(&json!({
                "p95": {"analysis_type": "percentile", "target_property": "price", "percentile": 95.0},
                "total": {"analysis_type": "sum", "target_property": "price"}
            }))
        );
    }

    #[test]
    fn test_filter_operator_parsing() {
        assert_eq!(FilterOperator::from_str(">="), Some(FilterOperator::Gte));
        assert_eq!(FilterOperator::from_str("not_contains"), Some(FilterOperator::NotContains));
        assert_eq!(FilterOperator::from_str("near"), None);
        assert_eq!(String::from(FilterOperator::Within), "within");
    }
}
