//! Query executor
//!
//! [`KeenQueryClient`] validates query parameters, posts them to
//! `{base}/{version}/projects/{project}/queries/{kind}` and unwraps the
//! response envelope. Each call makes exactly one round trip; nothing is
//! retried or cached.

use super::project::KeenProject;
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
use crate::config::Config;
use crate::logging;
use crate::query::{
    Analysis, FunnelStep, KeenResult, QueryError, QueryKind, QueryParams, QueryParamsBuilder,
    QueryResult, Timeframe,
};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Default API address
pub const DEFAULT_BASE_URL: &str = "https://api.keen.io";

/// API version segment of every query URL
pub const API_VERSION: &str = "3.0";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Client for the query API
pub struct KeenQueryClient {
    transport: Box<dyn Transport>,
    base_url: String,
    project: KeenProject,
}

/// Builder for [`KeenQueryClient`]
pub struct KeenQueryClientBuilder {
    project: KeenProject,
    base_url: Option<String>,
    transport: Option<Box<dyn Transport>>,
    timeout: Duration,
}

impl KeenQueryClientBuilder {
    /// API address; empty falls back to [`DEFAULT_BASE_URL`]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Replace the default `reqwest` transport
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Request timeout of the default transport
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<KeenQueryClient, TransportError> {
        let transport: Box<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Box::new(ReqwestTransport::new(self.timeout)?),
        };

        Ok(KeenQueryClient {
            transport,
            base_url: normalize_base_url(self.base_url.as_deref()),
            project: self.project,
        })
    }
}

fn normalize_base_url(base_url: Option<&str>) -> String {
    match base_url.map(|url| url.trim_end_matches('/')) {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => DEFAULT_BASE_URL.to_string(),
    }
}

impl KeenQueryClient {
    /// Client with the default transport and base URL
    pub fn new(project: KeenProject) -> Result<Self, TransportError> {
        Self::builder(project).build()
    }

    pub fn builder(project: KeenProject) -> KeenQueryClientBuilder {
        KeenQueryClientBuilder {
            project,
            base_url: None,
            transport: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Builder pre-filled from loaded configuration
    pub fn builder_from_config(config: &Config) -> KeenQueryClientBuilder {
        Self::builder(config.project.to_project())
            .base_url(config.client.base_url.clone())
            .timeout(Duration::from_secs(config.client.request_timeout_secs))
    }

    pub fn project(&self) -> &KeenProject {
        &self.project
    }

    pub fn set_project(&mut self, project: KeenProject) {
        self.project = project;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Change the API address; empty restores the default
    pub fn set_base_url(&mut self, base_url: &str) {
        self.base_url = normalize_base_url(Some(base_url));
    }

    /// URL a query of `kind` is posted to
    pub fn query_url(&self, kind: QueryKind) -> String {
        format!(
            "{}/{}/projects/{}/queries/{}",
            self.base_url,
            API_VERSION,
            urlencoding::encode(&self.project.project_id),
            kind.wire_name()
        )
    }

    /// Run a query and decode its result.
    ///
    /// The params' group-by and interval settings steer decoding. A
    /// `timeframe` given here replaces one embedded in `params`.
    pub fn execute(
        &self,
        kind: QueryKind,
        params: &QueryParams,
        timeframe: Option<&Timeframe>,
    ) -> KeenResult<QueryResult> {
        let raw = self.execute_raw(kind, params, timeframe)?;
        Ok(QueryResult::decode(
            &raw,
            params.has_group_by(),
            params.has_interval(),
        ))
    }

    /// Run a query and return the raw `result` value
    pub fn execute_raw(
        &self,
        kind: QueryKind,
        params: &QueryParams,
        timeframe: Option<&Timeframe>,
    ) -> KeenResult<Value> {
        params.validate(kind)?;

        let args = params.to_wire_args_with(timeframe)?;
        let url = self.query_url(kind);

        let serialized = serde_json::to_string(&args);
        if logging::request_logging_enabled() {
            match &serialized {
                Ok(body) => tracing::info!("Sent request '{}' to URL '{}'", body, url),
                Err(e) => tracing::warn!("Couldn't log request to {}: {}", url, e),
            }
        }

        let body = if args.is_empty() {
            None
        } else {
            Some(serialized?)
        };

        let request = HttpRequest {
            url,
            method: Method::POST,
            credential: self.project.read_key.clone(),
            body,
        };

        let response = self.transport.send(&request)?;
        tracing::debug!(status = response.status, kind = %kind, "Query response received");

        unwrap_envelope(response)
    }

    /// Number of events in a collection
    pub fn count(&self, event_collection: &str, timeframe: &Timeframe) -> KeenResult<i64> {
        let params = QueryParams::builder()
            .event_collection(event_collection)
            .build();
        let raw = self.execute_raw(QueryKind::CountResource, &params, Some(timeframe))?;
        expect_integer(&raw)
    }

    /// Number of distinct values of a property
    pub fn count_unique(
        &self,
        event_collection: &str,
        target_property: &str,
        timeframe: &Timeframe,
    ) -> KeenResult<i64> {
        let params = target_params(event_collection, target_property).build();
        let raw = self.execute_raw(QueryKind::CountUnique, &params, Some(timeframe))?;
        expect_integer(&raw)
    }

    pub fn minimum(
        &self,
        event_collection: &str,
        target_property: &str,
        timeframe: &Timeframe,
    ) -> KeenResult<f64> {
        self.numeric(QueryKind::Minimum, event_collection, target_property, timeframe)
    }

    pub fn maximum(
        &self,
        event_collection: &str,
        target_property: &str,
        timeframe: &Timeframe,
    ) -> KeenResult<f64> {
        self.numeric(QueryKind::Maximum, event_collection, target_property, timeframe)
    }

    pub fn average(
        &self,
        event_collection: &str,
        target_property: &str,
        timeframe: &Timeframe,
    ) -> KeenResult<f64> {
        self.numeric(QueryKind::Average, event_collection, target_property, timeframe)
    }

    pub fn median(
        &self,
        event_collection: &str,
        target_property: &str,
        timeframe: &Timeframe,
    ) -> KeenResult<f64> {
        self.numeric(QueryKind::Median, event_collection, target_property, timeframe)
    }

    pub fn sum(
        &self,
        event_collection: &str,
        target_property: &str,
        timeframe: &Timeframe,
    ) -> KeenResult<f64> {
        self.numeric(QueryKind::SumResource, event_collection, target_property, timeframe)
    }

    /// Value at `percentile` (0-100) of a numeric property
    pub fn percentile(
        &self,
        event_collection: &str,
        target_property: &str,
        percentile: f64,
        timeframe: &Timeframe,
    ) -> KeenResult<f64> {
        let params = target_params(event_collection, target_property)
            .percentile(percentile)
            .build();
        let raw = self.execute_raw(QueryKind::Percentile, &params, Some(timeframe))?;
        expect_number(&raw)
    }

    /// Distinct values of a property
    pub fn select_unique(
        &self,
        event_collection: &str,
        target_property: &str,
        timeframe: &Timeframe,
    ) -> KeenResult<QueryResult> {
        let params = target_params(event_collection, target_property).build();
        self.execute(QueryKind::SelectUniqueResource, &params, Some(timeframe))
    }

    /// Raw events of a collection
    pub fn extraction(&self, event_collection: &str, timeframe: &Timeframe) -> KeenResult<Value> {
        let params = QueryParams::builder()
            .event_collection(event_collection)
            .build();
        self.execute_raw(QueryKind::ExtractionResource, &params, Some(timeframe))
    }

    /// Ask the service to mail an extraction to `email`
    pub fn extraction_to_email(
        &self,
        event_collection: &str,
        email: &str,
        timeframe: &Timeframe,
    ) -> KeenResult<()> {
        let params = QueryParams::builder()
            .event_collection(event_collection)
            .email(email)
            .build();
        self.execute_raw(QueryKind::ExtractionResource, &params, Some(timeframe))?;
        Ok(())
    }

    /// Funnel over ordered steps; steps may carry their own timeframes
    pub fn funnel(
        &self,
        steps: Vec<FunnelStep>,
        timeframe: Option<&Timeframe>,
    ) -> KeenResult<Value> {
        let params = QueryParams::builder().funnel_steps(steps).build();
        self.execute_raw(QueryKind::Funnel, &params, timeframe)
    }

    /// Several labelled analyses over one collection
    pub fn multi_analysis(
        &self,
        event_collection: &str,
        analyses: BTreeMap<String, Analysis>,
        timeframe: &Timeframe,
    ) -> KeenResult<Value> {
        let params = QueryParams::builder()
            .event_collection(event_collection)
            .analyses(analyses)
            .build();
        self.execute_raw(QueryKind::MultiAnalysis, &params, Some(timeframe))
    }

    fn numeric(
        &self,
        kind: QueryKind,
        event_collection: &str,
        target_property: &str,
        timeframe: &Timeframe,
    ) -> KeenResult<f64> {
        let params = target_params(event_collection, target_property).build();
        let raw = self.execute_raw(kind, &params, Some(timeframe))?;
        expect_number(&raw)
    }
}

fn target_params(event_collection: &str, target_property: &str) -> QueryParamsBuilder {
    QueryParams::builder()
        .event_collection(event_collection)
        .target_property(target_property)
}

/// Extract `result` from a response, or the error the service reported
pub fn unwrap_envelope(response: HttpResponse) -> KeenResult<Value> {
    if !response.is_success() {
        return Err(QueryError::Server {
            status: response.status,
            message: response.body,
        });
    }

    let envelope: Value = serde_json::from_str(&response.body)
        .map_err(|e| QueryError::MalformedResponse(format!("body is not JSON: {}", e)))?;

    let mut envelope = match envelope {
        Value::Object(envelope) => envelope,
        other => {
            return Err(QueryError::MalformedResponse(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            )))
        }
    };

    match envelope.remove("result") {
        Some(result) if !result.is_null() => Ok(result),
        _ => {
            let error_code = envelope.get("error_code").map(display_field);
            let message = envelope.get("message").map(display_field);

            if error_code.is_none() && message.is_none() {
                return Err(QueryError::MalformedResponse(
                    "response has neither a result nor an error".to_string(),
                ));
            }

            let mut composed = "Error response received from server".to_string();
            if let Some(code) = error_code {
                composed.push(' ');
                composed.push_str(&code);
            }
            if let Some(message) = message {
                composed.push_str(": ");
                composed.push_str(&message);
            }

            Err(QueryError::Server {
                status: response.status,
                message: composed,
            })
        }
    }
}

fn display_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_type_name(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "double",
        Value::Number(n) if n.is_u64() && n.as_i64().is_none() => "unsigned integer",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
    .to_string()
}

/// Count-style results must be integers
fn expect_integer(raw: &Value) -> KeenResult<i64> {
    raw.as_i64().ok_or_else(|| QueryError::TypeMismatch {
        expected: "integer",
        found: json_type_name(raw),
    })
}

/// Aggregate results are numbers; integers are widened
fn expect_number(raw: &Value) -> KeenResult<f64> {
    raw.as_f64().ok_or_else(|| QueryError::TypeMismatch {
        expected: "number",
        found: json_type_name(raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(body: &str) -> HttpResponse {
        HttpResponse::new(200, body)
    }

    #[test]
    fn test_unwrap_result() {
        assert_eq!(unwrap_envelope(ok(r#"{"result": 42}"#)).unwrap(), json!(42));
        assert_eq!(
            unwrap_envelope(ok(r#"{"result": [{"a": 1, "result": 2}]}"#)).unwrap(),
            json!([{"a": 1, "result": 2}])
        );
    }

    #[test]
    fn test_unwrap_error_envelope() {
        let err = unwrap_envelope(ok(r#"{"error_code": "InvalidFilter", "message": "bad op"}"#))
            .unwrap_err();
        match err {
            QueryError::Server { message, .. } => {
                assert_eq!(message, "Error response received from server InvalidFilter: bad op");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unwrap_partial_error_envelope() {
        let err = unwrap_envelope(ok(r#"{"message": "bad op"}"#)).unwrap_err();
        assert!(matches!(err, QueryError::Server { ref message, .. } if message.ends_with(": bad op")));
    }

    #[test]
    fn test_unwrap_empty_envelope_is_malformed() {
        let err = unwrap_envelope(ok(r#"{"something": "else"}"#)).unwrap_err();
        assert!(matches!(err, QueryError::MalformedResponse(_)));

        let err = unwrap_envelope(ok(r#"{"result": null}"#)).unwrap_err();
        assert!(matches!(err, QueryError::MalformedResponse(_)));

        let err = unwrap_envelope(ok("[1, 2]")).unwrap_err();
        assert!(matches!(err, QueryError::MalformedResponse(_)));

        let err = unwrap_envelope(ok("<html>")).unwrap_err();
        assert!(matches!(err, QueryError::MalformedResponse(_)));
    }

    #[test]
    fn test_http_failure_keeps_body_verbatim() {
        let body = r#"{"message": "Invalid API key", "error_code": "InvalidApiKeyError"}"#;
        let err = unwrap_envelope(HttpResponse::new(401, body)).unwrap_err();
        match err {
            QueryError::Server { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, body);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(expect_integer(&json!(7)).unwrap(), 7);
        assert!(matches!(
            expect_integer(&json!(7.5)),
            Err(QueryError::TypeMismatch { expected: "integer", .. })
        ));
        assert_eq!(expect_number(&json!(7)).unwrap(), 7.0);
        assert_eq!(expect_number(&json!(7.5)).unwrap(), 7.5);
        assert!(matches!(
            expect_number(&json!("7")),
            Err(QueryError::TypeMismatch { expected: "number", .. })
        ));
    }

    #[test]
    fn test_oversized_unsigned_is_not_an_integer() {
        let err = expect_integer(&json!(u64::MAX)).unwrap_err();
        match err {
            QueryError::TypeMismatch { expected, found } => {
                assert_eq!(expected, "integer");
                assert_eq!(found, "unsigned integer");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(json_type_name(&json!(5)), "integer");
        assert_eq!(json_type_name(&json!(-5)), "integer");
    }

    #[test]
    fn test_base_url_normalization() {
        assert_eq!(normalize_base_url(None), DEFAULT_BASE_URL);
        assert_eq!(normalize_base_url(Some("")), DEFAULT_BASE_URL);
        assert_eq!(
            normalize_base_url(Some("http://localhost:9000/")),
            "http://localhost:9000"
        );
    }
}
