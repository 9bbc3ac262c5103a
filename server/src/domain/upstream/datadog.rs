//! Datadog implementation of `UpstreamApi`
//!
//! Endpoints:
//! - catalog: `GET /api/v2/services/definitions` (page-number pagination)
//! - APM status: `GET /api/v1/query` over the ingested-span usage metric
//! - spans: `POST /api/v2/spans/events/search` (cursor pagination)

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{ApmService, CatalogService, Page, RawSpan, TimeWindow, UpstreamApi, UpstreamError};
use crate::core::config::DatadogConfig;

const API_KEY_HEADER: &str = "DD-API-KEY";
const APP_KEY_HEADER: &str = "DD-APPLICATION-KEY";
const RATE_LIMIT_RESET_HEADER: &str = "X-RateLimit-Reset";

/// Ingested span volume per service and language
const APM_QUERY: &str =
    "sum:datadog.estimated_usage.apm.ingested_spans{*} by {service,language}.as_count()";

/// Parent ids that mark a root span
const UNKNOWN_PARENT_IDS: &[&str] = &["", "0"];

pub struct DatadogApi {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
    apm_lookback: Duration,
    has_credentials: bool,
}

impl DatadogApi {
    pub fn new(
        config: &DatadogConfig,
        page_size: u32,
        apm_lookback: Duration,
    ) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        for (name, secret) in [
            (API_KEY_HEADER, &config.api_key),
            (APP_KEY_HEADER, &config.app_key),
        ] {
            let mut value = HeaderValue::from_str(secret.expose()).map_err(|_| {
                UpstreamError::Unauthorized(format!("{} contains invalid characters", name))
            })?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .user_agent(concat!("apmtrack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Transient(format!("failed to build HTTP client: {}", e)))?;

        let base_url = config.api_base_url();
        tracing::debug!(base_url = %base_url, page_size, "Datadog client initialized");

        Ok(Self {
            client,
            base_url,
            page_size: page_size.max(1),
            apm_lookback,
            has_credentials: config.has_credentials(),
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, UpstreamError> {
        // Datadog answers missing keys with 403; fail the same way without the round trip
        if !self.has_credentials {
            return Err(UpstreamError::Unauthorized(
                "Datadog API/application keys are not configured".to_string(),
            ));
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(RATE_LIMIT_RESET_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::from_status(status.as_u16(), retry_after, &body));
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl UpstreamApi for DatadogApi {
    async fn list_catalog(
        &self,
        cursor: Option<&str>,
    ) -> Result<Page<CatalogService>, UpstreamError> {
        let page_number: u32 = match cursor {
            Some(c) => c
                .parse()
                .map_err(|_| UpstreamError::Decode(format!("invalid catalog cursor: {}", c)))?,
            None => 0,
        };

        let url = format!("{}/api/v2/services/definitions", self.base_url);
        let request = self.client.get(&url).query(&[
            ("page[size]", self.page_size),
            ("page[number]", page_number),
        ]);
        let body: ServiceDefinitionsResponse = self.send(request).await?;

        let full_page = body.data.len() >= self.page_size as usize;
        let items: Vec<CatalogService> = body
            .data
            .into_iter()
            .filter_map(ServiceDefinition::into_catalog_service)
            .collect();

        Ok(Page {
            items,
            next_cursor: full_page.then(|| (page_number + 1).to_string()),
        })
    }

    async fn list_apm_status(
        &self,
        _cursor: Option<&str>,
    ) -> Result<Page<ApmService>, UpstreamError> {
        let window = TimeWindow::trailing(self.apm_lookback);
        let url = format!("{}/api/v1/query", self.base_url);
        let request = self.client.get(&url).query(&[
            ("from", window.start.timestamp().to_string()),
            ("to", window.end.timestamp().to_string()),
            ("query", APM_QUERY.to_string()),
        ]);
        let body: MetricQueryResponse = self.send(request).await?;

        if body.status.as_deref() == Some("error") {
            return Err(UpstreamError::Rejected {
                status: 200,
                message: body.error.unwrap_or_else(|| "metric query failed".to_string()),
            });
        }

        // The metric query is not paginated
        Ok(Page::last(aggregate_series(body.series)))
    }

    async fn search_spans(
        &self,
        window: &TimeWindow,
        cursor: Option<&str>,
    ) -> Result<Page<RawSpan>, UpstreamError> {
        let mut page = serde_json::json!({ "limit": self.page_size });
        if let Some(cursor) = cursor {
            page["cursor"] = serde_json::Value::String(cursor.to_string());
        }
        let payload = serde_json::json!({
            "data": {
                "type": "search_request",
                "attributes": {
                    "filter": {
                        "from": window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
                        "to": window.end.to_rfc3339_opts(SecondsFormat::Secs, true),
                        "query": "*",
                    },
                    "page": page,
                    "sort": "timestamp",
                }
            }
        });

        let url = format!("{}/api/v2/spans/events/search", self.base_url);
        let request = self.client.post(&url).json(&payload);
        let body: SpanSearchResponse = self.send(request).await?;

        let items = body
            .data
            .into_iter()
            .filter_map(SpanData::into_raw_span)
            .collect();
        let next_cursor = body
            .meta
            .and_then(|m| m.page)
            .and_then(|p| p.after)
            .filter(|c| !c.is_empty());

        Ok(Page { items, next_cursor })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ServiceDefinitionsResponse {
    #[serde(default)]
    data: Vec<ServiceDefinition>,
}

#[derive(Debug, Deserialize)]
struct ServiceDefinition {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    attributes: ServiceDefinitionAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceDefinitionAttributes {
    #[serde(default)]
    schema: ServiceSchema,
}

/// Fields shared by the v2.x and v3 service definition schemas
#[derive(Debug, Default, Deserialize)]
struct ServiceSchema {
    #[serde(rename = "dd-service")]
    dd_service: Option<String>,
    team: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(rename = "dependsOn", default)]
    depends_on: Vec<String>,
    metadata: Option<SchemaMetadata>,
    spec: Option<SchemaSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct SchemaMetadata {
    name: Option<String>,
    owner: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SchemaSpec {
    #[serde(rename = "dependsOn", default)]
    depends_on: Vec<String>,
}

impl ServiceDefinition {
    fn into_catalog_service(self) -> Option<CatalogService> {
        let ServiceSchema {
            dd_service,
            team,
            mut tags,
            mut depends_on,
            metadata,
            spec,
        } = self.attributes.schema;
        let metadata = metadata.unwrap_or_default();

        let name = dd_service
            .or(metadata.name)
            .or(self.id)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())?;

        tags.extend(metadata.tags);
        if let Some(spec) = spec {
            depends_on.extend(spec.depends_on);
        }

        let team = team
            .or(metadata.owner)
            .filter(|t| !t.trim().is_empty())
            .or_else(|| tag_value(&tags, "team"));
        let dependencies = extract_dependencies(&name, &tags, &depends_on);

        Some(CatalogService {
            environment: tag_value(&tags, "env"),
            infra_type: infer_infra_type(&tags),
            customer_facing: is_customer_facing(&tags),
            name,
            team,
            tags,
            dependencies,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MetricQueryResponse {
    status: Option<String>,
    error: Option<String>,
    #[serde(default)]
    series: Vec<MetricSeries>,
}

#[derive(Debug, Deserialize)]
struct MetricSeries {
    #[serde(default)]
    tag_set: Vec<String>,
    #[serde(default)]
    pointlist: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct SpanSearchResponse {
    #[serde(default)]
    data: Vec<SpanData>,
    meta: Option<SpanSearchMeta>,
}

#[derive(Debug, Deserialize)]
struct SpanSearchMeta {
    page: Option<SpanSearchPage>,
}

#[derive(Debug, Deserialize)]
struct SpanSearchPage {
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpanData {
    id: Option<String>,
    #[serde(default)]
    attributes: SpanAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct SpanAttributes {
    service: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
    parent_id: Option<String>,
}

impl SpanData {
    fn into_raw_span(self) -> Option<RawSpan> {
        let attrs = self.attributes;
        let trace_id = attrs.trace_id.filter(|t| !t.is_empty())?;
        let service = attrs.service.filter(|s| !s.is_empty())?;
        let span_id = attrs.span_id.or(self.id).unwrap_or_default();
        let parent_id = attrs
            .parent_id
            .filter(|p| !UNKNOWN_PARENT_IDS.contains(&p.as_str()));

        Some(RawSpan {
            trace_id,
            span_id,
            service,
            parent_id,
        })
    }
}

// ============================================================================
// Tag derivations
// ============================================================================

/// Value of the first `key:value` tag with the given key
fn tag_value(tags: &[String], key: &str) -> Option<String> {
    tags.iter().find_map(|tag| {
        let (k, v) = tag.split_once(':')?;
        (k.trim().eq_ignore_ascii_case(key) && !v.trim().is_empty()).then(|| v.trim().to_string())
    })
}

/// Explicit `infrastructure:` tag, else a container/VM/serverless guess from platform tags
fn infer_infra_type(tags: &[String]) -> Option<String> {
    if let Some(explicit) = tag_value(tags, "infrastructure") {
        return Some(explicit);
    }

    let tokens: Vec<String> = tags
        .iter()
        .flat_map(|tag| tag.split([':', '-', '_', '/', '.']))
        .map(|token| token.trim().to_ascii_lowercase())
        .collect();
    let has = |candidates: &[&str]| tokens.iter().any(|t| candidates.contains(&t.as_str()));

    if has(&["lambda", "serverless", "functions"]) {
        Some("Serverless".to_string())
    } else if has(&["eks", "ecs", "kubernetes", "k8s", "fargate", "docker", "container"]) {
        Some("Container".to_string())
    } else if has(&["ec2", "vm", "compute"]) {
        Some("VM".to_string())
    } else {
        None
    }
}

fn is_customer_facing(tags: &[String]) -> bool {
    tags.iter().any(|tag| {
        let lower = tag.trim().to_ascii_lowercase();
        let (key, value) = lower.split_once(':').unwrap_or((lower.as_str(), ""));
        match key {
            "customer-facing" | "customer_facing" | "public" => value != "false",
            "critical_flow" => value == "true",
            _ => false,
        }
    })
}

/// Declared dependencies from `depends-on:`/`dependency:` tags and schema entries
fn extract_dependencies(name: &str, tags: &[String], declared: &[String]) -> Vec<String> {
    let from_tags = tags.iter().filter_map(|tag| {
        let (key, value) = tag.split_once(':')?;
        matches!(key.trim(), "depends-on" | "depends_on" | "dependency").then_some(value)
    });

    let mut deps: Vec<String> = from_tags
        .chain(declared.iter().map(String::as_str))
        .map(|dep| dep.trim())
        .map(|dep| dep.strip_prefix("service:").unwrap_or(dep).trim().to_string())
        .filter(|dep| !dep.is_empty() && dep != name)
        .collect();
    deps.sort();
    deps.dedup();
    deps
}

fn normalize_language(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "python" => "Python".to_string(),
        "java" | "jvm" => "Java".to_string(),
        "go" | "golang" => "Go".to_string(),
        "node" | "nodejs" | "javascript" => "Node.js".to_string(),
        "ruby" => "Ruby".to_string(),
        "php" => "PHP".to_string(),
        "dotnet" | ".net" => ".NET".to_string(),
        "cpp" | "c++" => "C++".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// Fold metric series into one record per service
fn aggregate_series(series: Vec<MetricSeries>) -> Vec<ApmService> {
    let mut by_service: BTreeMap<String, ApmService> = BTreeMap::new();

    for s in series {
        let Some(service) = tag_value(&s.tag_set, "service") else {
            continue;
        };
        let language = tag_value(&s.tag_set, "language")
            .filter(|l| !matches!(l.as_str(), "n/a" | "N/A" | "none"))
            .map(|l| normalize_language(&l));

        let mut span_count = 0f64;
        let mut last_seen_ms: Option<f64> = None;
        for point in &s.pointlist {
            if let [Some(ts), Some(value), ..] = point.as_slice()
                && *value > 0.0
            {
                span_count += value;
                last_seen_ms = Some(last_seen_ms.map_or(*ts, |prev| prev.max(*ts)));
            }
        }
        let last_seen = last_seen_ms.map(|ms| (ms / 1000.0) as i64);

        let entry = by_service.entry(service.clone()).or_insert(ApmService {
            service,
            language: None,
            span_count: 0,
            last_seen: None,
        });
        entry.span_count += span_count.round() as i64;
        entry.last_seen = entry.last_seen.max(last_seen);
        if entry.language.is_none() {
            entry.language = language;
        }
    }

    let now = Utc::now().timestamp();
    by_service
        .into_values()
        .map(|mut apm| {
            apm.last_seen = apm.last_seen.map(|ts| ts.min(now));
            apm
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::secret::Secret;
    use httpmock::prelude::*;

    fn config(base_url: &str) -> DatadogConfig {
        DatadogConfig {
            site: "datadoghq.com".to_string(),
            api_key: Secret::new("api-key"),
            app_key: Secret::new("app-key"),
            base_url: Some(base_url.to_string()),
            request_timeout: Duration::from_secs(5),
        }
    }

    fn api(server: &MockServer, page_size: u32) -> DatadogApi {
        DatadogApi::new(&config(&server.base_url()), page_size, Duration::from_secs(3600)).unwrap()
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tag_derivations() {
        let t = tags(&["team:payments", "env:prod", "depends-on:service:inventory", "public"]);
        assert_eq!(tag_value(&t, "env"), Some("prod".to_string()));
        assert_eq!(tag_value(&t, "region"), None);
        assert!(is_customer_facing(&t));
        assert!(is_customer_facing(&tags(&["critical_flow:true"])));
        assert!(!is_customer_facing(&tags(&["critical_flow:false", "team:public-api"])));
        assert_eq!(
            extract_dependencies("checkout", &t, &tags(&["service:payments-db", "inventory", "checkout"])),
            vec!["inventory".to_string(), "payments-db".to_string()]
        );
    }

    #[test]
    fn test_infra_inference() {
        assert_eq!(
            infer_infra_type(&tags(&["infrastructure:Kubernetes"])),
            Some("Kubernetes".to_string())
        );
        assert_eq!(infer_infra_type(&tags(&["platform:eks"])), Some("Container".to_string()));
        assert_eq!(infer_infra_type(&tags(&["runtime:aws-lambda"])), Some("Serverless".to_string()));
        assert_eq!(infer_infra_type(&tags(&["host:ec2"])), Some("VM".to_string()));
        assert_eq!(infer_infra_type(&tags(&["specs:ready"])), None);
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("node"), "Node.js");
        assert_eq!(normalize_language("DOTNET"), ".NET");
        assert_eq!(normalize_language("rust"), "Rust");
    }

    #[tokio::test]
    async fn test_list_catalog_parses_definitions() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v2/services/definitions")
                    .header("DD-API-KEY", "api-key")
                    .header("DD-APPLICATION-KEY", "app-key")
                    .query_param("page[size]", "2")
                    .query_param("page[number]", "0");
                then.status(200).json_body(serde_json::json!({
                    "data": [
                        {
                            "id": "abc",
                            "attributes": { "schema": {
                                "dd-service": "checkout",
                                "team": "payments",
                                "tags": ["env:prod", "platform:eks", "customer-facing", "depends-on:inventory"]
                            }}
                        },
                        {
                            "id": "def",
                            "attributes": { "schema": {
                                "metadata": { "name": "inventory", "owner": "stock" },
                                "spec": { "dependsOn": ["service:inventory-db"] }
                            }}
                        }
                    ]
                }));
            })
            .await;

        let page = api(&server, 2).list_catalog(None).await.unwrap();
        mock.assert_async().await;

        assert_eq!(page.next_cursor.as_deref(), Some("1"));
        assert_eq!(page.items.len(), 2);
        let checkout = &page.items[0];
        assert_eq!(checkout.name, "checkout");
        assert_eq!(checkout.team.as_deref(), Some("payments"));
        assert_eq!(checkout.environment.as_deref(), Some("prod"));
        assert_eq!(checkout.infra_type.as_deref(), Some("Container"));
        assert!(checkout.customer_facing);
        assert_eq!(checkout.dependencies, vec!["inventory".to_string()]);

        let inventory = &page.items[1];
        assert_eq!(inventory.team.as_deref(), Some("stock"));
        assert_eq!(inventory.dependencies, vec!["inventory-db".to_string()]);
    }

    #[tokio::test]
    async fn test_short_catalog_page_ends_pagination() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v2/services/definitions")
                    .query_param("page[number]", "3");
                then.status(200).json_body(serde_json::json!({ "data": [] }));
            })
            .await;

        let page = api(&server, 50).list_catalog(Some("3")).await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_status_codes_map_to_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/services/definitions");
                then.status(429).header("X-RateLimit-Reset", "7");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/query");
                then.status(403).body(r#"{"errors":["Forbidden"]}"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/spans/events/search");
                then.status(502).body("bad gateway");
            })
            .await;

        let api = api(&server, 10);
        assert_eq!(
            api.list_catalog(None).await.unwrap_err(),
            UpstreamError::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );
        assert!(api.list_apm_status(None).await.unwrap_err().is_fatal());
        let window = TimeWindow::trailing(Duration::from_secs(60));
        assert!(matches!(
            api.search_spans(&window, None).await.unwrap_err(),
            UpstreamError::Transient(_)
        ));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/services/definitions");
                then.status(200).body("<html>");
            })
            .await;

        let err = api(&server, 10).list_catalog(None).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_without_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.any_request();
                then.status(200);
            })
            .await;

        let mut cfg = config(&server.base_url());
        cfg.api_key = Secret::default();
        let api = DatadogApi::new(&cfg, 10, Duration::from_secs(60)).unwrap();

        assert!(api.list_catalog(None).await.unwrap_err().is_fatal());
        mock.assert_calls_async(0).await;
    }

    #[tokio::test]
    async fn test_apm_status_aggregates_series() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/v1/query")
                    .query_param_exists("from")
                    .query_param_exists("to")
                    .query_param("query", APM_QUERY);
                then.status(200).json_body(serde_json::json!({
                    "status": "ok",
                    "series": [
                        {
                            "tag_set": ["service:checkout", "language:java"],
                            "pointlist": [[1700000000000.0, 100.0], [1700000060000.0, 20.0]]
                        },
                        {
                            "tag_set": ["service:checkout", "language:n/a"],
                            "pointlist": [[1700000120000.0, 5.0], [1700000180000.0, null]]
                        },
                        {
                            "tag_set": ["service:cart"],
                            "pointlist": [[1700000000000.0, 0.0]]
                        },
                        { "tag_set": ["env:prod"], "pointlist": [] }
                    ]
                }));
            })
            .await;

        let page = api(&server, 10).list_apm_status(None).await.unwrap();
        assert!(page.next_cursor.is_none());
        assert_eq!(page.items.len(), 2);

        let cart = &page.items[0];
        assert_eq!(cart.service, "cart");
        assert_eq!(cart.span_count, 0);
        assert_eq!(cart.last_seen, None);

        let checkout = &page.items[1];
        assert_eq!(checkout.language.as_deref(), Some("Java"));
        assert_eq!(checkout.span_count, 125);
        assert_eq!(checkout.last_seen, Some(1_700_000_120));
    }

    #[tokio::test]
    async fn test_metric_query_error_status_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/query");
                then.status(200)
                    .json_body(serde_json::json!({ "status": "error", "error": "bad query" }));
            })
            .await;

        let err = api(&server, 10).list_apm_status(None).await.unwrap_err();
        assert_eq!(
            err,
            UpstreamError::Rejected {
                status: 200,
                message: "bad query".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_search_spans_threads_cursor() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v2/spans/events/search")
                    .json_body_includes(r#"{"data":{"attributes":{"page":{"cursor":"abc","limit":10}}}}"#);
                then.status(200).json_body(serde_json::json!({
                    "data": [
                        { "id": "x1", "attributes": { "service": "checkout", "trace_id": "t1", "span_id": "s1", "parent_id": "0" } },
                        { "id": "x2", "attributes": { "service": "payments-db", "trace_id": "t1", "span_id": "s2", "parent_id": "s1" } },
                        { "id": "x3", "attributes": { "trace_id": "t2", "span_id": "s3" } }
                    ],
                    "meta": { "page": { "after": "def" } }
                }));
            })
            .await;

        let window = TimeWindow::trailing(Duration::from_secs(60));
        let page = api(&server, 10)
            .search_spans(&window, Some("abc"))
            .await
            .unwrap();
        mock.assert_async().await;

        assert_eq!(page.next_cursor.as_deref(), Some("def"));
        assert_eq!(page.items.len(), 2);
        assert!(page.items[0].is_root());
        assert_eq!(page.items[1].parent_id.as_deref(), Some("s1"));
    }
}
