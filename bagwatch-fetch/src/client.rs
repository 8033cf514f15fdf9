//! Authenticated request contract.
//!
//! [`TransportClient`] issues every marketplace call. It adds the baseline
//! headers, classifies non-2xx responses into [`ApiError`]s, and keeps the
//! [`QuotaCounters`] the watch loop reads for quota enforcement.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::counters::QuotaCounters;
use crate::error::{ApiError, BuildError};

/// Default marketplace API root.
pub const DEFAULT_BASE_URL: &str = "https://apptoogoodtogo.com/api/";

/// Default per-request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Fixed user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "TGTG/24.11.0 Dalvik/2.1.0 (Linux; U; Android 14; Pixel 7 Build/UQ1A.240105.004)";

/// Header carrying the stable device id.
const DEVICE_ID_HEADER: &str = "x-device-id";

/// Header carrying the device type.
const DEVICE_TYPE_HEADER: &str = "x-device-type";

// ============================================================================
// Configuration
// ============================================================================

/// Static settings of a transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// API root every endpoint is joined onto.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent header.
    pub user_agent: String,
    /// `Accept-Language` header.
    pub locale: String,
    /// Device type reported to the service (e.g. `ANDROID`).
    pub device_type: String,
    /// Stable device id.
    pub device_id: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            locale: "en-GB".to_string(),
            device_type: "ANDROID".to_string(),
            device_id: String::new(),
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A successful (2xx) response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// Endpoint the response came from.
    pub endpoint: String,
    /// HTTP status.
    pub status: u16,
    /// Decoded JSON body, `Null` when the body was empty.
    pub body: Value,
}

impl ApiResponse {
    /// Decodes the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidResponse` error if the body does not match `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        T::deserialize(&self.body)
            .map_err(|e| ApiError::invalid_response(&self.endpoint, self.status, e))
    }
}

// ============================================================================
// Transport Client
// ============================================================================

/// HTTP client for one user's marketplace calls.
#[derive(Debug)]
pub struct TransportClient {
    inner: Client,
    base_url: Url,
    config: TransportConfig,
    counters: QuotaCounters,
    counter_exempt: HashSet<String>,
}

impl TransportClient {
    /// Creates a new transport.
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is invalid or the HTTP client cannot be
    /// built.
    pub fn new(config: TransportConfig) -> Result<Self, BuildError> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        let inner = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner,
            base_url,
            config,
            counters: QuotaCounters::default(),
            counter_exempt: HashSet::new(),
        })
    }

    /// Excludes `endpoint` from the failure counter.
    ///
    /// Calls to it still count as requests but neither reset nor increment
    /// `consecutive_failures`.
    pub fn with_counter_exempt(mut self, endpoint: impl Into<String>) -> Self {
        self.counter_exempt.insert(endpoint.into());
        self
    }

    /// Returns the transport settings.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Replaces the device id sent with every request.
    pub fn set_device_id(&mut self, device_id: impl Into<String>) {
        self.config.device_id = device_id.into();
    }

    /// Current quota counters.
    pub fn counters(&self) -> QuotaCounters {
        self.counters
    }

    /// Resets `requests_since_refresh`.
    pub fn reset_requests(&mut self) {
        self.counters.requests_since_refresh = 0;
    }

    /// Resets `consecutive_failures`.
    pub fn reset_failures(&mut self) {
        self.counters.consecutive_failures = 0;
    }

    fn is_counted(&self, endpoint: &str) -> bool {
        !self.counter_exempt.contains(endpoint)
    }

    fn url(&self, endpoint: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| ApiError::bad_endpoint(endpoint, &e))
    }

    fn baseline_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        insert_header(&mut headers, header::USER_AGENT, &self.config.user_agent);
        insert_header(&mut headers, header::ACCEPT_LANGUAGE, &self.config.locale);
        insert_header(
            &mut headers,
            HeaderName::from_static(DEVICE_TYPE_HEADER),
            &self.config.device_type,
        );
        if !self.config.device_id.is_empty() {
            insert_header(
                &mut headers,
                HeaderName::from_static(DEVICE_ID_HEADER),
                &self.config.device_id,
            );
        }
        headers
    }

    fn record_failure(&mut self, counted: bool) {
        if counted {
            self.counters.record_failure();
        }
    }

    /// POSTs `body` to `endpoint`.
    ///
    /// `headers` are merged over the baseline headers. A `Null` body sends no
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns a `Transport` error on network failure and a classified error
    /// for any non-2xx status.
    #[instrument(skip(self, body, headers), fields(endpoint = %endpoint))]
    pub async fn post(
        &mut self,
        endpoint: &str,
        body: &Value,
        headers: HeaderMap,
    ) -> Result<ApiResponse, ApiError> {
        let counted = self.is_counted(endpoint);
        self.counters.record_request();

        let url = self.url(endpoint)?;
        let mut merged = self.baseline_headers();
        merged.extend(headers);

        let mut request = self.inner.post(url).headers(merged);
        if !body.is_null() {
            request = request.json(body);
        }

        debug!(requests = self.counters.requests_since_refresh, "POST request");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.record_failure(counted);
                warn!(error = %e, "Request failed");
                return Err(ApiError::transport(endpoint, &e));
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                self.record_failure(counted);
                warn!(error = %e, status, "Failed to read response body");
                return Err(ApiError::transport(endpoint, &e));
            }
        };
        debug!(status, len = text.len(), "Response received");

        if !(200..300).contains(&status) {
            self.record_failure(counted);
            let error = ApiError::from_status(status, endpoint, extract_challenge_url(&text));
            warn!(status, kind = %error.kind, "Request rejected");
            return Err(error);
        }

        if counted {
            self.counters.record_success();
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| ApiError::invalid_response(endpoint, status, e))?
        };

        Ok(ApiResponse {
            endpoint: endpoint.to_string(),
            status,
            body,
        })
    }
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => warn!(header = %name, "Skipping header with invalid value"),
    }
}

/// Pulls the challenge link out of a 403 body.
///
/// The service answers blocked requests with `{"url": "<challenge page>"}`.
pub fn extract_challenge_url(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("url")
        .and_then(Value::as_str)
        .filter(|url| url.starts_with("http"))
        .map(ToString::to_string)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TransportClient {
        TransportClient::new(TransportConfig {
            base_url: format!("{}/api", server.uri()),
            device_id: "device-123".to_string(),
            ..Default::default()
        })
        .unwrap()
        .with_counter_exempt("token/v1/refresh")
    }

    #[test]
    fn test_extract_challenge_url() {
        let body = r#"{"url": "https://geo.captcha.example/captcha/?id=1"}"#;
        assert_eq!(
            extract_challenge_url(body).as_deref(),
            Some("https://geo.captcha.example/captcha/?id=1")
        );
        assert_eq!(extract_challenge_url("blocked"), None);
        assert_eq!(extract_challenge_url(r#"{"url": 5}"#), None);
    }

    #[test]
    fn test_invalid_base_url() {
        let result = TransportClient::new(TransportConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(BuildError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_success_sends_baseline_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/item/v8/1"))
            .and(header_eq("x-device-id", "device-123"))
            .and(header_eq("accept-language", "en-GB"))
            .and(header_eq("x-extra", "yes"))
            .and(body_json(json!({"origin": null})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        let mut extra = HeaderMap::new();
        extra.insert("x-extra", HeaderValue::from_static("yes"));

        let response = client
            .post("item/v8/1", &json!({"origin": null}), extra)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body["ok"], true);
        assert_eq!(client.counters().requests_since_refresh, 1);
        assert_eq!(client.counters().consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/v5/logout"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        let response = client
            .post("auth/v5/logout", &Value::Null, HeaderMap::new())
            .await
            .unwrap();
        assert!(response.body.is_null());
    }

    #[tokio::test]
    async fn test_failures_counted_then_reset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/bad"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        for _ in 0..2 {
            let err = client.post("bad", &json!({}), HeaderMap::new()).await.unwrap_err();
            assert_eq!(err.kind, crate::ErrorKind::Connection);
            assert_eq!(err.status, Some(500));
            assert_eq!(err.endpoint, "bad");
        }
        assert_eq!(client.counters().consecutive_failures, 2);

        client.post("good", &json!({}), HeaderMap::new()).await.unwrap();
        assert_eq!(client.counters().consecutive_failures, 0);
        assert_eq!(client.counters().requests_since_refresh, 3);
    }

    #[tokio::test]
    async fn test_exempt_endpoint_leaves_failures_alone() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/bad"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token/v1/refresh"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/token/v1/refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        let _ = client.post("bad", &json!({}), HeaderMap::new()).await;
        assert_eq!(client.counters().consecutive_failures, 1);

        let err = client
            .post("token/v1/refresh", &json!({}), HeaderMap::new())
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(client.counters().consecutive_failures, 1);

        client
            .post("token/v1/refresh", &json!({}), HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(client.counters().consecutive_failures, 1);
        assert_eq!(client.counters().requests_since_refresh, 3);
    }

    #[tokio::test]
    async fn test_forbidden_carries_challenge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/discover/v1/bucket"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({"url": "https://geo.captcha.example/c?x=1"})),
            )
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        let err = client
            .post("discover/v1/bucket", &json!({}), HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Forbidden);
        assert_eq!(
            err.challenge_url.as_deref(),
            Some("https://geo.captcha.example/c?x=1")
        );
    }

    #[tokio::test]
    async fn test_undecodable_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/item/v8/2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let mut client = client_for(&server);
        let err = client
            .post("item/v8/2", &json!({}), HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_network_failure_is_transport_error() {
        let mut client = TransportClient::new(TransportConfig {
            base_url: "http://127.0.0.1:1/api/".to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();

        let err = client
            .post("item/v8/1", &json!({}), HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Transport);
        assert_eq!(err.status, None);
        assert_eq!(client.counters().consecutive_failures, 1);
    }

    #[test]
    fn test_parse_response() {
        #[derive(serde::Deserialize)]
        struct Polling {
            polling_id: String,
        }

        let response = ApiResponse {
            endpoint: "auth/v5/authByEmail".into(),
            status: 200,
            body: json!({"polling_id": "p-1"}),
        };
        let parsed: Polling = response.parse().unwrap();
        assert_eq!(parsed.polling_id, "p-1");

        let err = response.parse::<Vec<u8>>().unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::InvalidResponse);
    }
}
