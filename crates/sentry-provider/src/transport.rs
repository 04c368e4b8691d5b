//! HTTP transport
//!
//! The [`Transport`] trait is the single seam between the client and the
//! network. [`UreqTransport`] talks to a real server; [`MockTransport`]
//! serves scripted responses from memory and records every request.
//!
//! # Testing
//!
//! ```
//! use sentry_provider::transport::{HttpResponse, Method, MockTransport};
//! use serde_json::json;
//!
//! let mock = MockTransport::new();
//! mock.on(Method::Get, "0/teams/acme/core/", HttpResponse::json(200, json!({"slug": "core"})));
//! assert_eq!(mock.write_count(), 0);
//! ```

use reconcile::{Error, Result};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use url::Url;

/// HTTP methods used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether the method changes remote state.
    pub fn is_write(self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

/// A response with the parts the client reads.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    /// Raw `Link` header
    pub link: Option<String>,
    /// Parsed `Retry-After` header
    pub retry_after: Option<Duration>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            link: None,
            retry_after: None,
        }
    }

    /// Response with a JSON body.
    pub fn json(status: u16, body: Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Empty response, as returned by deletes.
    pub fn empty(status: u16) -> Self {
        Self::new(status, "")
    }

    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and returns the response, whatever its status.
///
/// Implementations only fail when no response was received.
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Transport over a blocking ureq agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Create a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = request.url.as_str();
        let result = match (request.method, &request.body) {
            (Method::Get, _) => with_headers(self.agent.get(url), &request.headers).call(),
            (Method::Delete, _) => with_headers(self.agent.delete(url), &request.headers).call(),
            (Method::Post, Some(body)) => {
                with_headers(self.agent.post(url), &request.headers).send_json(body)
            }
            (Method::Post, None) => {
                with_headers(self.agent.post(url), &request.headers).send_empty()
            }
            (Method::Put, Some(body)) => {
                with_headers(self.agent.put(url), &request.headers).send_json(body)
            }
            (Method::Put, None) => with_headers(self.agent.put(url), &request.headers).send_empty(),
        };

        let mut response = result.map_err(map_ureq_error)?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let link = header("link");
        let retry_after = header("retry-after").as_deref().and_then(parse_retry_after);
        let status = response.status().as_u16();

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(map_ureq_error)?;

        Ok(HttpResponse {
            status,
            body,
            link,
            retry_after,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn map_ureq_error(err: ureq::Error) -> Error {
    match err {
        ureq::Error::Timeout(_) => Error::DeadlineExceeded,
        other => Error::Transport(other.to_string()),
    }
}

/// Parse a `Retry-After` value given in seconds.
///
/// HTTP-date values are ignored; the backoff policy applies instead.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Route key: method plus the path below `/api/`, with the query if any.
type Route = (Method, String);

#[derive(Debug, Default)]
struct MockState {
    routes: HashMap<Route, VecDeque<HttpResponse>>,
    requests: Vec<HttpRequest>,
}

/// In-memory transport for tests.
///
/// Responses queued for a route are served in order; the last one keeps
/// being served once the queue is down to it. Unrouted requests get a 404.
/// Clones share the same routes and request log.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `response` for `method` on `path` (relative to `/api/`).
    pub fn on(&self, method: Method, path: &str, response: HttpResponse) -> &Self {
        self.lock()
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests that change remote state.
    pub fn write_count(&self) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method.is_write())
            .count()
    }

    /// Number of requests sent to one route.
    pub fn request_count(&self, method: Method, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && route_path(&r.url) == path)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut state = self.lock();
        state.requests.push(request.clone());

        let key = (request.method, route_path(&request.url));
        let response = match state.routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        Ok(response.unwrap_or_else(|| {
            HttpResponse::json(
                404,
                serde_json::json!({"detail": "The requested resource does not exist"}),
            )
        }))
    }
}

fn route_path(url: &Url) -> String {
    let path = url.path();
    let relative = path.find("/api/").map_or(path, |i| &path[i + 5..]);
    match url.query() {
        Some(query) => format!("{relative}?{query}"),
        None => relative.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(method: Method, url: &str) -> HttpRequest {
        HttpRequest {
            method,
            url: Url::parse(url).unwrap(),
            headers: Vec::new(),
            body: None,
        }
    }

    #[test]
    fn test_mock_serves_queue_then_sticks_to_last() {
        let mock = MockTransport::new();
        mock.on(Method::Get, "0/teams/acme/core/", HttpResponse::empty(429))
            .on(Method::Get, "0/teams/acme/core/", HttpResponse::json(200, json!({})));

        let req = request(Method::Get, "https://sentry.io/api/0/teams/acme/core/");
        assert_eq!(mock.send(&req).unwrap().status, 429);
        assert_eq!(mock.send(&req).unwrap().status, 200);
        assert_eq!(mock.send(&req).unwrap().status, 200);
        assert_eq!(mock.request_count(Method::Get, "0/teams/acme/core/"), 3);
    }

    #[test]
    fn test_mock_unrouted_is_not_found() {
        let mock = MockTransport::new();
        let req = request(Method::Delete, "https://sentry.io/api/0/teams/acme/x/");
        assert_eq!(mock.send(&req).unwrap().status, 404);
        assert_eq!(mock.write_count(), 1);
    }

    #[test]
    fn test_mock_routes_include_query() {
        let mock = MockTransport::new();
        mock.on(
            Method::Get,
            "0/organizations/acme/teams/?cursor=0%3A100%3A0",
            HttpResponse::json(200, json!([])),
        );
        let req = request(
            Method::Get,
            "https://sentry.io/api/0/organizations/acme/teams/?cursor=0%3A100%3A0",
        );
        assert_eq!(mock.send(&req).unwrap().status, 200);
    }

    #[test]
    fn test_route_path_with_self_hosted_prefix() {
        let url = Url::parse("https://example.com/sentry/api/0/projects/acme/web/").unwrap();
        assert_eq!(route_path(&url), "0/projects/acme/web/");
    }

    #[test]
    fn test_timeouts_become_deadline_exceeded() {
        for timeout in [ureq::Timeout::Global, ureq::Timeout::RecvResponse] {
            let err = map_ureq_error(ureq::Error::Timeout(timeout));
            assert!(matches!(err, Error::DeadlineExceeded));
            assert!(!err.is_retryable());
        }

        let err = map_ureq_error(ureq::Error::ConnectionFailed);
        assert!(matches!(err, Error::Transport(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 0.5 "), Some(Duration::from_millis(500)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-1"), None);
    }

    #[test]
    fn test_method_is_write() {
        assert!(!Method::Get.is_write());
        assert!(Method::Post.is_write());
        assert!(Method::Delete.is_write());
        assert_eq!(Method::Put.to_string(), "PUT");
    }
}
