//! Authenticated API client
//!
//! Every request carries the bearer token and user agent from
//! [`ProviderConfig`]. Throttled requests are retried according to the
//! configured [`RetryConfig`](reconcile::RetryConfig); every other non-2xx
//! status is surfaced as [`Error::Remote`] without retrying.

use crate::config::ProviderConfig;
use crate::pagination;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport, UreqTransport};
use reconcile::{CallContext, Cursor, Error, LogCallback, Page, Result, with_retry};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

/// API version prefix below the base URL.
const API_VERSION: &str = "0";

/// Client for the Sentry web API.
pub struct SentryClient {
    config: ProviderConfig,
    transport: Box<dyn Transport>,
}

impl SentryClient {
    /// Client talking to the configured server.
    pub fn new(config: ProviderConfig) -> Self {
        let transport = UreqTransport::new(config.timeout());
        Self::with_transport(config, transport)
    }

    /// Client sending through a custom transport.
    pub fn with_transport(config: ProviderConfig, transport: impl Transport + 'static) -> Self {
        Self {
            config,
            transport: Box::new(transport),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Endpoint URL for `segments`, e.g. `["teams", "acme", "core"]` gives
    /// `<base>/0/teams/acme/core/`. Segments are percent-encoded.
    pub fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.config.base_url().clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config("base URL cannot have a path".into()))?
            .pop_if_empty()
            .push(API_VERSION)
            .extend(segments)
            .push("");
        Ok(url)
    }

    /// Fetch one object; a 404 is `Ok(None)`.
    pub fn get<T: DeserializeOwned>(&self, ctx: &CallContext, url: &Url) -> Result<Option<T>> {
        let response = self.execute(ctx, Method::Get, url, None)?;
        if response.status == 404 {
            return Ok(None);
        }
        decode(&check(response)?).map(Some)
    }

    /// Fetch one page of a listing.
    pub fn list_page<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &Url,
        cursor: Option<&Cursor>,
    ) -> Result<Page<T>> {
        let mut url = url.clone();
        if let Some(cursor) = cursor {
            url.query_pairs_mut().append_pair("cursor", &cursor.token);
        }

        let response = check(self.execute(ctx, Method::Get, &url, None)?)?;
        let items = decode(&response)?;
        Ok(Page {
            items,
            next: pagination::next_cursor(response.link.as_deref()),
        })
    }

    /// POST a JSON body and decode the response.
    pub fn post<B, T>(&self, ctx: &CallContext, url: &Url, body: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        decode(&check(self.execute(ctx, Method::Post, url, Some(body))?)?)
    }

    /// PUT a JSON body and decode the response.
    pub fn put<B, T>(&self, ctx: &CallContext, url: &Url, body: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        decode(&check(self.execute(ctx, Method::Put, url, Some(body))?)?)
    }

    /// Delete an object; one that is already gone counts as deleted.
    pub fn delete(&self, ctx: &CallContext, url: &Url) -> Result<()> {
        let response = self.execute(ctx, Method::Delete, url, None)?;
        if response.status == 404 {
            log::debug!("DELETE {url}: already gone");
            return Ok(());
        }
        check(response).map(|_| ())
    }

    /// Send a request and require a 2xx status, ignoring the body.
    pub fn send(
        &self,
        ctx: &CallContext,
        method: Method,
        url: &Url,
        body: Option<serde_json::Value>,
    ) -> Result<HttpResponse> {
        check(self.execute(ctx, method, url, body)?)
    }

    /// Send with rate-limit retries. Returns any non-429 response.
    fn execute(
        &self,
        ctx: &CallContext,
        method: Method,
        url: &Url,
        body: Option<serde_json::Value>,
    ) -> Result<HttpResponse> {
        let request = HttpRequest {
            method,
            url: url.clone(),
            headers: vec![
                (
                    "Authorization".to_string(),
                    format!("Bearer {}", self.config.token()),
                ),
                ("User-Agent".to_string(), self.config.user_agent().to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
            body,
        };

        with_retry(self.config.retry(), ctx, Some(&LogCallback), || {
            log::debug!("{method} {url}");
            let response = self.transport.send(&request)?;
            if response.status == 429 {
                return Err(Error::RateLimited {
                    retry_after: response.retry_after,
                });
            }
            Ok(response)
        })
    }
}

fn check(response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(Error::remote(response.status, response.body))
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_str(&response.body).map_err(|e| {
        Error::UnexpectedShape(format!("{e} in response body {}", truncate(&response.body)))
    })
}

fn truncate(body: &str) -> &str {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body;
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
