//! Provider configuration
//!
//! Built once, validated at construction, then passed by reference to the
//! client. Values come from explicit input first, then from the environment,
//! then from the documented defaults.

use reconcile::{Error, Result, RetryConfig};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Public multi-tenant endpoint.
pub const DEFAULT_BASE_URL: &str = "https://sentry.io/api/";

/// Environment variables consulted for the token, in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["SENTRY_AUTH_TOKEN", "SENTRY_TOKEN"];

/// Environment variable consulted for the base URL.
pub const BASE_URL_ENV_VAR: &str = "SENTRY_BASE_URL";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Validated connection settings for the Sentry API.
#[derive(Clone)]
pub struct ProviderConfig {
    token: String,
    base_url: Url,
    user_agent: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl ProviderConfig {
    /// Start building a configuration.
    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder::default()
    }

    /// Bearer token sent with every request.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// API root, always ending in `/api/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Backoff policy for throttled requests.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Builder for [`ProviderConfig`].
#[derive(Debug, Default, Clone)]
pub struct ProviderConfigBuilder {
    token: Option<String>,
    base_url: Option<String>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
    retry: Option<RetryConfig>,
}

impl ProviderConfigBuilder {
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Validate and build, falling back to the process environment.
    pub fn build(self) -> Result<ProviderConfig> {
        self.build_with_env(|name| std::env::var(name).ok())
    }

    /// Validate and build, resolving fallbacks through `env`.
    ///
    /// Empty values count as unset at every level.
    pub fn build_with_env<E>(self, env: E) -> Result<ProviderConfig>
    where
        E: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let token = non_empty(self.token)
            .or_else(|| TOKEN_ENV_VARS.iter().find_map(|name| lookup(name)))
            .ok_or_else(|| {
                Error::Config(format!(
                    "no auth token: pass one explicitly or set {}",
                    TOKEN_ENV_VARS.join(" or ")
                ))
            })?;

        let raw_base = non_empty(self.base_url)
            .or_else(|| lookup(BASE_URL_ENV_VAR))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url(&raw_base)?;

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }

        Ok(ProviderConfig {
            token: token.trim().to_string(),
            base_url,
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
            timeout,
            retry: self.retry.unwrap_or_default(),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_user_agent() -> String {
    format!("sentryctl/{}", env!("CARGO_PKG_VERSION"))
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("invalid base URL {raw:?}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "base URL {raw:?} must use http or https"
        )));
    }
    if !url.path().ends_with("/api/") {
        return Err(Error::Config(format!(
            "base URL {raw:?} must end with /api/ (e.g. {DEFAULT_BASE_URL})"
        )));
    }

    Ok(url)
}
