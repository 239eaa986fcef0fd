use std::{env, time::Duration};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Where the pharmacy backend lives and how to talk to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Anti-forgery token sent on every mutating request
    pub csrf_token: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            csrf_token: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Reads `FARMACIA_BASE_URL`, `FARMACIA_CSRF_TOKEN` and
    /// `FARMACIA_TIMEOUT_MS`, falling back to defaults.
    pub fn from_env() -> Self {
        let base_url = env::var("FARMACIA_BASE_URL").unwrap_or(DEFAULT_BASE_URL.to_string());
        let csrf_token = env::var("FARMACIA_CSRF_TOKEN").ok().filter(|t| !t.trim().is_empty());
        let timeout_ms = env::var("FARMACIA_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Self {
            base_url,
            csrf_token,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = ClientConfig::new("http://farmacia.local/")
            .with_csrf_token("abc")
            .with_timeout(Duration::from_secs(2));

        assert_eq!(config.base_url, "http://farmacia.local/");
        assert_eq!(config.csrf_token.as_deref(), Some("abc"));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(
            ClientConfig::new("x").timeout,
            Duration::from_millis(DEFAULT_TIMEOUT_MS)
        );
    }
}
