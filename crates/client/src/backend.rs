use std::{fmt, sync::Arc};

use farmacia_domain::{
    inputs::ErrorBody,
    ports::{CredentialSupplier, StaticCredential},
    Error,
};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;

pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// reqwest-backed adapter for every backend port.
///
/// Paths follow the backend's trailing-slash convention. Mutating requests
/// carry the CSRF token from the credential supplier.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialSupplier>,
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            credentials: Arc::new(StaticCredential(config.csrf_token.clone())),
        })
    }

    /// Replace the startup token with a supplier that is asked on every request.
    pub fn with_credentials(mut self, credentials: impl CredentialSupplier + 'static) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/{segments..}/`, each segment percent-encoded.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = Url::parse(&self.base_url).map_err(|e| Error::Malformed {
            message: format!("invalid base url {}: {}", self.base_url, e),
        })?;

        url.path_segments_mut()
            .map_err(|_| Error::Malformed {
                message: format!("base url {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments)
            .push("");

        Ok(url)
    }

    pub(crate) fn get(&self, url: Url) -> RequestBuilder {
        self.http.get(url)
    }

    pub(crate) fn post(&self, url: Url, idempotency_key: Option<&str>) -> RequestBuilder {
        let mut request = self.http.post(url);
        if let Some(token) = self.credentials.csrf_token() {
            request = request.header(CSRF_HEADER, token);
        }
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }
        request
    }
}

pub(crate) async fn send(request: RequestBuilder) -> Result<Response, Error> {
    request.send().await.map_err(transport)
}

pub(crate) fn transport(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::RequestTimedOut
    } else if e.is_decode() {
        Error::Malformed {
            message: e.to_string(),
        }
    } else {
        Error::Network {
            message: e.to_string(),
        }
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
    let bytes = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Malformed {
        message: e.to_string(),
    })
}

/// Verbatim `error` field of a failed response, if it has one.
pub(crate) async fn error_message(response: Response) -> Option<String> {
    let bytes = response.bytes().await.ok()?;
    serde_json::from_slice::<ErrorBody>(&bytes)
        .ok()?
        .error
        .filter(|message| !message.trim().is_empty())
}

/// Non-2xx response turned into `Error::Server`, falling back to `fallback`
/// when the body has no usable message.
pub(crate) async fn server_error(response: Response, fallback: impl FnOnce(StatusCode) -> String) -> Error {
    let status = response.status();
    let message = error_message(response)
        .await
        .unwrap_or_else(|| fallback(status));

    tracing::warn!("Backend answered {}: {}", status.as_u16(), message);
    Error::Server {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(&ClientConfig::new(base)).unwrap()
    }

    #[test]
    fn endpoints_keep_trailing_slash() {
        let url = backend("http://localhost:8000").endpoint(&["api", "entradas", "guardar"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/entradas/guardar/");

        let url = backend("http://localhost:8000/farmacia/").endpoint(&["salidas"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/farmacia/salidas/");
    }

    #[test]
    fn path_segments_are_encoded() {
        let url = backend("http://localhost:8000")
            .endpoint(&["api", "get_paciente_by_name", "Juan Pérez/2"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/get_paciente_by_name/Juan%20P%C3%A9rez%2F2/"
        );
    }

    #[test]
    fn bad_base_url_is_reported() {
        assert!(matches!(
            backend("not a url").endpoint(&["x"]),
            Err(Error::Malformed { .. })
        ));
    }
}
