//! WebDAV implementation of the remote transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use crate::config::WebDavConfig;
use crate::error::{Error, Result};
use crate::remote::RemoteTransport;
use crate::util::compact_text;

/// Name of the single remote resource holding the snapshot document.
const SNAPSHOT_RESOURCE: &str = "codelet.json";

/// Bound on every remote call; a stalled request classifies as unreachable.
const REMOTE_HTTP_TIMEOUT_SECS: u64 = 15;

/// Transport speaking plain WebDAV with HTTP basic auth.
#[derive(Debug, Clone)]
pub struct WebDavTransport {
    config: WebDavConfig,
    client: reqwest::Client,
}

impl WebDavTransport {
    /// Build a transport for the given remote configuration.
    pub fn new(config: WebDavConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REMOTE_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|error| Error::Unreachable(error.to_string()))?;
        Ok(Self { config, client })
    }

    fn resource_url(&self) -> String {
        format!("{}/{SNAPSHOT_RESOURCE}", self.config.base_url())
    }

    fn request(&self, method: Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.config.username, Some(&self.config.password))
    }
}

#[async_trait]
impl RemoteTransport for WebDavTransport {
    async fn authenticate(&self) -> Result<()> {
        let response = self
            .request(Method::OPTIONS, self.config.base_url())
            .send()
            .await
            .map_err(|error| classify_request_error(&error))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(url = %self.config.base_url(), "webdav authentication ok");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(read_status_error(status, &body))
        }
    }

    async fn read_snapshot(&self) -> Result<Option<String>> {
        let response = self
            .request(Method::GET, self.resource_url())
            .send()
            .await
            .map_err(|error| classify_request_error(&error))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!("remote snapshot absent; first sync");
            return Ok(None);
        }
        if status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|error| classify_request_error(&error))?;
            return Ok(Some(body));
        }

        let body = response.text().await.unwrap_or_default();
        Err(read_status_error(status, &body))
    }

    async fn write_snapshot(&self, body: &str) -> Result<()> {
        let response = self
            .request(Method::PUT, self.resource_url())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_owned())
            .send()
            .await
            .map_err(|error| classify_request_error(&error))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(bytes = body.len(), "remote snapshot replaced");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(write_status_error(status, &body))
        }
    }

    fn validate(&self) -> bool {
        self.config.is_valid()
    }
}

/// Timeouts, DNS, and connection failures are all retryable-unreachable.
fn classify_request_error(error: &reqwest::Error) -> Error {
    Error::Unreachable(error.to_string())
}

fn read_status_error(status: StatusCode, body: &str) -> Error {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Error::Auth(format!("HTTP {}", status.as_u16()))
    } else {
        Error::Unreachable(format!(
            "HTTP {}: {}",
            status.as_u16(),
            compact_text(body)
        ))
    }
}

/// PUT-specific mapping: the remote reports a concurrent replacement as a
/// conflict status, which drives the engine's single-retry policy.
fn write_status_error(status: StatusCode, body: &str) -> Error {
    if status == StatusCode::CONFLICT || status == StatusCode::PRECONDITION_FAILED {
        Error::RemoteConflict
    } else {
        read_status_error(status, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> WebDavTransport {
        WebDavTransport::new(WebDavConfig {
            username: "user".to_string(),
            password: "secret".to_string(),
            url: "https://dav.example.com/backup/".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_resource_url_appends_snapshot_name() {
        assert_eq!(
            transport().resource_url(),
            "https://dav.example.com/backup/codelet.json"
        );
    }

    #[test]
    fn test_validate_checks_config_shape() {
        assert!(transport().validate());

        let incomplete = WebDavTransport::new(WebDavConfig::default()).unwrap();
        assert!(!incomplete.validate());
    }

    #[test]
    fn test_read_status_mapping() {
        assert!(matches!(
            read_status_error(StatusCode::UNAUTHORIZED, ""),
            Error::Auth(_)
        ));
        assert!(matches!(
            read_status_error(StatusCode::FORBIDDEN, ""),
            Error::Auth(_)
        ));
        assert!(matches!(
            read_status_error(StatusCode::BAD_GATEWAY, "upstream down"),
            Error::Unreachable(_)
        ));
    }

    #[test]
    fn test_write_status_mapping() {
        assert!(matches!(
            write_status_error(StatusCode::CONFLICT, ""),
            Error::RemoteConflict
        ));
        assert!(matches!(
            write_status_error(StatusCode::PRECONDITION_FAILED, ""),
            Error::RemoteConflict
        ));
        assert!(matches!(
            write_status_error(StatusCode::UNAUTHORIZED, ""),
            Error::Auth(_)
        ));
    }
}
