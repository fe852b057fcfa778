// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTPS client for the bridge's v2 resource API.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::protocol::{BridgeApi, unwrap_envelope};
use crate::types::ResourceType;

/// Header carrying the per-installation application key.
const APPLICATION_KEY_HEADER: &str = "hue-application-key";

// ============================================================================
// BridgeConfig
// ============================================================================

/// Connection parameters for a bridge.
///
/// The bridge serves HTTPS with a self-signed certificate, which is accepted
/// by default.
///
/// # Examples
///
/// ```
/// use hue_switchboard::protocol::BridgeConfig;
/// use std::time::Duration;
///
/// let config = BridgeConfig::new("192.168.1.20", "app-key")
///     .with_timeout(Duration::from_secs(10));
///
/// assert_eq!(config.base_url(), "https://192.168.1.20/clip/v2");
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    host: String,
    application_key: String,
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl BridgeConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a configuration.
    ///
    /// `host` is an address such as `192.168.1.20`; an explicit
    /// `http://` or `https://` prefix is kept as given.
    #[must_use]
    pub fn new(host: impl Into<String>, application_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            application_key: application_key.into(),
            timeout: Self::DEFAULT_TIMEOUT,
            accept_invalid_certs: true,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Requires a certificate that validates against the system roots.
    #[must_use]
    pub fn with_strict_certificates(mut self) -> Self {
        self.accept_invalid_certs = false;
        self
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the application key.
    #[must_use]
    pub fn application_key(&self) -> &str {
        &self.application_key
    }

    /// Returns the timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds the API base URL.
    #[must_use]
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}/clip/v2")
        } else {
            format!("https://{host}/clip/v2")
        }
    }

    /// Creates an `HttpClient` from this configuration.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` for an empty host or key, or
    /// `ProtocolError::Http` if the HTTP client cannot be created.
    pub fn into_client(self) -> Result<HttpClient, ProtocolError> {
        if self.host.trim().is_empty() {
            return Err(ProtocolError::InvalidAddress("host is required".to_string()));
        }
        if self.application_key.trim().is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "application key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(HttpClient {
            base_url: self.base_url(),
            application_key: self.application_key,
            timeout: self.timeout,
            client,
        })
    }
}

// ============================================================================
// HttpClient
// ============================================================================

/// HTTP client for a bridge.
///
/// # Examples
///
/// ```no_run
/// use hue_switchboard::protocol::{BridgeApi, HttpClient};
/// use hue_switchboard::types::ResourceType;
///
/// # async fn example() -> Result<(), hue_switchboard::error::ProtocolError> {
/// let client = HttpClient::new("192.168.1.20", "app-key")?;
/// let scenes = client.get(ResourceType::Scene, None).await?;
/// println!("{} scenes", scenes.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    application_key: String,
    timeout: Duration,
    client: Client,
}

impl HttpClient {
    /// Creates a client with default settings.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(
        host: impl Into<String>,
        application_key: impl Into<String>,
    ) -> Result<Self, ProtocolError> {
        BridgeConfig::new(host, application_key).into_client()
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the URL for a resource collection or record.
    fn build_url(&self, resource: ResourceType, id: Option<&str>) -> String {
        match id {
            Some(id) => format!(
                "{}/resource/{}/{}",
                self.base_url,
                resource.path(),
                urlencoding::encode(id)
            ),
            None => format!("{}/resource/{}", self.base_url, resource.path()),
        }
    }

    fn map_send_error(&self, err: reqwest::Error) -> ProtocolError {
        if err.is_timeout() {
            ProtocolError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
        } else if err.is_connect() {
            ProtocolError::ConnectionFailed(err.to_string())
        } else {
            ProtocolError::Http(err)
        }
    }

    async fn execute(
        &self,
        request: RequestBuilder,
        resource: ResourceType,
        id: Option<&str>,
    ) -> Result<Vec<Value>, ProtocolError> {
        let response = request
            .header(APPLICATION_KEY_HEADER, &self.application_key)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        tracing::debug!(status = status.as_u16(), body = %body, "Received bridge response");

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProtocolError::AuthenticationFailed);
            }
            StatusCode::NOT_FOUND if id.is_some() => {
                return Err(ProtocolError::ResourceNotFound {
                    resource: resource.path().to_string(),
                    id: id.unwrap_or_default().to_string(),
                });
            }
            s if !s.is_success() => {
                return Err(ProtocolError::Api {
                    status: s.as_u16(),
                    body,
                });
            }
            _ => {}
        }

        unwrap_envelope(&body)
    }
}

impl BridgeApi for HttpClient {
    async fn get(
        &self,
        resource: ResourceType,
        id: Option<&str>,
    ) -> Result<Vec<Value>, ProtocolError> {
        let url = self.build_url(resource, id);
        tracing::debug!(url = %url, "GET");
        self.execute(self.client.get(&url), resource, id).await
    }

    async fn put(
        &self,
        resource: ResourceType,
        id: &str,
        body: &Value,
    ) -> Result<Vec<Value>, ProtocolError> {
        let url = self.build_url(resource, Some(id));
        tracing::debug!(url = %url, body = %body, "PUT");
        self.execute(self.client.put(&url).json(body), resource, Some(id))
            .await
    }

    async fn post(
        &self,
        resource: ResourceType,
        body: &Value,
    ) -> Result<Vec<Value>, ProtocolError> {
        let url = self.build_url(resource, None);
        tracing::debug!(url = %url, body = %body, "POST");
        self.execute(self.client.post(&url).json(body), resource, None)
            .await
    }

    async fn delete(&self, resource: ResourceType, id: &str) -> Result<bool, ProtocolError> {
        let url = self.build_url(resource, Some(id));
        tracing::debug!(url = %url, "DELETE");
        self.execute(self.client.delete(&url), resource, Some(id))
            .await
            .map(|_| true)
    }
}
