//! # Remote Property Fetcher
//!
//! Loads the property overlay of one microservice from the config server.
//!
//! ## Pipeline
//! ```text
//! resolve name + url (params > process config > default)
//!     -> bearer token from TokenProvider
//!     -> GET {url}/{name}/default
//!     -> decode ConfigServerEnvelope
//!     -> propertySources[0].source
//! ```
//!
//! Every call performs a fresh round trip. There is no cache and no retry at
//! this layer; both belong to the injected HTTP client or the caller.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::auth::TokenProvider;
use crate::configserver::envelope::ConfigServerEnvelope;
use crate::core::config::{select_url, ConfigAccessor, CONFIG_SERVER_URL_KEY, MICROSERVICE_NAME_KEY};
use crate::core::error::{BootstrapError, BootstrapResult};

pub const DEFAULT_CONFIG_SERVER_HTTP_URL: &str = "http://config-server:8080";
pub const DEFAULT_CONFIG_SERVER_HTTPS_URL: &str = "https://config-server:8443";

/// Profile requested from the config server
pub const DEFAULT_PROFILE: &str = "default";

/// Optional per-source overrides; empty fields fall back to process config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySourceConfiguration {
    #[serde(default)]
    pub microservice_name: String,
    #[serde(default)]
    pub config_server_url: String,
}

impl PropertySourceConfiguration {
    pub fn new<N: Into<String>, U: Into<String>>(microservice_name: N, config_server_url: U) -> Self {
        Self {
            microservice_name: microservice_name.into(),
            config_server_url: config_server_url.into(),
        }
    }
}

/// Resolved coordinates of one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub microservice_name: String,
    pub config_server_url: String,
}

impl FetchTarget {
    /// Full request URL: `{config_server_url}/{microservice_name}/default`
    pub fn request_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.config_server_url.trim_end_matches('/'),
            self.microservice_name,
            DEFAULT_PROFILE
        )
    }
}

/// Fetches property overlays from the config server
pub struct PropertyFetcher {
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    properties: Arc<dyn ConfigAccessor>,
    tls_enabled: bool,
}

impl PropertyFetcher {
    /// Create a fetcher around an injected client, token provider and process config
    pub fn new(
        client: reqwest::Client,
        tokens: Arc<dyn TokenProvider>,
        properties: Arc<dyn ConfigAccessor>,
    ) -> Self {
        Self {
            client,
            tokens,
            properties,
            tls_enabled: false,
        }
    }

    /// Select the HTTPS default URL when the deployment runs with internal TLS
    pub fn with_tls(mut self, enabled: bool) -> Self {
        self.tls_enabled = enabled;
        self
    }

    /// Resolve microservice name and config-server URL
    ///
    /// Returns `ConfigMisuse` when no microservice name is configured anywhere.
    /// That error is fatal: nothing is fetched and startup is expected to stop.
    pub fn resolve_target(
        &self,
        params: Option<&PropertySourceConfiguration>,
    ) -> BootstrapResult<FetchTarget> {
        let default_url = select_url(
            self.tls_enabled,
            DEFAULT_CONFIG_SERVER_HTTP_URL,
            DEFAULT_CONFIG_SERVER_HTTPS_URL,
        );

        let mut config_server_url = self
            .properties
            .get_or_default_string(CONFIG_SERVER_URL_KEY, default_url);
        let mut microservice_name = self
            .properties
            .get_or_default_string(MICROSERVICE_NAME_KEY, "");

        if let Some(params) = params {
            if !params.microservice_name.is_empty() {
                microservice_name = params.microservice_name.clone();
            }
            if !params.config_server_url.is_empty() {
                config_server_url = params.config_server_url.clone();
            }
        }

        if microservice_name.trim().is_empty() {
            return Err(BootstrapError::misuse(format!(
                "You did not specify the mandatory '{}' property. Set it in application.yaml, \
                 pass it through the MICROSERVICE_NAME environment variable or use \
                 PropertySourceConfiguration",
                MICROSERVICE_NAME_KEY
            )));
        }

        Ok(FetchTarget {
            microservice_name,
            config_server_url,
        })
    }

    /// Fetch the primary property source, unflattened
    pub async fn fetch(
        &self,
        params: Option<&PropertySourceConfiguration>,
        cancel: &CancellationToken,
    ) -> BootstrapResult<Map<String, Value>> {
        let target = self.resolve_target(params)?;

        let token = self.tokens.get_token(cancel).await.map_err(|e| match e {
            BootstrapError::Cancelled { .. } => e,
            other => BootstrapError::auth(format!(
                "could not get token to load properties from config-server: {}",
                other
            )),
        })?;

        let url = target.request_url();
        let mut request = self.client.get(&url);
        if !token.is_empty() {
            request = request.bearer_auth(&token);
        }

        debug!(url = %url, authenticated = !token.is_empty(), "Requesting properties from config-server");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(BootstrapError::cancelled("config-server request"));
            }
            result = request.send() => result.map_err(|e| {
                error!(url = %url, error = %e, "Failed send request to config-server");
                BootstrapError::transport(format!("request to {} failed: {}", url, e))
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            error!(url = %url, status = status.as_u16(), "Config-server answered with an error status");
            return Err(BootstrapError::http_status(
                status.as_u16(),
                format!("config-server returned {} for {}", status, url),
            ));
        }

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(BootstrapError::cancelled("config-server response body"));
            }
            result = response.bytes() => result.map_err(|e| {
                error!(url = %url, error = %e, "Failed to read response body");
                BootstrapError::transport(format!("failed to read body from {}: {}", url, e))
            })?,
        };

        let envelope = ConfigServerEnvelope::from_slice(&body).map_err(|e| {
            error!(url = %url, error = %e, "Failed to unmarshal response body");
            e
        })?;

        let source = envelope.into_primary_source();
        info!(
            microservice = %target.microservice_name,
            keys = source.len(),
            "Loaded properties from config-server"
        );
        Ok(source)
    }
}
