//! Network boundary towards the route control plane.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use url::Url;

use crate::auth::TokenProvider;
use crate::core::error::{BootstrapError, BootstrapResult};
use crate::routing::gateway::GatewayName;

/// Delivers a rendered registration document for one gateway
#[async_trait]
pub trait RoutePusher: Send + Sync {
    async fn push(&self, gateway: &GatewayName, document: &Value) -> BootstrapResult<()>;
}

/// Pusher that POSTs documents to `{endpoint}/{gateway}`
pub struct HttpRoutePusher {
    client: reqwest::Client,
    endpoint: Url,
    tokens: Arc<dyn TokenProvider>,
    cancel: CancellationToken,
}

impl HttpRoutePusher {
    pub fn new(
        client: reqwest::Client,
        endpoint: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> BootstrapResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            BootstrapError::config(format!("Invalid control-plane endpoint '{}': {}", endpoint, e))
        })?;

        Ok(Self {
            client,
            endpoint,
            tokens,
            cancel: CancellationToken::new(),
        })
    }

    /// Abort in-flight pushes when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn gateway_url(&self, gateway: &GatewayName) -> String {
        format!("{}/{}", self.endpoint.as_str().trim_end_matches('/'), gateway)
    }
}

#[async_trait]
impl RoutePusher for HttpRoutePusher {
    async fn push(&self, gateway: &GatewayName, document: &Value) -> BootstrapResult<()> {
        let token = self.tokens.get_token(&self.cancel).await?;
        let url = self.gateway_url(gateway);

        let mut request = self.client.post(&url).json(document);
        if !token.is_empty() {
            request = request.bearer_auth(&token);
        }

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(BootstrapError::cancelled("route push"));
            }
            result = request.send() => result.map_err(|e| {
                error!(gateway = %gateway, url = %url, error = %e, "Failed to push routes");
                BootstrapError::transport(format!("push to {} failed: {}", url, e))
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            error!(gateway = %gateway, status = status.as_u16(), "Control plane rejected routes");
            return Err(BootstrapError::http_status(
                status.as_u16(),
                format!("control plane returned {} for {}", status, url),
            ));
        }

        debug!(gateway = %gateway, url = %url, "Pushed routes");
        Ok(())
    }
}
