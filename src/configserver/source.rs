//! Config-server property source for the configuration loader.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::configserver::fetcher::{PropertyFetcher, PropertySourceConfiguration};
use crate::configserver::flatten::flatten;
use crate::core::error::{BootstrapError, BootstrapResult};

/// A source the configuration loader can pull properties from
#[async_trait]
pub trait PropertySource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Structured read returning a flat key space
    async fn read(&self, cancel: &CancellationToken) -> BootstrapResult<Map<String, Value>>;

    /// Raw byte read for parser-backed sources
    async fn read_bytes(&self, cancel: &CancellationToken) -> BootstrapResult<Vec<u8>>;
}

/// Property source backed by the remote config server
pub struct ConfigServerSource {
    fetcher: Arc<PropertyFetcher>,
    params: Option<PropertySourceConfiguration>,
}

impl ConfigServerSource {
    pub fn new(fetcher: Arc<PropertyFetcher>) -> Self {
        Self {
            fetcher,
            params: None,
        }
    }

    /// Override the microservice name and/or config-server URL
    pub fn with_configuration(mut self, params: PropertySourceConfiguration) -> Self {
        self.params = Some(params);
        self
    }
}

#[async_trait]
impl PropertySource for ConfigServerSource {
    fn name(&self) -> &str {
        "configserver"
    }

    async fn read(&self, cancel: &CancellationToken) -> BootstrapResult<Map<String, Value>> {
        let source = self.fetcher.fetch(self.params.as_ref(), cancel).await?;
        Ok(flatten(&source))
    }

    async fn read_bytes(&self, _cancel: &CancellationToken) -> BootstrapResult<Vec<u8>> {
        Err(BootstrapError::unsupported(
            "configserver provider does not support this method",
        ))
    }
}
