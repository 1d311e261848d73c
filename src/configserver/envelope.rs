//! Config-server response envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::core::error::BootstrapResult;

/// Body of `GET {config-server}/{microservice}/{profile}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigServerEnvelope {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profiles: Vec<String>,
    #[serde(default)]
    pub property_sources: Vec<PropertySourceEntry>,
}

/// One overlay inside the envelope, most specific first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySourceEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: Map<String, Value>,
}

impl ConfigServerEnvelope {
    /// Decode an envelope from a raw response body
    pub fn from_slice(body: &[u8]) -> BootstrapResult<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Take the most specific property source
    ///
    /// Later entries are lower-priority overlays and are discarded. An envelope
    /// without property sources yields an empty map.
    pub fn into_primary_source(self) -> Map<String, Value> {
        match self.property_sources.into_iter().next() {
            Some(entry) => entry.source,
            None => {
                warn!(envelope = %self.name, "PropertySources is empty for '{}'", self.name);
                Map::new()
            }
        }
    }
}
