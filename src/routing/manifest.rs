//! Route manifests: YAML files declaring the routes of a microservice.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::core::error::{BootstrapError, BootstrapResult};
use crate::routing::route::Route;

/// Key holding the path of the route manifest
pub const ROUTES_MANIFEST_KEY: &str = "routes.manifest";

/// ```yaml
/// routes:
///   - from: /api/v1/orders
///     to: http://order-service:8080/api/v1/orders
///     type: public
///     timeout: 30s
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteManifest {
    #[serde(default)]
    pub routes: Vec<Route>,
}

impl RouteManifest {
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> BootstrapResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            BootstrapError::config(format!(
                "Failed to read route manifest {}: {}",
                path.display(),
                e
            ))
        })?;

        let manifest = Self::from_yaml_str(&content)?;
        debug!(path = %path.display(), routes = manifest.routes.len(), "Loaded route manifest");
        Ok(manifest)
    }

    pub fn from_yaml_str(content: &str) -> BootstrapResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| BootstrapError::config(format!("Failed to parse route manifest: {}", e)))
    }
}
