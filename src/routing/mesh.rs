//! # Mesh Backends
//!
//! The registrar talks to every mesh through the same two traits:
//! [`MeshBackend`] resolves a gateway name to a [`GatewayTransport`], and the
//! transport registers one partition of routes. Each backend renders the
//! partition into the document its control plane understands and hands it to
//! a [`RoutePusher`]. Adding a mesh means adding a backend, not touching the
//! registrar.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::error::{BootstrapError, BootstrapResult};
use crate::routing::gateway::GatewayName;
use crate::routing::payload::{CoreRouteRequest, VirtualService};
use crate::routing::pusher::RoutePusher;
use crate::routing::route::Route;

/// Environment variable selecting the mesh implementation
pub const SERVICE_MESH_TYPE_ENV: &str = "SERVICE_MESH_TYPE";

/// Mesh implementation routes are registered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceMeshType {
    /// Control plane of the platform's own gateways
    #[default]
    Core,
    Istio,
}

impl ServiceMeshType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMeshType::Core => "CORE",
            ServiceMeshType::Istio => "ISTIO",
        }
    }

    /// Read `SERVICE_MESH_TYPE` from the process environment
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(SERVICE_MESH_TYPE_ENV).ok().as_deref())
    }

    /// Interpret a raw env value; anything unrecognized keeps `Core`
    pub fn from_env_value(value: Option<&str>) -> Self {
        value
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for ServiceMeshType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceMeshType {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CORE" => Ok(ServiceMeshType::Core),
            "ISTIO" => Ok(ServiceMeshType::Istio),
            other => Err(BootstrapError::config(format!(
                "Unknown service mesh type '{}'",
                other
            ))),
        }
    }
}

/// Registers one gateway partition
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn register(&self, routes: &[Route]) -> BootstrapResult<()>;
}

/// Capability of a mesh: where does a gateway's partition go
pub trait MeshBackend: Send + Sync {
    fn mesh_type(&self) -> ServiceMeshType;

    fn resolve_transport(&self, gateway: &GatewayName) -> Arc<dyn GatewayTransport>;
}

/// Settings shared by the bundled backends
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendSettings {
    pub namespace: Option<String>,
    pub default_timeout: Option<Duration>,
}

/// Backend for the core mesh control plane
pub struct CoreMeshBackend {
    pusher: Arc<dyn RoutePusher>,
    settings: BackendSettings,
}

impl CoreMeshBackend {
    pub fn new(pusher: Arc<dyn RoutePusher>, settings: BackendSettings) -> Self {
        Self { pusher, settings }
    }
}

impl MeshBackend for CoreMeshBackend {
    fn mesh_type(&self) -> ServiceMeshType {
        ServiceMeshType::Core
    }

    fn resolve_transport(&self, gateway: &GatewayName) -> Arc<dyn GatewayTransport> {
        Arc::new(CoreGatewayTransport {
            gateway: gateway.clone(),
            pusher: self.pusher.clone(),
            settings: self.settings.clone(),
        })
    }
}

struct CoreGatewayTransport {
    gateway: GatewayName,
    pusher: Arc<dyn RoutePusher>,
    settings: BackendSettings,
}

#[async_trait]
impl GatewayTransport for CoreGatewayTransport {
    async fn register(&self, routes: &[Route]) -> BootstrapResult<()> {
        let request = CoreRouteRequest::build(
            &self.gateway,
            routes,
            self.settings.namespace.as_deref(),
            self.settings.default_timeout,
        );
        let document = serde_json::to_value(&request)?;

        debug!(
            gateway = %self.gateway,
            virtual_services = request.virtual_services.len(),
            "Pushing core route configuration"
        );
        self.pusher.push(&self.gateway, &document).await?;

        info!(gateway = %self.gateway, routes = routes.len(), "Registered routes");
        Ok(())
    }
}

/// Backend rendering Istio `VirtualService` resources
pub struct IstioMeshBackend {
    pusher: Arc<dyn RoutePusher>,
    settings: BackendSettings,
}

impl IstioMeshBackend {
    pub fn new(pusher: Arc<dyn RoutePusher>, settings: BackendSettings) -> Self {
        Self { pusher, settings }
    }
}

impl MeshBackend for IstioMeshBackend {
    fn mesh_type(&self) -> ServiceMeshType {
        ServiceMeshType::Istio
    }

    fn resolve_transport(&self, gateway: &GatewayName) -> Arc<dyn GatewayTransport> {
        Arc::new(IstioGatewayTransport {
            gateway: gateway.clone(),
            pusher: self.pusher.clone(),
            settings: self.settings.clone(),
        })
    }
}

struct IstioGatewayTransport {
    gateway: GatewayName,
    pusher: Arc<dyn RoutePusher>,
    settings: BackendSettings,
}

#[async_trait]
impl GatewayTransport for IstioGatewayTransport {
    async fn register(&self, routes: &[Route]) -> BootstrapResult<()> {
        let services = VirtualService::build_all(
            &self.gateway,
            routes,
            self.settings.namespace.as_deref(),
            self.settings.default_timeout,
        )?;

        // one resource per virtual service; the first failure aborts this gateway
        for service in &services {
            let document = serde_json::to_value(service)?;
            debug!(
                gateway = %self.gateway,
                virtual_service = %service.metadata.name,
                "Pushing Istio VirtualService"
            );
            self.pusher.push(&self.gateway, &document).await?;
        }

        info!(gateway = %self.gateway, routes = routes.len(), "Registered routes");
        Ok(())
    }
}

/// Bundled backend for a mesh type
pub fn backend_for(
    mesh_type: ServiceMeshType,
    pusher: Arc<dyn RoutePusher>,
    settings: BackendSettings,
) -> Arc<dyn MeshBackend> {
    match mesh_type {
        ServiceMeshType::Core => Arc::new(CoreMeshBackend::new(pusher, settings)),
        ServiceMeshType::Istio => Arc::new(IstioMeshBackend::new(pusher, settings)),
    }
}
