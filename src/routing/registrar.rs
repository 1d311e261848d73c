//! # Route Registrar
//!
//! Accumulates route declarations and registers them with every gateway they
//! resolve to.
//!
//! ```text
//! Registrar::new(config, pusher)
//!     .with_routes(a)        // accumulate
//!     .with_routes(b)        // accumulate, never replace
//!     .register().await      // resolve -> partition -> dispatch all -> join
//! ```
//!
//! A route resolving to N gateways lands in N partitions. Partitions are
//! dispatched concurrently and every one of them is attempted; failures are
//! reported together once all dispatches have finished.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::core::error::{BootstrapError, BootstrapResult, GatewayFailure};
use crate::routing::gateway::GatewayName;
use crate::routing::mesh::{backend_for, BackendSettings, MeshBackend, ServiceMeshType};
use crate::routing::pusher::RoutePusher;
use crate::routing::route::Route;

/// Registrar settings, fixed at construction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrarConfig {
    pub service_mesh_type: ServiceMeshType,
    /// Namespace stamped on rendered documents
    pub namespace: Option<String>,
    /// Timeout for routes that do not declare one
    pub default_timeout: Option<Duration>,
}

impl RegistrarConfig {
    pub fn new(service_mesh_type: ServiceMeshType) -> Self {
        Self {
            service_mesh_type,
            ..Self::default()
        }
    }

    /// Mesh type from `SERVICE_MESH_TYPE`, everything else default
    pub fn from_env() -> Self {
        Self::new(ServiceMeshType::from_env())
    }

    pub fn with_namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    fn backend_settings(&self) -> BackendSettings {
        BackendSettings {
            namespace: self.namespace.clone(),
            default_timeout: self.default_timeout,
        }
    }
}

/// Routes bound for one gateway, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPartition {
    pub gateway: GatewayName,
    pub routes: Vec<Route>,
}

/// Outcome of a successful `register()` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationReport {
    /// Gateways dispatched to, with the number of routes each received
    pub dispatched: Vec<(GatewayName, usize)>,
}

impl RegistrationReport {
    pub fn routes_for(&self, gateway: &GatewayName) -> Option<usize> {
        self.dispatched
            .iter()
            .find(|(name, _)| name == gateway)
            .map(|(_, count)| *count)
    }
}

/// Route registration builder
///
/// Not synchronized: a registrar is owned by the task that builds it.
pub struct Registrar {
    config: RegistrarConfig,
    backend: Arc<dyn MeshBackend>,
    routes: Vec<Route>,
}

impl Registrar {
    /// Create a registrar using the bundled backend for the configured mesh
    pub fn new(config: RegistrarConfig, pusher: Arc<dyn RoutePusher>) -> Self {
        let backend = backend_for(config.service_mesh_type, pusher, config.backend_settings());
        Self::with_backend(config, backend)
    }

    /// Create a registrar around a custom backend
    pub fn with_backend(config: RegistrarConfig, backend: Arc<dyn MeshBackend>) -> Self {
        if backend.mesh_type() != config.service_mesh_type {
            warn!(
                configured = %config.service_mesh_type,
                backend = %backend.mesh_type(),
                "Mesh backend does not match configured service mesh type"
            );
        }

        Self {
            config,
            backend,
            routes: Vec::new(),
        }
    }

    /// Append routes to the accumulated set
    pub fn with_routes<I>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = Route>,
    {
        self.routes.extend(routes);
        self
    }

    pub fn config(&self) -> &RegistrarConfig {
        &self.config
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Group accumulated routes by target gateway
    ///
    /// Partitions appear in the order their gateway is first reached; routes
    /// inside a partition keep declaration order.
    pub fn partitions(&self) -> Vec<GatewayPartition> {
        let mesh_type = self.config.service_mesh_type;
        let mut partitions: Vec<GatewayPartition> = Vec::new();
        let mut index: HashMap<GatewayName, usize> = HashMap::new();

        for route in &self.routes {
            for gateway in route.target_gateways(mesh_type) {
                let slot = *index.entry(gateway.clone()).or_insert_with(|| {
                    partitions.push(GatewayPartition {
                        gateway,
                        routes: Vec::new(),
                    });
                    partitions.len() - 1
                });
                partitions[slot].routes.push(route.clone());
            }
        }

        partitions
    }

    /// Register every accumulated route with its gateways
    ///
    /// May be called again; each call re-sends the full accumulated set.
    pub async fn register(&self) -> BootstrapResult<RegistrationReport> {
        let partitions = self.partitions();
        if partitions.is_empty() {
            info!("No routes to register");
            return Ok(RegistrationReport::default());
        }

        info!(
            mesh = %self.config.service_mesh_type,
            routes = self.routes.len(),
            gateways = partitions.len(),
            "Registering routes"
        );

        let dispatches = partitions.into_iter().map(|partition| {
            let transport = self.backend.resolve_transport(&partition.gateway);
            async move {
                let result = transport.register(&partition.routes).await;
                (partition, result)
            }
        });

        let mut report = RegistrationReport::default();
        let mut failures = Vec::new();

        for (partition, result) in join_all(dispatches).await {
            match result {
                Ok(()) => report
                    .dispatched
                    .push((partition.gateway, partition.routes.len())),
                Err(e) => {
                    error!(gateway = %partition.gateway, error = %e, "Failed to register routes");
                    failures.push(GatewayFailure {
                        gateway: partition.gateway.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if !failures.is_empty() {
            return Err(BootstrapError::Registration { failures });
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::gateway::{INTERNAL_GATEWAY_SERVICE, PRIVATE_GATEWAY_SERVICE, PUBLIC_GATEWAY_SERVICE};

    struct NullBackend;

    impl MeshBackend for NullBackend {
        fn mesh_type(&self) -> ServiceMeshType {
            ServiceMeshType::Core
        }

        fn resolve_transport(&self, _gateway: &GatewayName) -> Arc<dyn crate::routing::mesh::GatewayTransport> {
            unreachable!("partitioning never dispatches")
        }
    }

    fn registrar() -> Registrar {
        Registrar::with_backend(RegistrarConfig::default(), Arc::new(NullBackend))
    }

    #[test]
    fn test_with_routes_accumulates() {
        let registrar = registrar()
            .with_routes(vec![Route::public("/a", "http://a:8080").unwrap()])
            .with_routes(vec![Route::internal("/b", "http://b:8080").unwrap()]);

        assert_eq!(registrar.routes().len(), 2);
        assert_eq!(registrar.routes()[0].from(), "/a");
        assert_eq!(registrar.routes()[1].from(), "/b");
    }

    #[test]
    fn test_partitions_fan_out() {
        let registrar = registrar().with_routes(vec![
            Route::public("/public", "http://svc:8080").unwrap(),
            Route::internal("/internal", "http://svc:8080").unwrap(),
        ]);

        let partitions = registrar.partitions();
        let gateways: Vec<&str> = partitions.iter().map(|p| p.gateway.as_str()).collect();
        assert_eq!(
            gateways,
            vec![PUBLIC_GATEWAY_SERVICE, PRIVATE_GATEWAY_SERVICE, INTERNAL_GATEWAY_SERVICE]
        );

        let internal = &partitions[2];
        assert_eq!(internal.routes.len(), 2);
        assert_eq!(internal.routes[0].from(), "/public");
        assert_eq!(internal.routes[1].from(), "/internal");
        assert_eq!(partitions[0].routes.len(), 1);
        assert_eq!(partitions[1].routes.len(), 1);
    }

    #[test]
    fn test_partitions_include_mesh_gateways() {
        let registrar = registrar().with_routes(vec![
            Route::mesh("/mesh", "http://svc:8080", "egress-gateway").unwrap(),
            Route::private("/private", "http://svc:8080").unwrap(),
        ]);

        let partitions = registrar.partitions();
        assert_eq!(partitions.len(), 3);
        assert_eq!(partitions[0].gateway.as_str(), "egress-gateway");
        assert_eq!(partitions[0].routes[0].from(), "/mesh");
    }

    #[test]
    fn test_no_routes_no_partitions() {
        assert!(registrar().partitions().is_empty());
    }

    #[test]
    fn test_config_builders() {
        let config = RegistrarConfig::new(ServiceMeshType::Istio)
            .with_namespace("shop")
            .with_default_timeout(Duration::from_secs(20));

        assert_eq!(config.service_mesh_type, ServiceMeshType::Istio);
        assert_eq!(config.namespace.as_deref(), Some("shop"));
        assert_eq!(config.default_timeout, Some(Duration::from_secs(20)));
    }
}
