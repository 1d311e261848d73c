//! # Gateway Resolver
//!
//! Maps a route's visibility tier to the gateways it must be registered in.
//! Tiers are nested: a public route is reachable through the private and
//! internal gateways too, so it is registered in all three.
//!
//! | Route type | Gateways                                   |
//! |------------|--------------------------------------------|
//! | public     | public, private, internal gateway services |
//! | private    | private, internal gateway services         |
//! | internal   | internal gateway service                   |
//! | mesh       | the gateway named by the route             |

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

use crate::core::error::{BootstrapError, BootstrapResult};
use crate::routing::mesh::ServiceMeshType;
use crate::routing::route::{Route, RouteType};

pub const PUBLIC_GATEWAY_SERVICE: &str = "public-gateway-service";
pub const PRIVATE_GATEWAY_SERVICE: &str = "private-gateway-service";
pub const INTERNAL_GATEWAY_SERVICE: &str = "internal-gateway-service";

/// Name of a gateway routes are registered in
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatewayName(String);

impl GatewayName {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn public() -> Self {
        Self::new(PUBLIC_GATEWAY_SERVICE)
    }

    pub fn private() -> Self {
        Self::new(PRIVATE_GATEWAY_SERVICE)
    }

    pub fn internal() -> Self {
        Self::new(INTERNAL_GATEWAY_SERVICE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is one of the three fixed tier gateways
    pub fn is_tier(&self) -> bool {
        matches!(
            self.0.as_str(),
            PUBLIC_GATEWAY_SERVICE | PRIVATE_GATEWAY_SERVICE | INTERNAL_GATEWAY_SERVICE
        )
    }
}

impl fmt::Display for GatewayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GatewayName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl AsRef<str> for GatewayName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered, duplicate-free set of gateways
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewaySet {
    gateways: Vec<GatewayName>,
}

impl GatewaySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a gateway, keeping the first position of duplicates
    pub fn insert(&mut self, gateway: GatewayName) -> bool {
        if self.gateways.contains(&gateway) {
            return false;
        }
        self.gateways.push(gateway);
        true
    }

    pub fn contains(&self, gateway: &GatewayName) -> bool {
        self.gateways.contains(gateway)
    }

    pub fn is_subset(&self, other: &GatewaySet) -> bool {
        self.gateways.iter().all(|gateway| other.contains(gateway))
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GatewayName> {
        self.gateways.iter()
    }
}

impl FromIterator<GatewayName> for GatewaySet {
    fn from_iter<I: IntoIterator<Item = GatewayName>>(iter: I) -> Self {
        let mut set = GatewaySet::new();
        for gateway in iter {
            set.insert(gateway);
        }
        set
    }
}

impl IntoIterator for GatewaySet {
    type Item = GatewayName;
    type IntoIter = std::vec::IntoIter<GatewayName>;

    fn into_iter(self) -> Self::IntoIter {
        self.gateways.into_iter()
    }
}

impl<'a> IntoIterator for &'a GatewaySet {
    type Item = &'a GatewayName;
    type IntoIter = std::slice::Iter<'a, GatewayName>;

    fn into_iter(self) -> Self::IntoIter {
        self.gateways.iter()
    }
}

/// Resolve the gateways for a route type
///
/// `gateway` is only read for `Mesh` routes, which fail with
/// `MissingMeshGateway` when it is empty. The tier table is the same for every
/// mesh type; `mesh_type` only selects the transport later on.
pub fn resolve_gateways(
    route_type: RouteType,
    gateway: &str,
    mesh_type: ServiceMeshType,
) -> BootstrapResult<GatewaySet> {
    trace!(route_type = %route_type, mesh = %mesh_type, "Resolving gateways");

    match route_type {
        RouteType::Mesh => {
            let gateway = gateway.trim();
            if gateway.is_empty() {
                return Err(BootstrapError::MissingMeshGateway {
                    from: String::new(),
                });
            }
            Ok(std::iter::once(GatewayName::new(gateway)).collect())
        }
        tier => Ok(tier_gateways(tier)),
    }
}

fn tier_gateways(route_type: RouteType) -> GatewaySet {
    match route_type {
        RouteType::Public => [GatewayName::public(), GatewayName::private(), GatewayName::internal()]
            .into_iter()
            .collect(),
        RouteType::Private => [GatewayName::private(), GatewayName::internal()]
            .into_iter()
            .collect(),
        RouteType::Internal => std::iter::once(GatewayName::internal()).collect(),
        RouteType::Mesh => GatewaySet::new(),
    }
}

impl Route {
    /// Gateways this route is registered in
    ///
    /// Routes are validated on construction, so a mesh route always carries a
    /// gateway and this never fails.
    pub fn target_gateways(&self, mesh_type: ServiceMeshType) -> GatewaySet {
        match self.route_type() {
            RouteType::Mesh => std::iter::once(GatewayName::new(self.gateway())).collect(),
            tier => {
                trace!(route = %self, mesh = %mesh_type, "Resolving tier gateways");
                tier_gateways(tier)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(set: &GatewaySet) -> Vec<&str> {
        set.iter().map(GatewayName::as_str).collect()
    }

    #[test]
    fn test_tier_table() {
        let mesh = ServiceMeshType::Core;

        let public = resolve_gateways(RouteType::Public, "", mesh).unwrap();
        assert_eq!(
            names(&public),
            vec![PUBLIC_GATEWAY_SERVICE, PRIVATE_GATEWAY_SERVICE, INTERNAL_GATEWAY_SERVICE]
        );

        let private = resolve_gateways(RouteType::Private, "", mesh).unwrap();
        assert_eq!(names(&private), vec![PRIVATE_GATEWAY_SERVICE, INTERNAL_GATEWAY_SERVICE]);

        let internal = resolve_gateways(RouteType::Internal, "", mesh).unwrap();
        assert_eq!(names(&internal), vec![INTERNAL_GATEWAY_SERVICE]);
    }

    #[test]
    fn test_tiers_are_nested() {
        for mesh in [ServiceMeshType::Core, ServiceMeshType::Istio] {
            let public = resolve_gateways(RouteType::Public, "", mesh).unwrap();
            let private = resolve_gateways(RouteType::Private, "", mesh).unwrap();
            let internal = resolve_gateways(RouteType::Internal, "", mesh).unwrap();

            assert!(internal.is_subset(&private));
            assert!(private.is_subset(&public));
            assert!(!public.is_subset(&private));
        }
    }

    #[test]
    fn test_mesh_route_resolves_to_its_gateway_only() {
        let set = resolve_gateways(RouteType::Mesh, "egress-gateway", ServiceMeshType::Istio).unwrap();
        assert_eq!(names(&set), vec!["egress-gateway"]);
    }

    #[test]
    fn test_mesh_route_without_gateway_fails() {
        let err = resolve_gateways(RouteType::Mesh, "  ", ServiceMeshType::Core).unwrap_err();
        assert!(matches!(err, BootstrapError::MissingMeshGateway { .. }));
        assert_eq!(
            err.to_string(),
            "Route type 'mesh' requires a gateway but no gateway was given"
        );
    }

    #[test]
    fn test_tier_routes_ignore_gateway_argument() {
        let set = resolve_gateways(RouteType::Internal, "something-else", ServiceMeshType::Core).unwrap();
        assert_eq!(names(&set), vec![INTERNAL_GATEWAY_SERVICE]);
    }

    #[test]
    fn test_route_target_gateways() {
        let route = Route::private("/api", "http://svc:8080").unwrap();
        let set = route.target_gateways(ServiceMeshType::Core);
        assert!(set.contains(&GatewayName::private()));
        assert!(set.contains(&GatewayName::internal()));
        assert!(!set.contains(&GatewayName::public()));

        let mesh = Route::mesh("/api", "http://svc:8080", "mesh-gw").unwrap();
        assert_eq!(names(&mesh.target_gateways(ServiceMeshType::Core)), vec!["mesh-gw"]);
    }

    #[test]
    fn test_gateway_set_deduplicates() {
        let set: GatewaySet = vec![GatewayName::internal(), GatewayName::internal()]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_is_tier() {
        assert!(GatewayName::public().is_tier());
        assert!(!GatewayName::new("mesh-gw").is_tier());
    }
}
