//! Route classification and registration.
//!
//! # Data Flow
//! ```text
//! Route declarations
//!     -> Registrar::with_routes (accumulate)
//!     -> gateway.rs (route type -> gateway set)
//!     -> Registrar::partitions (gateway -> routes, fan-out)
//!     -> MeshBackend::resolve_transport (per gateway)
//!     -> payload.rs (core request / Istio VirtualService)
//!     -> RoutePusher (control plane)
//! ```

pub mod gateway;
pub mod manifest;
pub mod mesh;
pub mod payload;
pub mod pusher;
pub mod registrar;
pub mod route;

pub use gateway::{
    resolve_gateways, GatewayName, GatewaySet, INTERNAL_GATEWAY_SERVICE, PRIVATE_GATEWAY_SERVICE,
    PUBLIC_GATEWAY_SERVICE,
};
pub use manifest::{RouteManifest, ROUTES_MANIFEST_KEY};
pub use mesh::{
    backend_for, BackendSettings, CoreMeshBackend, GatewayTransport, IstioMeshBackend, MeshBackend,
    ServiceMeshType, SERVICE_MESH_TYPE_ENV,
};
pub use pusher::{HttpRoutePusher, RoutePusher};
pub use registrar::{GatewayPartition, Registrar, RegistrarConfig, RegistrationReport};
pub use route::{Route, RouteBuilder, RouteType, ANY_HOST};
