//! # Mesh Bootstrap Library
//!
//! Startup plumbing for microservices deployed behind the platform gateways:
//!
//! - a config-server property source that authenticates, fetches and flattens
//!   the externalized configuration of a microservice
//! - a route registrar that classifies declared routes into gateway tiers and
//!   registers each gateway's share with the service mesh
//!
//! ## Module Map
//! - `core`: error taxonomy and the process-wide flat configuration
//! - `auth`: bearer token providers for outbound calls
//! - `configserver`: fetcher, envelope, flattener and property source
//! - `routing`: route model, gateway resolver, mesh backends and registrar
//! - `observability`: structured logging setup

/// Error types and process-wide configuration
pub mod core;

/// Token providers used by the config-server fetcher and route pusher
pub mod auth;

/// Remote configuration from the config server
pub mod configserver;

/// Route classification and registration with the service mesh
pub mod routing;

/// Logging configuration and subscriber setup
pub mod observability;

pub use crate::core::config::{ConfigAccessor, Properties};
pub use crate::core::error::{BootstrapError, BootstrapResult, GatewayFailure};

pub use configserver::{ConfigServerSource, PropertyFetcher, PropertySource, PropertySourceConfiguration};

pub use routing::{
    GatewayName, Registrar, RegistrarConfig, Route, RouteType, ServiceMeshType,
};
