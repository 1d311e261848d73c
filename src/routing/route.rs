//! # Route Model
//!
//! A [`Route`] is an immutable declaration of one path plus its registration
//! intent. Fields are private; routes are built through [`RouteBuilder`] or
//! deserialized from a manifest, and both paths run the same validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::core::error::{BootstrapError, BootstrapResult};

/// Host pattern matching any host
pub const ANY_HOST: &str = "*";

/// Visibility tier of a route
///
/// - `Public` routes are registered in the public, private and internal gateways
/// - `Private` routes are registered in the private and internal gateways
/// - `Internal` routes are registered only in the internal gateway
/// - `Mesh` routes are registered in the mesh gateway named by the route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RouteType {
    Public,
    Private,
    Internal,
    Mesh,
}

impl RouteType {
    pub const ALL: [RouteType; 4] = [
        RouteType::Public,
        RouteType::Private,
        RouteType::Internal,
        RouteType::Mesh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Public => "public",
            RouteType::Private => "private",
            RouteType::Internal => "internal",
            RouteType::Mesh => "mesh",
        }
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteType {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(RouteType::Public),
            "private" => Ok(RouteType::Private),
            "internal" => Ok(RouteType::Internal),
            "mesh" => Ok(RouteType::Mesh),
            _ => Err(BootstrapError::InvalidRouteType {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for RouteType {
    type Error = BootstrapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RouteType> for String {
    fn from(route_type: RouteType) -> Self {
        route_type.as_str().to_string()
    }
}

/// One declared route
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RouteSpec", into = "RouteSpec")]
pub struct Route {
    from: String,
    to: String,
    forbidden: bool,
    timeout: Option<Duration>,
    route_type: RouteType,
    gateway: String,
    virtual_service: String,
    hosts: Vec<String>,
}

impl Route {
    pub fn builder<S: Into<String>>(from: S) -> RouteBuilder {
        RouteBuilder::new(from)
    }

    pub fn public<F: Into<String>, T: Into<String>>(from: F, to: T) -> BootstrapResult<Self> {
        RouteBuilder::new(from).to(to).route_type(RouteType::Public).build()
    }

    pub fn private<F: Into<String>, T: Into<String>>(from: F, to: T) -> BootstrapResult<Self> {
        RouteBuilder::new(from).to(to).route_type(RouteType::Private).build()
    }

    pub fn internal<F: Into<String>, T: Into<String>>(from: F, to: T) -> BootstrapResult<Self> {
        RouteBuilder::new(from).to(to).route_type(RouteType::Internal).build()
    }

    /// Route registered only in the named mesh gateway
    pub fn mesh<F, T, G>(from: F, to: T, gateway: G) -> BootstrapResult<Self>
    where
        F: Into<String>,
        T: Into<String>,
        G: Into<String>,
    {
        RouteBuilder::new(from)
            .to(to)
            .route_type(RouteType::Mesh)
            .gateway(gateway)
            .build()
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn is_forbidden(&self) -> bool {
        self.forbidden
    }

    /// Route-specific timeout; `None` inherits the gateway default
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn route_type(&self) -> RouteType {
        self.route_type
    }

    /// Mesh gateway name; empty for tiered routes
    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    pub fn virtual_service(&self) -> &str {
        &self.virtual_service
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.forbidden {
            write!(f, "{} [{}] deny", self.from, self.route_type)
        } else {
            write!(f, "{} -> {} [{}]", self.from, self.to, self.route_type)
        }
    }
}

/// Builder for [`Route`]
#[derive(Debug, Clone)]
pub struct RouteBuilder {
    spec: RouteSpec,
}

impl RouteBuilder {
    pub fn new<S: Into<String>>(from: S) -> Self {
        Self {
            spec: RouteSpec {
                from: from.into(),
                ..RouteSpec::default()
            },
        }
    }

    pub fn to<S: Into<String>>(mut self, to: S) -> Self {
        self.spec.to = to.into();
        self
    }

    pub fn forbidden(mut self, forbidden: bool) -> Self {
        self.spec.forbidden = forbidden;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.spec.timeout = Some(timeout);
        self
    }

    pub fn route_type(mut self, route_type: RouteType) -> Self {
        self.spec.route_type = route_type;
        self
    }

    pub fn gateway<S: Into<String>>(mut self, gateway: S) -> Self {
        self.spec.gateway = gateway.into();
        self
    }

    pub fn virtual_service<S: Into<String>>(mut self, virtual_service: S) -> Self {
        self.spec.virtual_service = virtual_service.into();
        self
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.spec.hosts.push(host.into());
        self
    }

    pub fn hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Validate and freeze the route
    pub fn build(self) -> BootstrapResult<Route> {
        Route::try_from(self.spec)
    }
}

/// Serialized form of a route, as found in route manifests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    forbidden: bool,
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    timeout: Option<Duration>,
    #[serde(rename = "type", alias = "routeType", default = "default_route_type")]
    route_type: RouteType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    gateway: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    virtual_service: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    hosts: Vec<String>,
}

fn default_route_type() -> RouteType {
    RouteType::Internal
}

impl Default for RouteSpec {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: String::new(),
            forbidden: false,
            timeout: None,
            route_type: default_route_type(),
            gateway: String::new(),
            virtual_service: String::new(),
            hosts: Vec::new(),
        }
    }
}

impl TryFrom<RouteSpec> for Route {
    type Error = BootstrapError;

    fn try_from(spec: RouteSpec) -> Result<Self, Self::Error> {
        let from = spec.from.trim().to_string();
        if from.is_empty() {
            return Err(BootstrapError::config("route 'from' must not be empty"));
        }

        let gateway = spec.gateway.trim().to_string();
        if spec.route_type == RouteType::Mesh && gateway.is_empty() {
            return Err(BootstrapError::MissingMeshGateway { from });
        }

        let to = match spec.to.trim() {
            "" => from.clone(),
            to => to.to_string(),
        };

        Ok(Route {
            from,
            to,
            forbidden: spec.forbidden,
            timeout: spec.timeout.filter(|timeout| !timeout.is_zero()),
            // gateway is derived for every tiered route
            gateway: if spec.route_type == RouteType::Mesh {
                gateway
            } else {
                String::new()
            },
            route_type: spec.route_type,
            virtual_service: spec.virtual_service.trim().to_string(),
            hosts: spec
                .hosts
                .into_iter()
                .map(|host| host.trim().to_string())
                .filter(|host| !host.is_empty())
                .collect(),
        })
    }
}

impl From<Route> for RouteSpec {
    fn from(route: Route) -> Self {
        Self {
            from: route.from,
            to: route.to,
            forbidden: route.forbidden,
            timeout: route.timeout,
            route_type: route.route_type,
            gateway: route.gateway,
            virtual_service: route.virtual_service,
            hosts: route.hosts,
        }
    }
}
