//! # Registration Documents
//!
//! Rendering of one gateway partition into the document its mesh expects.
//!
//! Routes of a partition are first grouped by virtual service (routes without
//! one fall into a group named after the gateway). Inside a group the same
//! `from` may be declared more than once:
//! - exact duplicates collapse to the first declaration
//! - a deny rule and a forward rule for the same path reconcile to the deny rule
//! - two forward rules for the same path keep the later declaration
//!
//! Rules are matched top-down by prefix, so each group is emitted most
//! specific first: longer `from` prefixes ahead of shorter ones, deny rules
//! ahead of forward rules for equal prefixes. A forward rule for `/api` can
//! never shadow a deny rule for `/api/admin`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::core::error::{BootstrapError, BootstrapResult};
use crate::routing::gateway::GatewayName;
use crate::routing::route::{Route, ANY_HOST};

/// Routes of one gateway sharing a virtual service
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGroup<'a> {
    pub virtual_service: String,
    pub hosts: Vec<String>,
    pub routes: Vec<&'a Route>,
}

/// Group a partition by virtual service and reconcile overlapping paths
pub fn group_routes<'a>(gateway: &GatewayName, routes: &'a [Route]) -> Vec<RouteGroup<'a>> {
    let mut groups: Vec<RouteGroup<'a>> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for route in routes {
        let name = match route.virtual_service() {
            "" => gateway.as_str().to_string(),
            name => name.to_string(),
        };

        let index = *group_index.entry(name.clone()).or_insert_with(|| {
            groups.push(RouteGroup {
                virtual_service: name,
                hosts: Vec::new(),
                routes: Vec::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[index];
        for host in route.hosts() {
            if !group.hosts.contains(host) {
                group.hosts.push(host.clone());
            }
        }
        merge_route(gateway, group, route);
    }

    for group in &mut groups {
        if group.hosts.is_empty() || group.hosts.iter().any(|host| host == ANY_HOST) {
            group.hosts = vec![ANY_HOST.to_string()];
        }
        sort_by_specificity(&mut group.routes);
    }

    groups
}

/// Longest prefix first, deny before forward on ties; otherwise stable
fn sort_by_specificity(routes: &mut [&Route]) {
    routes.sort_by(|a, b| {
        b.from()
            .len()
            .cmp(&a.from().len())
            .then_with(|| b.is_forbidden().cmp(&a.is_forbidden()))
    });
}

fn merge_route<'a>(gateway: &GatewayName, group: &mut RouteGroup<'a>, route: &'a Route) {
    let Some(index) = group
        .routes
        .iter()
        .position(|existing| existing.from() == route.from())
    else {
        group.routes.push(route);
        return;
    };
    let existing = &mut group.routes[index];

    if *existing == route {
        return;
    }

    match (existing.is_forbidden(), route.is_forbidden()) {
        (true, false) => {
            warn!(
                gateway = %gateway,
                path = %route.from(),
                "Path is both forbidden and permitted, keeping the deny rule"
            );
        }
        (false, true) => {
            warn!(
                gateway = %gateway,
                path = %route.from(),
                "Path is both forbidden and permitted, keeping the deny rule"
            );
            *existing = route;
        }
        _ => {
            debug!(gateway = %gateway, path = %route.from(), "Later route declaration replaces earlier one");
            *existing = route;
        }
    }
}

fn effective_timeout(route: &Route, default_timeout: Option<Duration>) -> Option<Duration> {
    route.timeout().or(default_timeout)
}

/// Document accepted by the core mesh control plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreRouteRequest {
    pub gateways: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub virtual_services: Vec<CoreVirtualService>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreVirtualService {
    pub name: String,
    pub hosts: Vec<String>,
    pub routes: Vec<CoreRouteRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreRouteRule {
    pub from: String,
    pub to: String,
    pub forbidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl CoreRouteRequest {
    pub fn build(
        gateway: &GatewayName,
        routes: &[Route],
        namespace: Option<&str>,
        default_timeout: Option<Duration>,
    ) -> Self {
        let virtual_services = group_routes(gateway, routes)
            .into_iter()
            .map(|group| CoreVirtualService {
                name: group.virtual_service,
                hosts: group.hosts,
                routes: group
                    .routes
                    .into_iter()
                    .map(|route| CoreRouteRule {
                        from: route.from().to_string(),
                        to: route.to().to_string(),
                        forbidden: route.is_forbidden(),
                        timeout_ms: effective_timeout(route, default_timeout)
                            .map(|timeout| u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)),
                    })
                    .collect(),
            })
            .collect();

        Self {
            gateways: vec![gateway.to_string()],
            namespace: namespace.map(str::to_string),
            virtual_services,
        }
    }
}

pub const ISTIO_API_VERSION: &str = "networking.istio.io/v1beta1";
pub const VIRTUAL_SERVICE_KIND: &str = "VirtualService";

/// HTTP status returned for forbidden paths on Istio
pub const FORBIDDEN_ROUTE_STATUS: u16 = 404;

/// Istio `VirtualService` resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualService {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: VirtualServiceSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualServiceSpec {
    pub hosts: Vec<String>,
    pub gateways: Vec<String>,
    pub http: Vec<HttpRoute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRoute {
    #[serde(rename = "match")]
    pub matches: Vec<HttpMatchRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<HttpRouteDestination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<HttpRewrite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<HttpFaultInjection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpMatchRequest {
    pub uri: StringMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringMatch {
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRouteDestination {
    pub destination: Destination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<PortSelector>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSelector {
    pub number: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRewrite {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpFaultInjection {
    pub abort: Abort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Abort {
    pub http_status: u16,
    pub percentage: Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Percent {
    pub value: f64,
}

impl VirtualService {
    /// Render one `VirtualService` per route group of the partition
    ///
    /// Fails with a configuration error when a forward rule has no
    /// destination host, e.g. a route whose `to` defaulted to its path.
    pub fn build_all(
        gateway: &GatewayName,
        routes: &[Route],
        namespace: Option<&str>,
        default_timeout: Option<Duration>,
    ) -> BootstrapResult<Vec<Self>> {
        group_routes(gateway, routes)
            .into_iter()
            .map(|group| -> BootstrapResult<Self> {
                let http = group
                    .routes
                    .into_iter()
                    .map(|route| http_route(route, default_timeout))
                    .collect::<BootstrapResult<Vec<_>>>()?;

                Ok(Self {
                    api_version: ISTIO_API_VERSION.to_string(),
                    kind: VIRTUAL_SERVICE_KIND.to_string(),
                    metadata: ObjectMeta {
                        name: group.virtual_service,
                        namespace: namespace.map(str::to_string),
                    },
                    spec: VirtualServiceSpec {
                        hosts: group.hosts,
                        gateways: vec![gateway.to_string()],
                        http,
                    },
                })
            })
            .collect()
    }
}

fn http_route(route: &Route, default_timeout: Option<Duration>) -> BootstrapResult<HttpRoute> {
    let matches = vec![HttpMatchRequest {
        uri: StringMatch {
            prefix: route.from().to_string(),
        },
    }];

    if route.is_forbidden() {
        return Ok(HttpRoute {
            matches,
            route: Vec::new(),
            rewrite: None,
            timeout: None,
            fault: Some(HttpFaultInjection {
                abort: Abort {
                    http_status: FORBIDDEN_ROUTE_STATUS,
                    percentage: Percent { value: 100.0 },
                },
            }),
        });
    }

    let (destination, rewrite) = destination_of(route)?;
    Ok(HttpRoute {
        matches,
        route: vec![HttpRouteDestination { destination }],
        rewrite,
        timeout: effective_timeout(route, default_timeout)
            .map(|timeout| humantime::format_duration(timeout).to_string()),
        fault: None,
    })
}

/// Split `to` into a mesh destination and an optional path rewrite
///
/// `http://order-service:8080/api/v2` targets host `order-service`, port 8080
/// and rewrites the prefix to `/api/v2`. A bare service name such as
/// `order-service` is used as the host verbatim. A bare path names no host and
/// is rejected.
fn destination_of(route: &Route) -> BootstrapResult<(Destination, Option<HttpRewrite>)> {
    let verbatim = || -> BootstrapResult<(Destination, Option<HttpRewrite>)> {
        Ok((
            Destination {
                host: route.to().to_string(),
                port: None,
            },
            None,
        ))
    };

    let Ok(url) = Url::parse(route.to()) else {
        if route.to().starts_with('/') {
            return Err(BootstrapError::config(format!(
                "Route '{}' forwards to '{}', which names no destination host; \
                 set 'to' to a service URL",
                route.from(),
                route.to()
            )));
        }
        return verbatim();
    };

    let Some(host) = url.host_str() else {
        return verbatim();
    };

    let path = url.path();
    let rewrite = (path != "/" && path != route.from()).then(|| HttpRewrite {
        uri: path.to_string(),
    });

    Ok((
        Destination {
            host: host.to_string(),
            port: url.port().map(|number| PortSelector { number }),
        },
        rewrite,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::route::RouteType;

    fn gateway() -> GatewayName {
        GatewayName::internal()
    }

    #[test]
    fn test_routes_without_virtual_service_group_under_gateway() {
        let routes = vec![
            Route::internal("/a", "http://a:8080").unwrap(),
            Route::internal("/b", "http://b:8080").unwrap(),
        ];

        let groups = group_routes(&gateway(), &routes);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].virtual_service, "internal-gateway-service");
        assert_eq!(groups[0].hosts, vec![ANY_HOST.to_string()]);
        assert_eq!(groups[0].routes.len(), 2);
    }

    #[test]
    fn test_groups_keep_first_seen_order_and_union_hosts() {
        let routes = vec![
            Route::builder("/orders")
                .virtual_service("orders")
                .host("orders.example.com")
                .build()
                .unwrap(),
            Route::builder("/billing")
                .virtual_service("billing")
                .build()
                .unwrap(),
            Route::builder("/orders/history")
                .virtual_service("orders")
                .host("orders.internal")
                .build()
                .unwrap(),
        ];

        let groups = group_routes(&gateway(), &routes);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].virtual_service, "orders");
        assert_eq!(groups[0].hosts, vec!["orders.example.com", "orders.internal"]);
        assert_eq!(groups[0].routes[0].from(), "/orders/history");
        assert_eq!(groups[0].routes[1].from(), "/orders");
        assert_eq!(groups[1].virtual_service, "billing");
    }

    #[test]
    fn test_any_host_absorbs_specific_hosts() {
        let routes = vec![
            Route::builder("/a").host("a.example.com").build().unwrap(),
            Route::builder("/b").host(ANY_HOST).build().unwrap(),
        ];

        let groups = group_routes(&gateway(), &routes);

        assert_eq!(groups[0].hosts, vec![ANY_HOST.to_string()]);
    }

    #[test]
    fn test_deny_rule_wins_over_forward_rule() {
        let routes = vec![
            Route::internal("/admin", "http://svc:8080").unwrap(),
            Route::builder("/admin").forbidden(true).build().unwrap(),
        ];

        let groups = group_routes(&gateway(), &routes);

        assert_eq!(groups[0].routes.len(), 1);
        assert!(groups[0].routes[0].is_forbidden());

        let reversed: Vec<Route> = routes.into_iter().rev().collect();
        let groups = group_routes(&gateway(), &reversed);
        assert!(groups[0].routes[0].is_forbidden());
    }

    #[test]
    fn test_later_forward_rule_replaces_earlier() {
        let routes = vec![
            Route::internal("/api", "http://old:8080").unwrap(),
            Route::internal("/api", "http://new:8080").unwrap(),
            Route::internal("/api", "http://new:8080").unwrap(),
        ];

        let groups = group_routes(&gateway(), &routes);

        assert_eq!(groups[0].routes.len(), 1);
        assert_eq!(groups[0].routes[0].to(), "http://new:8080");
    }

    #[test]
    fn test_core_request_document() {
        let routes = vec![
            Route::builder("/api/v1/orders")
                .to("http://order-service:8080/api/v1/orders")
                .route_type(RouteType::Public)
                .timeout(Duration::from_secs(5))
                .virtual_service("orders")
                .build()
                .unwrap(),
            Route::builder("/api/v1/orders/admin")
                .forbidden(true)
                .virtual_service("orders")
                .build()
                .unwrap(),
        ];

        let request = CoreRouteRequest::build(
            &GatewayName::public(),
            &routes,
            Some("shop"),
            Some(Duration::from_secs(30)),
        );
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["gateways"], serde_json::json!(["public-gateway-service"]));
        assert_eq!(json["namespace"], "shop");
        assert_eq!(json["virtualServices"][0]["name"], "orders");
        let rules = &json["virtualServices"][0]["routes"];
        assert_eq!(rules[0]["from"], "/api/v1/orders/admin");
        assert_eq!(rules[0]["forbidden"], true);
        assert_eq!(rules[0]["timeoutMs"], 30000);
        assert_eq!(rules[1]["from"], "/api/v1/orders");
        assert_eq!(rules[1]["timeoutMs"], 5000);
    }

    #[test]
    fn test_istio_virtual_service_document() {
        let routes = vec![
            Route::builder("/api/v1/orders")
                .to("http://order-service:8080/api/v2/orders")
                .timeout(Duration::from_secs(10))
                .virtual_service("orders")
                .host("orders.example.com")
                .build()
                .unwrap(),
            Route::builder("/api/v1/orders/admin")
                .forbidden(true)
                .virtual_service("orders")
                .build()
                .unwrap(),
        ];

        let services =
            VirtualService::build_all(&GatewayName::private(), &routes, None, None).unwrap();

        assert_eq!(services.len(), 1);
        let json = serde_json::to_value(&services[0]).unwrap();
        assert_eq!(json["apiVersion"], ISTIO_API_VERSION);
        assert_eq!(json["kind"], VIRTUAL_SERVICE_KIND);
        assert_eq!(json["metadata"]["name"], "orders");
        assert!(json["metadata"].get("namespace").is_none());
        assert_eq!(json["spec"]["gateways"], serde_json::json!(["private-gateway-service"]));
        assert_eq!(json["spec"]["hosts"], serde_json::json!(["orders.example.com"]));

        let deny = &json["spec"]["http"][0];
        assert_eq!(deny["match"][0]["uri"]["prefix"], "/api/v1/orders/admin");
        assert_eq!(deny["fault"]["abort"]["httpStatus"], 404);
        assert!(deny.get("route").is_none());

        let forward = &json["spec"]["http"][1];
        assert_eq!(forward["match"][0]["uri"]["prefix"], "/api/v1/orders");
        assert_eq!(forward["route"][0]["destination"]["host"], "order-service");
        assert_eq!(forward["route"][0]["destination"]["port"]["number"], 8080);
        assert_eq!(forward["rewrite"]["uri"], "/api/v2/orders");
        assert_eq!(forward["timeout"], "10s");
    }

    #[test]
    fn test_non_url_target_is_used_as_host() {
        let routes = vec![Route::internal("/api", "order-service").unwrap()];

        let services = VirtualService::build_all(&gateway(), &routes, None, None).unwrap();

        let destination = &services[0].spec.http[0].route[0].destination;
        assert_eq!(destination.host, "order-service");
        assert!(destination.port.is_none());
        assert!(services[0].spec.http[0].rewrite.is_none());
    }

    #[test]
    fn test_deny_rule_is_not_shadowed_by_broader_forward_rule() {
        let routes = vec![
            Route::internal("/api", "http://api:8080").unwrap(),
            Route::internal("/api/v1", "http://api:8080").unwrap(),
            Route::builder("/api/admin").forbidden(true).build().unwrap(),
            Route::internal("/api/admin/reports", "http://reports:8080").unwrap(),
        ];

        let services = VirtualService::build_all(&gateway(), &routes, None, None).unwrap();
        let order: Vec<(&str, bool)> = services[0]
            .spec
            .http
            .iter()
            .map(|rule| (rule.matches[0].uri.prefix.as_str(), rule.fault.is_some()))
            .collect();

        // first matching prefix decides; every deny precedes the forwards containing it
        let deny_at = order.iter().position(|(prefix, _)| *prefix == "/api/admin").unwrap();
        for (index, (prefix, deny)) in order.iter().enumerate() {
            if !deny && "/api/admin".starts_with(prefix) {
                assert!(deny_at < index, "{} shadows /api/admin in {:?}", prefix, order);
            }
        }
        let first_match = order
            .iter()
            .find(|(prefix, _)| "/api/admin/users".starts_with(prefix))
            .unwrap();
        assert_eq!(*first_match, ("/api/admin", true));
        assert_eq!(order[0], ("/api/admin/reports", false));
    }

    #[test]
    fn test_equal_prefixes_keep_declaration_order() {
        let routes = vec![
            Route::builder("/b").to("http://b:8080").virtual_service("svc").build().unwrap(),
            Route::builder("/a").to("http://a:8080").virtual_service("svc").build().unwrap(),
        ];

        let groups = group_routes(&gateway(), &routes);

        assert_eq!(groups[0].routes[0].from(), "/b");
        assert_eq!(groups[0].routes[1].from(), "/a");
    }

    #[test]
    fn test_path_only_target_is_rejected_for_istio() {
        let routes = vec![Route::builder("/api/v1").build().unwrap()];

        let err = VirtualService::build_all(&gateway(), &routes, None, None).unwrap_err();

        assert!(matches!(err, BootstrapError::Configuration { .. }));
        assert!(err.to_string().contains("/api/v1"));
    }

    #[test]
    fn test_forbidden_route_needs_no_destination() {
        let routes = vec![Route::builder("/internal").forbidden(true).build().unwrap()];

        let services = VirtualService::build_all(&gateway(), &routes, None, None).unwrap();

        assert!(services[0].spec.http[0].route.is_empty());
    }

    #[test]
    fn test_oversized_timeout_saturates() {
        let routes = vec![Route::builder("/slow")
            .to("http://slow:8080")
            .timeout(Duration::from_secs(u64::MAX))
            .build()
            .unwrap()];

        let request = CoreRouteRequest::build(&gateway(), &routes, None, None);

        assert_eq!(request.virtual_services[0].routes[0].timeout_ms, Some(u64::MAX));
    }
}
