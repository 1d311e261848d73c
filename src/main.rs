//! # mesh-bootstrap
//!
//! Startup helper run before (or inside) a microservice:
//!
//! 1. load `application.yaml` (path from the first argument or `APPLICATION_CONFIG`)
//!    and apply environment overrides
//! 2. pull the microservice's overlay from the config server and merge it
//! 3. register the routes declared in `routes.manifest` with the service mesh
//!
//! A missing `microservice.name` stops the process with exit code 2.

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use mesh_bootstrap::auth::{
    AnonymousTokenProvider, ServiceAccountTokenProvider, TokenProvider, SERVICE_ACCOUNT_TOKEN_PATH,
};
use mesh_bootstrap::core::config::{select_url, ConfigAccessor, Properties, INTERNAL_TLS_ENABLED_KEY, MICROSERVICE_NAME_KEY};
use mesh_bootstrap::observability::{init_logging, LogConfig};
use mesh_bootstrap::routing::{HttpRoutePusher, RouteManifest, ROUTES_MANIFEST_KEY};
use mesh_bootstrap::{ConfigServerSource, PropertyFetcher, PropertySource, Registrar, RegistrarConfig};

const DEFAULT_APPLICATION_CONFIG: &str = "application.yaml";
const ROUTE_REGISTRATION_URL_KEY: &str = "route-registration.url";
const HTTP_CLIENT_TIMEOUT_KEY: &str = "http.client.timeout";
const NAMESPACE_KEY: &str = "cloud.namespace";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("APPLICATION_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_APPLICATION_CONFIG.to_string());

    let mut properties = load_properties(&config_path).await?;
    init_logging(&LogConfig::from_properties(&properties), "mesh-bootstrap");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let tls_enabled = properties.get_or_default_bool(INTERNAL_TLS_ENABLED_KEY, false);
    let client = reqwest::Client::builder()
        .timeout(properties.get_or_default_duration(HTTP_CLIENT_TIMEOUT_KEY, Duration::from_secs(30)))
        .build()
        .context("failed to build HTTP client")?;
    let tokens = token_provider();

    let fetcher = PropertyFetcher::new(client.clone(), tokens.clone(), Arc::new(properties.clone()))
        .with_tls(tls_enabled);
    let source = ConfigServerSource::new(Arc::new(fetcher));

    match source.read(&cancel).await {
        Ok(remote) => {
            info!(source = source.name(), keys = remote.len(), "Merged remote properties");
            properties.extend(remote);
        }
        Err(e) if e.is_fatal() => {
            error!(error = %e, "Cannot start without '{}'", MICROSERVICE_NAME_KEY);
            std::process::exit(2);
        }
        Err(e) => return Err(e).context("failed to load properties from config-server"),
    }

    let Some(manifest_path) = properties.get_string(ROUTES_MANIFEST_KEY) else {
        info!("No route manifest configured, skipping route registration");
        return Ok(());
    };
    let manifest = RouteManifest::load_from_file(&manifest_path).await?;

    let endpoint = properties.get_or_default_string(
        ROUTE_REGISTRATION_URL_KEY,
        select_url(
            tls_enabled,
            "http://control-plane:8080/api/v3/routes",
            "https://control-plane:8443/api/v3/routes",
        ),
    );
    let pusher = HttpRoutePusher::new(client, &endpoint, tokens)?.with_cancellation(cancel.clone());

    let mut config = RegistrarConfig::from_env();
    if let Some(namespace) = properties.get_string(NAMESPACE_KEY) {
        config = config.with_namespace(namespace);
    }

    let report = Registrar::new(config, Arc::new(pusher))
        .with_routes(manifest.routes)
        .register()
        .await
        .context("route registration failed")?;

    for (gateway, routes) in &report.dispatched {
        info!(gateway = %gateway, routes, "Gateway updated");
    }
    Ok(())
}

async fn load_properties(path: &str) -> anyhow::Result<Properties> {
    let mut properties = if Path::new(path).exists() {
        Properties::load_from_file(path).await?
    } else {
        Properties::new()
    };
    properties.apply_env_overrides();
    Ok(properties)
}

fn token_provider() -> Arc<dyn TokenProvider> {
    if Path::new(SERVICE_ACCOUNT_TOKEN_PATH).exists() {
        Arc::new(ServiceAccountTokenProvider::default())
    } else {
        warn!("No service account token found, calling config-server unauthenticated");
        Arc::new(AnonymousTokenProvider)
    }
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling startup");
            cancel.cancel();
        }
    });
}
