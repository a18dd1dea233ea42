//! HTTP server bootstrap for the invoice gateway.
//!
//! This module wires together:
//! - configuration
//! - the payee identity (derived from the configured signing key)
//! - the subgraph registry and ledger collaborator
//! - the Axum router

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use alloy::signers::local::PrivateKeySigner;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use crate::auth::{ApiKeyValidator, AuthMiddlewareState};
use crate::domain::{Currency, FeePolicy, PayeeIdentity};
use crate::invoice::InvoiceService;
use crate::ledger::{InMemoryLedger, SubgraphRegistry};

/// Development-only signing key (the well-known local test key the protocol
/// tooling ships with). Overridden by `PAYEE_PRIVATE_KEY` in any real
/// deployment.
const DEV_PAYEE_PRIVATE_KEY: &str =
    "0xc87509a1c067bbde78beb793e6fa76530b6382a4c0241e5e4a9ec0a0f44dc0d3";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Static API key; `None` means no key is configured.
    pub api_key: Option<String>,
    /// Whether the API key check is enforced.
    pub require_auth: bool,
    /// The single currency pair this deployment accepts.
    pub supported_currency: Currency,
    /// Fee recipient policy for the fee-proxy extension.
    pub fee_policy: FeePolicy,
    /// Payee signing key (hex private key).
    pub payee_private_key: String,
    /// Deadline for each ledger call.
    pub ledger_timeout: Duration,
    /// Simulated confirmation latency for the in-memory ledger.
    pub confirmation_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address: {e}"))?;

        let api_key = std::env::var("API_KEY").ok().filter(|k| !k.is_empty());
        let auth_mode = std::env::var("AUTH_MODE").unwrap_or_else(|_| "required".to_string());
        let require_auth = auth_mode != "disabled";

        let supported_currency: Currency = std::env::var("SUPPORTED_CURRENCY")
            .unwrap_or_else(|_| "ETH-sepolia".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid SUPPORTED_CURRENCY: {e}"))?;

        let fee_policy = match std::env::var("FEE_POLICY") {
            Ok(v) => FeePolicy::parse(&v)
                .ok_or_else(|| anyhow::anyhow!("Invalid FEE_POLICY: {v:?}"))?,
            Err(_) => FeePolicy::default(),
        };

        let payee_private_key = std::env::var("PAYEE_PRIVATE_KEY")
            .unwrap_or_else(|_| DEV_PAYEE_PRIVATE_KEY.to_string());

        let ledger_timeout = Duration::from_secs(
            std::env::var("LEDGER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        );

        let confirmation_delay = Duration::from_millis(
            std::env::var("CONFIRMATION_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        );

        Ok(Self {
            listen_addr,
            api_key,
            require_auth,
            supported_currency,
            fee_policy,
            payee_private_key,
            ledger_timeout,
            confirmation_delay,
        })
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub invoices: Arc<InvoiceService>,
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting Invoice Gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Supported currency: {}", config.supported_currency);
    info!("  Ledger timeout: {:?}", config.ledger_timeout);

    if config.require_auth && config.api_key.is_none() {
        anyhow::bail!(
            "AUTH_MODE=required but no API key is configured; set API_KEY (or set AUTH_MODE=disabled for local dev)"
        );
    }

    // Subgraph table is resolved and checked once, at startup: an unknown
    // chain must fail here, not at the first balance refresh.
    let subgraphs = SubgraphRegistry::from_env();
    let subgraph_url = subgraphs
        .url_for(&config.supported_currency.chain)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();
    info!("  Payment subgraph: {subgraph_url}");

    // Payee identity is fixed for the process lifetime.
    if config.payee_private_key == DEV_PAYEE_PRIVATE_KEY {
        warn!("Using the development payee key; set PAYEE_PRIVATE_KEY for real deployments");
    }
    let signer: PrivateKeySigner = config
        .payee_private_key
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid payee private key: {e}"))?;
    let payee = PayeeIdentity::new(signer.address());
    info!("  Payee identity: {}", payee.address);

    let ledger = Arc::new(
        InMemoryLedger::new(subgraphs).with_confirmation_delay(config.confirmation_delay),
    );
    let invoices = Arc::new(InvoiceService::new(
        ledger,
        payee,
        config.supported_currency.clone(),
        config.fee_policy,
        config.ledger_timeout,
    ));

    let auth_state = AuthMiddlewareState {
        validator: Arc::new(ApiKeyValidator::new(config.api_key.as_deref())),
        require_auth: config.require_auth,
    };

    let state = AppState { invoices };
    let app = build_router(auth_state)?.with_state(state);

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("Invoice Gateway is ready to accept connections");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

/// Build the full router: invoice routes behind auth, health check open.
pub fn build_router(auth_state: AuthMiddlewareState) -> anyhow::Result<Router<AppState>> {
    let invoices = crate::api::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        crate::auth::auth_middleware,
    ));

    let mut router = Router::new()
        .merge(invoices)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors_layer_from_env()? {
        router = router.layer(cors_layer);
    }

    Ok(router)
}

fn cors_layer_from_env() -> anyhow::Result<Option<CorsLayer>> {
    let origins = match std::env::var("CORS_ALLOW_ORIGINS") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let origins = origins.trim();
    if origins.is_empty() {
        return Ok(None);
    }

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ]),
    ))
}

/// Health check endpoint.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "service": "invoice-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
