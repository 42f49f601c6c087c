use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{Json, Router, extract::DefaultBodyLimit, routing::get};
use portal_auth::{
    Clock, JwtService, OAuthState, ReplayGuard, SigningConfig, SigningKeyPair, SystemClock,
    TokenHandler, oauth_routes,
};
use portal_auth_memory::MemoryBackend;
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::bootstrap::seed_registrations;
use crate::config::AppConfig;

/// Loads the ID-token signing key from the configured PEM files, or
/// generates an ephemeral one when none are configured.
///
/// # Errors
///
/// Returns an error if a key file cannot be read or holds an invalid key.
pub fn load_signing_key(signing: &SigningConfig) -> anyhow::Result<SigningKeyPair> {
    match (&signing.private_key_path, &signing.public_key_path) {
        (Some(private_path), Some(public_path)) => {
            let private_pem = std::fs::read_to_string(private_path).with_context(|| {
                format!("failed to read private key {}", private_path.display())
            })?;
            let public_pem = std::fs::read_to_string(public_path)
                .with_context(|| format!("failed to read public key {}", public_path.display()))?;
            let kid = signing
                .key_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let key = SigningKeyPair::from_pem(kid, &private_pem, &public_pem)?;
            tracing::info!(kid = %key.kid, "Loaded signing key");
            Ok(key)
        }
        _ => {
            let mut key = SigningKeyPair::generate()?;
            if let Some(kid) = &signing.key_id {
                key.kid = kid.clone();
            }
            tracing::warn!(
                kid = %key.kid,
                "No signing key configured, generated an ephemeral key; ID tokens will not verify after restart"
            );
            Ok(key)
        }
    }
}

/// Builds the router over an existing backend.
///
/// Configured clients and scopes are seeded into `backend` first.
///
/// # Errors
///
/// Returns an error if the signing key cannot be loaded or seeding fails.
pub async fn build_app(
    cfg: &AppConfig,
    backend: &MemoryBackend,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Router> {
    let stats = seed_registrations(
        &cfg.bootstrap,
        backend.clients.as_ref(),
        backend.scopes.as_ref(),
    )
    .await
    .context("bootstrap failed")?;
    if stats.total() > 0 {
        tracing::info!(
            clients = stats.clients,
            scopes = stats.scopes,
            skipped = stats.skipped,
            "Bootstrap registrations created"
        );
    }

    let key = load_signing_key(&cfg.auth.signing)?;
    let jwt = Arc::new(JwtService::new(key, cfg.auth.issuer.clone()));
    let state = OAuthState::new(&cfg.auth, clock, jwt, backend.repositories());

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .merge(oauth_routes(state))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            use tracing::field::Empty;
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri().path(),
                                http.status_code = Empty
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(DefaultBodyLimit::max(cfg.server.body_limit_bytes)),
        ))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    clock: Arc<dyn Clock>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn build(self) -> anyhow::Result<PortalServer> {
        let backend = MemoryBackend::new();
        let app = build_app(&self.config, &backend, self.clock.clone()).await?;
        let tokens = TokenHandler::new(
            backend.tokens.clone(),
            self.clock.clone(),
            self.config.auth.tokens.clone(),
        );
        let replay_guard = ReplayGuard::new(backend.jti.clone(), self.clock);

        Ok(PortalServer {
            addr: self.addr,
            app,
            tokens,
            replay_guard,
            token_cleanup_every: self.config.auth.token_cleanup_interval,
            jti_cleanup_every: self.config.auth.jti_cleanup_interval,
        })
    }
}

pub struct PortalServer {
    addr: SocketAddr,
    app: Router,
    tokens: TokenHandler,
    replay_guard: ReplayGuard,
    token_cleanup_every: std::time::Duration,
    jti_cleanup_every: std::time::Duration,
}

impl PortalServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let cleanups = [
            self.tokens.start_cleanup_task(self.token_cleanup_every),
            self.replay_guard.start_cleanup_task(self.jti_cleanup_every),
        ];

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        for cleanup in &cleanups {
            cleanup.abort();
        }
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
