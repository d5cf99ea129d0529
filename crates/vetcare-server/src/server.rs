use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use url::Url;
use vetcare_core::{LabResult, Prescription, Vaccination};
use vetcare_db_memory::create_storage;
use vetcare_storage::{DocumentStore, DynStorage};

use crate::{
    config::AppConfig,
    error::LifecycleError,
    handlers::{self, children, records, reports},
    lifecycle::RecordLifecycleManager,
    middleware as app_middleware,
    report::ReportAssembler,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: DynStorage,
    pub lifecycle: Arc<RecordLifecycleManager>,
    pub reports: ReportAssembler,
}

impl AppState {
    /// Prepares indexes on `storage` and, if enabled, replays interrupted
    /// record deletes before any request is served.
    pub async fn initialize(cfg: &AppConfig, storage: DynStorage) -> Result<Self, LifecycleError> {
        let lifecycle = RecordLifecycleManager::new(storage.clone());
        lifecycle.stores().ensure_indexes().await?;

        if cfg.cascade.reconcile_on_startup {
            let summary = lifecycle.reconcile_pending().await?;
            if summary.replayed > 0 || summary.failed > 0 {
                tracing::info!(
                    replayed = summary.replayed,
                    failed = summary.failed,
                    "cascade reconciliation finished"
                );
            }
        }

        let public_base_url = match cfg.reports.public_base_url.as_deref() {
            Some(raw) => Some(Url::parse(raw).map_err(|e| {
                LifecycleError::report(format!("reports.public_base_url: {e}"))
            })?),
            None => None,
        };
        let reports = ReportAssembler::new(lifecycle.stores().clone(), public_base_url);

        tracing::info!(backend = storage.backend_name(), "storage ready");
        Ok(Self {
            config: Arc::new(cfg.clone()),
            storage,
            lifecycle: Arc::new(lifecycle),
            reports,
        })
    }
}

pub struct VetcareServer {
    addr: SocketAddr,
    app: Router,
}

/// Builds the application with the storage backend named in `cfg`.
pub async fn build_app(cfg: &AppConfig) -> Result<Router, LifecycleError> {
    let storage = create_storage(cfg.storage.backend);
    let state = AppState::initialize(cfg, storage).await?;
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let timeout = state.config.request_timeout();
    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        // Visit records
        .route("/records", get(records::list_records).post(records::create_record))
        .route(
            "/records/{id}",
            get(records::read_record)
                .put(records::update_record)
                .delete(records::delete_record),
        )
        .route("/records/{id}/report.pdf", get(reports::record_report))
        // Child entities
        .route(
            "/prescriptions",
            get(children::list::<Prescription>).post(children::create::<Prescription>),
        )
        .route(
            "/prescriptions/{id}",
            get(children::read::<Prescription>)
                .put(children::update::<Prescription>)
                .delete(children::delete::<Prescription>),
        )
        .route(
            "/vaccinations",
            get(children::list::<Vaccination>).post(children::create::<Vaccination>),
        )
        .route(
            "/vaccinations/{id}",
            get(children::read::<Vaccination>)
                .put(children::update::<Vaccination>)
                .delete(children::delete::<Vaccination>),
        )
        .route(
            "/labresults",
            get(children::list::<LabResult>).post(children::create::<LabResult>),
        )
        .route(
            "/labresults/{id}",
            get(children::read::<LabResult>)
                .put(children::update::<LabResult>)
                .delete(children::delete::<LabResult>),
        )
        .with_state(state)
        // Middleware stack, innermost first
        .layer(middleware::from_fn(app_middleware::content_negotiation))
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .headers()
                        .get(app_middleware::REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
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
        .layer(TimeoutLayer::new(timeout))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    storage: Option<DynStorage>,
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
            storage: None,
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

    /// Uses an existing backend instead of the configured one.
    pub fn with_storage(mut self, storage: DynStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub async fn build(self) -> Result<VetcareServer, LifecycleError> {
        let storage = self
            .storage
            .unwrap_or_else(|| create_storage(self.config.storage.backend));
        let state = AppState::initialize(&self.config, storage).await?;
        Ok(VetcareServer {
            addr: self.addr,
            app: router(state),
        })
    }
}

impl VetcareServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
