//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with one route per reload site
//! - Wire up middleware (tracing, request ID, outer timeout, allow-list)
//! - Build the production reload pipeline from configuration
//! - Bind server to listener and shut down gracefully

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::schema::has_route_pattern;
use crate::config::{ReloadPolicy, ServiceConfig};
use crate::lifecycle::{shutdown, signals};
use crate::observability::metrics;
use crate::reload::{
    Apply, ApplyError, CommandValidator, ReloadOrchestrator, SignalApplier, StagingStore,
    TargetProcess, Validate,
};
use crate::security::{allow_list_middleware, AllowList, AllowListError};

/// Error type for building the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("allowed_ips for site {site}: {source}")]
    AllowList {
        site: String,
        #[source]
        source: AllowListError,
    },

    #[error("site path {0:?} is relative, a route pattern, or declared twice")]
    SitePath(String),

    #[error("reload target: {0}")]
    Target(#[from] ApplyError),
}

/// State injected into a reload site's handler.
#[derive(Clone)]
pub struct SiteState {
    pub policy: Arc<ReloadPolicy>,
    pub orchestrator: Arc<ReloadOrchestrator>,
}

/// HTTP server hosting the reload endpoints.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a server with the external validator and signal applier
    /// described by `config`.
    pub fn new(config: ServiceConfig) -> Result<Self, ServerError> {
        let validator = Arc::new(CommandValidator::from_config(&config.validator));
        let applier = Arc::new(SignalApplier::from_config(&config.target)?);
        tracing::info!(
            validator = %config.validator.program,
            signal = ?applier.signal(),
            "Reload pipeline configured"
        );
        Self::with_pipeline(config, validator, applier)
    }

    /// Create a server around caller-supplied validator and applier.
    pub fn with_pipeline(
        config: ServiceConfig,
        validator: Arc<dyn Validate>,
        applier: Arc<dyn Apply>,
    ) -> Result<Self, ServerError> {
        let orchestrator = Arc::new(ReloadOrchestrator::new(
            StagingStore::from_config(&config.staging),
            validator,
            applier,
            TargetProcess::from_config(&config.target)?,
        ));

        let router = Self::build_router(&config, orchestrator)?;
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &ServiceConfig,
        orchestrator: Arc<ReloadOrchestrator>,
    ) -> Result<Router, ServerError> {
        let mut router = Router::new();
        let mut paths = HashSet::new();

        for policy in config.resolved_sites() {
            if !policy.path.starts_with('/')
                || has_route_pattern(&policy.path)
                || !paths.insert(policy.path.clone())
            {
                return Err(ServerError::SitePath(policy.path));
            }
            let allow = AllowList::parse(&policy.allowed_ips).map_err(|source| {
                ServerError::AllowList {
                    site: policy.path.clone(),
                    source,
                }
            })?;

            tracing::info!(
                path = %policy.path,
                max_body_size = policy.max_body_size,
                restricted = !allow.allows_all(),
                "Reload site configured"
            );

            let state = SiteState {
                policy: Arc::new(policy.clone()),
                orchestrator: orchestrator.clone(),
            };
            let mut site = Router::new()
                .route(&policy.path, any(reload_handler))
                .with_state(state);
            if !allow.allows_all() {
                site = site.route_layer(middleware::from_fn_with_state(
                    Arc::new(allow),
                    allow_list_middleware,
                ));
            }
            router = router.merge(site);
        }

        if config.listener.request_timeout_secs > 0 {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )));
        }

        Ok(router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)))
    }

    /// Router for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until an
    /// OS shutdown signal arrives or `shutdown_rx` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            sites = self.config.resolved_sites().len(),
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = signals::shutdown_signal() => {},
                    _ = shutdown::wait(shutdown_rx) => {},
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// Reload endpoint. Every method is routed here so the orchestrator can
/// answer non-POST requests with 405 itself.
async fn reload_handler(State(site): State<SiteState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let _in_flight = metrics::InFlightGuard::enter();

    let response = match site.orchestrator.handle(&site.policy, request).await {
        Ok(accepted) => accepted.into_response(),
        Err(e) => e.into_response(),
    };

    metrics::record_reload(&site.policy.path, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::reload::{ApplyOutcome, ProcessIdentity, ValidationOutcome};
    use async_trait::async_trait;
    use axum::http::{header, Method, StatusCode};
    use std::path::Path;
    use tower::ServiceExt;

    struct AcceptAll;

    #[async_trait]
    impl Validate for AcceptAll {
        async fn validate(&self, _path: &Path) -> ValidationOutcome {
            ValidationOutcome::Accepted
        }
    }

    struct NoopApplier;

    impl Apply for NoopApplier {
        fn apply(&self, _target: ProcessIdentity) -> ApplyOutcome {
            ApplyOutcome::Applied
        }
    }

    fn config(dir: &Path) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.staging.dir = Some(dir.to_path_buf());
        config.target.pid = Some(1);
        config.sites = vec![
            SiteConfig {
                path: "/small".into(),
                max_body_size: Some(4),
                allowed_ips: None,
            },
            SiteConfig::default(),
        ];
        config
    }

    fn server(config: ServiceConfig) -> HttpServer {
        HttpServer::with_pipeline(config, Arc::new(AcceptAll), Arc::new(NoopApplier)).unwrap()
    }

    fn post(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_each_site_has_its_own_limit() {
        let dir = tempfile::tempdir().unwrap();
        let app = server(config(dir.path())).router();

        let res = app
            .clone()
            .oneshot(post("/small", "worker_processes 1;"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let res = app
            .oneshot(post("/update-config", "worker_processes 1;"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_LENGTH], "0");
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let res = server(config(dir.path()))
            .router()
            .oneshot(post("/elsewhere", "x"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_put_is_method_not_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/update-config")
            .body(Body::from("worker_processes 1;"))
            .unwrap();
        let res = server(config(dir.path()))
            .router()
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn test_bad_allow_list_is_rejected_at_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.sites[0].allowed_ips = Some("not-an-ip".into());
        let err = HttpServer::with_pipeline(config, Arc::new(AcceptAll), Arc::new(NoopApplier))
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::AllowList { .. }));
    }

    #[test]
    fn test_duplicate_site_is_rejected_at_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.sites.push(SiteConfig::default());
        let err = HttpServer::with_pipeline(config, Arc::new(AcceptAll), Arc::new(NoopApplier))
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::SitePath(path) if path == "/update-config"));
    }

    #[test]
    fn test_pattern_site_paths_are_rejected_at_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut captures = config(dir.path());
        captures.sites = ["/{a}", "/{b}"]
            .into_iter()
            .map(|path| SiteConfig {
                path: path.into(),
                max_body_size: None,
                allowed_ips: None,
            })
            .collect();
        let err = HttpServer::with_pipeline(captures, Arc::new(AcceptAll), Arc::new(NoopApplier))
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::SitePath(path) if path == "/{a}"));

        let mut unbalanced = config(dir.path());
        unbalanced.sites[0].path = "/open{".into();
        let err = HttpServer::with_pipeline(unbalanced, Arc::new(AcceptAll), Arc::new(NoopApplier))
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::SitePath(path) if path == "/open{"));
    }

    #[test]
    fn test_missing_target_is_rejected_at_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.target.pid = None;
        config.target.pid_file = None;
        assert!(matches!(
            HttpServer::new(config).err().unwrap(),
            ServerError::Target(ApplyError::NoTarget)
        ));
    }
}
