//! API Server - HTTP server for REST API

use axum::{
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::auth::{Claims, JwtConfig};
use crate::api::handlers::{self, AppState};
use crate::config::Config;
use crate::error::StoreError;
use crate::security::Authenticator;
use crate::store::KvStore;

/// API Server configuration
pub struct ApiServer {
    state: Arc<AppState>,
    addr: String,
    request_timeout: Duration,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(store: Arc<dyn KvStore>, config: &Config) -> Self {
        let state = Arc::new(AppState {
            authenticator: Authenticator::new(
                store.clone(),
                config.limits.default_provisioned_capacity,
            ),
            store,
            jwt_config: JwtConfig::new(
                config.auth.jwt_secret.clone(),
                config.auth.token_expiration_hours,
            ),
        });

        Self {
            state,
            addr: config.server.listen_addr.clone(),
            request_timeout: config.server.request_timeout(),
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.request_timeout)
    }

    /// Bind the configured address and serve until ctrl-c
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Starting API server on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

pub(crate) fn build_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/object", post(handlers::create_object))
        .route(
            "/object/:key",
            get(handlers::get_object).delete(handlers::delete_object),
        )
        .route("/batch/object", post(handlers::batch_create_objects))
        .route("/quota", get(handlers::get_quota))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Authentication middleware - validates JWT token
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    // The token may come with or without the Bearer scheme
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.strip_prefix("Bearer ").unwrap_or(h).trim())
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        warn!("Missing Authorization header");
        return StoreError::Unauthorized("missing authorization token".to_string())
            .into_response();
    };

    match state.jwt_config.validate_token(token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            warn!("Invalid JWT token: {}", e);
            StoreError::Unauthorized("invalid or expired token".to_string()).into_response()
        }
    }
}

/// Extract Claims from request (for handlers)
#[axum::async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = StoreError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or_else(|| StoreError::Unauthorized("not authenticated".to_string()))
    }
}
