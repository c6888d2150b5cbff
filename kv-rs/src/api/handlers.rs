//! API request handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

use crate::api::auth::{Claims, JwtConfig};
use crate::error::{ErrorKind, StoreError};
use crate::security::Authenticator;
use crate::store::{KvStore, Object};

const INVALID_BODY: &str = "invalid request body";

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn KvStore>,
    pub authenticator: Authenticator,
    pub jwt_config: JwtConfig,
}

/// Registration request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub user_name: String,
    pub password: String,
    #[serde(default)]
    pub provisioned_capacity: Option<i64>,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn created(msg: &str) -> (StatusCode, Json<Self>) {
        (
            StatusCode::CREATED,
            Json(Self {
                message: msg.to_string(),
            }),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct QuotaResponse {
    pub provisioned: i64,
    pub utilised: i64,
    pub remaining: i64,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub kind: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, msg: &str) -> Self {
        Self {
            error: msg.to_string(),
            kind: kind.as_str().to_string(),
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::QuotaExceeded => StatusCode::FORBIDDEN,
        ErrorKind::ValueTooLarge | ErrorKind::BatchTooLarge | ErrorKind::InvalidInput => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        if kind == ErrorKind::Internal {
            error!("Request failed: {}", self);
        }

        (
            status_for(kind),
            Json(ApiError::new(kind, &self.public_message())),
        )
            .into_response()
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, StoreError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            warn!("Rejected request body: {}", rejection);
            Err(StoreError::InvalidInput(INVALID_BODY.to_string()))
        }
    }
}

/// GET /api/health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/auth/register - Create a user and its quota
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, StoreError> {
    let req = body(payload)?;

    state
        .authenticator
        .register(&req.user_name, &req.password, req.provisioned_capacity)
        .await?;

    Ok(MessageResponse::created("user registered successfully"))
}

/// POST /api/auth/login - Authenticate and get JWT token
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, StoreError> {
    let req = body(payload)?;

    let user = state
        .authenticator
        .authenticate(&req.user_name, &req.password)
        .await?;

    let token = state
        .jwt_config
        .create_token(user.id)
        .map_err(|e| StoreError::Internal(format!("Failed to create token: {}", e)))?;

    Ok(Json(LoginResponse { token }))
}

/// POST /api/object - Create or overwrite one object
pub async fn create_object(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    payload: Result<Json<Object>, JsonRejection>,
) -> Result<impl IntoResponse, StoreError> {
    let object = body(payload)?;

    state.store.create_object(claims.user_id, object).await?;

    Ok(MessageResponse::created("object created successfully"))
}

/// GET /api/object/:key
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(key): Path<String>,
) -> Result<Json<Object>, StoreError> {
    let object = state.store.get_object(claims.user_id, &key).await?;
    Ok(Json(object))
}

/// DELETE /api/object/:key - Always 204, even when the key is absent
pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    Path(key): Path<String>,
) -> Result<StatusCode, StoreError> {
    state.store.delete_object(claims.user_id, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/batch/object - Write every object or none
pub async fn batch_create_objects(
    State(state): State<Arc<AppState>>,
    claims: Claims,
    payload: Result<Json<Vec<Object>>, JsonRejection>,
) -> Result<impl IntoResponse, StoreError> {
    let objects = body(payload)?;

    state
        .store
        .batch_create_objects(claims.user_id, objects)
        .await?;

    Ok(MessageResponse::created("object created successfully"))
}

/// GET /api/quota - Current usage of the caller
pub async fn get_quota(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Json<QuotaResponse>, StoreError> {
    let quota = state.store.get_quota(claims.user_id).await?;

    Ok(Json(QuotaResponse {
        provisioned: quota.provisioned,
        utilised: quota.utilised,
        remaining: quota.remaining(),
    }))
}
