#![allow(clippy::result_large_err)]

//! HTTP trigger intake.
//!
//! * `POST /v1/events` hands a storage event to the [`TriggerRouter`] and
//!   answers before the execution finishes.
//! * `GET /v1/executions/{id}` returns the persisted execution record.
//!
//! Both routes require `Authorization: Bearer <token>`, where the token is read
//! once at startup from the variable named by `auth_token_env`.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::store::ExecutionStore;
use crate::core::workflow_graph::trigger::TriggerRouter;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::util::MapResponseLayer;
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Environment variable holding the bearer token, never the token itself.
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind() -> String {
    "127.0.0.1:8080".into()
}

fn default_auth_token_env() -> String {
    "SEECATS_WEBHOOK_TOKEN".into()
}

fn default_max_body_bytes() -> usize {
    1 << 20
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            auth_token_env: default_auth_token_env(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Clone)]
struct Intake {
    router: Arc<TriggerRouter>,
    store: Option<ExecutionStore>,
    token: Arc<str>,
}

#[derive(Debug, thiserror::Error)]
enum IntakeError {
    #[error("missing or invalid bearer token")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("execution not found")]
    NotFound,
    #[error("payload too large")]
    TooLarge,
    #[error("internal server error")]
    Internal,
}

impl IntakeError {
    fn status(&self) -> StatusCode {
        match self {
            IntakeError::Unauthorized => StatusCode::UNAUTHORIZED,
            IntakeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            IntakeError::NotFound => StatusCode::NOT_FOUND,
            IntakeError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            IntakeError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            IntakeError::Unauthorized => "SC-WEBHOOK-401",
            IntakeError::BadRequest(_) => "SC-WEBHOOK-400",
            IntakeError::NotFound => "SC-WEBHOOK-404",
            IntakeError::TooLarge => "SC-WEBHOOK-413",
            IntakeError::Internal => "SC-WEBHOOK-500",
        }
    }
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let body = json!({"error": {"code": self.code(), "message": self.to_string()}});
        (self.status(), Json(body)).into_response()
    }
}

/// Serve until the listener fails.
pub async fn serve_webhook(router: TriggerRouter, settings: WebhookSettings) -> Result<(), AppError> {
    serve(router, settings, None).await
}

/// Like [`serve_webhook`], sending the bound address once listening.
pub async fn serve_webhook_with_ready_notifier(
    router: TriggerRouter,
    settings: WebhookSettings,
    ready: oneshot::Sender<SocketAddr>,
) -> Result<(), AppError> {
    serve(router, settings, Some(ready)).await
}

async fn serve(
    router: TriggerRouter,
    settings: WebhookSettings,
    ready: Option<oneshot::Sender<SocketAddr>>,
) -> Result<(), AppError> {
    let token = read_token(&settings.auth_token_env)?;
    let addr: SocketAddr = settings.bind.parse().map_err(|err| {
        AppError::new(
            ErrorCategory::ValidationError,
            format!("webhook.bind '{}' is not a socket address: {}", settings.bind, err),
        )
    })?;

    let intake = Intake {
        store: router.engine().settings().store.clone(),
        router: Arc::new(router),
        token: token.into(),
    };
    let app = routes(intake, settings.max_body_bytes);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| io_error(format!("cannot listen on {}", addr), err))?;
    let bound = listener
        .local_addr()
        .map_err(|err| io_error("cannot read listener address".into(), err))?;
    if let Some(ready) = ready {
        let _ = ready.send(bound);
    }
    tracing::info!(addr = %bound, "accepting trigger events");

    axum::serve(listener, app)
        .await
        .map_err(|err| io_error("webhook listener stopped".into(), err))
}

fn routes(intake: Intake, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/v1/events", post(accept_event))
        .route("/v1/executions/{id}", get(fetch_execution))
        .route_layer(middleware::from_fn_with_state(intake.clone(), require_bearer))
        .with_state(intake)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(MapResponseLayer::new(explain_overflow))
}

async fn require_bearer(
    State(intake): State<Intake>,
    request: Request,
    next: Next,
) -> Result<Response, IntakeError> {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(IntakeError::Unauthorized)?;
    if !bool::from(presented.as_bytes().ct_eq(intake.token.as_bytes())) {
        return Err(IntakeError::Unauthorized);
    }
    Ok(next.run(request).await)
}

// The limit layer and the body extractor both answer 413 with plain text.
fn explain_overflow(response: Response<Body>) -> Response<Body> {
    if response.status() == StatusCode::PAYLOAD_TOO_LARGE {
        IntakeError::TooLarge.into_response()
    } else {
        response
    }
}

async fn accept_event(State(intake): State<Intake>, body: Bytes) -> Result<Json<Value>, IntakeError> {
    let event: Value =
        serde_json::from_slice(&body).map_err(|_| IntakeError::BadRequest("body is not valid JSON"))?;
    if !event.is_object() {
        return Err(IntakeError::BadRequest("event must be a JSON object"));
    }

    let started = intake.router.dispatch(event).map_err(|err| {
        tracing::error!(error = %err, "failed to start execution");
        IntakeError::Internal
    })?;
    Ok(Json(match started {
        Some(handle) => json!({
            "execution_id": handle.execution_id.to_string(),
            "status": "running",
        }),
        None => json!({"status": "ignored"}),
    }))
}

async fn fetch_execution(
    State(intake): State<Intake>,
    Path(id): Path<String>,
) -> Result<Json<Value>, IntakeError> {
    let execution_id =
        Uuid::parse_str(&id).map_err(|_| IntakeError::BadRequest("execution id is not a UUID"))?;
    let store = intake.store.as_ref().ok_or(IntakeError::NotFound)?;
    let record = store
        .load(&execution_id)
        .map_err(|_| IntakeError::NotFound)?;
    serde_json::to_value(&record)
        .map(Json)
        .map_err(|_| IntakeError::Internal)
}

fn read_token(variable: &str) -> Result<String, AppError> {
    match std::env::var(variable) {
        Ok(token) if !token.trim().is_empty() => Ok(token),
        Ok(_) => Err(AppError::new(
            ErrorCategory::ValidationError,
            format!("webhook token variable {} is empty", variable),
        )),
        Err(_) => Err(AppError::new(
            ErrorCategory::ValidationError,
            format!("webhook token variable {} is not set", variable),
        )),
    }
}

fn io_error(message: String, err: std::io::Error) -> AppError {
    AppError::with_source(ErrorCategory::IoError, message, Box::new(err))
}
