use std::time::Duration;

use axum::extract::State;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use sea_orm::DbErr;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::CorsConfig;
use crate::polls::PollError;
use crate::realtime::socket::websocket;
use crate::state::AppState;

mod likes;
mod polls;
mod votes;

#[cfg(test)]
mod tests;

pub fn router(state: AppState, cors: &CorsConfig) -> Router {
    let api = Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .nest(
            "/polls",
            polls::router().merge(votes::router()).merge(likes::router()),
        );

    Router::new()
        .route("/", get(service_info))
        .route("/ws", get(websocket))
        .nest("/api", api)
        .fallback(route_not_found)
        .layer(middleware::map_response_with_state(
            state.clone(),
            attach_error_detail,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors))
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    if config.allows_any() {
        return layer.allow_origin(Any);
    }
    // Validated at startup; anything unparsable was rejected there.
    let origins = config.header_values().unwrap_or_default();
    layer.allow_origin(origins).allow_credentials(true)
}

async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        status: "ok",
        message: "QuickPoll API Server",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ServiceEndpoints {
            polls: "/api/polls",
            health: "/api/health",
            realtime: "/ws",
        },
    })
}

async fn health_live(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "live",
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    state.database.ping().await.map_err(|err| {
        HttpError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Database unavailable: {err}"),
        )
    })?;

    Ok(Json(ReadyResponse {
        status: "ready",
        subscribers: state.events.subscriber_count(),
    }))
}

/// Server errors carry their underlying cause in the body only when the state allows it.
async fn attach_error_detail(State(state): State<AppState>, mut response: Response) -> Response {
    let Some(body) = response.extensions_mut().remove::<ErrorBody>() else {
        return response;
    };
    if !state.expose_error_detail || body.detail.is_none() {
        return response;
    }
    (response.status(), Json(body)).into_response()
}

async fn route_not_found() -> HttpError {
    HttpError::new(StatusCode::NOT_FOUND, "Route not found".to_string())
}

#[derive(Debug, Serialize)]
struct ServiceInfo {
    status: &'static str,
    message: &'static str,
    version: &'static str,
    endpoints: ServiceEndpoints,
}

#[derive(Debug, Serialize)]
struct ServiceEndpoints {
    polls: &'static str,
    health: &'static str,
    realtime: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    subscribers: usize,
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
    detail: Option<String>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self {
            status,
            message,
            detail: None,
        }
    }

    pub fn internal(detail: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal Server Error".to_string(),
            detail: Some(detail),
        }
    }
}

impl From<PollError> for HttpError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::MissingField(_) | PollError::InvalidPoll(_) | PollError::InvalidOption => {
                Self::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            PollError::PollNotFound => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            PollError::Database(db_err) => Self::internal(db_err.to_string()),
        }
    }
}

impl From<DbErr> for HttpError {
    fn from(err: DbErr) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(
                "HTTP error {}: {} ({})",
                self.status,
                self.message,
                self.detail.as_deref().unwrap_or("no detail")
            );
        } else {
            info!("HTTP error: {}", self.message);
        }

        let public = ErrorBody {
            success: false,
            message: self.message.clone(),
            detail: None,
        };
        let mut response = (self.status, Json(public)).into_response();
        response.extensions_mut().insert(ErrorBody {
            success: false,
            message: self.message,
            detail: self.detail,
        });
        response
    }
}

#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}
