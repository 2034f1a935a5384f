use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, FromRequest, Request, State};
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

use crate::config::SignupMode;
use crate::state::AppState;

mod auth;

pub const API_BASE_PATH: &str = "/api/v1";

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    assert!(max_body_bytes > 0, "Body limit must be positive");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let api_router = auth::router()
        .route("/", get(api_root))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .nest(API_BASE_PATH, api_router)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(state)
}

async fn api_root() -> &'static str {
    "Hello"
}

async fn health_live(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    let uptime = state.start_time.elapsed().as_secs();
    let response = HealthResponse {
        status: "live",
        uptime_seconds: uptime,
    };
    Ok(Json(response))
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    state
        .store
        .ping()
        .await
        .map_err(|err| {
            warn!("Readiness probe failed: {err}");
            HttpError::new(StatusCode::SERVICE_UNAVAILABLE, "Store unavailable".to_string())
        })?;

    let response = ReadyResponse {
        status: "ready",
        signup_mode: state.signup_mode,
        cached_profiles: state.profiles.entry_count(),
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadyResponse {
    status: &'static str,
    signup_mode: SignupMode,
    cached_profiles: u64,
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self { status, message }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!("HTTP error {}: {}", self.status, self.message);
        } else {
            info!("HTTP error {}: {}", self.status, self.message);
        }
        let body = Json(ErrorBody {
            message: self.message,
            status_code: self.status.as_u16(),
            status: "error",
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: String,
    status_code: u16,
    status: &'static str,
}

/// JSON body that has passed its `validator` schema before the handler runs.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection_error)?;
        value
            .validate()
            .map_err(|errors| HttpError::bad_request(first_validation_message(&errors)))?;
        Ok(Self(value))
    }
}

/// Body shape errors are plain 400s; size and content-type rejections keep
/// their own status.
fn json_rejection_error(rejection: JsonRejection) -> HttpError {
    let status = match rejection {
        JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
            StatusCode::BAD_REQUEST
        }
        ref other => other.status(),
    };
    HttpError::new(status, rejection.body_text())
}

/// Message of the alphabetically first failing field.
fn first_validation_message(errors: &ValidationErrors) -> String {
    let field_errors = errors.field_errors();
    let mut fields: Vec<_> = field_errors.iter().collect();
    fields.sort_by(|(left, _), (right, _)| left.cmp(right));

    fields
        .into_iter()
        .find_map(|(field, errors)| {
            errors.first().map(|error| match &error.message {
                Some(message) => message.to_string(),
                None => format!("Invalid {field}"),
            })
        })
        .unwrap_or_else(|| "Invalid request body".to_string())
}


#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::test_support::{MemoryAuthStore, UploadBehavior, harness, harness_with_store};
    use super::*;

    const LIMIT: usize = 1024 * 1024;

    async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn api_root_says_hello() {
        let h = harness(SignupMode::Profile, UploadBehavior::Succeed);
        let (status, body) = get(router(h.state, LIMIT), "/api/v1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Hello");
    }

    #[tokio::test]
    async fn liveness_reports_uptime() {
        let h = harness(SignupMode::Profile, UploadBehavior::Succeed);
        let (status, body) = get(router(h.state, LIMIT), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "live");
        assert!(json["uptimeSeconds"].is_u64());
    }

    #[tokio::test]
    async fn readiness_reports_mode_and_cache_size() {
        let h = harness(SignupMode::Identity, UploadBehavior::Succeed);
        let (status, body) = get(router(h.state, LIMIT), "/health/ready").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ready");
        assert_eq!(json["signupMode"], "identity");
        assert_eq!(json["cachedProfiles"], 0);
    }

    #[tokio::test]
    async fn readiness_fails_when_store_is_down() {
        let store = MemoryAuthStore {
            unavailable: true,
            ..Default::default()
        };
        let h = harness_with_store(SignupMode::Profile, UploadBehavior::Succeed, store);
        let (status, body) = get(router(h.state, LIMIT), "/health/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["statusCode"], 503);
        assert_eq!(json["message"], "Store unavailable");
    }

    #[tokio::test]
    async fn error_body_carries_status_fields() {
        let response = HttpError::bad_request("Invalid credentials").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["message"], "Invalid credentials");
        assert_eq!(json["statusCode"], 400);
        assert_eq!(json["status"], "error");
    }
}
