use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::auth::{
    SignupIds, build_auth_document, build_user_profile, first_letter_uppercase, lowercase,
};
use crate::config::SignupMode;
use crate::models::auth::{SignupIdentityResponse, SignupProfileResponse, SignupRequest};
use crate::state::AppState;
use crate::store::StoreError;

use super::{HttpError, ValidatedJson};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const UPLOAD_FAILED: &str = "File upload: Error occurred. Try again.";
const INTERNAL_ERROR: &str = "Something went wrong. Try again later.";

pub fn router() -> Router<AppState> {
    Router::new().route("/signup", post(signup))
}

async fn signup(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SignupRequest>,
) -> Result<Response, HttpError> {
    let username = first_letter_uppercase(&payload.username);
    let email = lowercase(&payload.email);

    let existing = state
        .store
        .find_by_username_or_email(&username, &email)
        .await
        .map_err(|err| {
            error!("Looking up {username} / {email} failed: {err}");
            HttpError::internal(INTERNAL_ERROR)
        })?;
    if existing.is_some() {
        return Err(HttpError::bad_request(INVALID_CREDENTIALS));
    }

    let ids = SignupIds::generate();
    let auth_data = build_auth_document(
        &ids,
        &payload.username,
        &payload.email,
        &payload.password,
        &payload.avatar_color,
        Utc::now(),
    );

    let profile_key = ids.profile_id.to_string();
    let upload = match state
        .media
        .upload(&payload.avatar_image, &profile_key, true, true)
        .await
    {
        Ok(result) => result,
        Err(err) => {
            warn!("Avatar upload for {profile_key} failed: {err}");
            return Err(HttpError::bad_request(UPLOAD_FAILED));
        }
    };
    let Some(public_id) = upload.public_id else {
        warn!("Avatar upload for {profile_key} returned no public id");
        return Err(HttpError::bad_request(UPLOAD_FAILED));
    };

    state.store.create(&auth_data).await.map_err(|err| match err {
        StoreError::Duplicate => HttpError::bad_request(INVALID_CREDENTIALS),
        other => {
            error!("Persisting auth record {} failed: {other}", auth_data.id);
            HttpError::internal(INTERNAL_ERROR)
        }
    })?;
    info!("Created user {} (uId {})", auth_data.username, auth_data.u_id);

    match state.signup_mode {
        SignupMode::Identity => {
            let body = SignupIdentityResponse {
                message: "User created!",
                auth_data,
            };
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
        SignupMode::Profile => {
            let picture = state.media.image_url(&public_id, upload.version);
            let user = build_user_profile(&auth_data, ids.profile_id, picture);
            state
                .profiles
                .save_profile(&profile_key, &ids.u_id, user.clone())
                .await
                .map_err(|err| {
                    error!("Caching profile {profile_key} failed: {err}");
                    HttpError::internal(INTERNAL_ERROR)
                })?;

            let body = SignupProfileResponse {
                message: "User created successfully",
                user,
            };
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
    }
}
