use crate::error::{ApiError, INVALID_CREDENTIALS};
use crate::state::AppState;
use anyhow::Context;
use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use stratify_core::auth::{hash_password, verify_password, verify_unknown_user, MIN_PASSWORD_LEN};
use stratify_core::domain::user::{normalize_email, User, UserProfile};
use stratify_core::storage::users;

const LOGIN_FAILED: &str = "Invalid email or password";

/// The caller behind a valid bearer token. The user must still exist.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized(INVALID_CREDENTIALS))?;
        let claims = state.tokens.verify(token, Utc::now()).map_err(|e| {
            tracing::debug!(error = %e, "bearer token rejected");
            ApiError::Unauthorized(INVALID_CREDENTIALS)
        })?;

        let user = users::find_user_by_id(state.db()?, claims.sub)
            .await?
            .ok_or(ApiError::Unauthorized(INVALID_CREDENTIALS))?;
        Ok(AuthUser(user))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let email = normalize_email(&body.email).ok_or_else(|| ApiError::bad_request("Invalid email address"))?;
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let pool = state.db()?;

    let password = body.password;
    let hashed = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task failed")??;

    let user = users::create_user(pool, &email, &hashed)
        .await?
        .ok_or_else(|| ApiError::bad_request("Email already registered"))?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(UserProfile::from(&user))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<AccessToken>, ApiError> {
    let email = normalize_email(&body.email).ok_or(ApiError::Unauthorized(LOGIN_FAILED))?;
    let pool = state.db()?;

    let password = body.password;
    let Some(user) = users::find_user_by_email(pool, &email).await? else {
        tokio::task::spawn_blocking(move || verify_unknown_user(&password))
            .await
            .context("password verification task failed")?;
        return Err(ApiError::Unauthorized(LOGIN_FAILED));
    };

    let stored = user.hashed_password.clone();
    let ok = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .context("password verification task failed")??;
    if !ok {
        tracing::info!(user_id = %user.id, "login rejected");
        return Err(ApiError::Unauthorized(LOGIN_FAILED));
    }

    let access_token = state.tokens.issue(user.id, &user.email, Utc::now())?;
    Ok(Json(AccessToken {
        access_token,
        token_type: "bearer",
    }))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}
