use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        claims::JwtKeys,
        dto::{
            AuthResponse, AuthenticateRequest, ConsumeResetRequest, MessageResponse,
            RegisterRequest, RequestResetRequest, SelfResponse,
        },
        extractors::AuthUser,
        password::{hash_password, verify_password},
        repo_types::User,
        reset::{generate_reset_token, reset_expiry},
    },
    error::ApiError,
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/authenticate", post(authenticate))
        .route("/request-reset", post(request_reset))
        .route("/consume-reset", post(consume_reset))
}

pub fn self_routes() -> Router<AppState> {
    Router::new().route("/self", get(get_self))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!("register invalid email");
        return Err(ApiError::validation("invalid email"));
    }

    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("register password too short");
        return Err(ApiError::validation("password too short"));
    }

    let username = match payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
    {
        Some(u) => u.to_string(),
        None => payload
            .email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let hash = hash_password(&payload.password).map_err(ApiError::server)?;

    // Insert-first: the store's uniqueness constraint is the only duplicate
    // check, so concurrent registrations cannot both pass.
    let user = User::create(&state.db, &payload.email, &username, &hash).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(&user).map_err(ApiError::server)?;

    dispatch_welcome(&state, user.email.clone(), user.username.clone());

    info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn authenticate(
    State(state): State<AppState>,
    Json(mut payload): Json<AuthenticateRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_string();

    // Unknown email and wrong password collapse to the same answer.
    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!("authenticate unknown email");
            return Err(ApiError::Auth("invalid credentials"));
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(ApiError::server)?;
    if !ok {
        warn!(user_id = %user.id, "authenticate wrong password");
        return Err(ApiError::Auth("invalid credentials"));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(&user).map_err(ApiError::server)?;

    info!(user_id = %user.id, "user authenticated");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn request_reset(
    State(state): State<AppState>,
    Json(mut payload): Json<RequestResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_string();

    // The acknowledgement is identical whether or not the account exists.
    if let Some(user) = User::find_by_email(&state.db, &payload.email).await? {
        let token = generate_reset_token();
        let expiry = reset_expiry(state.config.reset_ttl_minutes);
        User::set_reset_token(&state.db, &user.email, &token, expiry).await?;
        dispatch_reset_link(&state, user.email.clone(), user.username.clone(), token);
        info!(user_id = %user.id, "reset token issued");
    }

    Ok(Json(MessageResponse {
        message: "if that account exists, a reset link has been sent",
    }))
}

#[instrument(skip(state, payload))]
pub async fn consume_reset(
    State(state): State<AppState>,
    Json(payload): Json<ConsumeResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.new_password.len() < MIN_PASSWORD_LEN {
        warn!("consume_reset password too short");
        return Err(ApiError::validation("password too short"));
    }

    if User::find_by_reset_token(&state.db, &payload.token)
        .await?
        .is_none()
    {
        warn!("reset token lookup failed");
        return Err(ApiError::Auth("invalid or expired token"));
    }

    let hash = hash_password(&payload.new_password).map_err(ApiError::server)?;

    // Keyed on the token again: the lookup above can race another consume,
    // the update cannot.
    let user = User::consume_reset_token(&state.db, &payload.token, &hash)
        .await?
        .ok_or(ApiError::Auth("invalid or expired token"))?;

    info!(user_id = %user.id, "password reset completed");
    Ok(Json(MessageResponse {
        message: "password updated",
    }))
}

#[instrument(skip(state, claims))]
pub async fn get_self(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<SelfResponse>, ApiError> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(SelfResponse { user: user.into() }))
}

fn dispatch_welcome(state: &AppState, email: String, username: String) {
    let notifier = Arc::clone(&state.notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.send_welcome(&email, &username).await {
            warn!(error = %e, email = %email, "welcome mail dispatch failed");
        }
    });
}

fn dispatch_reset_link(state: &AppState, email: String, username: String, token: String) {
    let notifier = Arc::clone(&state.notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.send_reset_link(&email, &username, &token).await {
            warn!(error = %e, email = %email, "reset mail dispatch failed");
        }
    });
}
