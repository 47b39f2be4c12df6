use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, OAuthCallback, PublicUser, RegisterRequest},
        identity::Provider,
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_password},
        repo_types::{Role, User},
    },
    error::{unique_violation, ApiError},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/:provider", get(oauth_start))
        .route("/auth/:provider/callback", get(oauth_callback))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    if payload.username.is_empty() {
        return Err(ApiError::Validation("Username is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    let role = payload.role.unwrap_or(Role::Student);
    let hash = hash_password(&payload.password)?;

    let user = match User::create(&state.db, &payload.username, &payload.email, &hash, role).await
    {
        Ok(u) => u,
        Err(e) if unique_violation(&e).is_some() => {
            warn!(email = %payload.email, "email already registered");
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, email = %user.email, role = ?user.role, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::InvalidCredentials);
        }
    };

    // Provider-only accounts have no hash; same outcome as a wrong password.
    let Some(hash) = user.password_hash.as_deref() else {
        warn!(user_id = %user.id, "login attempt on provider-only account");
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_password(&payload.password, hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, user.role)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        role: user.role,
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn oauth_start(
    State(state): State<AppState>,
    Path(provider): Path<Provider>,
) -> Result<Redirect, ApiError> {
    let url = state.identity.authorize_url(provider);
    Ok(Redirect::to(&url))
}

#[instrument(skip(state, query))]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<Provider>,
    Query(query): Query<OAuthCallback>,
) -> Result<Redirect, ApiError> {
    let identity = match state.identity.verify_code(provider, &query.code).await {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, provider = ?provider, "provider verification failed");
            return Err(ApiError::InvalidCredentials);
        }
    };

    let user = User::resolve_external(&state.db, &identity).await?;
    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id, user.role)?;

    info!(user_id = %user.id, provider = ?provider, "external login");
    Ok(Redirect::to(&format!(
        "{}?token={}",
        state.config.oauth.frontend_redirect_url, token
    )))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let record = User::find_by_id(&state.db, user.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(record.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a.b+c@x.co"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("spaces in@x.com"));
        assert!(!is_valid_email("missing@tld"));
    }
}
