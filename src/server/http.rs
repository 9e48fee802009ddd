//! HTTP handlers
//!
//! The JSON API a client renders from: sign-up/sign-in, the profile, intents,
//! and the read-only shop, history and stats views.

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::identity::AuthError;
use crate::server::auth::{Claims, CredentialsRequest, LoginResponse, RefreshRequest, TokenType};
use crate::server::ServerState;
use crate::session::{Intent, Outcome, Rewards};
use crate::stats::{self, ProgressSummary};
use crate::store::StoreError;
use crate::types::{HistoryEntry, Profile};

/// Errors returned by the API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Login failed.")]
    LoginFailed,

    #[error("Registration failed.")]
    RegistrationFailed,

    #[error("Too many failed attempts, try again in {0} minutes.")]
    LockedOut(i64),

    #[error("Invalid refresh token.")]
    InvalidRefreshToken,

    #[error("Not found.")]
    NotFound,

    #[error("Identity provider unavailable.")]
    IdentityUnavailable,

    #[error("Profile store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::LoginFailed | ApiError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            ApiError::RegistrationFailed => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::LockedOut(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::IdentityUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(StoreError::Encoding(_)) | ApiError::Internal(_) => {
                error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn lockout_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub identity: String,
    pub store: String,
    pub active_sessions: usize,
    pub rewards: Rewards,
}

/// Profile with its sidebar numbers
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: Profile,
    pub summary: ProgressSummary,
}

impl ProfileResponse {
    fn of(profile: Profile) -> Self {
        let summary = ProgressSummary::of(&profile);
        Self { profile, summary }
    }
}

/// Result of an intent
#[derive(Debug, Serialize)]
pub struct IntentResponse {
    pub outcome: Outcome,
    pub profile: Profile,
    pub summary: ProgressSummary,
}

/// Sign-up handler
pub async fn signup_handler(
    State(state): State<ServerState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<impl IntoResponse> {
    match state.identity.sign_up(&req.email, &req.password).await {
        Ok(signed_up) => {
            info!("Registered {}", signed_up.user_id);
            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "user_id": signed_up.user_id,
                    "message": "Registered! Please login."
                })),
            ))
        }
        Err(AuthError::Transport(e)) => {
            warn!("Sign-up could not reach identity provider: {}", e);
            Err(ApiError::IdentityUnavailable)
        }
        Err(e) => {
            warn!("Sign-up rejected: {}", e);
            Err(ApiError::RegistrationFailed)
        }
    }
}

/// Sign-in handler: verifies with the identity provider, opens the session
/// and issues tokens
pub async fn login_handler(
    State(state): State<ServerState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let key = lockout_key(&req.email);
    if let Some(remaining) = state.auth_state.is_locked(&key) {
        return Err(ApiError::LockedOut(remaining.num_minutes() + 1));
    }

    let signed_in = match state.identity.sign_in(&req.email, &req.password).await {
        Ok(signed_in) => signed_in,
        Err(AuthError::Transport(e)) => {
            warn!("Sign-in could not reach identity provider: {}", e);
            return Err(ApiError::IdentityUnavailable);
        }
        Err(e) => {
            warn!("Sign-in rejected: {}", e);
            state.auth_state.record_failed_login(&key);
            return Err(ApiError::LoginFailed);
        }
    };
    state.auth_state.clear_login_attempts(&key);

    state.sessions.open(&signed_in.user_id).await?;

    let access_token = state.auth_state.generate_access_token(&signed_in.user_id)?;
    let refresh_token = state.auth_state.generate_refresh_token(&signed_in.user_id)?;

    Ok(Json(LoginResponse {
        user_id: signed_in.user_id,
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth_state.access_token_expiry_seconds(),
    }))
}

/// Refresh handler: trades a refresh token for a new pair
pub async fn refresh_handler(
    State(state): State<ServerState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let claims = state
        .auth_state
        .validate_token(&req.refresh_token)
        .map_err(|_| ApiError::InvalidRefreshToken)?;
    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::InvalidRefreshToken);
    }

    state.auth_state.revoke_token(&claims.jti);

    let access_token = state.auth_state.generate_access_token(&claims.sub)?;
    let refresh_token = state.auth_state.generate_refresh_token(&claims.sub)?;

    Ok(Json(LoginResponse {
        user_id: claims.sub,
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth_state.access_token_expiry_seconds(),
    }))
}

/// Logout handler: saves pending changes, ends the session, revokes the
/// access token and every refresh token of the user
pub async fn logout_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state.sessions.close(&claims.sub).await?;
    state.auth_state.revoke_token(&claims.jti);
    state.auth_state.revoke_user_refresh_tokens(&claims.sub);
    Ok(Json(json!({ "message": "Logged out" })))
}

/// Status handler
pub async fn status_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        identity: state.identity.name().to_string(),
        store: state.sessions.store_name().to_string(),
        active_sessions: state.sessions.active_count().await,
        rewards: state.sessions.controller().rewards(),
    })
}

/// Unknown routes
pub async fn not_found_handler() -> ApiError {
    ApiError::NotFound
}

pub async fn profile_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = state.sessions.profile(&claims.sub).await?;
    Ok(Json(ProfileResponse::of(profile)))
}

/// Intent handler: the single entry point for profile changes
pub async fn intent_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
    Json(intent): Json<Intent>,
) -> ApiResult<Json<IntentResponse>> {
    let result = state.sessions.dispatch(&claims.sub, intent, today()).await?;
    let summary = ProgressSummary::of(&result.profile);
    Ok(Json(IntentResponse {
        outcome: result.outcome,
        profile: result.profile,
        summary,
    }))
}

pub async fn shop_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let profile = state.sessions.profile(&claims.sub).await?;
    let items = stats::shop_view(state.sessions.controller().catalog(), &profile);
    Ok(Json(json!({ "coins": profile.coins, "items": items })))
}

pub async fn avatars_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let profile = state.sessions.profile(&claims.sub).await?;
    let selectable = state
        .sessions
        .controller()
        .catalog()
        .selectable(&profile.purchased_avatars);
    Ok(Json(json!({ "current": profile.avatar, "selectable": selectable })))
}

pub async fn history_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let profile = state.sessions.profile(&claims.sub).await?;
    Ok(Json(profile.history))
}

pub async fn stats_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let profile = state.sessions.profile(&claims.sub).await?;
    Ok(Json(json!({
        "summary": ProgressSummary::of(&profile),
        "weekly": stats::weekly_completions(&profile.history),
    })))
}

pub async fn reminder_handler(
    State(state): State<ServerState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let profile = state.sessions.profile(&claims.sub).await?;
    Ok(Json(stats::reminder(&profile, today())))
}
