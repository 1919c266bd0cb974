use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect},
    Json,
};
use chrono::{Duration, Utc};
use hive_shared::Profile;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    db,
    error::{ApiError, ApiResult},
    profiles::{self, NewProfile},
    AppState,
};

const TOKEN_TTL_DAYS: i64 = 30;

// ── JWT Claims ──

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,   // profile id
    pub exp: usize, // expiry (unix timestamp)
}

impl Claims {
    pub fn new(profile_id: i64) -> Self {
        let exp = (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize;
        Self { sub: profile_id, exp }
    }
}

pub fn issue_token(profile_id: i64, jwt_secret: &str) -> ApiResult<String> {
    let token = encode(
        &Header::default(),
        &Claims::new(profile_id),
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

// ── Extract authenticated user from Authorization header ──

pub fn extract_user_id(headers: &HeaderMap, jwt_secret: &str) -> ApiResult<i64> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthenticated)?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        ApiError::Unauthenticated
    })?;

    Ok(data.claims.sub)
}

/// Caller identity when present; anonymous reads are allowed.
pub fn optional_user_id(headers: &HeaderMap, jwt_secret: &str) -> Option<i64> {
    extract_user_id(headers, jwt_secret).ok()
}

/// Post-login redirect, restricted to the frontend origin.
pub fn redirect_target(requested: Option<String>, origin: &str) -> String {
    requested
        .filter(|r| r == origin || r.starts_with(&format!("{}/", origin.trim_end_matches('/'))))
        .unwrap_or_else(|| origin.to_string())
}

// ── GitHub OAuth types ──

#[derive(Deserialize)]
pub struct LoginParams {
    redirect: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackParams {
    // absent when the user declines at the provider (`?error=access_denied`)
    code: Option<String>,
    state: Option<String>,
}

#[derive(Deserialize)]
struct GitHubTokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GitHubUser {
    id: i64,
    login: Option<String>,
    avatar_url: Option<String>,
    email: Option<String>,
}

// ── Handlers ──

/// GET /api/auth/github: redirect to GitHub OAuth
pub async fn github_login(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
) -> impl IntoResponse {
    let redirect_after = redirect_target(params.redirect, &state.config.cors_origin);

    let url = format!(
        "{}/authorize?client_id={}&redirect_uri={}&state={}",
        state.config.github_oauth_url,
        state.config.github_client_id,
        urlencoding::encode(&format!("{}/api/auth/callback", state.config.api_url)),
        urlencoding::encode(&redirect_after),
    );

    Redirect::temporary(&url)
}

/// GET /api/auth/callback: exchange code, create profile if absent, redirect with JWT
pub async fn github_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Redirect> {
    let config = &state.config;

    let Some(code) = params.code else {
        tracing::info!("sign-in cancelled at provider");
        return Ok(Redirect::temporary(&redirect_target(params.state, &config.cors_origin)));
    };

    let token_resp = state
        .http
        .post(format!("{}/access_token", config.github_oauth_url))
        .header("Accept", "application/json")
        .json(&serde_json::json!({
            "client_id": config.github_client_id,
            "client_secret": config.github_client_secret,
            "code": code,
        }))
        .send()
        .await?
        .error_for_status()?
        .json::<GitHubTokenResponse>()
        .await?;

    let gh_user = state
        .http
        .get(format!("{}/user", config.github_api_url))
        .header("Authorization", format!("Bearer {}", token_resp.access_token))
        .header("User-Agent", "hive-api")
        .send()
        .await?
        .error_for_status()?
        .json::<GitHubUser>()
        .await?;

    let new_profile = NewProfile {
        github_id: gh_user.id,
        username: profiles::pick_username(
            gh_user.login.as_deref(),
            gh_user.email.as_deref(),
            gh_user.id,
        ),
        avatar_url: gh_user.avatar_url.unwrap_or_default(),
        email: gh_user.email,
    };

    let profile_id = db::with_conn(&state.db, move |conn| {
        profiles::ensure_profile(conn, &new_profile, Utc::now())
    })
    .await?;

    let jwt = issue_token(profile_id, &config.jwt_secret)?;
    tracing::info!(profile_id, "signed in");

    let redirect_to = redirect_target(params.state, &config.cors_origin);
    let separator = if redirect_to.contains('?') { "&" } else { "?" };
    let url = format!("{redirect_to}{separator}token={jwt}");

    Ok(Redirect::temporary(&url))
}

/// GET /api/auth/me: return current profile
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Profile>> {
    let user_id = extract_user_id(&headers, &state.config.jwt_secret)?;
    let profile = db::with_conn(&state.db, move |conn| profiles::authenticated(conn, user_id)).await?;
    Ok(Json(profile))
}
