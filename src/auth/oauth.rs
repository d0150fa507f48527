use anyhow::Context;
use axum::{
    extract::{FromRef, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use rand::RngCore;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{
    dto::{RegisterResponse, SocialRegisterRequest},
    services::AuthService,
};
use crate::{
    config::GoogleConfig,
    error::AppError,
    response::{ok, ApiResponse},
    state::AppState,
};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const STATE_COOKIE: &str = "oauth_state";

/// Profile fields we use from Google's userinfo endpoint.
#[derive(Debug, Deserialize)]
pub struct GoogleProfile {
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Authorization-code client for Google sign-in.
pub struct GoogleOAuth {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
}

impl GoogleOAuth {
    pub fn new(cfg: &GoogleConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            redirect_url: cfg.redirect_url.clone(),
        }
    }

    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{AUTHORIZE_URL}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&prompt=select_account",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_url),
            urlencoding::encode("openid email profile"),
            urlencoding::encode(state),
        )
    }

    pub async fn exchange_code(&self, code: &str) -> anyhow::Result<GoogleProfile> {
        let token: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("google token request failed")?
            .error_for_status()
            .context("google token endpoint rejected the code")?
            .json()
            .await
            .context("google token response malformed")?;

        let profile = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .context("google userinfo request failed")?
            .error_for_status()
            .context("google userinfo rejected the token")?
            .json()
            .await
            .context("google userinfo response malformed")?;
        Ok(profile)
    }
}

fn random_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

fn not_configured() -> AppError {
    AppError::NotFound("Google sign-in is not configured".into())
}

/// GET /auth/google/login
#[instrument(skip(state))]
pub async fn google_login(State(state): State<AppState>) -> Result<Response, AppError> {
    let google = state.google.as_ref().ok_or_else(not_configured)?;
    let csrf = random_state();
    let cookie = format!("{STATE_COOKIE}={csrf}; Path=/; Max-Age=600; HttpOnly; SameSite=Lax");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Redirect::temporary(&google.authorize_url(&csrf)),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// GET /auth/google/callback
#[instrument(skip(state, params, headers))]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<ApiResponse<RegisterResponse>>), AppError> {
    let google = state.google.clone().ok_or_else(not_configured)?;

    if let Some(reason) = params.error {
        warn!(reason = %reason, "google sign-in denied");
        return Err(AppError::validation("code", "Google sign-in was cancelled"));
    }
    let expected = cookie_value(&headers, STATE_COOKIE);
    match (expected, params.state.as_deref()) {
        (Some(a), Some(b)) if !a.is_empty() && a == b => {}
        _ => return Err(AppError::validation("state", "Invalid OAuth state")),
    }
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::validation("code", "Authorization code is required"))?;

    let profile = google
        .exchange_code(&code)
        .await
        .map_err(|e| AppError::internal("failed to complete Google sign-in", e))?;
    info!(email = %profile.email, "google profile received");

    let res = AuthService::from_ref(&state)
        .register_social(SocialRegisterRequest {
            email: profile.email,
            name: profile.name,
            avatar_url: profile.picture,
        })
        .await?;

    let status = if res.is_new_user {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let clear = format!("{STATE_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax");
    Ok((status, [(header::SET_COOKIE, clear)], ok(res)))
}
