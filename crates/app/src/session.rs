//! Session cookie handling and the authenticated-caller extractor.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use assess_core::model::SessionToken;
use chrono::{DateTime, Utc};
use services::Identity;

use crate::error::ApiError;
use crate::router::AppState;

pub const SESSION_COOKIE: &str = "session_id";

/// Attributes shared by every session cookie this server sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieSettings {
    pub secure: bool,
}

impl CookieSettings {
    /// `Set-Cookie` value binding the browser to `token` until `expires_at`.
    #[must_use]
    pub fn issue(&self, token: &SessionToken, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> String {
        let max_age = (expires_at - now).num_seconds().max(0);
        format!(
            "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}{}",
            token.as_str(),
            self.secure_suffix()
        )
    }

    #[must_use]
    pub fn clear(&self) -> String {
        format!(
            "{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
            self.secure_suffix()
        )
    }

    fn secure_suffix(&self) -> &'static str {
        if self.secure { "; Secure" } else { "" }
    }
}

/// Pull the session token out of the request's `Cookie` headers, if any.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| SessionToken::from_raw(value))
}

/// The resolved caller. Handlers that take this never run for anonymous requests.
pub struct CurrentUser(pub Identity);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers);
        let identity = state.services.identity().resolve(token.as_ref()).await?;
        Ok(Self(identity))
    }
}
