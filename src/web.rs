//! Request/response plumbing shared by the HTML and JSON surfaces:
//! client negotiation and one-shot flash messages kept in the session.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{
        header::{HeaderName, ACCEPT, CONTENT_TYPE},
        request::Parts,
        HeaderMap, Method,
    },
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

const FLASH_KEY: &str = "flash";

/// Who is on the other end: a browser submitting forms and following
/// redirects, or an API client speaking JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Client {
    Browser,
    Api,
}

impl Client {
    pub fn detect(method: &Method, headers: &HeaderMap) -> Self {
        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_ascii_lowercase()
        };
        let content_type = header(CONTENT_TYPE);
        if content_type.starts_with("application/x-www-form-urlencoded") {
            return Client::Browser;
        }
        if content_type.starts_with("application/json") || header(ACCEPT).contains("application/json")
        {
            return Client::Api;
        }
        if method == Method::GET || method == Method::HEAD {
            Client::Browser
        } else {
            Client::Api
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Client {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Client::detect(&parts.method, &parts.headers))
    }
}

/// User-facing notices shown once on the next rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flash {
    LoginRequired,
    InvalidCredentials,
    LoadFailed,
    SignedUp,
    ActivityAdded,
    LoggedOut,
}

impl Flash {
    pub fn message(self) -> &'static str {
        match self {
            Flash::LoginRequired => "Please login to view your profile",
            Flash::InvalidCredentials => "Invalid username or password",
            Flash::LoadFailed => "Error getting activities",
            Flash::SignedUp => "User registered, you can now log in",
            Flash::ActivityAdded => "Activity added",
            Flash::LoggedOut => "You have been logged out",
        }
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            Flash::LoginRequired | Flash::InvalidCredentials | Flash::LoadFailed
        )
    }
}

/// Records `flash` for the next page. Store failures are only logged.
pub async fn set_flash(session: &Session, flash: Flash) {
    if let Err(e) = session.insert(FLASH_KEY, flash).await {
        warn!(error = %e, ?flash, "could not store flash message");
    }
}

/// Removes and returns the pending flash, if any.
pub async fn take_flash(session: &Session) -> Option<Flash> {
    session
        .remove::<Flash>(FLASH_KEY)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "could not read flash message");
            None
        })
}

/// 303 redirect that leaves a flash behind for the target page.
pub async fn redirect_with_flash(session: &Session, to: &str, flash: Flash) -> Response {
    set_flash(session, flash).await;
    Redirect::to(to).into_response()
}
