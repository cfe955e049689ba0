use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::warn;

use super::service::AuthError;
use crate::{
    db::User,
    error::AppError,
    state::AppState,
    web::{self, Client, Flash},
};

/// The authenticated user, freshly loaded for this request. Taking it as a
/// handler argument is what makes a route protected.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let client = Client::detect(&parts.method, &parts.headers);
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        match state.auth.resolve(&session).await {
            Ok(user) => Ok(CurrentUser(user)),
            Err(e) => {
                warn!(error = %e, uri = %parts.uri, "unauthenticated request");
                Err(reject(client, &session, e).await)
            }
        }
    }
}

async fn reject(client: Client, session: &Session, err: AuthError) -> Response {
    let flash = match err {
        AuthError::Store(_) | AuthError::Session(_) | AuthError::Internal(_) => Flash::LoadFailed,
        _ => Flash::LoginRequired,
    };
    match (client, flash) {
        (Client::Browser, _) => web::redirect_with_flash(session, "/login", flash).await,
        (Client::Api, Flash::LoadFailed) => AppError::from(err).into_response(),
        (Client::Api, _) => {
            web::set_flash(session, flash).await;
            (StatusCode::UNAUTHORIZED, flash.message()).into_response()
        }
    }
}
