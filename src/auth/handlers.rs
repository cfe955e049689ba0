use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use tower_sessions::Session;
use tracing::{info, instrument};

use super::{
    dto::{LoginRequest, PublicUser, SignupRequest},
    extractors::CurrentUser,
    service::AuthError,
};
use crate::{
    error::AppError,
    pages,
    state::AppState,
    validation::Valid,
    web::{self, redirect_with_flash, Client, Flash},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", get(signup_page).post(signup))
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
}

#[utoipa::path(
    get,
    path = "/signup",
    tag = "auth",
    responses((status = 200, description = "HTML sign-up form", body = String, content_type = "text/html"))
)]
pub async fn signup_page(session: Session) -> Html<String> {
    pages::signup(web::take_flash(&session).await)
}

#[utoipa::path(
    get,
    path = "/login",
    tag = "auth",
    responses((status = 200, description = "HTML login form", body = String, content_type = "text/html"))
)]
pub async fn login_page(session: Session) -> Html<String> {
    pages::login(web::take_flash(&session).await)
}

/// Form posts get the login page back with a confirmation.
#[utoipa::path(
    post,
    path = "/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User registered", body = PublicUser),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Username already registered"),
        (status = 500, description = "Error registering user")
    )
)]
#[instrument(skip(state, creds))]
pub async fn signup(
    State(state): State<AppState>,
    client: Client,
    Valid(creds): Valid<SignupRequest>,
) -> Result<Response, AppError> {
    let user = state.auth.signup(creds).await?;
    Ok(match client {
        Client::Browser => (StatusCode::CREATED, pages::login(Some(Flash::SignedUp))).into_response(),
        Client::Api => (StatusCode::CREATED, Json(PublicUser::from(&user))).into_response(),
    })
}

#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = PublicUser),
        (status = 303, description = "Form login; redirect to /profile, or back to /login on failure"),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Invalid credentials")
    )
)]
#[instrument(skip(state, session, creds))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    client: Client,
    Valid(creds): Valid<LoginRequest>,
) -> Result<Response, AppError> {
    let user = match state.auth.authenticate(&session, &creds).await {
        Ok(u) => u,
        Err(AuthError::UnknownUser | AuthError::WrongPassword) if client == Client::Browser => {
            return Ok(redirect_with_flash(&session, "/login", Flash::InvalidCredentials).await);
        }
        Err(e) => return Err(e.into()),
    };

    Ok(match client {
        Client::Browser => Redirect::to("/profile").into_response(),
        Client::Api => Json(PublicUser::from(&user)).into_response(),
    })
}

#[utoipa::path(
    post,
    path = "/logout",
    tag = "auth",
    security(("sessionCookie" = [])),
    responses(
        (status = 204, description = "Logged out"),
        (status = 303, description = "Form logout; redirect to /login"),
        (status = 401, description = "Not authenticated")
    )
)]
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user): CurrentUser,
    client: Client,
) -> Result<Response, AppError> {
    state.auth.logout(&session).await?;
    info!(user_id = %user.id, "session ended");

    Ok(match client {
        Client::Browser => redirect_with_flash(&session, "/login", Flash::LoggedOut).await,
        Client::Api => StatusCode::NO_CONTENT.into_response(),
    })
}
