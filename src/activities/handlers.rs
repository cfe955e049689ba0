use axum::{
    extract::{Path, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{CreateActivityRequest, RenameActivityRequest},
    services,
};
use crate::{
    auth::extractors::CurrentUser,
    db::Activity,
    error::AppError,
    pages,
    state::AppState,
    validation::Valid,
    web::{self, Client, Flash},
};

pub fn activity_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(list_activities).post(create_activity))
        .route(
            "/profile/:id",
            get(get_activity)
                .put(rename_activity)
                .delete(delete_activity),
        )
}

/// A segment that is not a UUID cannot name a stored activity.
fn activity_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Activity"))
}

#[utoipa::path(
    get,
    path = "/profile",
    tag = "activities",
    security(("sessionCookie" = [])),
    responses(
        (status = 200, description = "Activities in insertion order", body = [Activity]),
        (status = 303, description = "Browser without a session; redirect to /login"),
        (status = 401, description = "Not authenticated")
    )
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_activities(
    session: Session,
    CurrentUser(user): CurrentUser,
    client: Client,
) -> Response {
    match client {
        Client::Browser => {
            let flash = web::take_flash(&session).await;
            pages::profile(&user, flash).into_response()
        }
        Client::Api => Json(user.activities).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/profile",
    tag = "activities",
    security(("sessionCookie" = [])),
    request_body = CreateActivityRequest,
    responses(
        (status = 201, description = "Activity added", body = Activity),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Error adding activity")
    )
)]
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_activity(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    client: Client,
    Valid(new): Valid<CreateActivityRequest>,
) -> Result<Response, AppError> {
    let activity = services::create(state.store.as_ref(), &mut user, new).await?;
    Ok(match client {
        Client::Browser => (
            StatusCode::CREATED,
            pages::profile(&user, Some(Flash::ActivityAdded)),
        )
            .into_response(),
        Client::Api => (
            StatusCode::CREATED,
            [(LOCATION, format!("/profile/{}", activity.id))],
            Json(activity),
        )
            .into_response(),
    })
}

#[utoipa::path(
    get,
    path = "/profile/{id}",
    tag = "activities",
    security(("sessionCookie" = [])),
    params(("id" = String, Path, description = "Activity id")),
    responses(
        (status = 200, description = "The activity", body = Activity),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Activity belongs to another user"),
        (status = 404, description = "Activity not found")
    )
)]
#[instrument(skip(state, user, client), fields(user_id = %user.id))]
pub async fn get_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    client: Client,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let activity = services::fetch(state.store.as_ref(), &user, activity_id(&id)?).await?;
    Ok(match client {
        Client::Browser => pages::activity(&activity).into_response(),
        Client::Api => Json(activity).into_response(),
    })
}

#[utoipa::path(
    put,
    path = "/profile/{id}",
    tag = "activities",
    security(("sessionCookie" = [])),
    params(("id" = String, Path, description = "Activity id")),
    request_body = RenameActivityRequest,
    responses(
        (status = 200, description = "Activity updated", body = Activity),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Activity belongs to another user"),
        (status = 404, description = "Activity not found")
    )
)]
#[instrument(skip(state, user, name), fields(user_id = %user.id))]
pub async fn rename_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Valid(name): Valid<RenameActivityRequest>,
) -> Result<Json<Activity>, AppError> {
    let activity = services::rename(state.store.as_ref(), &user, activity_id(&id)?, name).await?;
    Ok(Json(activity))
}

#[utoipa::path(
    delete,
    path = "/profile/{id}",
    tag = "activities",
    security(("sessionCookie" = [])),
    params(("id" = String, Path, description = "Activity id")),
    responses(
        (status = 200, description = "Activity deleted", body = String),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Activity belongs to another user"),
        (status = 404, description = "Activity not found")
    )
)]
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_activity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, &'static str), AppError> {
    services::delete(state.store.as_ref(), &user, activity_id(&id)?).await?;
    Ok((StatusCode::OK, "Activity deleted"))
}
