//! OpenAPI description of the HTTP surface, generated from the
//! `#[utoipa::path]` annotations on the handlers and served with Swagger UI.

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    activities::{self, dto::{CreateActivityRequest, RenameActivityRequest}},
    app,
    auth::{self, dto::{LoginRequest, PublicUser, SignupRequest}, session::SESSION_COOKIE},
    db::Activity,
};

pub const OPENAPI_JSON: &str = "/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Activity log",
        description = "Sign up, log in, and keep a dated list of activities."
    ),
    paths(
        app::root,
        app::health,
        auth::handlers::signup_page,
        auth::handlers::signup,
        auth::handlers::login_page,
        auth::handlers::login,
        auth::handlers::logout,
        activities::handlers::list_activities,
        activities::handlers::create_activity,
        activities::handlers::get_activity,
        activities::handlers::rename_activity,
        activities::handlers::delete_activity
    ),
    components(schemas(
        SignupRequest,
        LoginRequest,
        PublicUser,
        CreateActivityRequest,
        RenameActivityRequest,
        Activity
    )),
    modifiers(&SessionCookie),
    tags(
        (name = "auth", description = "Accounts and sessions"),
        (name = "activities", description = "The current user's activities")
    )
)]
pub struct ApiDoc;

/// Registers the `sid` cookie as the `sessionCookie` scheme.
struct SessionCookie;

impl Modify for SessionCookie {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "sessionCookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE))),
            );
        }
    }
}

/// Swagger UI at `/api-docs`, reading the document from [`OPENAPI_JSON`].
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/api-docs").url(OPENAPI_JSON, ApiDoc::openapi())
}
