use serde::Deserialize;
use time::Date;
use utoipa::ToSchema;

/// Request body for `POST /profile`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateActivityRequest {
    #[schema(example = "Yoga")]
    pub name: Option<String>,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp.
    #[schema(example = "2024-03-01")]
    pub date: Option<String>,
}

/// Request body for `PUT /profile/:id`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RenameActivityRequest {
    #[schema(example = "Swim")]
    pub name: Option<String>,
}

/// A validated activity, not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub name: String,
    pub date: Date,
}
