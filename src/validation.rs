//! Payload schemas for every mutating endpoint. A handler only ever sees the
//! validated output, so nothing reaches the store before these checks pass.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use time::{format_description::well_known::Rfc3339, Date, OffsetDateTime};
use tracing::warn;

use crate::{
    activities::dto::{CreateActivityRequest, NewActivity, RenameActivityRequest},
    auth::dto::{Credentials, LoginRequest, SignupRequest},
    db::iso_date,
    error::AppError,
};

/// First violated field and a message naming it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub trait Validate {
    type Output;

    fn validate(self) -> Result<Self::Output, ValidationError>;
}

/// Present and non-empty. The value is passed through untouched.
fn required(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::new(field, format!("{field} is required"))),
    }
}

/// Names: surrounding whitespace is dropped before the emptiness check.
fn required_name(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    required(field, value.map(|v| v.trim().to_string()))
}

fn has_control_chars(text: &str) -> bool {
    lazy_static! {
        static ref CONTROL_RE: Regex = Regex::new(r"\p{Cc}").unwrap();
    }
    CONTROL_RE.is_match(text)
}

/// `YYYY-MM-DD`, or an RFC 3339 timestamp whose date part is kept.
pub fn parse_date(text: &str) -> Option<Date> {
    let text = text.trim();
    iso_date::parse(text).or_else(|| {
        OffsetDateTime::parse(text, &Rfc3339)
            .ok()
            .map(|dt| dt.date())
    })
}

impl Validate for SignupRequest {
    type Output = Credentials;

    fn validate(self) -> Result<Credentials, ValidationError> {
        let username = required_name("username", self.username)?;
        if has_control_chars(&username) {
            return Err(ValidationError::new(
                "username",
                "username must not contain control characters",
            ));
        }
        let password = required("password", self.password)?;
        Ok(Credentials { username, password })
    }
}

impl Validate for LoginRequest {
    type Output = Credentials;

    fn validate(self) -> Result<Credentials, ValidationError> {
        let username = required_name("username", self.username)?;
        let password = required("password", self.password)?;
        Ok(Credentials { username, password })
    }
}

impl Validate for CreateActivityRequest {
    type Output = NewActivity;

    fn validate(self) -> Result<NewActivity, ValidationError> {
        let name = required_name("name", self.name)?;
        let raw = required("date", self.date)?;
        let date = parse_date(&raw).ok_or_else(|| {
            ValidationError::new("date", format!("date `{raw}` is not a valid date"))
        })?;
        Ok(NewActivity { name, date })
    }
}

impl Validate for RenameActivityRequest {
    type Output = String;

    fn validate(self) -> Result<String, ValidationError> {
        required_name("name", self.name)
    }
}

/// Body extractor: accepts JSON or a urlencoded form and yields the
/// validated payload. Malformed bodies become 400s.
pub struct Valid<T: Validate>(pub T::Output);

#[async_trait]
impl<T, S> FromRequest<S> for Valid<T>
where
    T: Validate + DeserializeOwned + Send,
    T::Output: Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        let payload: T = if is_form {
            let Form(payload) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| ValidationError::new("body", e.body_text()))?;
            payload
        } else {
            let Json(payload) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| ValidationError::new("body", e.body_text()))?;
            payload
        };

        match payload.validate() {
            Ok(value) => Ok(Valid(value)),
            Err(e) => {
                warn!(field = e.field, error = %e, "payload rejected");
                Err(e.into())
            }
        }
    }
}
