use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::header,
    Form, Json,
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Request body accepted either as JSON or as an URL-encoded form, picked by
/// the `Content-Type` header.
#[derive(Debug, Clone)]
pub struct Input<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Input<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|err| no_data(err.body_text()))?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|err| no_data(err.body_text()))?;
            Ok(Self(value))
        }
    }
}

/// `Path` whose rejection is an [`AppError`], so bad ids get the usual JSON
/// body or browser notice.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct UrlParam<T>(pub T);

/// `Query` with an [`AppError`] rejection.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

fn no_data(detail: String) -> AppError {
    AppError::BadRequest(format!("No data given: {detail}"))
}

pub fn normalize_optional(input: Option<String>) -> Option<String> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Formats accepted for dates typed by users. The first one is what the
/// forms suggest.
const DATE_INPUT_FORMATS: [&str; 2] = ["%d.%m.%Y", "%Y-%m-%d"];

/// Parses an optional date and returns it as `YYYY-MM-DD`, which orders
/// correctly as text.
pub fn parse_optional_date(input: Option<String>) -> Result<Option<String>, AppError> {
    let Some(raw) = normalize_optional(input) else {
        return Ok(None);
    };
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&raw, format).ok())
        .map(|date| Some(date.format("%Y-%m-%d").to_string()))
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "invalid date {raw}, expected DD.MM.YYYY or YYYY-MM-DD"
            ))
        })
}

/// Parses an optional numeric id coming from a multipart or query field.
pub fn parse_optional_id(raw: &str) -> Result<Option<i64>, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| AppError::BadRequest(format!("invalid id: {trimmed}")))
}
