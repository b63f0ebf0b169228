use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, NoneAsEmptyString, PickFirst};
use sqlx::FromRow;

use crate::{
    error::AppError,
    forms::{normalize_optional, parse_optional_date},
    models::{format_amount, format_date, format_timestamp},
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Trip {
    pub trip_id: i64,
    pub user_id: i64,
    pub destination: String,
    pub date: Option<String>,
    pub description: String,
    pub budget: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    pub fn date_display(&self) -> String {
        format_date(self.date.as_deref())
    }

    pub fn budget_display(&self) -> String {
        self.budget
            .map(format_amount)
            .unwrap_or_else(|| "–".into())
    }

    pub fn created_display(&self) -> String {
        format_timestamp(self.created_at)
    }
}

/// Trip payload as submitted by a form or a JSON client. Numbers may arrive
/// as JSON numbers or as (possibly empty) strings.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct TripInput {
    #[serde(default, alias = "location")]
    pub destination: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde_as(as = "PickFirst<(_, NoneAsEmptyString)>")]
    #[serde(default)]
    pub budget: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripFields {
    pub destination: String,
    pub date: Option<String>,
    pub description: String,
    pub budget: Option<f64>,
}

impl TripInput {
    pub fn validate(self) -> Result<TripFields, AppError> {
        let (Some(destination), Some(description)) = (
            normalize_optional(self.destination),
            normalize_optional(self.description),
        ) else {
            return Err(AppError::BadRequest(
                "destination and description are required".into(),
            ));
        };
        if let Some(budget) = self.budget {
            if !budget.is_finite() || budget < 0.0 {
                return Err(AppError::BadRequest(
                    "budget cannot be negative".into(),
                ));
            }
        }
        Ok(TripFields {
            destination,
            date: parse_optional_date(self.date)?,
            description,
            budget: self.budget,
        })
    }
}
