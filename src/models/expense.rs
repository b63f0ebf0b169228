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
pub struct Expense {
    pub expense_id: i64,
    pub trip_id: i64,
    pub description: Option<String>,
    pub date: Option<String>,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn description_display(&self) -> &str {
        self.description.as_deref().unwrap_or("(no description)")
    }

    pub fn date_display(&self) -> String {
        format_date(self.date.as_deref())
    }

    pub fn amount_display(&self) -> String {
        format_amount(self.amount)
    }

    pub fn created_display(&self) -> String {
        format_timestamp(self.created_at)
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
pub struct ExpenseInput {
    #[serde_as(as = "PickFirst<(_, NoneAsEmptyString)>")]
    #[serde(default)]
    pub trip_id: Option<i64>,
    #[serde(default, alias = "expense_description")]
    pub description: Option<String>,
    #[serde(default, alias = "expense_date")]
    pub date: Option<String>,
    #[serde_as(as = "PickFirst<(_, NoneAsEmptyString)>")]
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseFields {
    pub trip_id: i64,
    pub description: Option<String>,
    pub date: Option<String>,
    pub amount: f64,
}

impl ExpenseInput {
    pub fn validate(self) -> Result<ExpenseFields, AppError> {
        let (Some(trip_id), Some(amount)) = (self.trip_id, self.amount) else {
            return Err(AppError::BadRequest(
                "trip_id and amount are required".into(),
            ));
        };
        if !amount.is_finite() {
            return Err(AppError::BadRequest("amount must be a number".into()));
        }
        Ok(ExpenseFields {
            trip_id,
            description: normalize_optional(self.description),
            date: parse_optional_date(self.date)?,
            amount,
        })
    }
}
