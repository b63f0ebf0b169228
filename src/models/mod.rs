pub mod expense;
pub mod photo;
pub mod session;
pub mod trip;
pub mod user;

use chrono::{DateTime, Local, NaiveDate, Utc};

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%d.%m.%Y %H:%M")
        .to_string()
}

pub(crate) fn format_amount(value: f64) -> String {
    format!("{value:.2}")
}

/// Shows a stored `YYYY-MM-DD` date the way the forms ask for it.
pub(crate) fn format_date(date: Option<&str>) -> String {
    match date {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|date| date.format("%d.%m.%Y").to_string())
            .unwrap_or_else(|_| raw.to_string()),
        None => "–".to_string(),
    }
}
