use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::format_timestamp;

/// An uploaded picture. `file_path` is relative to the upload directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Photo {
    pub photo_id: i64,
    pub user_id: i64,
    pub trip_id: Option<i64>,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    pub fn url(&self) -> String {
        format!("/uploads/{}", self.file_path)
    }

    pub fn created_display(&self) -> String {
        format_timestamp(self.created_at)
    }
}
