use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{error::AppError, forms::normalize_optional};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub fullname: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// A registration that passed validation. The password is still plain text.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub fullname: String,
    pub email: Option<String>,
}

impl RegisterInput {
    pub fn validate(self) -> Result<NewUser, AppError> {
        let Some(username) = normalize_optional(self.username) else {
            return Err(AppError::BadRequest("Username is required".into()));
        };
        let Some(fullname) = normalize_optional(self.fullname) else {
            return Err(AppError::BadRequest("Fullname is required".into()));
        };
        // Passwords are taken verbatim, only an all-blank one is rejected.
        let password = match self.password {
            Some(password) if !password.trim().is_empty() => password,
            _ => return Err(AppError::BadRequest("Password is required".into())),
        };
        let email = normalize_optional(self.email);
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(AppError::BadRequest(format!(
                    "{email} is not a valid email address"
                )));
            }
        }
        Ok(NewUser {
            username,
            password,
            fullname,
            email,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl LoginInput {
    pub fn validate(self) -> Result<(String, String), AppError> {
        match (normalize_optional(self.username), self.password) {
            (Some(username), Some(password)) if !password.is_empty() => Ok((username, password)),
            _ => Err(AppError::BadRequest(
                "Username and password are required".into(),
            )),
        }
    }
}
