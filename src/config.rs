use std::{env, net::SocketAddr, path::PathBuf};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub cookie_secret: String,
    pub session_ttl_hours: i64,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://trips.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let upload_dir = env::var("UPLOAD_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("upload_folder"));

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-trips-tracking-cookie-secret".to_string());

        let session_ttl_hours = check_session_ttl(parse_var("SESSION_TTL_HOURS", 24 * 7)?)?;
        let max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;

        Ok(Self {
            database_url,
            listen_addr,
            upload_dir,
            cookie_secret,
            session_ttl_hours,
            max_upload_bytes,
        })
    }
}

/// Upper bound for `SESSION_TTL_HOURS`, one year.
const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

fn check_session_ttl(hours: i64) -> Result<i64, AppError> {
    if hours <= 0 {
        return Err(AppError::Config(
            "SESSION_TTL_HOURS must be positive".to_string(),
        ));
    }
    if hours > MAX_SESSION_TTL_HOURS {
        return Err(AppError::Config(format!(
            "SESSION_TTL_HOURS must be at most {MAX_SESSION_TTL_HOURS}"
        )));
    }
    Ok(hours)
}

fn parse_var<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| AppError::Config(format!("invalid {name}: {err}"))),
        Err(_) => Ok(default),
    }
}
