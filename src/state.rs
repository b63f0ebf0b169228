use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use sqlx::sqlite::SqliteConnectOptions;

use crate::{config::AppConfig, services::storage::PhotoStorage};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db_options: SqliteConnectOptions,
    pub photos: PhotoStorage,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(config: AppConfig, db_options: SqliteConnectOptions, photos: PhotoStorage) -> Self {
        let digest = Sha512::digest(config.cookie_secret.as_bytes());
        let cookie_key = Key::from(&digest[..]);
        Self {
            config,
            db_options,
            photos,
            cookie_key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
