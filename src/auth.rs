use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use tracing::{debug, info, warn};

use crate::{
    context::RequestContext,
    db::DbConnection,
    error::AppError,
    models::{
        session::Session,
        user::{NewUser, User},
    },
};

pub const SESSION_COOKIE: &str = "trips_session";

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct AuthenticatedUser {
    #[serde(rename = "user_id")]
    pub id: i64,
    pub username: String,
    pub fullname: String,
    pub email: Option<String>,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.user_id,
            username: user.username,
            fullname: user.fullname,
            email: user.email,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::from_request_parts(parts, state).await?;
        Ok(Self(ctx.user().cloned()))
    }
}

impl CurrentUser {
    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }

    pub fn username(&self) -> Option<String> {
        self.0.as_ref().map(|user| user.username.clone())
    }
}

/// Resolves the session cookie into the request's user. Runs for every
/// request; an unknown or expired token simply leaves the request anonymous.
pub async fn load_current_user(
    jar: PrivateCookieJar,
    ctx: RequestContext,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let mut db = ctx.db().await?;
        match find_session_user(&mut db, cookie.value()).await? {
            Some(user) => {
                debug!(user_id = user.id, "session resolved");
                ctx.attach_user(user);
            }
            None => debug!("ignoring stale session cookie"),
        }
    }
    Ok(next.run(req).await)
}

/// Route layer for everything that needs a logged-in user. The wrapped
/// handler never runs for anonymous requests.
pub async fn require_user(
    current: CurrentUser,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    current.require_user()?;
    Ok(next.run(req).await)
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::PasswordHash(err.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed =
        PasswordHash::new(password_hash).map_err(|err| AppError::PasswordHash(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub async fn register_user(conn: &mut DbConnection, new_user: &NewUser) -> Result<User, AppError> {
    let password_hash = hash_password(&new_user.password)?;
    let inserted = sqlx::query_as::<_, User>(
        r#"INSERT INTO user (username, password_hash, fullname, email, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           RETURNING user_id, username, password_hash, fullname, email, created_at"#,
    )
    .bind(&new_user.username)
    .bind(&password_hash)
    .bind(&new_user.fullname)
    .bind(&new_user.email)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await;

    match inserted {
        Ok(user) => {
            info!(user_id = user.user_id, username = %user.username, "user registered");
            Ok(user)
        }
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(AppError::Conflict(
            format!("User {} is already registered.", new_user.username),
        )),
        Err(err) => Err(err.into()),
    }
}

pub async fn authenticate_user(
    conn: &mut DbConnection,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT user_id, username, password_hash, fullname, email, created_at FROM user WHERE username = ?1",
    )
    .bind(username)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(user) = user else {
        warn!(%username, "login for unknown user");
        return Err(AppError::InvalidCredentials("Invalid username".into()));
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(%username, "login with wrong password");
        return Err(AppError::InvalidCredentials("Invalid password".into()));
    }
    Ok(user)
}

pub async fn create_session(
    conn: &mut DbConnection,
    user_id: i64,
    ttl: Duration,
) -> Result<Session, AppError> {
    let session = Session::new(user_id, ttl);
    sqlx::query(
        r#"INSERT INTO session (session_id, user_id, created_at, last_seen_at, expires_at)
           VALUES (?1, ?2, ?3, ?4, ?5)"#,
    )
    .bind(&session.session_id)
    .bind(session.user_id)
    .bind(session.created_at)
    .bind(session.last_seen_at)
    .bind(session.expires_at)
    .execute(&mut *conn)
    .await?;
    Ok(session)
}

pub async fn destroy_session(conn: &mut DbConnection, session_id: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM session WHERE session_id = ?1")
        .bind(session_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_session_user(
    conn: &mut DbConnection,
    session_id: &str,
) -> Result<Option<AuthenticatedUser>, AppError> {
    let session = sqlx::query_as::<_, Session>(
        "SELECT session_id, user_id, created_at, last_seen_at, expires_at FROM session WHERE session_id = ?1",
    )
    .bind(session_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(session) = session else {
        return Ok(None);
    };

    let now = Utc::now();
    if session.is_expired(now) {
        destroy_session(conn, session_id).await?;
        debug!(user_id = session.user_id, "session expired");
        return Ok(None);
    }

    sqlx::query("UPDATE session SET last_seen_at = ?1 WHERE session_id = ?2")
        .bind(now)
        .bind(session_id)
        .execute(&mut *conn)
        .await?;

    let user = sqlx::query_as::<_, AuthenticatedUser>(
        "SELECT user_id AS id, username, fullname, email FROM user WHERE user_id = ?1",
    )
    .bind(session.user_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(user)
}

pub fn apply_session_cookie(jar: PrivateCookieJar, session: &Session) -> PrivateCookieJar {
    let cookie = Cookie::build((SESSION_COOKIE, session.session_id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    jar.add(cookie)
}

pub fn clear_session_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}
