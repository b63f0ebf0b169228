use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Duration;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    auth::{self, AuthenticatedUser, CurrentUser},
    context::RequestContext,
    error::AppError,
    forms::Input,
    models::user::{LoginInput, RegisterInput},
    routes::{finish, render, Page},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(profile))
        .route("/delete_user", delete(delete_user).post(delete_user))
        .route_layer(from_fn(auth::require_user));

    Router::new()
        .route("/register", get(register_form).post(register))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout).post(logout))
        .merge(protected)
}

#[derive(Template)]
#[template(path = "users/register.html")]
struct RegisterTemplate {
    page: Page,
}

async fn register_form(current: CurrentUser, jar: PrivateCookieJar) -> Response {
    let (jar, page) = Page::take(&current, jar);
    render(jar, RegisterTemplate { page })
}

async fn register(
    ctx: RequestContext,
    jar: PrivateCookieJar,
    Input(input): Input<RegisterInput>,
) -> Result<Response, AppError> {
    let new_user = input.validate()?;
    let user = {
        let mut db = ctx.db().await?;
        auth::register_user(&mut db, &new_user).await?
    };
    Ok(finish(
        ctx.format(),
        jar,
        StatusCode::CREATED,
        json!({ "message": "Registered successfully", "user": user }),
        "Registered successfully, please log in.",
        "/users/login",
    ))
}

#[derive(Template)]
#[template(path = "users/login.html")]
struct LoginTemplate {
    page: Page,
}

async fn login_form(current: CurrentUser, jar: PrivateCookieJar) -> Response {
    let (jar, page) = Page::take(&current, jar);
    render(jar, LoginTemplate { page })
}

async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: PrivateCookieJar,
    Input(input): Input<LoginInput>,
) -> Result<Response, AppError> {
    let (username, password) = input.validate()?;
    let (user, session) = {
        let mut db = ctx.db().await?;
        let user = auth::authenticate_user(&mut db, &username, &password).await?;
        // A fresh login always starts a fresh session.
        if let Some(previous) = jar.get(auth::SESSION_COOKIE) {
            auth::destroy_session(&mut db, previous.value()).await?;
        }
        let ttl = Duration::hours(state.config.session_ttl_hours);
        let session = auth::create_session(&mut db, user.user_id, ttl).await?;
        (user, session)
    };
    info!(user_id = user.user_id, username = %user.username, "user logged in");

    let jar = auth::apply_session_cookie(jar, &session);
    let message = format!("{}, login successful", user.fullname);
    Ok(finish(
        ctx.format(),
        jar,
        StatusCode::OK,
        json!({
            "message": message,
            "user_id": user.user_id,
            "username": user.username,
        }),
        &message,
        "/",
    ))
}

async fn logout(ctx: RequestContext, jar: PrivateCookieJar) -> Result<Response, AppError> {
    if let Some(cookie) = jar.get(auth::SESSION_COOKIE) {
        let mut db = ctx.db().await?;
        if auth::destroy_session(&mut db, cookie.value()).await? {
            info!("user logged out");
        }
    }
    let jar = auth::clear_session_cookie(jar);
    Ok(finish(
        ctx.format(),
        jar,
        StatusCode::OK,
        json!({ "message": "Logout successfully" }),
        "You have been logged out.",
        "/",
    ))
}

#[derive(Template)]
#[template(path = "users/profile.html")]
struct ProfileTemplate {
    page: Page,
    user: AuthenticatedUser,
    trip_count: i64,
    photo_count: i64,
}

impl ProfileTemplate {
    fn email_display(&self) -> &str {
        self.user.email.as_deref().unwrap_or("–")
    }
}

async fn profile(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let user = current.require_user()?.clone();
    let (trip_count, photo_count) = {
        let mut db = ctx.db().await?;
        let trips: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trip WHERE user_id = ?1")
            .bind(user.id)
            .fetch_one(&mut *db)
            .await?;
        let photos: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM photo WHERE user_id = ?1")
            .bind(user.id)
            .fetch_one(&mut *db)
            .await?;
        (trips, photos)
    };

    if ctx.format().is_json() {
        return Ok(Json(json!({
            "message": format!("{}, you are logged in!", user.fullname),
            "user": user,
            "trip_count": trip_count,
            "photo_count": photo_count,
        }))
        .into_response());
    }
    let (jar, page) = Page::take(&current, jar);
    Ok(render(
        jar,
        ProfileTemplate {
            page,
            user,
            trip_count,
            photo_count,
        },
    ))
}

async fn delete_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let files = {
        let mut db = ctx.db().await?;
        let files: Vec<String> =
            sqlx::query_scalar("SELECT file_path FROM photo WHERE user_id = ?1")
                .bind(user.id)
                .fetch_all(&mut *db)
                .await?;
        let deleted = sqlx::query("DELETE FROM user WHERE user_id = ?1")
            .bind(user.id)
            .execute(&mut *db)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "No user found with user id {}",
                user.id
            )));
        }
        files
    };

    for file in files {
        if let Err(err) = state.photos.remove(&file).await {
            warn!(%file, "could not remove photo of deleted user: {err}");
        }
    }
    info!(user_id = user.id, username = %user.username, "user deleted");

    let jar = auth::clear_session_cookie(jar);
    Ok(finish(
        ctx.format(),
        jar,
        StatusCode::OK,
        json!({ "message": "User deleted successfully!" }),
        "Your account has been deleted.",
        "/",
    ))
}
