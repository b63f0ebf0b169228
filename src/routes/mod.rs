pub mod expenses;
pub mod photos;
pub mod public;
pub mod trips;
pub mod users;

use askama::Template;
use askama_axum::IntoResponse as AskamaTemplateResponse;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{Redirect, Response},
    Json, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    auth::{self, CurrentUser},
    context::{self, ResponseFormat},
    flash,
    state::AppState,
};

pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(trips::router())
        .merge(expenses::router())
        .merge(photos::router())
        .route_layer(from_fn(auth::require_user));

    Router::new()
        .merge(public::router())
        .nest("/users", users::router())
        .merge(protected)
        .nest_service("/static", ServeDir::new("static"))
        .nest_service("/uploads", ServeDir::new(state.photos.root()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn_with_state(state.clone(), context::request_scope))
                .layer(from_fn_with_state(state.clone(), auth::load_current_user))
                .layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .with_state(state)
}

/// Layout data every rendered page needs.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub flash: Option<String>,
    pub username: Option<String>,
}

impl Page {
    /// Builds the layout data, consuming the pending flash message.
    pub fn take(current: &CurrentUser, jar: PrivateCookieJar) -> (PrivateCookieJar, Self) {
        let (jar, flash) = flash::take(jar);
        let page = Self {
            flash,
            username: current.username(),
        };
        (jar, page)
    }
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    page: Page,
    status: u16,
    reason: String,
    message: String,
}

pub(crate) fn error_page(status: StatusCode, message: &str, page: Page) -> Response {
    let template = ErrorTemplate {
        page,
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Error").to_string(),
        message: message.to_string(),
    };
    (status, AskamaTemplateResponse::into_response(template)).into_response()
}

/// Response for a completed mutation: JSON clients get `status` and `body`,
/// browsers get `message` as a flash and a redirect to `location`.
pub(crate) fn finish(
    format: ResponseFormat,
    jar: PrivateCookieJar,
    status: StatusCode,
    body: serde_json::Value,
    message: &str,
    location: &str,
) -> Response {
    match format {
        ResponseFormat::Json => (status, jar, Json(body)).into_response(),
        ResponseFormat::Html => {
            (flash::push(jar, message), Redirect::to(location)).into_response()
        }
    }
}

/// Renders an HTML page, attaching the jar so a consumed flash is cleared.
pub(crate) fn render<T>(jar: PrivateCookieJar, template: T) -> Response
where
    T: Template + AskamaTemplateResponse,
{
    (jar, AskamaTemplateResponse::into_response(template)).into_response()
}
