//! Request-scoped state: the negotiated response format, the session user and
//! a lazily opened database connection that lives exactly as long as the
//! request.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use sqlx::{sqlite::SqliteConnectOptions, Connection};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{
    auth::AuthenticatedUser,
    db::{self, DbConnection},
    error::{AppError, ErrorNotice},
    flash,
    routes::{self, Page},
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Html,
}

impl ResponseFormat {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let wants_json = headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|value| value.contains("application/json"));
        if wants_json {
            ResponseFormat::Json
        } else {
            ResponseFormat::Html
        }
    }

    pub fn is_json(self) -> bool {
        self == ResponseFormat::Json
    }
}

struct Inner {
    options: SqliteConnectOptions,
    conn: Mutex<Option<DbConnection>>,
    user: OnceLock<AuthenticatedUser>,
}

#[derive(Clone)]
pub struct RequestContext {
    format: ResponseFormat,
    inner: Arc<Inner>,
}

impl RequestContext {
    pub fn new(options: SqliteConnectOptions, format: ResponseFormat) -> Self {
        Self {
            format,
            inner: Arc::new(Inner {
                options,
                conn: Mutex::new(None),
                user: OnceLock::new(),
            }),
        }
    }

    pub fn format(&self) -> ResponseFormat {
        self.format
    }

    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.inner.user.get()
    }

    /// Attaches the session user. Only the first call wins.
    pub fn attach_user(&self, user: AuthenticatedUser) {
        if self.inner.user.set(user).is_err() {
            warn!("session user attached twice within one request");
        }
    }

    /// The request's connection, opened on first use. Holding the guard
    /// blocks every other caller in the same request, so drop it before
    /// handing control to inner services.
    pub async fn db(&self) -> Result<MappedMutexGuard<'_, DbConnection>, AppError> {
        let mut slot = self.inner.conn.lock().await;
        if slot.is_none() {
            *slot = Some(db::open(&self.inner.options).await?);
            debug!("opened request connection");
        }
        MutexGuard::try_map(slot, |slot| slot.as_mut())
            .map_err(|_| AppError::Other(anyhow::anyhow!("request connection unavailable")))
    }

    pub async fn is_open(&self) -> bool {
        self.inner.conn.lock().await.is_some()
    }

    pub async fn close(&self) -> Result<(), AppError> {
        let conn = self.inner.conn.lock().await.take();
        if let Some(conn) = conn {
            conn.close().await?;
            debug!("closed request connection");
        }
        Ok(())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| AppError::Other(anyhow::anyhow!("request context layer missing")))
    }
}

/// Outermost application middleware. Creates the [`RequestContext`], closes
/// its connection once the response exists and turns error responses into
/// flash redirects or error pages for browser clients.
pub async fn request_scope(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let format = ResponseFormat::from_headers(req.headers());
    let back = req
        .headers()
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(local_path);
    let ctx = RequestContext::new(state.db_options.clone(), format);
    req.extensions_mut().insert(ctx.clone());

    let response = next.run(req).await;

    if let Err(err) = ctx.close().await {
        warn!("closing request connection failed: {err}");
    }

    if format.is_json() {
        return response;
    }
    match response.extensions().get::<ErrorNotice>().cloned() {
        Some(notice) => render_for_browser(&ctx, jar, notice, back),
        None => response,
    }
}

fn render_for_browser(
    ctx: &RequestContext,
    jar: PrivateCookieJar,
    notice: ErrorNotice,
    back: Option<String>,
) -> Response {
    match notice.status {
        StatusCode::UNAUTHORIZED => (
            flash::push(jar, notice.message),
            Redirect::to("/users/login"),
        )
            .into_response(),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT => {
            let target = back.unwrap_or_else(|| "/".to_string());
            (flash::push(jar, notice.message), Redirect::to(&target)).into_response()
        }
        status => {
            let page = Page {
                flash: None,
                username: ctx.user().map(|user| user.username.clone()),
            };
            routes::error_page(status, &notice.message, page)
        }
    }
}

fn local_path(referer: &str) -> Option<String> {
    let uri: Uri = referer.parse().ok()?;
    uri.path_and_query().map(|pq| pq.to_string())
}
