use askama::Template;
use axum::{response::IntoResponse, response::Response, routing::get, Json, Router};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde_json::json;

use crate::{
    auth::CurrentUser,
    context::RequestContext,
    routes::{render, Page},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(home))
}

#[derive(Template)]
#[template(path = "index.html")]
struct HomeTemplate {
    page: Page,
}

async fn home(ctx: RequestContext, current: CurrentUser, jar: PrivateCookieJar) -> Response {
    if ctx.format().is_json() {
        return Json(json!({ "message": "Hello!", "user": current.0 })).into_response();
    }
    let (jar, page) = Page::take(&current, jar);
    render(jar, HomeTemplate { page })
}
