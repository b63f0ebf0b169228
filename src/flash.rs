//! One-shot notices carried across a redirect in an encrypted cookie.

use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};

pub const FLASH_COOKIE: &str = "trips_flash";

pub fn push(jar: PrivateCookieJar, message: impl Into<String>) -> PrivateCookieJar {
    let cookie = Cookie::build((FLASH_COOKIE, message.into()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    jar.add(cookie)
}

/// Reads the pending notice and schedules its removal. The returned jar must
/// be part of the response for the removal to reach the client.
pub fn take(jar: PrivateCookieJar) -> (PrivateCookieJar, Option<String>) {
    let Some(message) = jar.get(FLASH_COOKIE).map(|cookie| cookie.value().to_string()) else {
        return (jar, None);
    };
    let jar = jar.remove(Cookie::build(FLASH_COOKIE).path("/"));
    (jar, Some(message))
}
