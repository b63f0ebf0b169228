#![allow(dead_code)]

use std::{collections::HashMap, fmt, net::SocketAddr, path::PathBuf};

use anyhow::Context;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use trips::{
    config::AppConfig, db, routes::create_router, services::storage::PhotoStorage,
    state::AppState,
};

pub const BOUNDARY: &str = "trips-test-boundary";

/// The full application on a throw-away SQLite file, driven in-process with
/// a tiny cookie store that behaves like a browser.
pub struct TestApp {
    router: Router,
    cookies: HashMap<String, String>,
    database_url: String,
    pub upload_dir: PathBuf,
    _root: TempDir,
}

impl fmt::Debug for TestApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestApp")
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|err| panic!("response is not JSON ({err}): {}", self.body))
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for test app")?;
        let db_path = root.path().join("trips.sqlite");
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());
        let upload_dir = root.path().join("uploads");

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            upload_dir: upload_dir.clone(),
            cookie_secret: "test-cookie-secret".into(),
            session_ttl_hours: 1,
            max_upload_bytes: 1024 * 1024,
        };

        let db_options = db::connect_options(&config.database_url)?;
        db::init_schema(&db_options).await?;

        let photos = PhotoStorage::new(config.upload_dir.clone());
        photos.ensure_structure().await?;

        let state = AppState::new(config, db_options, photos);
        Ok(Self {
            router: create_router(state),
            cookies: HashMap::new(),
            database_url,
            upload_dir,
            _root: root,
        })
    }

    pub async fn send(&mut self, mut req: Request<Body>) -> TestResponse {
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            req.headers_mut()
                .insert(header::COOKIE, cookie.parse().expect("cookie header"));
        }

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("router is infallible");

        for value in response.headers().get_all(header::SET_COOKIE) {
            let raw = value.to_str().expect("ascii set-cookie");
            let pair = raw.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            if value.is_empty() || raw.contains("Max-Age=0") {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn json(&mut self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::ACCEPT, "application/json");
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.send(req).await
    }

    pub async fn get_json(&mut self, uri: &str) -> TestResponse {
        self.json(Method::GET, uri, None).await
    }

    pub async fn post_json(&mut self, uri: &str, body: Value) -> TestResponse {
        self.json(Method::POST, uri, Some(body)).await
    }

    pub async fn get_html(&mut self, uri: &str) -> TestResponse {
        let req = Request::builder()
            .uri(uri)
            .header(header::ACCEPT, "text/html")
            .body(Body::empty())
            .expect("request");
        self.send(req).await
    }

    pub async fn post_form(&mut self, uri: &str, form: &str) -> TestResponse {
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::ACCEPT, "text/html")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .expect("request");
        self.send(req).await
    }

    pub async fn upload(&mut self, file_name: &str, data: &[u8], trip_id: Option<i64>) -> TestResponse {
        let mut body = Vec::new();
        if let Some(trip_id) = trip_id {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"trip_id\"\r\n\r\n{trip_id}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let req = Request::builder()
            .method(Method::POST)
            .uri("/trips/add_photos")
            .header(header::ACCEPT, "application/json")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request");
        self.send(req).await
    }

    pub async fn register(&mut self, username: &str, password: &str) -> TestResponse {
        self.post_json(
            "/users/register",
            json!({
                "username": username,
                "password": password,
                "fullname": format!("{username} tester"),
            }),
        )
        .await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> TestResponse {
        self.post_json(
            "/users/login",
            json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Registers and logs in a user, panicking on failure.
    pub async fn sign_in(&mut self, username: &str) {
        let registered = self.register(username, "testpassword").await;
        assert_eq!(registered.status, StatusCode::CREATED, "{}", registered.body);
        let logged_in = self.login(username, "testpassword").await;
        assert_eq!(logged_in.status, StatusCode::OK, "{}", logged_in.body);
    }

    pub async fn create_trip(&mut self, destination: &str, date: &str, budget: f64) -> i64 {
        let response = self
            .post_json(
                "/add_trip",
                json!({
                    "destination": destination,
                    "date": date,
                    "description": format!("Trip to {destination}"),
                    "budget": budget,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.json()["trip"]["trip_id"]
            .as_i64()
            .expect("trip id")
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    pub fn cookie_snapshot(&self) -> HashMap<String, String> {
        self.cookies.clone()
    }

    pub fn restore_cookies(&mut self, cookies: HashMap<String, String>) {
        self.cookies = cookies;
    }

    pub fn clear_cookies(&mut self) {
        self.cookies.clear();
    }

    /// Runs a `SELECT COUNT(*)`-style query on a separate connection.
    pub async fn count(&self, sql: &str) -> i64 {
        let options = db::connect_options(&self.database_url).expect("options");
        let mut conn = db::open(&options).await.expect("connection");
        sqlx::query_scalar(sql)
            .fetch_one(&mut conn)
            .await
            .expect("count query")
    }
}
