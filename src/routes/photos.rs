use askama::Template;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get},
    Json, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    auth::CurrentUser,
    context::RequestContext,
    db::DbConnection,
    error::AppError,
    flash,
    forms::{parse_optional_id, QueryParams, UrlParam},
    models::{photo::Photo, trip::Trip},
    routes::{finish, render, trips, Page},
    services::storage::{allowed_file, secure_filename},
    state::AppState,
};

const PHOTO_COLUMNS: &str = "photo_id, user_id, trip_id, file_path, created_at";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips/photos", get(list_photos))
        .route("/trips/photos/", get(list_photos))
        .route("/trips/photos/:photo_id", get(show_photo))
        .route("/trips/add_photos", get(upload_form).post(upload_photo))
        .route(
            "/trips/delete_photo/:photo_id",
            delete(delete_photo).post(delete_photo),
        )
}

async fn find_owned_photo(
    conn: &mut DbConnection,
    user_id: i64,
    photo_id: i64,
) -> Result<Photo, AppError> {
    sqlx::query_as::<_, Photo>(&format!(
        "SELECT {PHOTO_COLUMNS} FROM photo WHERE photo_id = ?1 AND user_id = ?2"
    ))
    .bind(photo_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::missing("photo", photo_id))
}

#[derive(Template)]
#[template(path = "photos/list.html")]
struct PhotoListTemplate {
    page: Page,
    photos: Vec<Photo>,
}

async fn list_photos(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let photos = {
        let mut db = ctx.db().await?;
        sqlx::query_as::<_, Photo>(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photo WHERE user_id = ?1 ORDER BY created_at DESC, photo_id DESC"
        ))
        .bind(user.id)
        .fetch_all(&mut *db)
        .await?
    };

    if photos.is_empty() {
        if ctx.format().is_json() {
            return Err(AppError::NotFound("No photos found".into()));
        }
        return Ok((
            flash::push(jar, "No photos found yet, upload the first one."),
            Redirect::to("/trips/add_photos"),
        )
            .into_response());
    }
    if ctx.format().is_json() {
        return Ok(Json(json!({ "photos": photos })).into_response());
    }
    let (jar, page) = Page::take(&current, jar);
    Ok(render(jar, PhotoListTemplate { page, photos }))
}

#[derive(Template)]
#[template(path = "photos/detail.html")]
struct PhotoDetailTemplate {
    page: Page,
    photo: Photo,
    trip: Option<Trip>,
}

async fn show_photo(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    UrlParam(photo_id): UrlParam<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let (photo, trip) = {
        let mut db = ctx.db().await?;
        let photo = find_owned_photo(&mut db, user.id, photo_id).await?;
        let trip = match photo.trip_id {
            Some(trip_id) => Some(trips::find_owned_trip(&mut db, user.id, trip_id).await?),
            None => None,
        };
        (photo, trip)
    };
    if ctx.format().is_json() {
        return Ok(Json(json!({ "photo": photo, "url": photo.url() })).into_response());
    }
    let (jar, page) = Page::take(&current, jar);
    Ok(render(jar, PhotoDetailTemplate { page, photo, trip }))
}

#[derive(Debug, Default, Deserialize)]
struct UploadQuery {
    trip_id: Option<i64>,
}

#[derive(Template)]
#[template(path = "photos/form.html")]
struct UploadTemplate {
    page: Page,
    trips: Vec<Trip>,
    selected: Option<i64>,
}

impl UploadTemplate {
    fn is_selected(&self, trip_id: &i64) -> bool {
        self.selected == Some(*trip_id)
    }
}

async fn upload_form(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    QueryParams(query): QueryParams<UploadQuery>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let trips = {
        let mut db = ctx.db().await?;
        trips::list_owned_trips(&mut db, user.id).await?
    };
    let (jar, page) = Page::take(&current, jar);
    Ok(render(
        jar,
        UploadTemplate {
            page,
            trips,
            selected: query.trip_id,
        },
    ))
}

struct Upload {
    file_name: String,
    data: Bytes,
}

async fn upload_photo(
    State(state): State<AppState>,
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let mut multipart = multipart?;

    let mut upload = None;
    let mut trip_id = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "file_path" => {
                let file_name = secure_filename(field.file_name().unwrap_or_default());
                let data = field.bytes().await?;
                upload = Some(Upload { file_name, data });
            }
            "trip_id" => {
                let raw = field.text().await?;
                trip_id = parse_optional_id(&raw)?;
            }
            _ => {}
        }
    }

    let Some(upload) =
        upload.filter(|upload| allowed_file(&upload.file_name) && !upload.data.is_empty())
    else {
        return Err(AppError::BadRequest(
            "Invalid file type or no file found".into(),
        ));
    };

    let photo = {
        let mut db = ctx.db().await?;
        if let Some(trip_id) = trip_id {
            trips::find_owned_trip(&mut db, user.id, trip_id).await?;
        }
        let stored = state.photos.save(&upload.file_name, &upload.data).await?;
        let inserted = sqlx::query_as::<_, Photo>(&format!(
            r#"INSERT INTO photo (user_id, trip_id, file_path, created_at)
               VALUES (?1, ?2, ?3, ?4)
               RETURNING {PHOTO_COLUMNS}"#
        ))
        .bind(user.id)
        .bind(trip_id)
        .bind(&stored)
        .bind(Utc::now())
        .fetch_one(&mut *db)
        .await;
        match inserted {
            Ok(photo) => photo,
            Err(err) => {
                if let Err(cleanup) = state.photos.remove(&stored).await {
                    warn!(file = %stored, "could not remove orphaned upload: {cleanup}");
                }
                return Err(err.into());
            }
        }
    };
    info!(
        photo_id = photo.photo_id,
        user_id = user.id,
        file = %photo.file_path,
        "photo uploaded"
    );

    let location = format!("/trips/photos/{}", photo.photo_id);
    let url = photo.url();
    Ok(finish(
        ctx.format(),
        jar,
        StatusCode::CREATED,
        json!({ "message": "Photos uploaded successfully", "photo": photo, "url": url }),
        "Photos uploaded successfully",
        &location,
    ))
}

async fn delete_photo(
    State(state): State<AppState>,
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    UrlParam(photo_id): UrlParam<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let photo = {
        let mut db = ctx.db().await?;
        let photo = find_owned_photo(&mut db, user.id, photo_id).await?;
        sqlx::query("DELETE FROM photo WHERE photo_id = ?1")
            .bind(photo_id)
            .execute(&mut *db)
            .await?;
        photo
    };
    if let Err(err) = state.photos.remove(&photo.file_path).await {
        warn!(file = %photo.file_path, "could not remove photo file: {err}");
    }
    info!(photo_id, user_id = user.id, "photo deleted");

    Ok(finish(
        ctx.format(),
        jar,
        StatusCode::OK,
        json!({ "message": "Photo deleted successfully!" }),
        "Photo deleted successfully!",
        "/trips/photos/",
    ))
}
