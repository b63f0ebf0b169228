use askama::Template;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get},
    Json, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::{
    auth::CurrentUser,
    context::RequestContext,
    db::DbConnection,
    error::AppError,
    flash,
    forms::{Input, UrlParam},
    models::{
        expense::Expense,
        photo::Photo,
        trip::{Trip, TripFields, TripInput},
    },
    routes::{finish, render, Page},
    state::AppState,
};

const TRIP_COLUMNS: &str = "trip_id, user_id, destination, date, description, budget, created_at";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_trips))
        .route("/trips/", get(list_trips))
        .route("/trip/:trip_id", get(show_trip))
        .route("/add_trip", get(new_trip_form).post(create_trip))
        .route(
            "/edit_trip/:trip_id",
            get(edit_trip_form).post(update_trip).put(update_trip),
        )
        .route(
            "/delete_trip/:trip_id",
            delete(delete_trip).post(delete_trip),
        )
}

/// Looks up a trip owned by `user_id`. Trips of other users are reported as
/// missing.
pub(crate) async fn find_owned_trip(
    conn: &mut DbConnection,
    user_id: i64,
    trip_id: i64,
) -> Result<Trip, AppError> {
    sqlx::query_as::<_, Trip>(&format!(
        "SELECT {TRIP_COLUMNS} FROM trip WHERE trip_id = ?1 AND user_id = ?2"
    ))
    .bind(trip_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::missing("trip", trip_id))
}

pub(crate) async fn list_owned_trips(
    conn: &mut DbConnection,
    user_id: i64,
) -> Result<Vec<Trip>, AppError> {
    let trips = sqlx::query_as::<_, Trip>(&format!(
        "SELECT {TRIP_COLUMNS} FROM trip WHERE user_id = ?1 ORDER BY date DESC, trip_id DESC"
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(trips)
}

#[derive(Template)]
#[template(path = "trips/list.html")]
struct TripListTemplate {
    page: Page,
    trips: Vec<Trip>,
}

async fn list_trips(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let trips = {
        let mut db = ctx.db().await?;
        list_owned_trips(&mut db, user.id).await?
    };

    if trips.is_empty() {
        if ctx.format().is_json() {
            return Err(AppError::NotFound("No trips found".into()));
        }
        return Ok((
            flash::push(jar, "No trips found yet, add your first one."),
            Redirect::to("/add_trip"),
        )
            .into_response());
    }
    if ctx.format().is_json() {
        return Ok(Json(json!({ "trips": trips })).into_response());
    }
    let (jar, page) = Page::take(&current, jar);
    Ok(render(jar, TripListTemplate { page, trips }))
}

#[derive(Template)]
#[template(path = "trips/detail.html")]
struct TripDetailTemplate {
    page: Page,
    trip: Trip,
    expenses: Vec<Expense>,
    expense_total: String,
    photos: Vec<Photo>,
}

async fn show_trip(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    UrlParam(trip_id): UrlParam<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let mut db = ctx.db().await?;
    let trip = find_owned_trip(&mut db, user.id, trip_id).await?;
    if ctx.format().is_json() {
        return Ok(Json(json!({ "trip": trip })).into_response());
    }

    let expenses = sqlx::query_as::<_, Expense>(
        r#"SELECT expense_id, trip_id, description, date, amount, created_at
           FROM expense WHERE trip_id = ?1 ORDER BY amount DESC, expense_id DESC"#,
    )
    .bind(trip.trip_id)
    .fetch_all(&mut *db)
    .await?;
    let photos = sqlx::query_as::<_, Photo>(
        r#"SELECT photo_id, user_id, trip_id, file_path, created_at
           FROM photo WHERE trip_id = ?1 AND user_id = ?2 ORDER BY created_at DESC, photo_id DESC"#,
    )
    .bind(trip.trip_id)
    .bind(user.id)
    .fetch_all(&mut *db)
    .await?;
    drop(db);

    let expense_total = format!("{:.2}", expenses.iter().map(|e| e.amount).sum::<f64>());
    let (jar, page) = Page::take(&current, jar);
    Ok(render(
        jar,
        TripDetailTemplate {
            page,
            trip,
            expenses,
            expense_total,
            photos,
        },
    ))
}

/// String form of a trip for pre-filling the add/edit form.
#[derive(Debug, Clone, Default)]
struct TripForm {
    destination: String,
    date: String,
    description: String,
    budget: String,
}

impl From<&Trip> for TripForm {
    fn from(trip: &Trip) -> Self {
        Self {
            destination: trip.destination.clone(),
            date: trip.date.as_ref().map(|_| trip.date_display()).unwrap_or_default(),
            description: trip.description.clone(),
            budget: trip.budget.map(|b| b.to_string()).unwrap_or_default(),
        }
    }
}

#[derive(Template)]
#[template(path = "trips/form.html")]
struct TripFormTemplate {
    page: Page,
    heading: String,
    action: String,
    form: TripForm,
}

async fn new_trip_form(current: CurrentUser, jar: PrivateCookieJar) -> Response {
    let (jar, page) = Page::take(&current, jar);
    render(
        jar,
        TripFormTemplate {
            page,
            heading: "Add a New Trip".into(),
            action: "/add_trip".into(),
            form: TripForm::default(),
        },
    )
}

async fn create_trip(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Input(input): Input<TripInput>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let fields = input.validate()?;
    let trip = {
        let mut db = ctx.db().await?;
        insert_trip(&mut db, user.id, &fields).await?
    };
    info!(trip_id = trip.trip_id, user_id = user.id, "trip created");

    let location = format!("/trip/{}", trip.trip_id);
    Ok(finish(
        ctx.format(),
        jar,
        StatusCode::CREATED,
        json!({ "message": "Trip was created successfully!", "trip": trip }),
        "Trip was created successfully!",
        &location,
    ))
}

async fn insert_trip(
    conn: &mut DbConnection,
    user_id: i64,
    fields: &TripFields,
) -> Result<Trip, AppError> {
    let trip = sqlx::query_as::<_, Trip>(&format!(
        r#"INSERT INTO trip (user_id, destination, date, description, budget, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           RETURNING {TRIP_COLUMNS}"#
    ))
    .bind(user_id)
    .bind(&fields.destination)
    .bind(&fields.date)
    .bind(&fields.description)
    .bind(fields.budget)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    Ok(trip)
}

async fn edit_trip_form(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    UrlParam(trip_id): UrlParam<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let trip = {
        let mut db = ctx.db().await?;
        find_owned_trip(&mut db, user.id, trip_id).await?
    };
    let (jar, page) = Page::take(&current, jar);
    Ok(render(
        jar,
        TripFormTemplate {
            page,
            heading: "Edit Trip".into(),
            action: format!("/edit_trip/{trip_id}"),
            form: TripForm::from(&trip),
        },
    ))
}

async fn update_trip(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    UrlParam(trip_id): UrlParam<i64>,
    Input(input): Input<TripInput>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let trip = {
        let mut db = ctx.db().await?;
        find_owned_trip(&mut db, user.id, trip_id).await?;
        let fields = input.validate()?;
        sqlx::query_as::<_, Trip>(&format!(
            r#"UPDATE trip SET destination = ?1, date = ?2, description = ?3, budget = ?4
               WHERE trip_id = ?5 AND user_id = ?6
               RETURNING {TRIP_COLUMNS}"#
        ))
        .bind(&fields.destination)
        .bind(&fields.date)
        .bind(&fields.description)
        .bind(fields.budget)
        .bind(trip_id)
        .bind(user.id)
        .fetch_one(&mut *db)
        .await?
    };
    info!(trip_id, user_id = user.id, "trip updated");

    let location = format!("/trip/{trip_id}");
    Ok(finish(
        ctx.format(),
        jar,
        StatusCode::OK,
        json!({ "message": "Trip updated successfully!", "trip": trip }),
        "Trip updated successfully!",
        &location,
    ))
}

async fn delete_trip(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    UrlParam(trip_id): UrlParam<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    {
        let mut db = ctx.db().await?;
        find_owned_trip(&mut db, user.id, trip_id).await?;
        sqlx::query("DELETE FROM trip WHERE trip_id = ?1 AND user_id = ?2")
            .bind(trip_id)
            .bind(user.id)
            .execute(&mut *db)
            .await?;
    }
    info!(trip_id, user_id = user.id, "trip deleted");

    Ok(finish(
        ctx.format(),
        jar,
        StatusCode::OK,
        json!({ "message": "Trip deleted successfully!" }),
        "Trip deleted successfully!",
        "/trips/",
    ))
}
