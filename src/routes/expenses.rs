use askama::Template;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get},
    Json, Router,
};
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{
    auth::CurrentUser,
    context::RequestContext,
    db::DbConnection,
    error::AppError,
    flash,
    forms::{Input, QueryParams, UrlParam},
    models::{
        expense::{Expense, ExpenseInput},
        trip::Trip,
    },
    routes::{finish, render, trips, Page},
    state::AppState,
};

const EXPENSE_COLUMNS: &str = "e.expense_id, e.trip_id, e.description, e.date, e.amount, e.created_at";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips/expenses", get(list_expenses))
        .route("/trips/expenses/", get(list_expenses))
        .route("/trips/expenses/:expense_id", get(show_expense))
        .route("/trips/add_expense", get(new_expense_form).post(create_expense))
        .route(
            "/trips/edit_expense/:expense_id",
            get(edit_expense_form).post(update_expense).put(update_expense),
        )
        .route(
            "/trips/delete_expense/:expense_id",
            delete(delete_expense).post(delete_expense),
        )
}

/// Expenses are owned through their parent trip.
async fn find_owned_expense(
    conn: &mut DbConnection,
    user_id: i64,
    expense_id: i64,
) -> Result<Expense, AppError> {
    sqlx::query_as::<_, Expense>(&format!(
        r#"SELECT {EXPENSE_COLUMNS} FROM expense e
           JOIN trip t ON t.trip_id = e.trip_id
           WHERE e.expense_id = ?1 AND t.user_id = ?2"#
    ))
    .bind(expense_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::missing("expense", expense_id))
}

#[derive(Debug, Default, Deserialize)]
struct ExpenseFilter {
    trip_id: Option<i64>,
}

#[derive(Template)]
#[template(path = "expenses/list.html")]
struct ExpenseListTemplate {
    page: Page,
    expenses: Vec<Expense>,
    trip_id: Option<i64>,
}

async fn list_expenses(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    QueryParams(filter): QueryParams<ExpenseFilter>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let expenses = {
        let mut db = ctx.db().await?;
        if let Some(trip_id) = filter.trip_id {
            trips::find_owned_trip(&mut db, user.id, trip_id).await?;
        }
        sqlx::query_as::<_, Expense>(&format!(
            r#"SELECT {EXPENSE_COLUMNS} FROM expense e
               JOIN trip t ON t.trip_id = e.trip_id
               WHERE t.user_id = ?1 AND (?2 IS NULL OR e.trip_id = ?2)
               ORDER BY e.amount DESC, e.expense_id DESC"#
        ))
        .bind(user.id)
        .bind(filter.trip_id)
        .fetch_all(&mut *db)
        .await?
    };

    if expenses.is_empty() {
        if ctx.format().is_json() {
            return Err(AppError::NotFound("No expenses found".into()));
        }
        let location = match filter.trip_id {
            Some(trip_id) => format!("/trips/add_expense?trip_id={trip_id}"),
            None => "/trips/add_expense".to_string(),
        };
        return Ok((
            flash::push(jar, "No expenses found yet, record the first one."),
            Redirect::to(&location),
        )
            .into_response());
    }
    if ctx.format().is_json() {
        return Ok(Json(json!({ "expenses": expenses })).into_response());
    }
    let (jar, page) = Page::take(&current, jar);
    Ok(render(
        jar,
        ExpenseListTemplate {
            page,
            expenses,
            trip_id: filter.trip_id,
        },
    ))
}

#[derive(Template)]
#[template(path = "expenses/detail.html")]
struct ExpenseDetailTemplate {
    page: Page,
    expense: Expense,
    trip: Trip,
}

async fn show_expense(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    UrlParam(expense_id): UrlParam<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let (expense, trip) = {
        let mut db = ctx.db().await?;
        let expense = find_owned_expense(&mut db, user.id, expense_id).await?;
        let trip = trips::find_owned_trip(&mut db, user.id, expense.trip_id).await?;
        (expense, trip)
    };
    if ctx.format().is_json() {
        return Ok(Json(json!({ "expense": expense })).into_response());
    }
    let (jar, page) = Page::take(&current, jar);
    Ok(render(
        jar,
        ExpenseDetailTemplate {
            page,
            expense,
            trip,
        },
    ))
}

#[derive(Debug, Clone, Default)]
struct ExpenseForm {
    trip_id: Option<i64>,
    description: String,
    date: String,
    amount: String,
}

impl From<&Expense> for ExpenseForm {
    fn from(expense: &Expense) -> Self {
        Self {
            trip_id: Some(expense.trip_id),
            description: expense.description.clone().unwrap_or_default(),
            date: expense.date.as_ref().map(|_| expense.date_display()).unwrap_or_default(),
            amount: expense.amount.to_string(),
        }
    }
}

impl ExpenseForm {
    fn is_selected(&self, trip_id: &i64) -> bool {
        self.trip_id == Some(*trip_id)
    }
}

#[derive(Template)]
#[template(path = "expenses/form.html")]
struct ExpenseFormTemplate {
    page: Page,
    heading: String,
    action: String,
    form: ExpenseForm,
    trips: Vec<Trip>,
}

async fn new_expense_form(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    QueryParams(filter): QueryParams<ExpenseFilter>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let trips = {
        let mut db = ctx.db().await?;
        trips::list_owned_trips(&mut db, user.id).await?
    };
    if trips.is_empty() {
        return Ok((
            flash::push(jar, "Add a trip before recording expenses."),
            Redirect::to("/add_trip"),
        )
            .into_response());
    }
    let (jar, page) = Page::take(&current, jar);
    Ok(render(
        jar,
        ExpenseFormTemplate {
            page,
            heading: "Add an Expense".into(),
            action: "/trips/add_expense".into(),
            form: ExpenseForm {
                trip_id: filter.trip_id,
                ..ExpenseForm::default()
            },
            trips,
        },
    ))
}

async fn create_expense(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    Input(input): Input<ExpenseInput>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let fields = input.validate()?;
    let expense = {
        let mut db = ctx.db().await?;
        trips::find_owned_trip(&mut db, user.id, fields.trip_id).await?;
        sqlx::query_as::<_, Expense>(
            r#"INSERT INTO expense (trip_id, description, date, amount, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)
               RETURNING expense_id, trip_id, description, date, amount, created_at"#,
        )
        .bind(fields.trip_id)
        .bind(&fields.description)
        .bind(&fields.date)
        .bind(fields.amount)
        .bind(Utc::now())
        .fetch_one(&mut *db)
        .await?
    };
    info!(
        expense_id = expense.expense_id,
        trip_id = expense.trip_id,
        "expense created"
    );

    let location = format!("/trips/expenses/{}", expense.expense_id);
    Ok(finish(
        ctx.format(),
        jar,
        StatusCode::CREATED,
        json!({ "message": "Expense was created successfully!", "expense": expense }),
        "Expense was created successfully!",
        &location,
    ))
}

async fn edit_expense_form(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    UrlParam(expense_id): UrlParam<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let (expense, trips) = {
        let mut db = ctx.db().await?;
        let expense = find_owned_expense(&mut db, user.id, expense_id).await?;
        let trips = trips::list_owned_trips(&mut db, user.id).await?;
        (expense, trips)
    };
    let (jar, page) = Page::take(&current, jar);
    Ok(render(
        jar,
        ExpenseFormTemplate {
            page,
            heading: "Edit Expense".into(),
            action: format!("/trips/edit_expense/{expense_id}"),
            form: ExpenseForm::from(&expense),
            trips,
        },
    ))
}

async fn update_expense(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    UrlParam(expense_id): UrlParam<i64>,
    Input(input): Input<ExpenseInput>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let expense = {
        let mut db = ctx.db().await?;
        let existing = find_owned_expense(&mut db, user.id, expense_id).await?;
        let fields = input.validate()?;
        if fields.trip_id != existing.trip_id {
            trips::find_owned_trip(&mut db, user.id, fields.trip_id).await?;
        }
        sqlx::query_as::<_, Expense>(
            r#"UPDATE expense SET trip_id = ?1, description = ?2, date = ?3, amount = ?4
               WHERE expense_id = ?5
               RETURNING expense_id, trip_id, description, date, amount, created_at"#,
        )
        .bind(fields.trip_id)
        .bind(&fields.description)
        .bind(&fields.date)
        .bind(fields.amount)
        .bind(expense_id)
        .fetch_one(&mut *db)
        .await?
    };
    info!(expense_id, trip_id = expense.trip_id, "expense updated");

    let location = format!("/trips/expenses/{expense_id}");
    Ok(finish(
        ctx.format(),
        jar,
        StatusCode::OK,
        json!({ "message": "Expense updated successfully!", "expense": expense }),
        "Expense updated successfully!",
        &location,
    ))
}

async fn delete_expense(
    ctx: RequestContext,
    current: CurrentUser,
    jar: PrivateCookieJar,
    UrlParam(expense_id): UrlParam<i64>,
) -> Result<Response, AppError> {
    let user = current.require_user()?;
    let expense = {
        let mut db = ctx.db().await?;
        let expense = find_owned_expense(&mut db, user.id, expense_id).await?;
        sqlx::query("DELETE FROM expense WHERE expense_id = ?1")
            .bind(expense_id)
            .execute(&mut *db)
            .await?;
        expense
    };
    info!(expense_id, trip_id = expense.trip_id, "expense deleted");

    let location = format!("/trip/{}", expense.trip_id);
    Ok(finish(
        ctx.format(),
        jar,
        StatusCode::OK,
        json!({ "message": "Expense deleted successfully!" }),
        "Expense deleted successfully!",
        &location,
    ))
}
