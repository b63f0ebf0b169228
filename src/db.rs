use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use tracing::info;

use crate::error::AppError;

pub type DbConnection = SqliteConnection;

const TABLES: [&str; 6] = ["photo", "expense", "trip", "session", "user", "_sqlx_migrations"];

pub fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    Ok(options)
}

pub async fn open(options: &SqliteConnectOptions) -> Result<DbConnection, AppError> {
    let conn = SqliteConnection::connect_with(options).await?;
    Ok(conn)
}

pub async fn init_schema(options: &SqliteConnectOptions) -> Result<(), AppError> {
    let mut conn = open(options).await?;
    sqlx::migrate!("./migrations").run(&mut conn).await?;
    conn.close().await?;
    Ok(())
}

/// Drops every table and re-applies the migrations.
pub async fn reset_schema(options: &SqliteConnectOptions) -> Result<(), AppError> {
    let mut conn = open(options).await?;
    for table in TABLES {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&mut conn)
            .await?;
    }
    info!("dropped existing tables");
    sqlx::migrate!("./migrations").run(&mut conn).await?;
    conn.close().await?;
    Ok(())
}
