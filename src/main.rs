use trips::config::AppConfig;
use trips::db;
use trips::error::AppError;
use trips::routes::create_router;
use trips::services::storage::PhotoStorage;
use trips::state::AppState;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let db_options = db::connect_options(&config.database_url)?;

    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => {}
        Some("init-db") => {
            db::reset_schema(&db_options).await?;
            info!("The new database has been created!");
            return Ok(());
        }
        Some(other) => {
            return Err(AppError::Config(format!(
                "unknown command {other:?}, expected `serve` or `init-db`"
            )));
        }
    }

    if let Err(err) = db::init_schema(&db_options).await {
        error!("migration failed: {err:?}");
        return Err(err);
    }

    let photos = PhotoStorage::new(config.upload_dir.clone());
    photos.ensure_structure().await?;

    let state = AppState::new(config.clone(), db_options, photos);
    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,trips=debug,tower_http=info".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
