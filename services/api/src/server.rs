use crate::cli::{MigrateArgs, ServeArgs};
use crate::infra::AppState;
use crate::routes::with_core_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use school_records::clock::SystemClock;
use school_records::config::AppConfig;
use school_records::error::AppError;
use school_records::store::Database;
use school_records::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(database) = args.database.take() {
        config.storage.database_url = database;
    }

    telemetry::init(&config.telemetry)?;

    let database = Database::connect(&config.storage)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        database: database.clone(),
    };

    let app = with_core_routes(database, Arc::new(SystemClock))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        database = %config.storage.database_url,
        "school records service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) fn migrate(mut args: MigrateArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(database) = args.database.take() {
        config.storage.database_url = database;
    }

    telemetry::init(&config.telemetry)?;

    let database = Database::connect(&config.storage)?;
    let version = database.schema_version()?;
    info!(
        database = %config.storage.database_url,
        schema_version = version,
        "schema is up to date"
    );
    Ok(())
}
