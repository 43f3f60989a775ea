use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use tillpoint::configuration::{get_configuration, StoreBackend};
use tillpoint::startup::{run, spawn_session_cleanup, AppState};
use tillpoint::store::Stores;
use tillpoint::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let timeout = configuration.application.store_timeout();
    let stores = match configuration.application.store {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; nothing survives a restart");
            Stores::in_memory(timeout)
        }
        StoreBackend::Postgres => {
            tracing::info!("Attempting to connect to database");

            let pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(timeout)
                .connect(&configuration.database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                    )
                })?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to run migrations: {}", e);
                    std::io::Error::new(std::io::ErrorKind::Other, "Database migration error")
                })?;

            tracing::info!("Database connection pool created successfully");
            Stores::postgres(pool, timeout)
        }
    };

    let state = AppState::new(stores, &configuration).map_err(|e| {
        tracing::error!("Failed to build application state: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Startup error")
    })?;

    spawn_session_cleanup(state.binder.clone(), configuration.session.cleanup_interval());
    tracing::info!(
        every_secs = configuration.session.cleanup_interval_seconds,
        "Expired session cleanup scheduled"
    );

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, state)?;
    server.await
}
