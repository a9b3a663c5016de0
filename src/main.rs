use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use studyroom::auth::{SessionManager, TokenCodec};
use studyroom::configuration::get_configuration;
use studyroom::startup::run;
use studyroom::store::{CredentialStore, InMemoryCredentialStore, PostgresCredentialStore};
use studyroom::telemetry::init_telemetry;

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

    // Refuse to start with missing, weak or shared signing secrets
    let codec = TokenCodec::new(&configuration.jwt).map_err(|e| {
        tracing::error!("Invalid JWT configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "JWT configuration error")
    })?;

    let store: Arc<dyn CredentialStore> = match &configuration.database {
        Some(database) => {
            tracing::info!("Attempting to connect to database");

            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database.connection_string())
                .await
                .map_err(|e| {
                    tracing::error!("Failed to create connection pool: {}", e);
                    std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "Database connection error",
                    )
                })?;

            tracing::info!("Database connection pool created successfully");
            Arc::new(PostgresCredentialStore::new(pool))
        }
        None => {
            tracing::warn!("No database configured, accounts are kept in memory");
            Arc::new(InMemoryCredentialStore::new())
        }
    };

    let address = configuration.application.address();
    tracing::info!("Binding server to address: {}", address);

    let listener = TcpListener::bind(&address)?;
    tracing::info!(
        environment = %configuration.application.environment,
        "Server listening on: {}",
        address
    );

    let sessions = SessionManager::new(codec, store);
    let server = run(
        listener,
        sessions,
        configuration.application.clone(),
        configuration.rate_limit.clone(),
    )?;
    tracing::info!("Server started successfully");

    server.await
}
