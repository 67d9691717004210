use campus_hub::{
    AppState, LogNotifier, SeedOutcome,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database and migrations, storage,
/// admin seeding, the optional recovery-code sweep, then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise a development default.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "campus_hub=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let postgres = PostgresRepository::new(pool);
    postgres
        .migrate()
        .await
        .expect("FATAL: Failed to run database migrations.");
    let repo = Arc::new(postgres) as RepositoryState;

    // 4. Storage (S3/MinIO)
    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    if config.env == Env::Local {
        s3_client.ensure_bucket_exists().await;
    }
    let storage = Arc::new(s3_client) as StorageState;

    // 5. Unified state
    let app_state = AppState::new(repo, storage, Arc::new(LogNotifier), config.clone());

    // 6. First-boot admin
    match app_state
        .credentials
        .seed_admin(&config.admin_email, &config.admin_password)
        .await
    {
        Ok(SeedOutcome::Created) => {
            tracing::info!(email = %config.admin_email, "admin account created")
        }
        Ok(SeedOutcome::AlreadyPresent) => {
            tracing::debug!(email = %config.admin_email, "admin account already present")
        }
        Err(e) => panic!("FATAL: Failed to seed admin account: {e}"),
    }

    // 7. Expired-code sweep (maintenance only, off by default)
    if config.otp_sweep_secs > 0 {
        let recovery = app_state.recovery.clone();
        let period = Duration::from_secs(config.otp_sweep_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match recovery.purge_expired(chrono::Utc::now()).await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "expired recovery codes purged"),
                    Err(e) => tracing::warn!(error = %e, "recovery code sweep failed"),
                }
            }
        });
    }

    // 8. Router and server
    let app = create_router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", addr);
    tracing::info!(
        "API Documentation (Swagger UI) available at: http://localhost:{}/swagger-ui",
        config.port
    );

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
