//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{Argon2Hasher, DbAdapter, GeminiClient, JwtTokenService},
    config::Config,
    error::{set_expose_details, ApiError},
    web::{build_router, Adapters, AppState},
};
use notatnik_core::ports::GenerativeModel;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!(env = ?config.app_env, "Configuration loaded. Starting server...");
    set_expose_details(config.app_env.is_development());

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .idle_timeout(config.db_idle_timeout)
        .acquire_timeout(config.db_acquire_timeout)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let model: Option<Arc<dyn GenerativeModel>> = match &config.gemini_api_key {
        Some(api_key) => {
            let client = GeminiClient::new(api_key.clone(), config.gemini_api_base.clone())?;
            info!(model = %config.gemini_model, "Gemini client configured");
            Some(Arc::new(client) as Arc<dyn GenerativeModel>)
        }
        None => {
            warn!("GEMINI_API_KEY is not set; the AI coach is disabled");
            None
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        config.clone(),
        Adapters {
            users: db_adapter.clone(),
            notes: db_adapter.clone(),
            chats: db_adapter.clone(),
            health: db_adapter,
            hasher: Arc::new(Argon2Hasher::new()),
            tokens: Arc::new(JwtTokenService::new(&config.jwt_secret)),
            model,
        },
    ));

    // Probe the configured model in the background; requests initialise lazily otherwise.
    if app_state.coach.is_available() {
        let coach = app_state.coach.clone();
        tokio::spawn(async move {
            match coach.initialize().await {
                Ok(model) => info!(model = %model, "AI coach ready"),
                Err(e) => error!(error = %e, "AI coach initialisation failed"),
            }
        });
    }

    // --- 5. Create the Web Router ---
    let app = build_router(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received, stopping server");
}
