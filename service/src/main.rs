mod config;
mod routes;
mod storage;
mod models;

use axum::{Router, extract::DefaultBodyLimit};
use config::ServiceConfig;
use routes::AppState;
use runlog_parser::ProfileRegistry;
use std::sync::Arc;
use storage::RunStorage;
use tower_http::cors::{CorsLayer, Any};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runlog_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::from_env()?;
    tracing::debug!("Loaded config: {:?}", config);

    let mut registry = ProfileRegistry::new();
    if let Some(path) = &config.profiles_path {
        let loaded = registry.load_specs_from_path(path)?;
        tracing::info!("Loaded {} custom profiles: {}", loaded.len(), loaded.join(", "));
    }
    if registry.get(&config.default_profile).is_none() {
        return Err(format!("Default profile '{}' is not registered", config.default_profile).into());
    }

    let state = AppState {
        storage: Arc::new(RunStorage::new(&config.data_dir)?),
        registry: Arc::new(registry),
        default_profile: Arc::from(config.default_profile.as_str()),
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Planner logs with per-rule statistics can run to hundreds of MB
    let app = Router::new()
        .merge(routes::create_routes(state))
        .layer(DefaultBodyLimit::max(1024 * 1024 * 1024)) // 1 GB limit
        .layer(cors);

    tracing::info!("Starting run log service on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
