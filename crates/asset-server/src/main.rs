//! CMS asset server
//!
//! Serves the asset API over the configured store and storage backend.

use std::sync::Arc;

use asset_api::{ApiConfig, AppState};
use asset_core::config::AppConfig;
use asset_core::Settings;
use asset_db::{Database, DatabaseConfig, PgAssetStore, SettingsRepository};
use asset_library::{
    standard_registry, AssetService, AssetSettings, AssetStore, AttachmentPaths, LocalStorage,
    MemoryAssetStore, S3Storage, Storage, StorageBackend,
};
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod health;

use health::HealthChecker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().unwrap_or_else(|e| {
        warn!("Failed to load config from env: {}, using defaults", e);
        AppConfig::default()
    });

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting asset server"
    );

    let db = connect_database(&config).await;
    let settings = load_settings(&config, db.as_ref()).await?;
    let asset_settings = AssetSettings::from_settings(&settings);

    let storage = build_storage(&asset_settings, &config)?;
    let store: Arc<dyn AssetStore> = match db {
        Some(ref db) => Arc::new(PgAssetStore::new(db.pool().clone())),
        None => {
            warn!("No database configured, assets are kept in memory");
            Arc::new(MemoryAssetStore::new())
        }
    };

    let paths = AttachmentPaths::from_settings(&asset_settings, config.storage.root.clone());
    let service = AssetService::new(
        Arc::new(standard_registry()),
        store,
        Arc::clone(&storage),
        asset_settings,
        paths,
    );

    let mut health = HealthChecker::new(storage);
    if let Some(ref db) = db {
        health = health.with_database(db.clone());
    }

    let state = AppState::new(
        Arc::new(service),
        ApiConfig {
            x_sendfile: config.server.x_sendfile,
        },
    );
    let app = build_router(state, Arc::new(health), config.server.max_body_size_bytes);

    let addr = config.server_addr();
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(db) = db {
        db.close().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,asset_server=debug,asset_api=debug,asset_library=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Connect and migrate when a database URL is configured. A failed connection
/// falls back to the in-memory store.
async fn connect_database(config: &AppConfig) -> Option<Database> {
    let url = config.database.url.as_deref()?;
    let db_config = DatabaseConfig::new(url, config.database.pool_size).with_env_overrides();

    let db = match Database::connect(&db_config).await {
        Ok(db) => db,
        Err(e) => {
            warn!("Failed to connect to database: {}. Running without database.", e);
            return None;
        }
    };

    if let Err(e) = asset_db::migrate(&db).await {
        warn!("Failed to ensure schema: {}. Running without database.", e);
        return None;
    }

    info!("Connected to database");
    Some(db)
}

/// Settings file first, then the `config` table on top
async fn load_settings(config: &AppConfig, db: Option<&Database>) -> anyhow::Result<Settings> {
    let mut settings = match config.storage.settings_file {
        Some(ref path) => Settings::from_file(path)?,
        None => Settings::new(),
    };

    if let Some(db) = db {
        let stored = SettingsRepository::new(db.pool().clone()).load().await?;
        info!(keys = stored.len(), "Loaded settings from database");
        settings.merge(stored);
    }

    Ok(settings)
}

fn build_storage(settings: &AssetSettings, config: &AppConfig) -> anyhow::Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match settings.storage {
        StorageBackend::Filesystem => Arc::new(LocalStorage::new(&config.storage.root)),
        StorageBackend::S3 => Arc::new(S3Storage::new(&settings.s3)?),
    };
    info!(storage = storage.name(), "Storage backend selected");
    Ok(storage)
}

fn build_router(state: AppState, health: Arc<HealthChecker>, max_body_size: usize) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::liveness))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(health);

    Router::new()
        .merge(health_routes)
        .merge(asset_api::router().with_state(state))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
