//! Health checks
//!
//! Reports database and storage reachability for load balancers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use asset_db::Database;
use asset_library::Storage;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Key probed to confirm the storage backend answers
const STORAGE_PROBE_KEY: &str = "public/assets/.health";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub response_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: Vec<ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthReport {
    pub fn http_status(&self) -> StatusCode {
        match self.status {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

struct CachedHealth {
    report: HealthReport,
    cached_at: Instant,
}

pub struct HealthChecker {
    cache_duration: Duration,
    start_time: Instant,
    cache: RwLock<Option<CachedHealth>>,
    database: Option<Database>,
    storage: Arc<dyn Storage>,
}

impl HealthChecker {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            cache_duration: Duration::from_secs(10),
            start_time: Instant::now(),
            cache: RwLock::new(None),
            database: None,
            storage,
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = duration;
        self
    }

    /// Cached report, refreshed once it is older than the cache duration
    pub async fn check(&self) -> HealthReport {
        {
            let cache = self.cache.read().await;
            if let Some(ref cached) = *cache {
                if cached.cached_at.elapsed() < self.cache_duration {
                    debug!("Returning cached health report");
                    return cached.report.clone();
                }
            }
        }

        let report = self.perform_checks().await;

        let mut cache = self.cache.write().await;
        *cache = Some(CachedHealth {
            report: report.clone(),
            cached_at: Instant::now(),
        });

        report
    }

    async fn perform_checks(&self) -> HealthReport {
        let mut components = Vec::new();

        if let Some(ref database) = self.database {
            let start = Instant::now();
            let result = database.ping().await.map_err(|e| e.to_string());
            components.push(component("database", start, result));
        }

        let start = Instant::now();
        let result = self
            .storage
            .exists(STORAGE_PROBE_KEY)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string());
        components.push(component(self.storage.name(), start, result));

        let status = if components.iter().all(|c| c.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        HealthReport {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            components,
            timestamp: chrono::Utc::now(),
        }
    }
}

fn component(name: &str, start: Instant, result: Result<(), String>) -> ComponentHealth {
    let response_time_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(()) => ComponentHealth {
            name: name.to_string(),
            status: HealthStatus::Healthy,
            message: None,
            response_time_ms,
        },
        Err(message) => {
            warn!(component = name, error = %message, "Health check failed");
            ComponentHealth {
                name: name.to_string(),
                status: HealthStatus::Unhealthy,
                message: Some(message),
                response_time_ms,
            }
        }
    }
}

/// Liveness probe
pub async fn liveness() -> &'static str {
    "OK"
}

/// Readiness probe with component details
pub async fn readiness(
    State(checker): State<Arc<HealthChecker>>,
) -> (StatusCode, Json<HealthReport>) {
    let report = checker.check().await;
    (report.http_status(), Json(report))
}
