//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the booking orchestrator, in-flight attempts and configuration.

use crate::profiles::HttpProfileProvider;
use crate::storage::PgBookingStore;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use stay_core::{
    AvailabilityService, BookingOrchestrator, LedgerWriter, MemoryBookingStore,
    OrchestratorConfig, PayerProfileProvider, PaymentAttempt, ProfileDirectory, ResourceCatalog,
    SharedBookingStore,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// PostgreSQL ledger; in-memory when absent
    pub database_url: Option<String>,
    /// Path to the TOML resource catalog
    pub resource_catalog: String,
    /// Identity service; TOML payer directory when absent
    pub profile_service_url: Option<String>,
    pub verify_timeout_secs: u64,
    pub verify_max_attempts: u32,
    pub provider_timeout_secs: u64,
    /// How long an unanswered attempt is kept for its client result
    pub attempt_ttl_secs: u64,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_or("PORT", 8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            resource_catalog: std::env::var("RESOURCE_CATALOG")
                .unwrap_or_else(|_| "config/resources.toml".to_string()),
            profile_service_url: std::env::var("PROFILE_SERVICE_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            verify_timeout_secs: env_or("VERIFY_TIMEOUT_SECS", 15),
            verify_max_attempts: env_or("VERIFY_MAX_ATTEMPTS", 3),
            provider_timeout_secs: env_or("PROVIDER_TIMEOUT_SECS", 30),
            attempt_ttl_secs: env_or("ATTEMPT_TTL_SECS", 1800),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            provider_timeout: Duration::from_secs(self.provider_timeout_secs),
            verify_timeout: Duration::from_secs(self.verify_timeout_secs),
            verify_max_attempts: self.verify_max_attempts,
            ..OrchestratorConfig::default()
        }
    }

    pub fn attempt_ttl(&self) -> Duration {
        Duration::from_secs(self.attempt_ttl_secs)
    }
}

struct Pending {
    attempt: PaymentAttempt,
    stored_at: Instant,
}

/// In-flight attempts awaiting their client result, keyed by provider reference.
///
/// Process-local and lossy: an expired or forgotten attempt can still be
/// committed through the provider callback.
#[derive(Clone)]
pub struct PendingAttempts {
    inner: Arc<Mutex<HashMap<String, Pending>>>,
    ttl: Duration,
}

impl PendingAttempts {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Park an attempt under its provider reference. Attempts without a
    /// session are not stored.
    pub async fn insert(&self, attempt: PaymentAttempt) -> bool {
        let Some(reference) = attempt.reference().map(String::from) else {
            return false;
        };
        let mut pending = self.inner.lock().await;
        pending.insert(
            reference,
            Pending {
                attempt,
                stored_at: Instant::now(),
            },
        );
        true
    }

    /// Remove and return the attempt for `reference` unless it has expired.
    ///
    /// Taking ownership serializes concurrent result submissions.
    pub async fn take(&self, reference: &str) -> Option<PaymentAttempt> {
        let mut pending = self.inner.lock().await;
        let entry = pending.remove(reference)?;
        if entry.stored_at.elapsed() > self.ttl {
            warn!("Attempt for {} expired before its result arrived", reference);
            return None;
        }
        Some(entry.attempt)
    }

    /// Drop expired attempts, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut pending = self.inner.lock().await;
        let before = pending.len();
        let ttl = self.ttl;
        pending.retain(|_, entry| entry.stored_at.elapsed() <= ttl);
        before - pending.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Booking orchestrator (availability, providers, ledger)
    pub orchestrator: Arc<BookingOrchestrator>,
    /// Attempts waiting for a client result
    pub pending: PendingAttempts,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Build state from the environment
    pub async fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();

        let resources = load_resource_catalog(&config.resource_catalog)?;

        let bookings: SharedBookingStore = match &config.database_url {
            Some(url) => {
                let store = PgBookingStore::connect(url).await?;
                store.ensure_schema().await?;
                info!("Ledger: PostgreSQL");
                Arc::new(store)
            }
            None => {
                warn!("DATABASE_URL not set, using in-memory ledger");
                Arc::new(MemoryBookingStore::new())
            }
        };

        let profiles: Arc<dyn PayerProfileProvider> = match &config.profile_service_url {
            Some(url) => {
                info!("Payer profiles: {}", url);
                Arc::new(HttpProfileProvider::new(url.as_str())?)
            }
            None => Arc::new(load_payer_directory()?),
        };

        let providers = stay_gateway::registry_from_env();
        if providers.is_empty() {
            anyhow::bail!(
                "No payment provider configured (set PAYSTACK_SECRET_KEY or FLW_SECRET_KEY)"
            );
        }

        let orchestrator = BookingOrchestrator::new(
            AvailabilityService::new(Arc::new(resources), bookings.clone()),
            profiles,
            providers,
            Arc::new(LedgerWriter::new(bookings)),
        )
        .with_config(config.orchestrator_config());

        Ok(Self::from_parts(config, orchestrator))
    }

    /// Assemble state from an already built orchestrator
    pub fn from_parts(config: AppConfig, orchestrator: BookingOrchestrator) -> Self {
        let pending = PendingAttempts::new(config.attempt_ttl());
        Self {
            orchestrator: Arc::new(orchestrator),
            pending,
            config,
        }
    }
}

fn read_first(path: &str) -> Option<(String, String)> {
    let candidates = [
        path.to_string(),
        format!("../{}", path),
        format!("../../{}", path),
    ];
    candidates.into_iter().find_map(|candidate| {
        std::fs::read_to_string(&candidate)
            .ok()
            .map(|content| (candidate, content))
    })
}

/// Load the resource catalog from config file
fn load_resource_catalog(path: &str) -> anyhow::Result<ResourceCatalog> {
    if let Some((found, content)) = read_first(path) {
        let catalog = ResourceCatalog::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", found, e))?;
        info!("Loaded {} resources from {}", catalog.resources.len(), found);
        return Ok(catalog);
    }

    warn!("No resource catalog found at {}, using empty catalog", path);
    Ok(ResourceCatalog::new())
}

/// Load the development payer directory
fn load_payer_directory() -> anyhow::Result<ProfileDirectory> {
    let path = "config/payers.toml";
    if let Some((found, content)) = read_first(path) {
        let directory = ProfileDirectory::from_toml(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", found, e))?;
        info!("Loaded {} payer profiles from {}", directory.payers.len(), found);
        return Ok(directory);
    }

    warn!("No payer directory found, every booking will need a profile service");
    Ok(ProfileDirectory::new())
}
