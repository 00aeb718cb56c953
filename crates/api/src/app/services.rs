use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};

use goldline_core::DomainResult;
use goldline_infra::{
    AppConfig, CheckoutTerminal, InMemoryCustomerDirectory, InMemoryRateSource,
    InMemorySalesStore, InMemorySessionStorage, PostgresSalesStore, SalesEngine, SalesStore,
    SessionStorage, storage_from_config,
};
use goldline_pricing::PricingConfig;
use goldline_sales::ResumeOutcome;

pub type Engine = SalesEngine<Arc<dyn SalesStore>, Arc<InMemoryRateSource>>;

pub type Terminal = CheckoutTerminal<
    Arc<dyn SalesStore>,
    Arc<InMemoryRateSource>,
    Arc<dyn SessionStorage>,
    Arc<InMemoryCustomerDirectory>,
>;

/// Services shared by every handler.
///
/// The market rate is published by hand through the API, so the rate source
/// is always the in-memory one; the store is Postgres when configured and
/// checkout sessions live in Redis when configured.
pub struct AppServices {
    engine: Arc<Engine>,
    directory: Arc<InMemoryCustomerDirectory>,
    sessions: Arc<dyn SessionStorage>,
    config: AppConfig,
}

impl AppServices {
    /// Everything in memory (tests/dev).
    pub fn in_memory(pricing: PricingConfig, rate_max_age: Duration) -> Self {
        let config = AppConfig {
            pricing,
            rate_max_age,
            ..AppConfig::default()
        };
        Self::with_backends(
            Arc::new(InMemorySalesStore::new()),
            Arc::new(InMemorySessionStorage::new()),
            config,
        )
    }

    pub fn with_backends(
        store: Arc<dyn SalesStore>,
        sessions: Arc<dyn SessionStorage>,
        config: AppConfig,
    ) -> Self {
        let rates = Arc::new(InMemoryRateSource::new());
        let engine = SalesEngine::new(store, rates, config.pricing.clone(), config.rate_max_age);
        Self {
            engine: Arc::new(engine),
            directory: Arc::new(InMemoryCustomerDirectory::new()),
            sessions,
            config,
        }
    }

    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn SalesStore> = match &config.database_url {
            Some(url) => {
                let store = PostgresSalesStore::connect(url)
                    .await
                    .context("failed to connect to Postgres")?;
                tracing::info!("using Postgres sales store");
                Arc::new(store)
            }
            None => Arc::new(InMemorySalesStore::new()),
        };
        let sessions = storage_from_config(config).context("failed to set up session storage")?;
        Ok(Self::with_backends(store, sessions, config.clone()))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn rates(&self) -> &InMemoryRateSource {
        self.engine.rates()
    }

    pub fn directory(&self) -> &InMemoryCustomerDirectory {
        &self.directory
    }

    /// Resume (or start) the checkout session of one till.
    pub fn open_terminal(&self, terminal_id: &str) -> DomainResult<(Terminal, ResumeOutcome)> {
        CheckoutTerminal::open(
            self.engine.clone(),
            self.directory.clone(),
            self.sessions.clone(),
            terminal_id,
            &self.config,
            Utc::now(),
        )
    }
}
