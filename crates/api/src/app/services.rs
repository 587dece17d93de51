//! Store selection and the shared service handles used by the handlers.

use std::sync::Arc;

use coffer_infra::{AccountDirectory, AccountStore, CoordinatorConfig, InMemoryAccountStore, TransferCoordinator};

use crate::config::ApiConfig;

/// Store handle shared by the coordinator and the directory.
pub type SharedStore = Arc<dyn AccountStore>;

pub struct AppServices {
    pub transfers: TransferCoordinator<SharedStore>,
    pub accounts: AccountDirectory<SharedStore>,
}

impl AppServices {
    /// Wire both services to the same store.
    pub fn new(store: SharedStore, config: CoordinatorConfig) -> Self {
        Self {
            transfers: TransferCoordinator::new(store.clone(), config),
            accounts: AccountDirectory::new(store),
        }
    }

    /// In-memory services with default timeouts (tests, local runs).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryAccountStore::new()), CoordinatorConfig::default())
    }
}

/// Build services for `config`: Postgres when a database URL is configured,
/// otherwise the in-memory store.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let store: SharedStore = match &config.database_url {
        Some(url) => persistent_store(url, &config.coordinator).await?,
        None => {
            tracing::info!("using in-memory account store");
            Arc::new(InMemoryAccountStore::new())
        }
    };
    Ok(AppServices::new(store, config.coordinator))
}

#[cfg(feature = "postgres")]
async fn persistent_store(url: &str, coordinator: &CoordinatorConfig) -> anyhow::Result<SharedStore> {
    use anyhow::Context;
    use coffer_infra::PostgresAccountStore;

    // Commits are bounded by the server, with the same budget as the read phase.
    let store = PostgresAccountStore::connect(url)
        .await
        .context("failed to connect to Postgres")?
        .with_statement_timeout(coordinator.operation_timeout);
    store.migrate().await.context("failed to create accounts schema")?;
    tracing::info!("using Postgres account store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn persistent_store(_url: &str, _coordinator: &CoordinatorConfig) -> anyhow::Result<SharedStore> {
    anyhow::bail!("USE_PERSISTENT_STORES=true requires building coffer-api with the `postgres` feature")
}
