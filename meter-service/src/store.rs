use std::sync::Arc;

use meter_client::db::{InMemoryStore, PgStore, Store};

use crate::config::{StoreConfig, StoreKind};

/// Open the configured store. Postgres connects eagerly so a bad URI fails
/// at startup rather than on the first request.
pub async fn open_store(cfg: &StoreConfig) -> anyhow::Result<Arc<dyn Store>> {
    match cfg.kind {
        StoreKind::Memory => {
            tracing::warn!("using in-memory store, data is lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreKind::Postgres => {
            let uri = cfg
                .uri
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("store.uri is required for postgres"))?;
            let store = PgStore::connect(uri, cfg.max_connections).await?;
            tracing::info!(max_connections = cfg.max_connections, "connected to postgres");
            Ok(Arc::new(store))
        }
    }
}
