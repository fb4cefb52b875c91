//! Shared application state handed to every axum handler.

use std::path::PathBuf;
use std::sync::Arc;

use ddf_catalog_storage::{Catalog, CatalogBackend};

use crate::admission::AdmissionControl;
use crate::config::ServiceConfig;
use crate::pool::EnginePool;
use ddf_loader::assets::AssetStore;

pub struct AppState<B: CatalogBackend> {
    pub catalog: Arc<Catalog<B>>,
    pub store: Arc<dyn AssetStore>,
    pub admission: AdmissionControl,
    pub config: ServiceConfig,
    /// Root directory holding `<name>/<version>/<shard>.csv` files
    /// produced by the loader for each ingested table.
    pub data_root: PathBuf,
    /// Pool of reusable query engines, sized by `db_max_connections` and
    /// bounded by `db_connection_timeout`.
    pub engines: Arc<EnginePool>,
}

impl<B: CatalogBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            store: Arc::clone(&self.store),
            admission: self.admission.clone(),
            config: self.config.clone(),
            data_root: self.data_root.clone(),
            engines: Arc::clone(&self.engines),
        }
    }
}
