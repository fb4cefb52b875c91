//! DDF catalog & query HTTP service.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use ddf_api::admission::AdmissionControl;
use ddf_api::routes;
use ddf_api::{AppState, ServiceConfig};
use ddf_catalog_storage::{CatalogBackend, LocalSqliteBackend};
use ddf_loader::assets::{AssetStore, LocalAssetStore};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = ServiceConfig::from_env();
    if let Err(message) = config.validate() {
        eprintln!("Error: invalid configuration: {message}");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(catalog = %config.catalog_path, "using catalog");

    let backend = LocalSqliteBackend::new(&config.catalog_path);
    if !backend.exists().unwrap_or(false) {
        tracing::warn!("catalog does not exist, initializing new catalog");
        backend.initialize().expect("failed to initialize catalog");
    }
    let catalog = Arc::new(ddf_catalog_storage::Catalog::new(backend));

    let data_root = std::path::PathBuf::from(
        std::env::var("DDF_DATA_ROOT").unwrap_or_else(|_| "ddf_data".to_string()),
    );
    let asset_root = std::path::PathBuf::from(
        std::env::var("DDF_ASSET_ROOT").unwrap_or_else(|_| "ddf_assets".to_string()),
    );
    let store: Arc<dyn AssetStore> = Arc::new(LocalAssetStore::new(asset_root));

    let admission = AdmissionControl::new(config.cpu_throttle, config.db_throttle);
    admission.spawn_sampler();

    let engines = Arc::new(ddf_api::pool::EnginePool::new(
        config.db_max_connections,
        config.db_connection_timeout,
    ));

    let state = AppState { catalog, store, admission, config: config.clone(), data_root, engines };

    let mut router = Router::new()
        .route("/", get(routes::list_datasets))
        .route("/ddf-service-directory", get(routes::service_directory))
        .route("/{name}/assets/{asset}", get(routes::asset_redirect_versionless))
        .route("/{name}/{version}/assets/{asset}", get(routes::asset_redirect_versioned))
        .route("/{name}/{version}", get(routes::run_query))
        .route("/{name}", get(routes::redirect_versionless));

    if let Some(token) = &config.loader_io_token {
        router = router.route(&format!("/{token}.txt"), get(routes::loader_io_token));
    }

    let app = router
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!(%addr, "ddf-api listening");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
