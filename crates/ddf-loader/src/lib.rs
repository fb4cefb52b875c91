//! DDF Loader
//!
//! Ingestion pipeline driving a package directory into a new catalog
//! version: manifest parsing, schema derivation via CSV inference,
//! version assignment, asset upload, and ingestion notifications.

pub mod assets;
pub mod datapackage;
pub mod materialize;
pub mod notify;
pub mod version;

use std::path::Path;

use ddf_catalog_storage::{Catalog, CatalogBackend};
use ddf_schema::SchemaModel;
use ddf_table::{infer_from_csv, ColumnStats, InferredSchema, WideTableLimits};

use assets::{upload_assets_dir, AssetStore, AssetStoreError};
use datapackage::{discover_translations, DataPackage, DataPackageError};
use materialize::{finalize_wide_tables, materialize_resource, merge_stats, version_data_dir, IngestionStats};
use notify::ChatNotifier;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    DataPackage(#[from] DataPackageError),
    #[error(transparent)]
    Catalog(#[from] ddf_catalog_core::CatalogError),
    #[error(transparent)]
    Infer(#[from] ddf_table::InferError),
    #[error(transparent)]
    Asset(#[from] AssetStoreError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, LoaderError>;

/// Flags recognised by the admin `load` subcommand.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub publish: bool,
    pub only_parse: bool,
    pub assets_only: bool,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub name: String,
    pub version: String,
    pub resources_loaded: usize,
    pub rows_loaded: u64,
    pub uploaded_assets: Vec<String>,
}

/// Drive the full ingestion pipeline for one package directory,
/// assigning a version if the caller didn't pass one, and posting
/// start/completion notifications along the way.
pub async fn load<B: CatalogBackend>(
    catalog: &Catalog<B>,
    store: &dyn AssetStore,
    notifier: &ChatNotifier,
    data_root: &Path,
    package_dir: &Path,
    name: &str,
    version: Option<&str>,
    options: &LoadOptions,
    wide_table_limits: &WideTableLimits,
) -> Result<LoadOutcome> {
    if options.assets_only {
        return load_assets_only(catalog, store, package_dir, name, version).await;
    }

    let resolved_version = resolve_version(catalog, name, version)?;
    notifier.notify_start(name, &resolved_version).await;

    match run_ingestion(catalog, store, data_root, package_dir, name, &resolved_version, options, wide_table_limits).await {
        Ok(outcome) => {
            if !options.only_parse {
                notifier.notify_completed(name, &resolved_version, outcome.rows_loaded).await;
            }
            Ok(outcome)
        }
        Err(err) => {
            notifier.notify_failed(name, &resolved_version, &err.to_string()).await;
            Err(err)
        }
    }
}

/// Idempotency guard: an explicit literal version that already exists
/// fails fast; otherwise derive the next version from the most
/// recently imported one.
fn resolve_version<B: CatalogBackend>(
    catalog: &Catalog<B>,
    name: &str,
    version: Option<&str>,
) -> Result<String> {
    match version {
        Some(explicit) => {
            if catalog.lookup(name, Some(explicit))?.is_some() {
                return Err(LoaderError::Catalog(ddf_catalog_core::CatalogError::AlreadyExists(
                    format!("{name}/{explicit}"),
                )));
            }
            Ok(explicit.to_string())
        }
        None => {
            let prior = catalog.list(Some(name))?.into_iter().map(|e| e.version).next();
            Ok(version::next_version(chrono::Utc::now().date_naive(), prior.as_deref()))
        }
    }
}

async fn run_ingestion<B: CatalogBackend>(
    catalog: &Catalog<B>,
    store: &dyn AssetStore,
    data_root: &Path,
    package_dir: &Path,
    name: &str,
    resolved_version: &str,
    options: &LoadOptions,
    wide_table_limits: &WideTableLimits,
) -> Result<LoadOutcome> {
    let package = DataPackage::load(package_dir)?;
    let _translations = discover_translations(package_dir)?;

    let mut schema = SchemaModel::new();
    let mut stats = IngestionStats::default();
    let mut rows_loaded: u64 = 0;
    // (resource path, normalized domain/datapoint key id) pairs to
    // materialize once the schema's final shard layout is known.
    let mut pending_entities: Vec<(String, String)> = Vec::new();
    let mut pending_datapoints: Vec<(String, Vec<String>)> = Vec::new();

    for concept_resource in &package.ddf_schema().concepts {
        register_entity_set_domains(&mut schema, &package_dir.join(concept_resource))?;
    }

    for entity in &package.ddf_schema().entities {
        let domain = entity.primary_key.first().cloned().unwrap_or_default();
        for resource in &entity.resources {
            let path = package_dir.join(resource);
            let inferred = infer_columns(&path)?;
            rows_loaded += inferred.row_count;
            let (key_stats, value_stats) = split_stats(inferred, &entity.primary_key);
            let value_columns: Vec<String> = value_stats.iter().map(|c| c.name.clone()).collect();
            merge_entity_columns(&mut schema, &domain, &value_columns, resource);
            merge_stats(stats.entity_key.entry(domain.clone()).or_default(), &key_stats);
            merge_stats(stats.entity_value.entry(domain.clone()).or_default(), &value_stats);
            pending_entities.push((resource.clone(), domain.clone()));
        }
    }

    for datapoint in &package.ddf_schema().datapoints {
        for resource in &datapoint.resources {
            let path = package_dir.join(resource);
            let inferred = infer_columns(&path)?;
            rows_loaded += inferred.row_count;
            let (key_stats, value_stats) = split_stats(inferred, &datapoint.primary_key);
            let value_columns: Vec<String> = value_stats.iter().map(|c| c.name.clone()).collect();
            schema.merge_datapoint_table(&datapoint.primary_key, &value_columns, resource);
            let id = ddf_schema::key_id(&schema.normalize_key(&datapoint.primary_key));
            merge_stats(stats.datapoint_key.entry(id.clone()).or_default(), &key_stats);
            merge_stats(stats.datapoint_value.entry(id).or_default(), &value_stats);
            pending_datapoints.push((resource.clone(), datapoint.primary_key.clone()));
        }
    }

    if options.only_parse {
        return Ok(LoadOutcome {
            name: name.to_string(),
            version: resolved_version.to_string(),
            resources_loaded: package.resources.len(),
            rows_loaded,
            uploaded_assets: Vec::new(),
        });
    }

    finalize_wide_tables(&mut schema, &stats, wide_table_limits);

    let version_dir = version_data_dir(data_root, name, resolved_version);
    for (resource, domain) in &pending_entities {
        let entry = schema.entities.get(domain).expect("entity table registered during merge");
        materialize_resource(&version_dir, entry, &package_dir.join(resource))?;
    }
    for (resource, raw_key) in &pending_datapoints {
        let normalized = schema.normalize_key(raw_key);
        let id = ddf_schema::key_id(&normalized);
        let entry = schema.datapoints.get(&id).expect("datapoint table registered during merge");
        materialize_resource(&version_dir, entry, &package_dir.join(resource))?;
    }

    catalog.insert_new(name, resolved_version, &schema, options.password.as_deref())?;
    if options.publish {
        catalog.mark_default(name, resolved_version)?;
    }

    let uploaded_assets = upload_assets_dir(store, package_dir, name, resolved_version).await?;

    Ok(LoadOutcome {
        name: name.to_string(),
        version: resolved_version.to_string(),
        resources_loaded: package.resources.len(),
        rows_loaded,
        uploaded_assets,
    })
}

async fn load_assets_only<B: CatalogBackend>(
    catalog: &Catalog<B>,
    store: &dyn AssetStore,
    package_dir: &Path,
    name: &str,
    version: Option<&str>,
) -> Result<LoadOutcome> {
    let record = catalog
        .lookup(name, version)?
        .ok_or_else(|| LoaderError::Catalog(ddf_catalog_core::CatalogError::NotFound(name.to_string())))?;
    let uploaded_assets = upload_assets_dir(store, package_dir, name, &record.version).await?;
    Ok(LoadOutcome {
        name: name.to_string(),
        version: record.version,
        resources_loaded: 0,
        rows_loaded: 0,
        uploaded_assets,
    })
}

/// Read a concepts resource and register every `entity_set` concept's
/// domain.
fn register_entity_set_domains(schema: &mut SchemaModel, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let concept_idx = headers.iter().position(|h| h == "concept");
    let type_idx = headers.iter().position(|h| h == "concept_type");
    let domain_idx = headers.iter().position(|h| h == "domain");

    let (Some(concept_idx), Some(type_idx), Some(domain_idx)) = (concept_idx, type_idx, domain_idx) else {
        return Ok(());
    };

    for record in reader.records() {
        let record = record?;
        if record.get(type_idx) == Some("entity_set") {
            if let (Some(set), Some(domain)) = (record.get(concept_idx), record.get(domain_idx)) {
                if !domain.is_empty() {
                    schema
                        .register_entity_set_domain(set, domain)
                        .map_err(|e| LoaderError::Catalog(ddf_catalog_core::CatalogError::Other(e.to_string())))?;
                }
            }
        }
    }
    Ok(())
}

fn infer_columns(path: &Path) -> Result<InferredSchema> {
    let file = std::fs::File::open(path)?;
    Ok(infer_from_csv(file)?)
}

/// Split one resource's inferred columns into key and value statistics,
/// preserving the full `ColumnStats` (not just names) so wide-table
/// splitting can see real widths and types rather than bare strings.
fn split_stats(inferred: InferredSchema, primary_key: &[String]) -> (Vec<ColumnStats>, Vec<ColumnStats>) {
    inferred.columns.into_iter().partition(|c| primary_key.contains(&c.name))
}

fn merge_entity_columns(schema: &mut SchemaModel, domain: &str, value_columns: &[String], resource: &str) {
    let entity_sets: Vec<String> = schema
        .entity_set_domains
        .iter()
        .filter(|(_, d)| d.as_str() == domain)
        .map(|(set, _)| set.clone())
        .collect();

    let entry = schema.entity_table_mut(domain);
    for col in value_columns {
        if !entry.table.value_columns.contains(col) {
            entry.table.value_columns.push(col.clone());
            entry.table.shards[0].value_columns.push(col.clone());
        }
    }
    if !entry.contributing_resources.iter().any(|r| r == resource) {
        entry.contributing_resources.push(resource.to_string());
    }

    // Track which entity sets resolve to this domain so a real
    // `is--<set>` column present in value_columns is recognized as a
    // materialized membership flag rather than an ordinary value.
    for set in entity_sets {
        if !entry.table.entity_set_flags.contains(&set) {
            entry.table.entity_set_flags.push(set);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddf_catalog_storage::LocalSqliteBackend;

    fn fresh_catalog() -> Catalog<LocalSqliteBackend> {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::remove_file(temp.path()).unwrap();
        let backend = LocalSqliteBackend::new(temp.path());
        backend.initialize().unwrap();
        Catalog::new(backend)
    }

    fn write_sample_package(dir: &Path) {
        std::fs::write(
            dir.join("datapackage.json"),
            r#"{
                "name": "test",
                "resources": [],
                "ddfSchema": {
                    "concepts": ["ddf--concepts.csv"],
                    "entities": [{"primaryKey": ["geo"], "resources": ["ddf--entities--geo.csv"]}],
                    "datapoints": [{"primaryKey": ["geo", "time"], "resources": ["ddf--datapoints--population--by--geo--time.csv"]}]
                }
            }"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("ddf--concepts.csv"),
            "concept,concept_type,domain\ncountry,entity_set,geo\ngeo,entity_domain,\ntime,time,\npopulation,measure,\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("ddf--entities--geo.csv"),
            "geo,name,latitude\nswe,Sweden,59\nusa,United States,38\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("ddf--datapoints--population--by--geo--time.csv"),
            "geo,time,population\nswe,2020,10000000\nusa,2020,330000000\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn loads_package_and_inserts_catalog_entry() {
        let package_dir = tempfile::tempdir().unwrap();
        write_sample_package(package_dir.path());

        let catalog = fresh_catalog();
        let store_dir = tempfile::tempdir().unwrap();
        let store = assets::LocalAssetStore::new(store_dir.path());
        let notifier = ChatNotifier::disabled();
        let data_root = tempfile::tempdir().unwrap();

        let outcome = load(
            &catalog,
            &store,
            &notifier,
            data_root.path(),
            package_dir.path(),
            "test",
            Some("v1"),
            &LoadOptions::default(),
            &WideTableLimits::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.version, "v1");
        assert!(outcome.rows_loaded > 0);

        let record = catalog.lookup("test", Some("v1")).unwrap().unwrap();
        assert!(record.schema.entity_set_domains.contains_key("country"));
        assert!(!record.schema.datapoints.is_empty());

        let version_dir = materialize::version_data_dir(data_root.path(), "test", "v1");
        let entries: Vec<_> = std::fs::read_dir(&version_dir).unwrap().collect();
        assert!(!entries.is_empty());
    }

    #[tokio::test]
    async fn reloading_same_explicit_version_fails() {
        let package_dir = tempfile::tempdir().unwrap();
        write_sample_package(package_dir.path());

        let catalog = fresh_catalog();
        let store_dir = tempfile::tempdir().unwrap();
        let store = assets::LocalAssetStore::new(store_dir.path());
        let notifier = ChatNotifier::disabled();
        let data_root = tempfile::tempdir().unwrap();

        load(
            &catalog,
            &store,
            &notifier,
            data_root.path(),
            package_dir.path(),
            "test",
            Some("v1"),
            &LoadOptions::default(),
            &WideTableLimits::default(),
        )
        .await
        .unwrap();

        let err = load(
            &catalog,
            &store,
            &notifier,
            data_root.path(),
            package_dir.path(),
            "test",
            Some("v1"),
            &LoadOptions::default(),
            &WideTableLimits::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LoaderError::Catalog(ddf_catalog_core::CatalogError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn only_parse_does_not_touch_catalog() {
        let package_dir = tempfile::tempdir().unwrap();
        write_sample_package(package_dir.path());

        let catalog = fresh_catalog();
        let store_dir = tempfile::tempdir().unwrap();
        let store = assets::LocalAssetStore::new(store_dir.path());
        let notifier = ChatNotifier::disabled();
        let data_root = tempfile::tempdir().unwrap();

        let options = LoadOptions { only_parse: true, ..Default::default() };
        load(
            &catalog,
            &store,
            &notifier,
            data_root.path(),
            package_dir.path(),
            "test",
            Some("v1"),
            &options,
            &WideTableLimits::default(),
        )
        .await
        .unwrap();

        assert!(catalog.lookup("test", Some("v1")).unwrap().is_none());
    }

    #[tokio::test]
    async fn no_explicit_version_derives_one_from_today() {
        let package_dir = tempfile::tempdir().unwrap();
        write_sample_package(package_dir.path());

        let catalog = fresh_catalog();
        let store_dir = tempfile::tempdir().unwrap();
        let store = assets::LocalAssetStore::new(store_dir.path());
        let notifier = ChatNotifier::disabled();
        let data_root = tempfile::tempdir().unwrap();

        let outcome = load(
            &catalog,
            &store,
            &notifier,
            data_root.path(),
            package_dir.path(),
            "test",
            None,
            &LoadOptions::default(),
            &WideTableLimits::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome.version.len(), 10);
        assert!(outcome.version.bytes().all(|b| b.is_ascii_digit()));
    }
}
