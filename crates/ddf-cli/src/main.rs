//! Admin command line for the dataset catalog.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ddf_catalog_core::{RESERVED_ALL, RESERVED_LATEST};
use ddf_catalog_storage::{Catalog, CatalogBackend, LocalSqliteBackend, RemoveTarget};
use ddf_loader::assets::LocalAssetStore;
use ddf_loader::materialize::version_data_dir;
use ddf_loader::notify::ChatNotifier;
use ddf_loader::{load, LoadOptions};
use ddf_table::WideTableLimits;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ddf")]
#[command(about = "Ingest, inspect, and manage versions of DDF datasets", long_about = None)]
struct Cli {
    /// Path to the catalog database.
    #[arg(long, env = "DB_NAME", default_value = "ddf_catalog.db")]
    db_name: String,

    /// Root directory where ingested table data is materialized.
    #[arg(long, env = "DDF_DATA_ROOT", default_value = "ddf_data")]
    data_root: PathBuf,

    /// Root directory the asset store writes uploaded files under.
    #[arg(long, env = "DDF_ASSET_ROOT", default_value = "ddf_assets")]
    asset_root: PathBuf,

    /// Column count above which a wide table gets split into shards
    /// during ingestion.
    #[arg(long, env = "DB_MAX_COLUMNS", default_value_t = ddf_table::wide::DEFAULT_MAX_COLUMNS)]
    db_max_columns: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a DDF package directory as a new (or explicit) version.
    Load {
        name: String,
        version: Option<String>,

        /// Package directory to read (datapackage.json and resources).
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Mark the ingested version as the dataset's default.
        #[arg(long)]
        publish: bool,

        /// Parse and infer the schema but don't touch the catalog or assets.
        #[arg(long)]
        only_parse: bool,

        /// Upload only the package's assets; reuse an already-ingested version.
        #[arg(short = 'a', long)]
        assets_only: bool,

        /// Require this password to query the ingested version.
        #[arg(long)]
        password: Option<String>,
    },

    /// List known datasets, or versions of one dataset.
    List { name: Option<String> },

    /// Remove one version, a list of versions, or every version of a dataset.
    Delete { name: String, version: String },

    /// Mark a version (or the most recently imported one) as default.
    MakeDefault { name: String, version: String },

    /// Remove every version of a dataset except the default (or the two
    /// most recent, if none is marked default) and its immediate predecessor.
    Purge { name: String },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let backend = LocalSqliteBackend::new(&cli.db_name);
    if !backend.exists().map_err(|e| e.to_string())? {
        backend.initialize().map_err(|e| e.to_string())?;
    }
    let catalog = Catalog::new(backend);

    let wide_table_limits = WideTableLimits { max_columns: cli.db_max_columns, ..WideTableLimits::default() };

    match cli.command {
        Commands::Load { name, version, dir, publish, only_parse, assets_only, password } => {
            let store = LocalAssetStore::new(cli.asset_root);
            let notifier = ChatNotifier::from_env();
            let options = LoadOptions { publish, only_parse, assets_only, password };
            let outcome = load(
                &catalog,
                &store,
                &notifier,
                &cli.data_root,
                &dir,
                &name,
                version.as_deref(),
                &options,
                &wide_table_limits,
            )
            .await
            .map_err(|e| e.to_string())?;
            println!(
                "loaded {} {} ({} resources, {} rows)",
                outcome.name, outcome.version, outcome.resources_loaded, outcome.rows_loaded
            );
            Ok(())
        }
        Commands::List { name } => {
            let entries = catalog.list(name.as_deref()).map_err(|e| e.to_string())?;
            for entry in entries {
                let marker = if entry.is_default { " (default)" } else { "" };
                println!("{} {}{}", entry.name, entry.version, marker);
            }
            Ok(())
        }
        Commands::Delete { name, version } => {
            let target = if version == RESERVED_ALL {
                RemoveTarget::All
            } else if version == RESERVED_LATEST {
                RemoveTarget::Latest
            } else {
                RemoveTarget::Version(version)
            };
            let removed = catalog.remove(&name, target).map_err(|e| e.to_string())?;
            remove_version_data(&cli.data_root, &name, &removed.removed_versions)?;
            println!(
                "removed {} physical table(s) across {} version(s)",
                removed.dropped_tables.len(),
                removed.removed_versions.len()
            );
            Ok(())
        }
        Commands::MakeDefault { name, version } => {
            catalog.mark_default(&name, &version).map_err(|e| e.to_string())?;
            println!("{name} default is now {version}");
            Ok(())
        }
        Commands::Purge { name } => {
            let removed = catalog.purge(&name).map_err(|e| e.to_string())?;
            remove_version_data(&cli.data_root, &name, &removed.removed_versions)?;
            println!(
                "purged {} physical table(s) across {} version(s)",
                removed.dropped_tables.len(),
                removed.removed_versions.len()
            );
            Ok(())
        }
    }
}

/// Drop the on-disk CSV shard directory for every removed version,
/// tolerating a directory that was already missing.
fn remove_version_data(data_root: &std::path::Path, name: &str, versions: &[String]) -> Result<(), String> {
    for version in versions {
        let dir = version_data_dir(data_root, name, version);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(format!("failed to remove {}: {e}", dir.display())),
        }
    }
    Ok(())
}
