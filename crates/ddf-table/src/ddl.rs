//! Table engine: registers physical tables with the relational engine
//! and executes compiled SQL against them.

use std::path::Path;
use std::sync::{Arc, Mutex};

use datafusion::arrow::record_batch::RecordBatch;
use datafusion::execution::context::SessionContext;
use datafusion::physical_plan::SendableRecordBatchStream;
use datafusion::prelude::CsvReadOptions;

#[derive(Debug, thiserror::Error)]
pub enum TableEngineError {
    #[error("datafusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),
}

pub type Result<T> = std::result::Result<T, TableEngineError>;

/// Thin wrapper around a `SessionContext` giving the loader and query
/// compiler a stable, narrow surface: register a CSV-backed table,
/// register an in-memory table, run SQL, drop a table.
///
/// Tracks the names it has registered so a pool can [`reset`](Self::reset)
/// the engine to a blank session between requests instead of paying for a
/// fresh `SessionContext` every time.
pub struct TableEngine {
    ctx: SessionContext,
    registered: Mutex<Vec<String>>,
}

impl Default for TableEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TableEngine {
    pub fn new() -> Self {
        Self {
            ctx: SessionContext::new(),
            registered: Mutex::new(Vec::new()),
        }
    }

    /// Register a physical table backed by a CSV file on disk, under
    /// the given database-safe table name.
    pub async fn register_csv_table(&self, table_name: &str, path: &Path) -> Result<()> {
        self.ctx
            .register_csv(table_name, path.to_string_lossy().as_ref(), CsvReadOptions::new())
            .await?;
        self.track(table_name);
        Ok(())
    }

    /// Register an in-memory table from already-materialized batches,
    /// used for shards assembled from parsed rows rather than a
    /// standalone file.
    pub async fn register_memory_table(
        &self,
        table_name: &str,
        schema: Arc<datafusion::arrow::datatypes::Schema>,
        batches: Vec<RecordBatch>,
    ) -> Result<()> {
        let table = datafusion::datasource::MemTable::try_new(schema, vec![batches])?;
        self.ctx.deregister_table(table_name)?;
        self.ctx.register_table(table_name, Arc::new(table))?;
        self.track(table_name);
        Ok(())
    }

    pub fn deregister_table(&self, table_name: &str) -> Result<()> {
        self.ctx.deregister_table(table_name)?;
        self.registered.lock().unwrap().retain(|n| n != table_name);
        Ok(())
    }

    pub fn table_exists(&self, table_name: &str) -> bool {
        self.ctx.table_exist(table_name).unwrap_or(false)
    }

    /// Drop every table registered since the engine was created (or
    /// since the last reset). Called by a pool before handing a reused
    /// engine to the next request, so one caller's tables never leak
    /// into another's query.
    pub fn reset(&self) -> Result<()> {
        let names: Vec<String> = self.registered.lock().unwrap().drain(..).collect();
        for name in names {
            self.ctx.deregister_table(&name)?;
        }
        Ok(())
    }

    fn track(&self, table_name: &str) {
        let mut registered = self.registered.lock().unwrap();
        if !registered.iter().any(|n| n == table_name) {
            registered.push(table_name.to_string());
        }
    }

    /// Execute a fully-compiled SQL statement and collect all result
    /// batches. Buffers the entire result in memory; prefer
    /// [`execute_stream`](Self::execute_stream) for request paths that
    /// serve the result to a client incrementally.
    pub async fn execute_sql(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        let df = self.ctx.sql(sql).await?;
        let batches = df.collect().await?;
        Ok(batches)
    }

    /// Execute a fully-compiled SQL statement and return a stream of
    /// result batches as the physical plan produces them, without
    /// buffering the whole result set first.
    pub async fn execute_stream(&self, sql: &str) -> Result<SendableRecordBatchStream> {
        let df = self.ctx.sql(sql).await?;
        let stream = df.execute_stream().await?;
        Ok(stream)
    }
}
