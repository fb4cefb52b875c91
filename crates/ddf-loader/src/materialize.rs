//! Turns a schema model's logical tables into physical CSV files under a
//! stable data directory the query engine can register at query time,
//! applying wide-table splitting once all contributing resources for a
//! table have been merged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ddf_schema::{db_safe_name, SchemaModel, ShardTable, TableEntry};
use ddf_table::{needs_split, split_into_shards, ColumnStats, WideTableLimits};

use crate::{LoaderError, Result};

/// Root directory holding one subdirectory per `<name>/<version>`, each
/// containing one CSV file per physical shard (named after
/// `ShardTable::db_name`).
pub fn version_data_dir(data_root: &Path, name: &str, version: &str) -> PathBuf {
    data_root.join(name).join(version)
}

/// Column statistics accumulated across every resource contributing to
/// each entity/datapoint table, keyed the same way as `SchemaModel`'s own
/// maps (domain for entities, normalized key id for datapoints).
///
/// Kept alongside the schema model rather than inside `PhysicalTable`
/// itself, since `ddf-schema` has no dependency on `ddf-table` (which is
/// where `ColumnStats` lives) and shouldn't gain one just to remember
/// inference statistics.
#[derive(Debug, Default)]
pub struct IngestionStats {
    pub entity_key: HashMap<String, Vec<ColumnStats>>,
    pub entity_value: HashMap<String, Vec<ColumnStats>>,
    pub datapoint_key: HashMap<String, Vec<ColumnStats>>,
    pub datapoint_value: HashMap<String, Vec<ColumnStats>>,
}

/// Append stats for columns not already present by name, mirroring the
/// dedup behaviour of [`SchemaModel::merge_datapoint_table`].
pub fn merge_stats(existing: &mut Vec<ColumnStats>, new: &[ColumnStats]) {
    for stat in new {
        if !existing.iter().any(|s| s.name == stat.name) {
            existing.push(stat.clone());
        }
    }
}

/// Apply wide-table splitting to every table entry in the schema once
/// all resources have been merged into it, replacing each entry's
/// single default shard with the planned set.
pub fn finalize_wide_tables(schema: &mut SchemaModel, stats: &IngestionStats, limits: &WideTableLimits) {
    for (domain, entry) in schema.entities.iter_mut() {
        if let (Some(key), Some(value)) = (stats.entity_key.get(domain), stats.entity_value.get(domain)) {
            split_entry(entry, key, value, limits);
        }
    }
    for (id, entry) in schema.datapoints.iter_mut() {
        if let (Some(key), Some(value)) = (stats.datapoint_key.get(id), stats.datapoint_value.get(id)) {
            split_entry(entry, key, value, limits);
        }
    }
}

fn split_entry(entry: &mut TableEntry, key_stats: &[ColumnStats], value_stats: &[ColumnStats], limits: &WideTableLimits) {
    let table = &mut entry.table;
    if !needs_split(key_stats, value_stats, limits) {
        return;
    }
    let plans = split_into_shards(key_stats, value_stats, limits);
    table.shards = plans
        .into_iter()
        .enumerate()
        .map(|(idx, plan)| ShardTable {
            db_name: db_safe_name(&format!("{}__s{idx}", table.logical_name)),
            value_columns: plan.value_columns,
        })
        .collect();
}

/// Copy (or re-split) a resource's CSV rows into the shard files backing
/// one table entry, tracking which resources have already been written
/// per shard so repeated merges of the same resource don't duplicate
/// rows.
pub fn materialize_resource(
    data_dir: &Path,
    entry: &TableEntry,
    resource_path: &Path,
) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;

    if entry.table.shards.len() == 1 {
        let dest = data_dir.join(format!("{}.csv", entry.table.shards[0].db_name));
        std::fs::copy(resource_path, &dest)?;
        return Ok(());
    }

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(resource_path)?;
    let headers = reader.headers()?.clone();
    let column_index: HashMap<&str, usize> =
        headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

    let mut writers = Vec::with_capacity(entry.table.shards.len());
    for shard in &entry.table.shards {
        let dest = data_dir.join(format!("{}.csv", shard.db_name));
        let mut writer = csv::WriterBuilder::new().from_path(&dest)?;
        let mut shard_header: Vec<String> = entry.table.key.clone();
        shard_header.extend(shard.value_columns.iter().cloned());
        writer.write_record(&shard_header)?;
        writers.push(writer);
    }

    for record in reader.records() {
        let record = record?;
        for (shard, writer) in entry.table.shards.iter().zip(writers.iter_mut()) {
            let mut row: Vec<&str> = Vec::with_capacity(entry.table.key.len() + shard.value_columns.len());
            for key_col in &entry.table.key {
                row.push(column_index.get(key_col.as_str()).and_then(|i| record.get(*i)).unwrap_or(""));
            }
            for value_col in &shard.value_columns {
                row.push(column_index.get(value_col.as_str()).and_then(|i| record.get(*i)).unwrap_or(""));
            }
            writer.write_record(&row)?;
        }
    }
    for mut writer in writers {
        writer.flush().map_err(|e| LoaderError::Io(e.into()))?;
    }
    Ok(())
}
