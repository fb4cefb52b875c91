//! Wide-table splitting.
//!
//! A logical table exceeding the configured column cap or the estimated
//! row-size limit is transparently split into shards that all carry the
//! key columns and a disjoint slice of the value columns, in declaration
//! order.

use crate::infer::ColumnStats;

/// Default maximum number of columns in a single physical table before a
/// split is forced.
pub const DEFAULT_MAX_COLUMNS: usize = 1000;

/// Approximate row-size cap in bytes the backing relational engine is
/// assumed to enforce.
pub const DEFAULT_MAX_ROW_BYTES: usize = 8000;

#[derive(Debug, Clone, Copy)]
pub struct WideTableLimits {
    pub max_columns: usize,
    pub max_row_bytes: usize,
}

impl Default for WideTableLimits {
    fn default() -> Self {
        Self {
            max_columns: DEFAULT_MAX_COLUMNS,
            max_row_bytes: DEFAULT_MAX_ROW_BYTES,
        }
    }
}

/// One shard's plan: the value columns it carries. Key columns are
/// implicit (every shard carries them).
#[derive(Debug, Clone)]
pub struct ShardPlan {
    pub value_columns: Vec<String>,
}

/// Whether a logical table needs splitting at all, given its key and
/// value columns.
pub fn needs_split(key: &[ColumnStats], values: &[ColumnStats], limits: &WideTableLimits) -> bool {
    let total_columns = key.len() + values.len();
    let total_bytes: usize = key
        .iter()
        .chain(values.iter())
        .map(|c| c.estimated_width_bytes())
        .sum();
    total_columns > limits.max_columns || total_bytes > limits.max_row_bytes
}

/// Distribute value columns across shards in declaration order until
/// each shard is within both the column-count and row-size limits.
///
/// Key columns count against every shard's column/byte budget, since
/// they are physically present on each one.
pub fn split_into_shards(
    key: &[ColumnStats],
    values: &[ColumnStats],
    limits: &WideTableLimits,
) -> Vec<ShardPlan> {
    if !needs_split(key, values, limits) {
        return vec![ShardPlan {
            value_columns: values.iter().map(|c| c.name.clone()).collect(),
        }];
    }

    let key_columns = key.len();
    let key_bytes: usize = key.iter().map(|c| c.estimated_width_bytes()).sum();

    let mut shards = Vec::new();
    let mut current = ShardPlan {
        value_columns: Vec::new(),
    };
    let mut current_columns = key_columns;
    let mut current_bytes = key_bytes;

    for value in values {
        let value_bytes = value.estimated_width_bytes();
        let would_exceed_columns = current_columns + 1 > limits.max_columns;
        let would_exceed_bytes = current_bytes + value_bytes > limits.max_row_bytes;

        if !current.value_columns.is_empty() && (would_exceed_columns || would_exceed_bytes) {
            shards.push(current);
            current = ShardPlan {
                value_columns: Vec::new(),
            };
            current_columns = key_columns;
            current_bytes = key_bytes;
        }

        current.value_columns.push(value.name.clone());
        current_columns += 1;
        current_bytes += value_bytes;
    }

    if !current.value_columns.is_empty() || shards.is_empty() {
        shards.push(current);
    }

    shards
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, width: usize) -> ColumnStats {
        let mut c = ColumnStats::new(name);
        c.observe(&"x".repeat(width));
        c
    }

    #[test]
    fn no_split_when_within_limits() {
        let key = vec![col("geo", 3)];
        let values = vec![col("v1", 4), col("v2", 4)];
        let limits = WideTableLimits::default();
        assert!(!needs_split(&key, &values, &limits));
        let shards = split_into_shards(&key, &values, &limits);
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].value_columns, vec!["v1", "v2"]);
    }

    #[test]
    fn splits_on_column_cap() {
        let key = vec![col("geo", 3)];
        let values: Vec<ColumnStats> = (0..5).map(|i| col(&format!("v{i}"), 4)).collect();
        let limits = WideTableLimits {
            max_columns: 3,
            max_row_bytes: DEFAULT_MAX_ROW_BYTES,
        };
        let shards = split_into_shards(&key, &values, &limits);
        // key(1) + up to 2 values per shard = 3 columns per shard.
        for shard in &shards {
            assert!(shard.value_columns.len() + key.len() <= limits.max_columns);
        }
        let total: usize = shards.iter().map(|s| s.value_columns.len()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn splits_on_row_byte_cap_and_each_shard_respects_both_limits() {
        let key = vec![col("geo", 10)];
        let values: Vec<ColumnStats> = (0..4).map(|i| col(&format!("v{i}"), 3000)).collect();
        let limits = WideTableLimits {
            max_columns: 1000,
            max_row_bytes: 6000,
        };
        let shards = split_into_shards(&key, &values, &limits);
        assert!(shards.len() > 1);
        for shard in &shards {
            let bytes: usize = shard
                .value_columns
                .iter()
                .map(|name| values.iter().find(|v| &v.name == name).unwrap().estimated_width_bytes())
                .sum::<usize>()
                + 10;
            assert!(bytes <= limits.max_row_bytes);
            assert!(shard.value_columns.len() + key.len() <= limits.max_columns);
        }
    }
}
