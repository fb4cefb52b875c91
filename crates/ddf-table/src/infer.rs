//! Schema inference from CSV.
//!
//! The loader streams each CSV once; for every column we track the
//! widest observed string length, whether all values parse as integers,
//! whether any value is fractional, whether values look boolean or JSON,
//! and cardinality up to a cap used for index planning.

use std::collections::HashSet;
use std::io::Read;

/// Width, in characters, above which a string column becomes `TEXT`
/// rather than `VARCHAR`.
pub const TEXT_THRESHOLD: usize = 2000;

/// Cardinality above which a secondary index is worth creating.
pub const SECONDARY_INDEX_MIN_CARDINALITY: usize = 150;

/// Cardinality tracking cap — beyond this we stop counting distinct
/// values exactly and only know "at least this many".
pub const CARDINALITY_TRACKING_CAP: usize = 200;

/// Inferred physical column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    BigInt,
    Double,
    Boolean,
    Json,
    Varchar,
    Text,
}

/// Running statistics for one CSV column.
#[derive(Debug, Clone)]
pub struct ColumnStats {
    pub name: String,
    max_len: usize,
    saw_any_value: bool,
    all_int: bool,
    any_overflow_i32: bool,
    any_fractional: bool,
    all_bool: bool,
    looks_json: bool,
    distinct: HashSet<String>,
    distinct_overflowed: bool,
}

impl ColumnStats {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_len: 0,
            saw_any_value: false,
            all_int: true,
            any_overflow_i32: false,
            any_fractional: false,
            all_bool: true,
            looks_json: false,
            distinct: HashSet::new(),
            distinct_overflowed: false,
        }
    }

    /// Observe one CSV cell value (empty string = null, not counted
    /// against type inference).
    pub fn observe(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        self.saw_any_value = true;
        self.max_len = self.max_len.max(value.chars().count());

        if !matches!(value, "TRUE" | "FALSE" | "true" | "false") && !self.name.starts_with("is--")
        {
            self.all_bool = false;
        }

        match value.parse::<i64>() {
            Ok(n) => {
                if n > i32::MAX as i64 || n < i32::MIN as i64 {
                    self.any_overflow_i32 = true;
                }
            }
            Err(_) => {
                self.all_int = false;
                if value.parse::<f64>().is_ok() {
                    self.any_fractional = true;
                }
            }
        }

        if value.starts_with('{') || value.starts_with('[') {
            self.looks_json = true;
        }

        if !self.distinct_overflowed {
            self.distinct.insert(value.to_string());
            if self.distinct.len() > CARDINALITY_TRACKING_CAP {
                self.distinct_overflowed = true;
            }
        }
    }

    pub fn cardinality(&self) -> usize {
        self.distinct.len()
    }

    pub fn cardinality_capped(&self) -> bool {
        self.distinct_overflowed
    }

    pub fn worth_secondary_index(&self) -> bool {
        self.distinct_overflowed || self.cardinality() >= SECONDARY_INDEX_MIN_CARDINALITY
    }

    /// Resolve the inferred physical type: boolean > json > numeric
    /// widening > string width, in that precedence.
    pub fn inferred_type(&self) -> ColumnType {
        if !self.saw_any_value {
            return ColumnType::Varchar;
        }
        if self.all_bool {
            return ColumnType::Boolean;
        }
        if self.looks_json {
            return if self.max_len > TEXT_THRESHOLD {
                ColumnType::Json
            } else {
                ColumnType::Varchar
            };
        }
        if self.all_int {
            return if self.any_overflow_i32 {
                ColumnType::BigInt
            } else {
                ColumnType::Integer
            };
        }
        if self.any_fractional {
            return ColumnType::Double;
        }
        if self.max_len >= TEXT_THRESHOLD {
            ColumnType::Text
        } else {
            ColumnType::Varchar
        }
    }

    /// Estimated on-disk width in bytes, used for wide-table splitting.
    pub fn estimated_width_bytes(&self) -> usize {
        match self.inferred_type() {
            ColumnType::Integer => 4,
            ColumnType::BigInt => 8,
            ColumnType::Double => 8,
            ColumnType::Boolean => 1,
            ColumnType::Json | ColumnType::Text => TEXT_THRESHOLD,
            ColumnType::Varchar => self.max_len.max(1),
        }
    }
}

/// Inferred schema for one CSV resource: ordered columns with their
/// running statistics.
#[derive(Debug, Clone, Default)]
pub struct InferredSchema {
    pub columns: Vec<ColumnStats>,
    pub row_count: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum InferError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stream a CSV resource and infer per-column statistics in a single
/// pass.
pub fn infer_from_csv<R: Read>(reader: R) -> Result<InferredSchema, InferError> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let mut columns: Vec<ColumnStats> = headers.iter().map(ColumnStats::new).collect();

    let mut row_count: u64 = 0;
    for result in rdr.records() {
        let record = result?;
        for (i, field) in record.iter().enumerate() {
            if let Some(col) = columns.get_mut(i) {
                col.observe(field);
            }
        }
        row_count += 1;
    }

    Ok(InferredSchema { columns, row_count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_integer_then_bigint_on_overflow() {
        let csv_data = "a\n1\n2\n3\n";
        let schema = infer_from_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(schema.columns[0].inferred_type(), ColumnType::Integer);

        let csv_data = "a\n1\n99999999999\n";
        let schema = infer_from_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(schema.columns[0].inferred_type(), ColumnType::BigInt);
    }

    #[test]
    fn infers_double_on_fractional_values() {
        let csv_data = "a\n1\n2.5\n";
        let schema = infer_from_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(schema.columns[0].inferred_type(), ColumnType::Double);
    }

    #[test]
    fn infers_boolean_from_is_prefix_or_true_false_values() {
        let csv_data = "is--country\nTRUE\nFALSE\n";
        let schema = infer_from_csv(csv_data.as_bytes()).unwrap();
        assert_eq!(schema.columns[0].inferred_type(), ColumnType::Boolean);
    }

    #[test]
    fn text_threshold_boundary() {
        let mut at_threshold = ColumnStats::new("c");
        at_threshold.observe(&"x".repeat(TEXT_THRESHOLD));
        assert_eq!(at_threshold.inferred_type(), ColumnType::Text);

        let mut below_threshold = ColumnStats::new("c");
        below_threshold.observe(&"x".repeat(TEXT_THRESHOLD - 1));
        assert_eq!(below_threshold.inferred_type(), ColumnType::Varchar);
    }

    #[test]
    fn json_like_values_choose_json_when_wide_varchar_when_short() {
        let mut short = ColumnStats::new("c");
        short.observe("{\"a\":1}");
        assert_eq!(short.inferred_type(), ColumnType::Varchar);

        let mut wide = ColumnStats::new("c");
        wide.observe(&format!("{{\"a\":\"{}\"}}", "x".repeat(TEXT_THRESHOLD)));
        assert_eq!(wide.inferred_type(), ColumnType::Json);
    }

    #[test]
    fn cardinality_capped_at_tracking_limit() {
        let mut col = ColumnStats::new("c");
        for i in 0..(CARDINALITY_TRACKING_CAP + 10) {
            col.observe(&i.to_string());
        }
        assert!(col.cardinality_capped());
        assert!(col.worth_secondary_index());
    }
}
