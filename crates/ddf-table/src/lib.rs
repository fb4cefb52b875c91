//! DDF Table
//!
//! CSV schema inference, wide-table splitting, SQL identifier quoting
//! and shard-rejoin emission, and the relational-engine-backed table
//! engine used by the loader and query compiler.

pub mod ddl;
pub mod infer;
pub mod query;
pub mod wide;

pub use ddl::{TableEngine, TableEngineError};
pub use infer::{infer_from_csv, ColumnStats, ColumnType, InferError, InferredSchema};
pub use query::{quote_ident, quote_string_literal, shard_rejoin_sql};
pub use wide::{split_into_shards, needs_split, ShardPlan, WideTableLimits};
