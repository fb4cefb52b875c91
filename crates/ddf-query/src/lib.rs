//! DDF Query
//!
//! Validated query AST, the predicate/join/order-by/language rewrite
//! pipeline, and SQL emission over a dataset's schema model. A schema
//! query (`*.schema`, `concepts.schema`, ...) short-circuits compilation
//! and is answered directly from the schema model.

pub mod ast;
pub mod compile;
pub mod error;

pub use ast::{
    ColumnRef, CompareOp, FromSpec, JoinBinding, OrderByItem, Predicate, Query, Select,
    ValueOperand,
};
pub use compile::{compile, parse_query, CompileOutput};
pub use error::{QueryError, Result};
