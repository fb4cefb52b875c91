//! Validated, typed query AST. [`crate::compile::parse_query`] turns a raw
//! `serde_json::Value` into this shape, surfacing each distinct
//! validation failure as its own [`crate::error::QueryError`] variant.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Select {
    pub key: Vec<String>,
    pub value: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueOperand {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<ValueOperand>),
}

/// A single column reference, optionally qualified against a join
/// binding variable (`$geo.name` → qualified against `$geo`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub join_binding: Option<String>,
    pub column: String,
}

#[derive(Debug, Clone)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: ValueOperand,
    },
}

#[derive(Debug, Clone)]
pub struct JoinBinding {
    pub key: Vec<String>,
    pub condition: Option<Predicate>,
}

#[derive(Debug, Clone)]
pub struct OrderByItem {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FromSpec {
    Concepts,
    Entities,
    Datapoints,
    ConceptsSchema,
    EntitiesSchema,
    DatapointsSchema,
    AllSchema,
}

impl FromSpec {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "concepts" => Some(Self::Concepts),
            "entities" => Some(Self::Entities),
            "datapoints" => Some(Self::Datapoints),
            "concepts.schema" => Some(Self::ConceptsSchema),
            "entities.schema" => Some(Self::EntitiesSchema),
            "datapoints.schema" => Some(Self::DatapointsSchema),
            "*.schema" => Some(Self::AllSchema),
            _ => None,
        }
    }

    pub fn is_schema_query(self) -> bool {
        matches!(
            self,
            Self::ConceptsSchema | Self::EntitiesSchema | Self::DatapointsSchema | Self::AllSchema
        )
    }
}

#[derive(Debug, Clone)]
pub struct Query {
    pub select: Select,
    pub from: FromSpec,
    pub where_clause: Option<Predicate>,
    pub join: HashMap<String, JoinBinding>,
    pub order_by: Vec<OrderByItem>,
    pub language: Option<String>,
}
