//! Query validation and compilation: turns a raw JSON query object into
//! one SQL statement (or, for a schema query, synthesises the result
//! rows directly from the schema model without touching SQL at all).

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use ddf_schema::{key_id, FromKind, SchemaModel, SchemaRow};
use ddf_table::{quote_ident, quote_string_literal, shard_rejoin_sql};

use crate::ast::{
    ColumnRef, CompareOp, FromSpec, JoinBinding, OrderByItem, Predicate, Query, Select,
    ValueOperand,
};
use crate::error::{QueryError, Result};

fn language_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z]{2,3}([_-][-_a-zA-Z0-9]{2,15})?$").unwrap())
}

fn join_var_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// Result of compiling a validated query: either one SQL statement with
/// any non-fatal warnings, or, for a schema query, the synthesised rows.
#[derive(Debug, Clone)]
pub enum CompileOutput {
    Sql { sql: String, header: Vec<String>, warnings: Vec<String> },
    SchemaRows(Vec<SchemaRow>),
}

/// Validate a raw JSON query object, surfacing each malformed field as
/// its own error kind, and build the typed AST.
pub fn parse_query(raw: &Value) -> Result<Query> {
    let obj = raw.as_object().ok_or(QueryError::MissingSelect)?;

    let select_value = obj.get("select").ok_or(QueryError::MissingSelect)?;
    let select_obj = select_value.as_object().ok_or(QueryError::MissingSelect)?;

    let key = parse_string_array(select_obj.get("key")).ok_or(QueryError::SelectKeyNotArray)?;
    if key.is_empty() {
        return Err(QueryError::EmptySelectKey);
    }
    let value = parse_string_array(select_obj.get("value")).ok_or(QueryError::SelectValueNotArray)?;

    let from_raw = obj.get("from").and_then(Value::as_str).ok_or(QueryError::MissingFrom)?;
    let from = FromSpec::parse(from_raw).ok_or_else(|| QueryError::NotSupported(from_raw.to_string()))?;

    let where_clause = match obj.get("where") {
        Some(v) => Some(parse_predicate(v)?),
        None => None,
    };

    let join = match obj.get("join") {
        Some(v) => parse_join(v)?,
        None => HashMap::new(),
    };

    let order_by = match obj.get("order_by") {
        Some(v) => parse_order_by(v)?,
        None => Vec::new(),
    };

    let language = match obj.get("language") {
        Some(Value::String(s)) => {
            if !language_pattern().is_match(s) {
                return Err(QueryError::MalformedLanguage(s.clone()));
            }
            Some(s.clone())
        }
        Some(other) => return Err(QueryError::MalformedLanguage(other.to_string())),
        None => None,
    };

    Ok(Query {
        select: Select { key, value },
        from,
        where_clause,
        join,
        order_by,
        language,
    })
}

fn parse_string_array(v: Option<&Value>) -> Option<Vec<String>> {
    let arr = v?.as_array()?;
    arr.iter().map(|item| item.as_str().map(str::to_string)).collect()
}

fn parse_order_by(v: &Value) -> Result<Vec<OrderByItem>> {
    let arr = v.as_array().ok_or(QueryError::MalformedOrderBy)?;
    let mut items = Vec::new();
    for entry in arr {
        match entry {
            Value::String(s) => items.push(OrderByItem { column: s.clone(), descending: false }),
            Value::Object(map) if map.len() == 1 => {
                let (col, dir) = map.iter().next().unwrap();
                let descending = match dir.as_str() {
                    Some("asc") => false,
                    Some("desc") => true,
                    _ => return Err(QueryError::MalformedOrderBy),
                };
                items.push(OrderByItem { column: col.clone(), descending });
            }
            _ => return Err(QueryError::MalformedOrderBy),
        }
    }
    Ok(items)
}

fn parse_join(v: &Value) -> Result<HashMap<String, JoinBinding>> {
    let obj = v.as_object().ok_or_else(|| QueryError::MalformedJoinVariable(v.to_string()))?;
    let mut out = HashMap::new();
    for (var, binding) in obj {
        if !join_var_pattern().is_match(var) {
            return Err(QueryError::MalformedJoinVariable(var.clone()));
        }
        let binding_obj = binding
            .as_object()
            .ok_or_else(|| QueryError::MalformedJoinVariable(var.clone()))?;
        let key = match binding_obj.get("key") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(other) => parse_string_array(Some(other))
                .ok_or_else(|| QueryError::MalformedJoinVariable(var.clone()))?,
            None => return Err(QueryError::MalformedJoinVariable(var.clone())),
        };
        let condition = match binding_obj.get("where") {
            Some(w) => Some(parse_predicate(w)?),
            None => None,
        };
        out.insert(var.clone(), JoinBinding { key, condition });
    }
    Ok(out)
}

fn split_column_ref(raw: &str) -> ColumnRef {
    if let Some(dot) = raw.find('.') {
        if raw.starts_with('$') {
            return ColumnRef {
                join_binding: Some(raw[..dot].to_string()),
                column: raw[dot + 1..].to_string(),
            };
        }
    }
    ColumnRef { join_binding: None, column: raw.to_string() }
}

fn parse_value_operand(v: &Value) -> Result<ValueOperand> {
    match v {
        Value::Null => Ok(ValueOperand::Null),
        Value::Bool(b) => Ok(ValueOperand::Bool(*b)),
        Value::Number(n) => Ok(ValueOperand::Number(n.as_f64().unwrap_or_default())),
        Value::String(s) => Ok(ValueOperand::String(s.clone())),
        Value::Array(items) => Ok(ValueOperand::List(
            items.iter().map(parse_value_operand).collect::<Result<Vec<_>>>()?,
        )),
        Value::Object(_) => Err(QueryError::MalformedWhere(v.to_string())),
    }
}

fn compare_op_from_key(key: &str) -> Option<CompareOp> {
    match key {
        "$eq" => Some(CompareOp::Eq),
        "$ne" => Some(CompareOp::Ne),
        "$gt" => Some(CompareOp::Gt),
        "$gte" => Some(CompareOp::Gte),
        "$lt" => Some(CompareOp::Lt),
        "$lte" => Some(CompareOp::Lte),
        "$in" => Some(CompareOp::In),
        "$nin" => Some(CompareOp::Nin),
        _ => None,
    }
}

/// Parse a `where`-shaped predicate tree: `$and`/
/// `$or` preserved, a scalar becomes implicit `$eq`, a multi-operator
/// object becomes an explicit conjunction.
pub fn parse_predicate(v: &Value) -> Result<Predicate> {
    let obj = v.as_object().ok_or_else(|| QueryError::MalformedWhere(v.to_string()))?;

    if let Some(Value::Array(items)) = obj.get("$and") {
        return Ok(Predicate::And(
            items.iter().map(parse_predicate).collect::<Result<Vec<_>>>()?,
        ));
    }
    if let Some(Value::Array(items)) = obj.get("$or") {
        return Ok(Predicate::Or(
            items.iter().map(parse_predicate).collect::<Result<Vec<_>>>()?,
        ));
    }

    let mut clauses = Vec::new();
    for (raw_column, condition) in obj {
        let column = split_column_ref(raw_column);
        match condition {
            Value::Object(cond_obj) => {
                for (op_key, op_value) in cond_obj {
                    let op = compare_op_from_key(op_key)
                        .ok_or_else(|| QueryError::MalformedWhere(op_key.clone()))?;
                    clauses.push(Predicate::Compare {
                        column: column.clone(),
                        op,
                        value: parse_value_operand(op_value)?,
                    });
                }
            }
            scalar => {
                clauses.push(Predicate::Compare {
                    column,
                    op: CompareOp::Eq,
                    value: parse_value_operand(scalar)?,
                });
            }
        }
    }

    match clauses.len() {
        0 => Err(QueryError::MalformedWhere("empty predicate object".to_string())),
        1 => Ok(clauses.into_iter().next().unwrap()),
        _ => Ok(Predicate::And(clauses)),
    }
}

struct JoinPlan {
    alias: String,
    table: String,
    on_columns: Vec<String>,
}

/// Compile a validated query against a dataset's schema model into SQL,
/// or short-circuit a schema query into synthesised rows.
pub fn compile(query: &Query, schema: &SchemaModel) -> Result<CompileOutput> {
    if query.from.is_schema_query() {
        let kind = match query.from {
            FromSpec::ConceptsSchema => Some(FromKind::Concepts),
            FromSpec::EntitiesSchema => Some(FromKind::Entities),
            FromSpec::DatapointsSchema => Some(FromKind::Datapoints),
            FromSpec::AllSchema => None,
            _ => unreachable!("non-schema FromSpec handled below"),
        };
        return Ok(CompileOutput::SchemaRows(schema.schema_rows(kind)));
    }

    // Rewrite 1: sort select key/value lexicographically.
    let mut key = query.select.key.clone();
    key.sort();
    let mut value = query.select.value.clone();
    value.sort();

    // Rewrite 2: entity-set key components become their domain. An
    // entity set only narrows the result if its domain table actually
    // carries a materialized `is--<set>` membership column (resolved
    // below, once the domain's physical table is known); an entity set
    // registered in the concepts table without one resolves to its full
    // domain with a warning instead of a query against a column that
    // doesn't exist.
    let mut entity_set_components: Vec<String> = Vec::new();
    let resolved_key: Vec<String> = key
        .iter()
        .map(|component| {
            let domain = schema.resolve_domain(component);
            if domain != component {
                entity_set_components.push(component.clone());
            }
            domain.to_string()
        })
        .collect();

    // Rewrite 3: resolve `from` to a physical table via the schema model.
    let from_kind = match query.from {
        FromSpec::Concepts => FromKind::Concepts,
        FromSpec::Entities => FromKind::Entities,
        FromSpec::Datapoints => FromKind::Datapoints,
        _ => unreachable!("schema variants handled above"),
    };
    let table_id = key_id(&resolved_key);
    let entry = schema
        .lookup(from_kind, &table_id)
        .ok_or_else(|| QueryError::UnknownTable(table_id.clone()))?;

    let mut implicit_filters = Vec::new();
    let mut dropped_entity_set_filters = Vec::new();
    for component in &entity_set_components {
        let flag_column = format!("is--{component}");
        let materialized = entry.table.entity_set_flags.contains(component)
            && entry.table.value_columns.iter().any(|c| c == &flag_column);
        if materialized {
            implicit_filters.push(Predicate::Compare {
                column: ColumnRef { join_binding: None, column: flag_column },
                op: CompareOp::Eq,
                value: ValueOperand::Bool(true),
            });
        } else {
            dropped_entity_set_filters.push(component.clone());
        }
    }

    let base_alias = "base";
    let projected_columns: Vec<String> = resolved_key.iter().chain(value.iter()).cloned().collect();

    let from_clause = if entry.table.is_wide() {
        let shards: Vec<(String, Vec<String>)> = entry
            .table
            .shards
            .iter()
            .map(|s| (s.db_name.clone(), s.value_columns.clone()))
            .collect();
        // shard_rejoin_sql already aliases as s0, s1, ...; base_alias below
        // is only used for predicate/order-by qualification of key columns,
        // which live identically on every shard including s0.
        shard_rejoin_sql(&entry.table.key, &shards, &projected_columns)
            .splitn(2, " FROM ")
            .nth(1)
            .unwrap_or_default()
            .to_string()
    } else {
        format!("{} AS {base_alias}", quote_ident(&entry.table.shards[0].db_name))
    };
    let base_alias = if entry.table.is_wide() { "s0" } else { base_alias };

    // Rewrite 4: resolve join bindings.
    let mut join_plans: Vec<JoinPlan> = Vec::new();
    let mut join_aliases: HashMap<String, String> = HashMap::new();
    let mut seen_tables: HashMap<String, Vec<String>> = HashMap::new();
    let mut join_clause_sql = String::new();

    let mut ordered_bindings: Vec<(&String, &JoinBinding)> = query.join.iter().collect();
    ordered_bindings.sort_by_key(|(var, _)| var.as_str());

    for (var, binding) in ordered_bindings {
        let normalized: Vec<String> = binding.key.iter().map(|c| schema.resolve_domain(c).to_string()).collect();
        let all_time_domain = ddf_schema::is_time_domain_key(&normalized);
        if all_time_domain {
            // Time-domain specials live on the base table; no join needed,
            // but the binding variable still resolves for qualified columns.
            join_aliases.insert(var.clone(), base_alias.to_string());
            continue;
        }

        let domain = normalized.first().cloned().unwrap_or_default();
        let foreign = schema
            .lookup(FromKind::Entities, &domain)
            .ok_or_else(|| QueryError::UnknownTable(domain.clone()))?;
        let foreign_table = foreign.table.shards[0].db_name.clone();
        let alias = var.trim_start_matches('$').to_string();

        if let Some(existing_on) = seen_tables.get(&foreign_table) {
            if existing_on != &binding.key {
                return Err(QueryError::ConflictingJoinOn(foreign_table));
            }
        } else {
            seen_tables.insert(foreign_table.clone(), binding.key.clone());
        }

        let on_sql = binding
            .key
            .iter()
            .map(|on_col| {
                format!(
                    "{base_alias}.{0} = {alias}.{0}",
                    quote_ident(on_col)
                )
            })
            .collect::<Vec<_>>()
            .join(" AND ");

        join_clause_sql.push_str(&format!(
            " INNER JOIN {} AS {alias} ON {on_sql}",
            quote_ident(&foreign_table)
        ));
        join_aliases.insert(var.clone(), alias.clone());
        join_plans.push(JoinPlan { alias, table: foreign_table, on_columns: binding.key.clone() });
    }
    let _ = &join_plans; // retained for future diagnostics; SQL already emitted above

    // Rewrite 5 already happened during parsing (where tree shape is
    // fixed by parse_predicate). Combine implicit filters with the
    // user's where clause and any join conditions.
    let mut top_level: Vec<Predicate> = implicit_filters;
    if let Some(p) = query.where_clause.clone() {
        top_level.push(p);
    }
    for binding in query.join.values() {
        if let Some(cond) = &binding.condition {
            top_level.push(cond.clone());
        }
    }

    // Rewrite 6: emit canonical SQL for each comparison.
    let where_sql = if top_level.is_empty() {
        None
    } else {
        Some(emit_predicate(&Predicate::And(top_level), base_alias, &join_aliases)?)
    };

    // Rewrite 7: drop order_by fields absent from the projection.
    let mut warnings: Vec<String> = dropped_entity_set_filters
        .iter()
        .map(|set| format!("entity set '{set}' has no materialized 'is--{set}' column; results include the full domain"))
        .collect();
    let mut order_by_sql_parts = Vec::new();
    for item in &query.order_by {
        if projected_columns.iter().any(|c| c == &item.column) {
            order_by_sql_parts.push(format!(
                "{base_alias}.{} {}",
                quote_ident(&item.column),
                if item.descending { "DESC" } else { "ASC" }
            ));
        } else {
            warnings.push(format!(
                "order_by column '{}' dropped: not part of the projection",
                item.column
            ));
        }
    }

    // Rewrite 8: language substitution in the projection.
    let select_list = projected_columns
        .iter()
        .map(|col| project_column(col, base_alias, query.language.as_deref(), entry))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("SELECT {select_list} FROM {from_clause}{join_clause_sql}");
    if let Some(w) = where_sql {
        sql.push_str(&format!(" WHERE {w}"));
    }
    if !order_by_sql_parts.is_empty() {
        sql.push_str(&format!(" ORDER BY {}", order_by_sql_parts.join(", ")));
    }

    Ok(CompileOutput::Sql { sql, header: projected_columns, warnings })
}

fn project_column(
    col: &str,
    base_alias: &str,
    language: Option<&str>,
    entry: &ddf_schema::TableEntry,
) -> String {
    if let Some(lang) = language {
        if let Some(tr) = entry.table.translations.iter().find(|t| t.base_column == col && t.lang == lang) {
            return format!(
                "COALESCE({base_alias}.{}, {base_alias}.{}) AS {}",
                quote_ident(&tr.stored_column()),
                quote_ident(&tr.base_column),
                quote_ident(&tr.virtual_column())
            );
        }
    }
    format!("{base_alias}.{}", quote_ident(col))
}

fn emit_literal(v: &ValueOperand) -> Result<String> {
    Ok(match v {
        ValueOperand::Null => "NULL".to_string(),
        ValueOperand::Bool(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
        ValueOperand::Number(n) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        ValueOperand::String(s) => quote_string_literal(s),
        ValueOperand::List(_) => return Err(QueryError::MalformedWhere("list literal used outside $in/$nin".to_string())),
    })
}

fn qualify_column(col: &ColumnRef, base_alias: &str, join_aliases: &HashMap<String, String>) -> Result<String> {
    match &col.join_binding {
        Some(var) => {
            let alias = join_aliases.get(var).ok_or_else(|| QueryError::UnknownJoinBinding(var.clone()))?;
            Ok(format!("{alias}.{}", quote_ident(&col.column)))
        }
        None => Ok(format!("{base_alias}.{}", quote_ident(&col.column))),
    }
}

fn emit_predicate(p: &Predicate, base_alias: &str, join_aliases: &HashMap<String, String>) -> Result<String> {
    match p {
        Predicate::And(items) => {
            let parts = items
                .iter()
                .map(|i| emit_predicate(i, base_alias, join_aliases))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("({})", parts.join(" AND ")))
        }
        Predicate::Or(items) => {
            let parts = items
                .iter()
                .map(|i| emit_predicate(i, base_alias, join_aliases))
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("({})", parts.join(" OR ")))
        }
        Predicate::Compare { column, op, value } => {
            let col_sql = qualify_column(column, base_alias, join_aliases)?;
            match op {
                CompareOp::Eq => match value {
                    ValueOperand::Bool(true) => Ok(format!("{col_sql} IS TRUE")),
                    ValueOperand::Bool(false) => Ok(format!("{col_sql} IS FALSE")),
                    _ => Ok(format!("{col_sql} IS NOT DISTINCT FROM {}", emit_literal(value)?)),
                },
                CompareOp::Ne => match value {
                    ValueOperand::Bool(true) => Ok(format!("{col_sql} IS NOT TRUE")),
                    ValueOperand::Bool(false) => Ok(format!("{col_sql} IS NOT FALSE")),
                    _ => Ok(format!("{col_sql} IS DISTINCT FROM {}", emit_literal(value)?)),
                },
                CompareOp::Gt => Ok(format!("{col_sql} > {}", emit_literal(value)?)),
                CompareOp::Gte => Ok(format!("{col_sql} >= {}", emit_literal(value)?)),
                CompareOp::Lt => Ok(format!("{col_sql} < {}", emit_literal(value)?)),
                CompareOp::Lte => Ok(format!("{col_sql} <= {}", emit_literal(value)?)),
                CompareOp::In | CompareOp::Nin => {
                    let ValueOperand::List(items) = value else {
                        return Err(QueryError::MalformedWhere("$in/$nin requires a list value".to_string()));
                    };
                    let list_sql = items.iter().map(emit_literal).collect::<Result<Vec<_>>>()?.join(", ");
                    let keyword = if matches!(op, CompareOp::In) { "IN" } else { "NOT IN" };
                    Ok(format!("{col_sql} {keyword} ({list_sql})"))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_schema() -> SchemaModel {
        let mut model = SchemaModel::new();
        model.register_entity_set_domain("country", "geo").unwrap();
        model.entity_table_mut("geo");
        model.merge_datapoint_table(
            &["country".to_string(), "time".to_string()],
            &["population".to_string()],
            "pop.csv",
        );
        model
    }

    #[test]
    fn missing_select_is_distinct_error() {
        let raw = json!({"from": "datapoints"});
        assert_eq!(parse_query(&raw).unwrap_err(), QueryError::MissingSelect);
    }

    #[test]
    fn select_key_must_be_array() {
        let raw = json!({"select": {"key": "geo", "value": []}, "from": "datapoints"});
        assert_eq!(parse_query(&raw).unwrap_err(), QueryError::SelectKeyNotArray);
    }

    #[test]
    fn unknown_from_is_not_supported() {
        let raw = json!({"select": {"key": ["geo"], "value": []}, "from": "nonsense"});
        assert_eq!(
            parse_query(&raw).unwrap_err(),
            QueryError::NotSupported("nonsense".to_string())
        );
    }

    #[test]
    fn malformed_language_rejected() {
        let raw = json!({
            "select": {"key": ["geo"], "value": []},
            "from": "datapoints",
            "language": "not a real tag!!"
        });
        assert!(matches!(parse_query(&raw), Err(QueryError::MalformedLanguage(_))));
    }

    #[test]
    fn entity_set_key_without_materialized_flag_drops_filter_with_warning() {
        let schema = sample_schema();
        let raw = json!({
            "select": {"key": ["country", "time"], "value": ["population"]},
            "from": "datapoints"
        });
        let query = parse_query(&raw).unwrap();
        let CompileOutput::Sql { sql, warnings, .. } = compile(&query, &schema).unwrap() else {
            panic!("expected sql output");
        };
        // sample_schema's datapoint table never gained an "is--country"
        // value column, so the filter must not reference it.
        assert!(!sql.contains("is--country"));
        assert!(sql.contains("\"population\""));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("country"));
    }

    #[test]
    fn entity_set_key_with_materialized_flag_keeps_is_true_filter() {
        let mut schema = sample_schema();
        let id = key_id(&["geo".to_string(), "time".to_string()]);
        let entry = schema.datapoints.get_mut(&id).unwrap();
        entry.table.value_columns.push("is--country".to_string());
        entry.table.shards[0].value_columns.push("is--country".to_string());

        let raw = json!({
            "select": {"key": ["country", "time"], "value": ["population"]},
            "from": "datapoints"
        });
        let query = parse_query(&raw).unwrap();
        let CompileOutput::Sql { sql, warnings, .. } = compile(&query, &schema).unwrap() else {
            panic!("expected sql output");
        };
        assert!(sql.contains("\"is--country\" IS TRUE"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn unknown_table_for_key_is_reported() {
        let schema = sample_schema();
        let raw = json!({
            "select": {"key": ["unknown_domain"], "value": []},
            "from": "entities"
        });
        let query = parse_query(&raw).unwrap();
        assert!(matches!(compile(&query, &schema), Err(QueryError::UnknownTable(_))));
    }

    #[test]
    fn order_by_outside_projection_is_dropped_with_warning() {
        let schema = sample_schema();
        let raw = json!({
            "select": {"key": ["geo", "time"], "value": ["population"]},
            "from": "datapoints",
            "order_by": ["population", "not_projected"]
        });
        let query = parse_query(&raw).unwrap();
        let CompileOutput::Sql { sql, warnings, .. } = compile(&query, &schema).unwrap() else {
            panic!("expected sql output");
        };
        assert!(sql.contains("ORDER BY"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("not_projected"));
    }

    #[test]
    fn boolean_equality_uses_is_true_is_false() {
        let schema = sample_schema();
        let raw = json!({
            "select": {"key": ["geo", "time"], "value": ["population"]},
            "from": "datapoints",
            "where": {"is--country": true}
        });
        let query = parse_query(&raw).unwrap();
        let CompileOutput::Sql { sql, .. } = compile(&query, &schema).unwrap() else {
            panic!("expected sql output");
        };
        assert!(sql.contains("IS TRUE"));
    }

    #[test]
    fn schema_query_short_circuits_to_rows() {
        let schema = sample_schema();
        let raw = json!({"select": {"key": ["geo"], "value": []}, "from": "datapoints.schema"});
        let query = parse_query(&raw).unwrap();
        match compile(&query, &schema).unwrap() {
            CompileOutput::SchemaRows(rows) => assert!(!rows.is_empty()),
            CompileOutput::Sql { .. } => panic!("expected schema rows"),
        }
    }

    #[test]
    fn in_predicate_emits_in_list() {
        let schema = sample_schema();
        let raw = json!({
            "select": {"key": ["geo", "time"], "value": ["population"]},
            "from": "datapoints",
            "where": {"geo": {"$in": ["swe", "usa"]}}
        });
        let query = parse_query(&raw).unwrap();
        let CompileOutput::Sql { sql, .. } = compile(&query, &schema).unwrap() else {
            panic!("expected sql output");
        };
        assert!(sql.contains("IN ('swe', 'usa')"));
    }
}
