//! SQL emission helpers shared between the table engine and the query
//! compiler: identifier quoting and shard-rejoin SQL for wide tables
//! that were split across several physical tables.

/// Quote an identifier for the relational engine's SQL dialect,
/// doubling any embedded quote characters.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal, doubling any embedded single quotes.
pub fn quote_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Build the SQL to reassemble a wide table's shards via an inner join
/// on the shared key columns, projecting the requested columns.
///
/// `shards` lists each shard's table name paired with the value
/// columns it physically carries; `key_columns` are present on every
/// shard.
pub fn shard_rejoin_sql(
    key_columns: &[String],
    shards: &[(String, Vec<String>)],
    projected_columns: &[String],
) -> String {
    assert!(!shards.is_empty(), "at least one shard required");

    let base_alias = "s0";
    let mut from_clause = format!("{} AS {}", quote_ident(&shards[0].0), base_alias);

    for (i, (table, _)) in shards.iter().enumerate().skip(1) {
        let alias = format!("s{i}");
        let on_clause = key_columns
            .iter()
            .map(|k| format!("{base_alias}.{0} = {alias}.{0}", quote_ident(k)))
            .collect::<Vec<_>>()
            .join(" AND ");
        from_clause.push_str(&format!(
            " INNER JOIN {} AS {alias} ON {on_clause}",
            quote_ident(table)
        ));
    }

    let column_to_alias: Vec<(String, String)> = shards
        .iter()
        .enumerate()
        .flat_map(|(i, (_, values))| {
            let alias = format!("s{i}");
            values.iter().map(move |v| (v.clone(), alias.clone()))
        })
        .collect();

    let select_list = projected_columns
        .iter()
        .map(|col| {
            if key_columns.contains(col) {
                format!("{base_alias}.{}", quote_ident(col))
            } else if let Some((_, alias)) = column_to_alias.iter().find(|(name, _)| name == col) {
                format!("{alias}.{}", quote_ident(col))
            } else {
                format!("{base_alias}.{}", quote_ident(col))
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("SELECT {select_list} FROM {from_clause}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_identifiers_and_escapes_embedded_quotes() {
        assert_eq!(quote_ident("geo"), "\"geo\"");
        assert_eq!(quote_ident("wei\"rd"), "\"wei\"\"rd\"");
    }

    #[test]
    fn quotes_string_literals() {
        assert_eq!(quote_string_literal("swe"), "'swe'");
        assert_eq!(quote_string_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn single_shard_needs_no_join() {
        let sql = shard_rejoin_sql(
            &["geo".to_string()],
            &[("country_name_s0".to_string(), vec!["name".to_string()])],
            &["geo".to_string(), "name".to_string()],
        );
        assert!(sql.contains("FROM \"country_name_s0\" AS s0"));
        assert!(!sql.contains("JOIN"));
    }

    #[test]
    fn multi_shard_rejoins_on_key_columns() {
        let sql = shard_rejoin_sql(
            &["geo".to_string(), "time".to_string()],
            &[
                ("t_s0".to_string(), vec!["population".to_string()]),
                ("t_s1".to_string(), vec!["gdp".to_string()]),
            ],
            &["geo".to_string(), "time".to_string(), "population".to_string(), "gdp".to_string()],
        );
        assert!(sql.contains("INNER JOIN \"t_s1\" AS s1"));
        assert!(sql.contains("s0.\"geo\" = s1.\"geo\""));
        assert!(sql.contains("s0.\"time\" = s1.\"time\""));
        assert!(sql.contains("s1.\"gdp\""));
        assert!(sql.contains("s0.\"population\""));
    }
}
