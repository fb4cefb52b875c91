//! DDF Schema Model
//!
//! In-memory representation of a dataset's DDF schema: three
//! maps — `concepts`, `entities`, `datapoints` — each keyed by the
//! `$`-joined sorted tuple of key columns, plus the entity-set-to-domain
//! map used to normalise datapoint keys and restrict entity membership.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Single-component keys treated as in-domain self-joins rather than
/// requiring a separate entity table.
pub const TIME_DOMAIN_KEYS: &[&str] = &["time", "year", "quarter", "month", "week", "day"];

/// The `concept_type` values named explicitly by a dataset's schema;
/// anything else observed in a package is carried through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptType {
    EntityDomain,
    EntitySet,
    Measure,
    String,
    Time,
    Boolean,
    Interval,
    Other(String),
}

/// A named attribute described in the dataset's schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub concept: String,
    pub concept_type: ConceptType,
    /// Present only when `concept_type == EntitySet`: the domain this set
    /// is a subset of.
    pub domain: Option<String>,
    pub name: Option<String>,
}

/// One shard of a (possibly wide-table-split) physical table. All shards
/// of the same logical table share the key columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardTable {
    pub db_name: String,
    pub value_columns: Vec<String>,
}

/// A translation column: `<column>--<lang>` virtual, backed by the stored
/// `_<column>--<lang>` column, coalescing to the base column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationColumn {
    pub base_column: String,
    pub lang: String,
}

impl TranslationColumn {
    pub fn stored_column(&self) -> String {
        format!("_{}--{}", self.base_column, self.lang)
    }

    pub fn virtual_column(&self) -> String {
        format!("{}--{}", self.base_column, self.lang)
    }
}

/// One logical table backing a schema entity, possibly split into
/// multiple physical shards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalTable {
    pub logical_name: String,
    pub key: Vec<String>,
    pub value_columns: Vec<String>,
    pub shards: Vec<ShardTable>,
    pub translations: Vec<TranslationColumn>,
    /// `is--<set>` boolean columns present on this table, for entity
    /// tables and datapoint tables whose key collapsed multiple entity
    /// sets into one domain.
    pub entity_set_flags: Vec<String>,
}

impl PhysicalTable {
    pub fn new(logical_name: String, key: Vec<String>) -> Self {
        let db_name = db_safe_name(&logical_name);
        Self {
            logical_name,
            key,
            value_columns: Vec::new(),
            shards: vec![ShardTable {
                db_name,
                value_columns: Vec::new(),
            }],
            translations: Vec::new(),
            entity_set_flags: Vec::new(),
        }
    }

    pub fn is_wide(&self) -> bool {
        self.shards.len() > 1
    }

    /// The shard that should carry a given value column, if the table is
    /// split. Returns `None` if the column is not present on any shard.
    pub fn shard_for_column(&self, column: &str) -> Option<&ShardTable> {
        self.shards.iter().find(|s| s.value_columns.iter().any(|c| c == column))
    }
}

/// DB-safe physical name for a logical table: the logical name unless it
/// exceeds 64 characters, in which case a short hash-suffixed form is used.
pub fn db_safe_name(logical_name: &str) -> String {
    if logical_name.len() <= 64 {
        return logical_name.to_string();
    }
    let digest = fnv1a(logical_name.as_bytes());
    let mut truncated: String = logical_name.chars().take(48).collect();
    truncated.push_str(&format!("_{digest:016x}"));
    truncated
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Sort and `$`-join a key tuple to produce the map key used by
/// [`SchemaModel`]'s three maps.
pub fn key_id<S: AsRef<str>>(key: &[S]) -> String {
    let mut sorted: Vec<&str> = key.iter().map(|s| s.as_ref()).collect();
    sorted.sort_unstable();
    sorted.join("$")
}

/// Whether a single-component key names a time-domain special (joined
/// against itself rather than a separate entity table).
pub fn is_time_domain_key(key: &[String]) -> bool {
    key.len() == 1 && TIME_DOMAIN_KEYS.contains(&key[0].as_str())
}

/// One entry in a [`SchemaModel`] map: a physical table plus the
/// resources that contributed to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEntry {
    pub key: Vec<String>,
    pub table: PhysicalTable,
    pub contributing_resources: Vec<String>,
    /// For entity tables, the domain concept name (equal to `key[0]`).
    pub domain: Option<String>,
}

/// The in-memory DDF schema model for one `(name, version)`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchemaModel {
    pub concepts: HashMap<String, TableEntry>,
    pub entities: HashMap<String, TableEntry>,
    pub datapoints: HashMap<String, TableEntry>,
    /// `entity_set → domain`, populated after concept ingestion.
    pub entity_set_domains: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("entity set '{0}' declared with conflicting domains '{1}' and '{2}'")]
    ConflictingDomain(String, String, String),
    #[error("unknown 'from' clause: {0}")]
    UnknownFrom(String),
}

pub type Result<T> = std::result::Result<T, SchemaError>;

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entity_set → domain`. Re-registering the same set with a
    /// different domain is a schema validation failure.
    pub fn register_entity_set_domain(&mut self, set: &str, domain: &str) -> Result<()> {
        if let Some(existing) = self.entity_set_domains.get(set) {
            if existing != domain {
                return Err(SchemaError::ConflictingDomain(
                    set.to_string(),
                    existing.clone(),
                    domain.to_string(),
                ));
            }
        }
        self.entity_set_domains
            .insert(set.to_string(), domain.to_string());
        Ok(())
    }

    /// Resolve a key component to its domain: entity sets map to their
    /// domain; everything else (domains, time specials, measures used as
    /// join keys) maps to itself.
    pub fn resolve_domain<'a>(&'a self, component: &'a str) -> &'a str {
        self.entity_set_domains
            .get(component)
            .map(|s| s.as_str())
            .unwrap_or(component)
    }

    /// Normalise a datapoint key by replacing entity-set components with
    /// their domain.
    pub fn normalize_key(&self, key: &[String]) -> Vec<String> {
        key.iter().map(|c| self.resolve_domain(c).to_string()).collect()
    }

    /// Merge a datapoint table definition into the model: normalises the
    /// key, then either creates a new table entry or accumulates value
    /// columns and contributing resources into the existing one.
    pub fn merge_datapoint_table(
        &mut self,
        raw_key: &[String],
        value_columns: &[String],
        resource: &str,
    ) {
        let normalized = self.normalize_key(raw_key);
        let id = key_id(&normalized);

        let entry = self.datapoints.entry(id.clone()).or_insert_with(|| {
            let mut sorted_key = normalized.clone();
            sorted_key.sort_unstable();
            let logical_name = sorted_key.join("_");
            TableEntry {
                key: sorted_key.clone(),
                table: PhysicalTable::new(logical_name, sorted_key),
                contributing_resources: Vec::new(),
                domain: None,
            }
        });

        for col in value_columns {
            if !entry.table.value_columns.contains(col) {
                entry.table.value_columns.push(col.clone());
                // Single-shard by default; wide-table splitting happens
                // later in ddf-table once full column counts are known.
                entry.table.shards[0].value_columns.push(col.clone());
            }
        }
        if !entry.contributing_resources.iter().any(|r| r == resource) {
            entry.contributing_resources.push(resource.to_string());
        }

        // Track which entity sets were folded into this domain table so
        // `is--<set>` flags can be declared.
        for raw_component in raw_key {
            if self.entity_set_domains.contains_key(raw_component)
                && !entry.table.entity_set_flags.contains(raw_component)
            {
                entry.table.entity_set_flags.push(raw_component.clone());
            }
        }
    }

    /// Register (or fetch) the entity table for a domain.
    pub fn entity_table_mut(&mut self, domain: &str) -> &mut TableEntry {
        self.entities.entry(domain.to_string()).or_insert_with(|| TableEntry {
            key: vec![domain.to_string()],
            table: PhysicalTable::new(domain.to_string(), vec![domain.to_string()]),
            contributing_resources: Vec::new(),
            domain: Some(domain.to_string()),
        })
    }

    pub fn lookup(&self, from: FromKind, id: &str) -> Option<&TableEntry> {
        match from {
            FromKind::Concepts => self.concepts.get(id),
            FromKind::Entities => self.entities.get(id),
            FromKind::Datapoints => self.datapoints.get(id),
        }
    }

    /// Synthesize `[keyTuple, value]` rows for a `*.schema` /
    /// `<kind>.schema` query without touching any database.
    pub fn schema_rows(&self, kind: Option<FromKind>) -> Vec<SchemaRow> {
        let mut rows = Vec::new();
        let collect = |map: &HashMap<String, TableEntry>, kind: FromKind, rows: &mut Vec<SchemaRow>| {
            // BTreeMap for deterministic ordering in responses/tests.
            let ordered: BTreeMap<&String, &TableEntry> = map.iter().collect();
            for (id, entry) in ordered {
                rows.push(SchemaRow {
                    kind,
                    key_id: id.clone(),
                    key: entry.key.clone(),
                    value_columns: entry.table.value_columns.clone(),
                });
            }
        };
        match kind {
            Some(FromKind::Concepts) => collect(&self.concepts, FromKind::Concepts, &mut rows),
            Some(FromKind::Entities) => collect(&self.entities, FromKind::Entities, &mut rows),
            Some(FromKind::Datapoints) => collect(&self.datapoints, FromKind::Datapoints, &mut rows),
            None => {
                collect(&self.concepts, FromKind::Concepts, &mut rows);
                collect(&self.entities, FromKind::Entities, &mut rows);
                collect(&self.datapoints, FromKind::Datapoints, &mut rows);
            }
        }
        rows
    }

    /// All physical table names this schema references (used by Catalog
    /// `remove`/`delete` to know what to drop).
    pub fn all_physical_table_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for map in [&self.concepts, &self.entities, &self.datapoints] {
            for entry in map.values() {
                for shard in &entry.table.shards {
                    names.push(shard.db_name.clone());
                }
            }
        }
        names
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FromKind {
    Concepts,
    Entities,
    Datapoints,
}

impl FromKind {
    pub fn as_table_str(self) -> &'static str {
        match self {
            FromKind::Concepts => "concepts",
            FromKind::Entities => "entities",
            FromKind::Datapoints => "datapoints",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRow {
    pub kind: FromKind,
    pub key_id: String,
    pub key: Vec<String>,
    pub value_columns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_id_sorts_and_joins() {
        assert_eq!(key_id(&["time", "geo"]), "geo$time");
        assert_eq!(key_id(&["geo", "time"]), "geo$time");
    }

    #[test]
    fn time_domain_keys_detected() {
        assert!(is_time_domain_key(&["time".to_string()]));
        assert!(is_time_domain_key(&["year".to_string()]));
        assert!(!is_time_domain_key(&["geo".to_string()]));
        assert!(!is_time_domain_key(&["time".to_string(), "geo".to_string()]));
    }

    #[test]
    fn entity_set_conflicting_domain_rejected() {
        let mut model = SchemaModel::new();
        model.register_entity_set_domain("country", "geo").unwrap();
        let err = model
            .register_entity_set_domain("country", "other_geo")
            .unwrap_err();
        assert!(matches!(err, SchemaError::ConflictingDomain(..)));
    }

    #[test]
    fn datapoint_key_normalised_to_domain() {
        let mut model = SchemaModel::new();
        model.register_entity_set_domain("country", "geo").unwrap();

        model.merge_datapoint_table(
            &["country".to_string(), "time".to_string()],
            &["population".to_string()],
            "pop.csv",
        );

        let id = key_id(&["geo", "time"]);
        let entry = model.datapoints.get(&id).expect("normalized entry present");
        assert_eq!(entry.key, vec!["geo".to_string(), "time".to_string()]);
        assert!(entry.table.entity_set_flags.contains(&"country".to_string()));
    }

    #[test]
    fn merging_accumulates_value_columns_from_multiple_resources() {
        let mut model = SchemaModel::new();
        model.merge_datapoint_table(
            &["geo".to_string(), "time".to_string()],
            &["population".to_string()],
            "pop.csv",
        );
        model.merge_datapoint_table(
            &["geo".to_string(), "time".to_string()],
            &["gdp".to_string()],
            "gdp.csv",
        );

        let id = key_id(&["geo", "time"]);
        let entry = model.datapoints.get(&id).unwrap();
        assert_eq!(entry.table.value_columns.len(), 2);
        assert_eq!(entry.contributing_resources.len(), 2);
    }

    #[test]
    fn db_safe_name_hashes_long_logical_names() {
        let long_name = "a".repeat(80);
        let safe = db_safe_name(&long_name);
        assert!(safe.len() <= 64);
        assert_ne!(safe, long_name);
        assert_eq!(db_safe_name("short"), "short");
    }

    #[test]
    fn schema_rows_deterministic_order() {
        let mut model = SchemaModel::new();
        model.merge_datapoint_table(&["geo".to_string()], &["a".to_string()], "r1");
        model.merge_datapoint_table(&["time".to_string()], &["b".to_string()], "r2");

        let rows1 = model.schema_rows(Some(FromKind::Datapoints));
        let rows2 = model.schema_rows(Some(FromKind::Datapoints));
        assert_eq!(
            rows1.iter().map(|r| r.key_id.clone()).collect::<Vec<_>>(),
            rows2.iter().map(|r| r.key_id.clone()).collect::<Vec<_>>()
        );
    }
}
