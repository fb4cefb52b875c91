//! Typed representation of a DDF package's `datapackage.json` manifest.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub primary_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSchema {
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, rename = "primaryKey")]
    pub primary_key: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub path: String,
    #[serde(default)]
    pub schema: ResourceSchema,
}

impl Resource {
    pub fn primary_key(&self) -> Vec<String> {
        if !self.schema.primary_key.is_empty() {
            return self.schema.primary_key.clone();
        }
        self.schema
            .fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| f.name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdfSchemaSection {
    #[serde(default)]
    pub concepts: Vec<String>,
    #[serde(default)]
    pub entities: Vec<EntitySchemaEntry>,
    #[serde(default)]
    pub datapoints: Vec<DatapointSchemaEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchemaEntry {
    #[serde(rename = "primaryKey")]
    pub primary_key: Vec<String>,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatapointSchemaEntry {
    #[serde(rename = "primaryKey")]
    pub primary_key: Vec<String>,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPackage {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(rename = "ddfSchema")]
    pub ddf_schema: Option<DdfSchemaSection>,
}

#[derive(Debug, thiserror::Error)]
pub enum DataPackageError {
    #[error("io error reading {0}: {1}")]
    Io(String, std::io::Error),
    #[error("invalid datapackage.json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("missing 'ddfSchema' section in datapackage.json")]
    MissingDdfSchema,
}

impl DataPackage {
    /// Parse `datapackage.json` from a package directory, requiring the
    /// `ddfSchema` section be present.
    pub fn load(dir: &Path) -> Result<Self, DataPackageError> {
        let path = dir.join("datapackage.json");
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| DataPackageError::Io(path.display().to_string(), e))?;
        let package: DataPackage = serde_json::from_str(&raw)?;
        if package.ddf_schema.is_none() {
            return Err(DataPackageError::MissingDdfSchema);
        }
        Ok(package)
    }

    pub fn ddf_schema(&self) -> &DdfSchemaSection {
        self.ddf_schema.as_ref().expect("validated at load()")
    }
}

/// Walk `lang/<id>/` subdirectories to discover translation resources.
pub fn discover_translations(package_dir: &Path) -> std::io::Result<Vec<(String, std::path::PathBuf)>> {
    let lang_dir = package_dir.join("lang");
    if !lang_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(&lang_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let lang_id = entry.file_name().to_string_lossy().to_string();
            out.push((lang_id, entry.path()));
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

impl Default for ResourceSchema {
    fn default() -> Self {
        Self { fields: Vec::new(), primary_key: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_manifest_without_ddf_schema() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("datapackage.json"),
            r#"{"name": "test", "resources": []}"#,
        )
        .unwrap();
        let err = DataPackage::load(dir.path()).unwrap_err();
        assert!(matches!(err, DataPackageError::MissingDdfSchema));
    }

    #[test]
    fn parses_resources_and_primary_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("datapackage.json"),
            r#"{
                "name": "test",
                "resources": [
                    {"path": "ddf--concepts.csv", "schema": {"primaryKey": ["concept"], "fields": []}}
                ],
                "ddfSchema": {"concepts": [], "entities": [], "datapoints": []}
            }"#,
        )
        .unwrap();
        let package = DataPackage::load(dir.path()).unwrap();
        assert_eq!(package.resources.len(), 1);
    }
}
