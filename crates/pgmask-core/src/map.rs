use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::Processor;
use crate::error::{Error, Result};

/// One processor invocation attached to a column. Processors run
/// left-to-right, each consuming the previous output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessorDefinition {
    pub name: String,
    #[serde(default)]
    pub max: f64,
    #[serde(default)]
    pub min: f64,
    #[serde(default)]
    pub variance: f64,
    /// Values matching this regex are exempt from rewriting.
    #[serde(default)]
    pub exemptions: String,
    #[serde(default)]
    pub comment: String,
}

impl ProcessorDefinition {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Rewrite rule for one column of one relation.
///
/// The parent triple, when set, declares that this column takes its rewritten
/// value from the same cache slot as its foreign-key parent so joins remain
/// valid after anonymization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColumnMap {
    #[serde(default)]
    pub comment: String,
    pub table_schema: String,
    pub table_name: String,
    pub column_name: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default)]
    pub parent_schema: String,
    #[serde(default)]
    pub parent_table: String,
    #[serde(default)]
    pub parent_column: String,
    #[serde(default)]
    pub ordinal_position: i32,
    #[serde(default)]
    pub is_nullable: bool,
    #[serde(default)]
    pub processors: Vec<ProcessorDefinition>,
}

impl ColumnMap {
    pub fn has_parent(&self) -> bool {
        !self.parent_schema.is_empty()
            && !self.parent_table.is_empty()
            && !self.parent_column.is_empty()
    }

    /// Cache key of the foreign-key parent, `schema.table.column`.
    pub fn parent_key(&self) -> String {
        format!(
            "{}.{}.{}",
            self.parent_schema, self.parent_table, self.parent_column
        )
    }

    /// Cache key of this column itself, `schema.table.column`.
    pub fn column_key(&self) -> String {
        format!(
            "{}.{}.{}",
            self.table_schema, self.table_name, self.column_name
        )
    }
}

/// Root of the map document: which columns are rewritten, by which
/// processors, and the seed driving the run's pseudo-randomness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DbMap {
    #[serde(rename = "DBName")]
    pub db_name: String,
    #[serde(default)]
    pub schema_prefix: String,
    #[serde(default)]
    pub seed: i64,
    pub column_maps: Vec<ColumnMap>,
}

impl DbMap {
    /// Read, parse, and validate a map document.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| Error::io(path, err))?;
        let map: DbMap = serde_json::from_reader(BufReader::new(file))?;
        map.validate()?;
        Ok(map)
    }

    /// Write the map document with 4-space indentation, preserving the
    /// declared field order.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|err| Error::io(path, err))?;
        let mut writer = BufWriter::new(file);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
        self.serialize(&mut serializer)?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|err| Error::io(path, err))
    }

    /// Verify that the map is complete and correct: a non-empty database
    /// name and only catalog-known processor names.
    pub fn validate(&self) -> Result<()> {
        if self.db_name.is_empty() {
            return Err(Error::InvalidMap("expected non-empty DBName".to_string()));
        }
        for cmap in &self.column_maps {
            for def in &cmap.processors {
                if Processor::from_name(&def.name).is_none() {
                    return Err(Error::InvalidMap(format!(
                        "unrecognized processor '{}' on column '{}'",
                        def.name,
                        cmap.column_key()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up the rewrite rule for a column.
    ///
    /// Identifiers arrive quoted when they are reserved words (the dump
    /// utility emits `public."order"`), so quotes are stripped before
    /// matching. A non-empty schema prefix matches any schema starting with
    /// it regardless of the recorded schema, which keeps sharded-schema
    /// deployments on a single set of rules.
    pub fn column_map(&self, schema: &str, table: &str, column: &str) -> Option<&ColumnMap> {
        let schema = schema.replace('"', "");
        let table = table.replace('"', "");
        let column = column.replace('"', "");

        self.column_maps.iter().find(|cmap| {
            if !self.schema_prefix.is_empty()
                && schema.starts_with(&self.schema_prefix)
                && cmap.table_name == table
                && cmap.column_name == column
            {
                return true;
            }
            cmap.table_schema == schema
                && cmap.table_name == table
                && cmap.column_name == column
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> DbMap {
        DbMap {
            db_name: "appdb".to_string(),
            schema_prefix: String::new(),
            seed: 42,
            column_maps: vec![
                ColumnMap {
                    table_schema: "public".to_string(),
                    table_name: "users".to_string(),
                    column_name: "email".to_string(),
                    processors: vec![ProcessorDefinition::named("ScrubString")],
                    ..ColumnMap::default()
                },
                ColumnMap {
                    table_schema: "public".to_string(),
                    table_name: "order".to_string(),
                    column_name: "id".to_string(),
                    processors: vec![ProcessorDefinition::named("RandomUUID")],
                    ..ColumnMap::default()
                },
            ],
        }
    }

    #[test]
    fn lookup_matches_exact_triple() {
        let map = sample_map();
        let found = map.column_map("public", "users", "email");
        assert_eq!(found.map(|c| c.column_name.as_str()), Some("email"));
        assert!(map.column_map("public", "users", "missing").is_none());
        assert!(map.column_map("other", "users", "email").is_none());
    }

    #[test]
    fn lookup_strips_reserved_word_quotes() {
        let map = sample_map();
        let found = map.column_map("public", "\"order\"", "id");
        assert_eq!(found.map(|c| c.table_name.as_str()), Some("order"));
    }

    #[test]
    fn lookup_honors_schema_prefix_wildcard() {
        let mut map = sample_map();
        map.schema_prefix = "tenant_".to_string();
        map.column_maps[0].table_schema = "tenant_001".to_string();

        // Any schema starting with the prefix matches, whatever is recorded.
        assert!(map.column_map("tenant_941", "users", "email").is_some());
        // Non-prefixed schemas still require an exact match.
        assert!(map.column_map("public", "users", "email").is_none());
    }

    #[test]
    fn validate_rejects_unknown_processor() {
        let mut map = sample_map();
        map.column_maps[0].processors = vec![ProcessorDefinition::named("Bogus")];
        let err = map.validate().unwrap_err();
        assert!(err.to_string().contains("Bogus"));
    }

    #[test]
    fn validate_rejects_empty_db_name() {
        let mut map = sample_map();
        map.db_name.clear();
        assert!(map.validate().is_err());
    }

    #[test]
    fn ordinal_position_is_not_part_of_the_lookup_key() {
        let mut map = sample_map();
        map.column_maps[0].ordinal_position = 99;
        assert!(map.column_map("public", "users", "email").is_some());
    }
}
