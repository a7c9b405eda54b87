//! Layout descriptors — the declarative input to the layout compiler.
//!
//! A descriptor describes a table's locality groups, families, and columns
//! in the form callers write and serialize. Descriptors are not validated
//! on decode; [`crate::layout::TableLayout::new`] is the single validation
//! and ID-assignment pass. When a descriptor is applied as an update, the
//! `renamed_from` and `delete` fields describe transitions relative to a
//! prior concrete layout.

use crate::ids::ColumnId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::PathBuf;
use strum_macros::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

#[cfg(test)]
pub mod builder;

/// How the logical row key maps to the underlying row-store key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyFormat {
    Raw,
    Hashed,
    HashPrefixed,
}

/// Block compression applied to a locality group's storage files.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Compression {
    None,
    Gz,
    Lzo,
    Snappy,
}

/// How a cell schema is declared.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaType {
    /// `value` is a schema literal (Avro schema JSON).
    Inline,
    /// `value` is the fully-qualified name of a compiled record class.
    Class,
    /// A 64-bit big-endian counter; carries no schema.
    Counter,
}

/// How decoded values are laid out in cells: schema-hash-prefixed,
/// schema-UID-prefixed, or raw. Immutable across layout updates.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaStorage {
    #[default]
    Hash,
    Uid,
    Final,
}

/// Declaration of the schema for one cell (a column, or a map family's
/// shared value schema).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSchema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    /// Schema literal for `INLINE`, class name for `CLASS`, unused for
    /// `COUNTER`.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub storage: SchemaStorage,
}

impl CellSchema {
    pub fn inline(literal: impl Into<String>) -> Self {
        Self {
            schema_type: SchemaType::Inline,
            value: Some(literal.into()),
            storage: SchemaStorage::default(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self {
            schema_type: SchemaType::Class,
            value: Some(name.into()),
            storage: SchemaStorage::default(),
        }
    }

    pub fn counter() -> Self {
        Self {
            schema_type: SchemaType::Counter,
            value: None,
            storage: SchemaStorage::default(),
        }
    }

    pub fn with_storage(mut self, storage: SchemaStorage) -> Self {
        self.storage = storage;
        self
    }
}

impl fmt::Display for CellSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.schema_type, &self.value) {
            (SchemaType::Counter, _) => write!(f, "COUNTER"),
            (t, Some(v)) => write!(f, "{t}({v})"),
            (t, None) => write!(f, "{t}"),
        }
    }
}

/// Declaration of one column inside a group-type family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDesc {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// Short ID. Values `<= 0` count as unset; the compiler assigns one.
    #[serde(default)]
    pub id: Option<i32>,
    /// Prior primary name this column was renamed from, in an update.
    #[serde(default)]
    pub renamed_from: Option<String>,
    /// Marks the prior column of this name for removal, in an update.
    #[serde(default)]
    pub delete: bool,
    pub column_schema: CellSchema,
}

/// Declaration of a column family: either group-type (a fixed set of named
/// columns) or map-type (free-form qualifiers sharing one value schema).
/// Declaring both `columns` and `map_schema` is rejected by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyDesc {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub renamed_from: Option<String>,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub columns: Vec<ColumnDesc>,
    #[serde(default)]
    pub map_schema: Option<CellSchema>,
}

impl FamilyDesc {
    pub fn is_map_type(&self) -> bool {
        self.map_schema.is_some()
    }
}

/// Declaration of a locality group: a storage tier whose families share
/// retention, versioning, compression, and memory-vs-disk placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalityGroupDesc {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub in_memory: bool,
    pub ttl_seconds: i32,
    pub max_versions: i32,
    pub compression: Compression,
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub renamed_from: Option<String>,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub families: Vec<FamilyDesc>,
}

/// The root descriptor for a table layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableLayoutDesc {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub keys_format: KeyFormat,
    /// Kept verbatim when supplied; otherwise the compiler derives the
    /// successor of the prior layout's ID (or `"1"` for a fresh table).
    #[serde(default)]
    pub layout_id: Option<String>,
    #[serde(default)]
    pub locality_groups: Vec<LocalityGroupDesc>,
    /// ID of the layout this descriptor was written against. Informational;
    /// carried through unmodified.
    #[serde(default)]
    pub reference_layout: Option<String>,
}

impl TableLayoutDesc {
    /// Decode a descriptor from JSON, reading the stream to its end. The
    /// reader is consumed and dropped on every path.
    pub fn from_json_reader<R: io::Read>(reader: R) -> Result<Self, LoadError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// The effective short ID carried by a descriptor `id` field: positive
/// values count as supplied, everything else as unset.
pub(crate) fn effective_id(id: Option<i32>) -> Option<ColumnId> {
    id.and_then(ColumnId::new)
}

/// Iterate a primary name and its aliases — the full set of names an
/// entity answers to.
pub(crate) fn names_of<'a>(
    name: &'a str,
    aliases: &'a [String],
) -> impl Iterator<Item = &'a str> {
    std::iter::once(name).chain(aliases.iter().map(String::as_str))
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("error opening layout descriptor {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid layout descriptor JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Layout(#[from] crate::layout::LayoutError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_descriptor_decodes_with_defaults() {
        let json = r#"{
            "name": "users",
            "keysFormat": "RAW",
            "localityGroups": [{
                "name": "default",
                "ttlSeconds": 3600,
                "maxVersions": 1,
                "compression": "NONE",
                "families": [{
                    "name": "info",
                    "columns": [{
                        "name": "email",
                        "columnSchema": {"type": "INLINE", "value": "\"string\""}
                    }]
                }]
            }]
        }"#;

        let desc = TableLayoutDesc::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(desc.name, "users");
        assert_eq!(desc.keys_format, KeyFormat::Raw);
        assert!(desc.layout_id.is_none());

        let lg = &desc.locality_groups[0];
        assert!(!lg.in_memory);
        assert!(lg.aliases.is_empty());
        assert!(lg.id.is_none());

        let family = &lg.families[0];
        assert!(!family.is_map_type());
        let column = &family.columns[0];
        assert!(!column.delete);
        assert_eq!(column.column_schema.storage, SchemaStorage::Hash);
    }

    #[test]
    fn test_descriptor_round_trips_through_json() {
        let json = r#"{
            "name": "t",
            "keysFormat": "HASH_PREFIXED",
            "layoutId": "3",
            "localityGroups": [{
                "name": "lg",
                "aliases": ["default"],
                "inMemory": true,
                "ttlSeconds": 600,
                "maxVersions": 5,
                "compression": "GZ",
                "id": 1,
                "families": [{
                    "name": "stats",
                    "id": 1,
                    "mapSchema": {"type": "COUNTER", "storage": "FINAL"}
                }]
            }]
        }"#;

        let desc = TableLayoutDesc::from_json_reader(json.as_bytes()).unwrap();
        let encoded = serde_json::to_string(&desc).unwrap();
        let again = TableLayoutDesc::from_json_reader(encoded.as_bytes()).unwrap();
        assert_eq!(desc, again);
    }

    #[test]
    fn test_effective_id_ignores_non_positive() {
        assert_eq!(effective_id(Some(4)).map(ColumnId::get), Some(4));
        assert!(effective_id(Some(0)).is_none());
        assert!(effective_id(Some(-1)).is_none());
        assert!(effective_id(None).is_none());
    }
}
