//! Concrete table layouts.
//!
//! A [`TableLayout`] is the compiled, frozen form of a layout descriptor:
//! every entity validated and uniqueness-checked, every cell schema
//! resolved, every entity holding a stable short ID. Layouts are built
//! once by [`TableLayout::new`] and never mutated afterwards; concurrent
//! readers need no synchronization.

pub mod build;

use crate::descriptor::{
    CellSchema, ColumnDesc, Compression, FamilyDesc, KeyFormat, LoadError, LocalityGroupDesc,
    SchemaStorage, TableLayoutDesc,
};
use crate::ids::ColumnId;
use crate::names::ColumnName;
use crate::schema::{NoClassLoader, SchemaClassLoader};
use apache_avro::Schema;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{self, BufReader};
use std::path::Path;
use thiserror::Error;

/// A validation failure while compiling a layout descriptor. Every variant
/// is fatal to the build: either a fully frozen layout is returned or
/// nothing is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("invalid name: '{0}'")]
    InvalidName(String),

    #[error("invalid alias: '{0}'")]
    InvalidAlias(String),

    #[error("duplicate name '{name}' in {scope}")]
    DuplicateName { name: String, scope: String },

    #[error("duplicate id {id} in {scope}")]
    DuplicateId { id: i32, scope: String },

    #[error("id {supplied} for '{name}' does not match prior id {prior}")]
    IdMismatch {
        name: String,
        supplied: i32,
        prior: i32,
    },

    #[error("forbidden change to {entity}: {change}")]
    ForbiddenMutation { entity: String, change: String },

    #[error("invalid rename: no prior {kind} named '{from}'")]
    InvalidRename { kind: &'static str, from: String },

    #[error("cannot delete {kind} '{name}': not present in the prior layout")]
    InvalidDelete { kind: &'static str, name: String },

    #[error("prior {kind}(s) not accounted for in update: {}", names.join(", "))]
    OrphanPrior {
        kind: &'static str,
        names: Vec<String>,
    },

    #[error("invalid schema {schema}: {reason}")]
    InvalidSchema { schema: String, reason: String },

    #[error("{0}")]
    InvalidParameter(String),

    #[error("cannot auto-increment layout id '{0}': not a decimal integer")]
    InvalidLayoutId(String),
}

/// A failed lookup against a frozen layout. Distinct from [`LayoutError`]:
/// these arise at read time, never during construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("table '{table}' has no column '{column}'")]
    NoSuchColumn { table: String, column: ColumnName },

    /// Addressing a group-type family without a qualifier is a caller
    /// error. Map-type families accept unqualified addresses instead; the
    /// two cases are deliberately not unified.
    #[error("group-type family '{family}' requires a column qualifier")]
    QualifierRequired { family: String },
}

/// A compiled column inside a group-type family.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    desc: ColumnDesc,
    id: ColumnId,
    schema: Option<Schema>,
}

impl ColumnLayout {
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.desc.aliases
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn cell_schema(&self) -> &CellSchema {
        &self.desc.column_schema
    }

    /// The resolved Avro schema, cached at build time. `None` for counters
    /// and for class schemas the build environment could not locate.
    pub fn avro_schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn to_descriptor(&self) -> ColumnDesc {
        self.desc.clone()
    }
}

/// A compiled column family: group-type with a fixed set of columns, or
/// map-type with one shared value schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyLayout {
    /// Family-level descriptor fields; `columns` is kept empty here and
    /// reassembled from the compiled columns on demand.
    fields: FamilyDesc,
    id: ColumnId,
    columns: Vec<ColumnLayout>,
    /// Column lookup by primary name or alias.
    column_index: HashMap<String, usize>,
    /// Reverse lookup: column ID to primary name.
    id_to_name: HashMap<ColumnId, String>,
    map_schema: Option<Schema>,
}

impl FamilyLayout {
    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.fields.aliases
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn is_map_type(&self) -> bool {
        self.fields.is_map_type()
    }

    /// The shared value schema declaration, for map-type families.
    pub fn map_schema(&self) -> Option<&CellSchema> {
        self.fields.map_schema.as_ref()
    }

    /// The resolved Avro schema of the map value, for map-type families.
    pub fn map_avro_schema(&self) -> Option<&Schema> {
        self.map_schema.as_ref()
    }

    /// Columns in declaration order. Empty for map-type families.
    pub fn columns(&self) -> &[ColumnLayout] {
        &self.columns
    }

    /// Look up a column by primary name or alias.
    pub fn column(&self, name_or_alias: &str) -> Option<&ColumnLayout> {
        self.column_index
            .get(name_or_alias)
            .map(|&pos| &self.columns[pos])
    }

    pub fn column_name_for_id(&self, id: ColumnId) -> Option<&str> {
        self.id_to_name.get(&id).map(String::as_str)
    }

    pub fn to_descriptor(&self) -> FamilyDesc {
        let mut desc = self.fields.clone();
        desc.columns = self.columns.iter().map(ColumnLayout::to_descriptor).collect();
        desc
    }
}

/// A compiled locality group: the storage tier its families share.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalityGroupLayout {
    /// Group-level descriptor fields; `families` is kept empty here and
    /// reassembled from the compiled families on demand.
    fields: LocalityGroupDesc,
    id: ColumnId,
    families: Vec<FamilyLayout>,
    /// Family lookup by primary name or alias, within this group.
    family_index: HashMap<String, usize>,
    /// Reverse lookup: family ID to primary name.
    id_to_name: HashMap<ColumnId, String>,
}

impl LocalityGroupLayout {
    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.fields.aliases
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn in_memory(&self) -> bool {
        self.fields.in_memory
    }

    pub fn ttl_seconds(&self) -> i32 {
        self.fields.ttl_seconds
    }

    pub fn max_versions(&self) -> i32 {
        self.fields.max_versions
    }

    pub fn compression(&self) -> Compression {
        self.fields.compression
    }

    /// Families in declaration order.
    pub fn families(&self) -> &[FamilyLayout] {
        &self.families
    }

    /// Look up a family by primary name or alias.
    pub fn family(&self, name_or_alias: &str) -> Option<&FamilyLayout> {
        self.family_index
            .get(name_or_alias)
            .map(|&pos| &self.families[pos])
    }

    pub fn family_name_for_id(&self, id: ColumnId) -> Option<&str> {
        self.id_to_name.get(&id).map(String::as_str)
    }

    pub fn to_descriptor(&self) -> LocalityGroupDesc {
        let mut desc = self.fields.clone();
        desc.families = self.families.iter().map(FamilyLayout::to_descriptor).collect();
        desc
    }
}

/// A compiled, frozen table layout.
pub struct TableLayout {
    /// Table-level descriptor fields; `locality_groups` is kept empty here
    /// and reassembled from the compiled groups on demand.
    fields: TableLayoutDesc,
    layout_id: String,
    locality_groups: Vec<LocalityGroupLayout>,
    /// Locality-group lookup by primary name or alias.
    group_index: HashMap<String, usize>,
    /// Family lookup by primary name or alias, across all locality groups:
    /// maps to (group position, family position). Doubles as the family's
    /// back-pointer to its enclosing group.
    family_index: HashMap<String, (usize, usize)>,
    /// Reverse lookup: locality-group ID to primary name.
    id_to_group_name: HashMap<ColumnId, String>,
    /// Every primary column name in the table: one unqualified entry per
    /// map-type family, one qualified entry per group-family column.
    column_names: BTreeSet<ColumnName>,
}

impl TableLayout {
    /// Compile a descriptor into a concrete layout.
    ///
    /// With `prior` set, the descriptor is applied as an update: renames,
    /// deletes, and modifications are reconciled against the prior layout
    /// and every transition is checked for on-disk compatibility. Class
    /// schemas are resolved with [`NoClassLoader`]; use
    /// [`TableLayout::with_class_loader`] to supply an environment.
    pub fn new(desc: TableLayoutDesc, prior: Option<&TableLayout>) -> Result<Self, LayoutError> {
        build::build_table(desc, prior, &NoClassLoader)
    }

    /// Compile a descriptor, resolving class schemas through `loader`.
    pub fn with_class_loader(
        desc: TableLayoutDesc,
        prior: Option<&TableLayout>,
        loader: &dyn SchemaClassLoader,
    ) -> Result<Self, LayoutError> {
        build::build_table(desc, prior, loader)
    }

    /// Read a descriptor from a JSON stream and compile it with no prior
    /// layout. The reader is consumed and dropped on every path.
    pub fn from_json_reader<R: io::Read>(reader: R) -> Result<Self, LoadError> {
        let desc = TableLayoutDesc::from_json_reader(reader)?;
        Ok(Self::new(desc, None)?)
    }

    /// Open a JSON layout file and delegate to [`TableLayout::from_json_reader`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_reader(BufReader::new(file))
    }

    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn description(&self) -> &str {
        &self.fields.description
    }

    pub fn keys_format(&self) -> KeyFormat {
        self.fields.keys_format
    }

    pub fn layout_id(&self) -> &str {
        &self.layout_id
    }

    pub fn reference_layout(&self) -> Option<&str> {
        self.fields.reference_layout.as_deref()
    }

    /// Locality groups in declaration order.
    pub fn locality_groups(&self) -> &[LocalityGroupLayout] {
        &self.locality_groups
    }

    /// Look up a locality group by primary name or alias.
    pub fn locality_group(&self, name_or_alias: &str) -> Option<&LocalityGroupLayout> {
        self.group_index
            .get(name_or_alias)
            .map(|&pos| &self.locality_groups[pos])
    }

    pub fn locality_group_name_for_id(&self, id: ColumnId) -> Option<&str> {
        self.id_to_group_name.get(&id).map(String::as_str)
    }

    /// Look up a family by primary name or alias, across all locality
    /// groups.
    pub fn family(&self, name_or_alias: &str) -> Option<&FamilyLayout> {
        self.family_index
            .get(name_or_alias)
            .map(|&(g, f)| &self.locality_groups[g].families[f])
    }

    /// The locality group enclosing the named family.
    pub fn locality_group_for_family(&self, family: &str) -> Option<&LocalityGroupLayout> {
        self.family_index
            .get(family)
            .map(|&(g, _)| &self.locality_groups[g])
    }

    /// Every primary column name in the table.
    pub fn column_names(&self) -> impl Iterator<Item = &ColumnName> {
        self.column_names.iter()
    }

    /// Whether the given column address resolves in this layout. Map-type
    /// families admit any qualifier; an unqualified address resolves for
    /// any existing family.
    pub fn contains_column(&self, column: &ColumnName) -> bool {
        let Some(family) = self.family(column.family()) else {
            return false;
        };
        if family.is_map_type() {
            return true;
        }
        match column.qualifier() {
            None => true,
            Some(qualifier) => family.column(qualifier).is_some(),
        }
    }

    /// The cell schema declaration for a column address.
    ///
    /// A map-type family yields its value schema regardless of qualifier.
    /// A group-type family requires a qualifier naming one of its columns.
    pub fn cell_schema(&self, column: &ColumnName) -> Result<&CellSchema, QueryError> {
        let family = self
            .family(column.family())
            .ok_or_else(|| self.no_such_column(column))?;
        if let Some(map_schema) = family.map_schema() {
            return Ok(map_schema);
        }
        let qualifier = column.qualifier().ok_or_else(|| QueryError::QualifierRequired {
            family: family.name().to_string(),
        })?;
        family
            .column(qualifier)
            .map(ColumnLayout::cell_schema)
            .ok_or_else(|| self.no_such_column(column))
    }

    /// The resolved Avro schema for a column address, as cached at build
    /// time. `None` for counters and unlocatable class schemas.
    pub fn avro_schema(&self, column: &ColumnName) -> Result<Option<&Schema>, QueryError> {
        let family = self
            .family(column.family())
            .ok_or_else(|| self.no_such_column(column))?;
        if family.is_map_type() {
            return Ok(family.map_avro_schema());
        }
        let qualifier = column.qualifier().ok_or_else(|| QueryError::QualifierRequired {
            family: family.name().to_string(),
        })?;
        family
            .column(qualifier)
            .map(ColumnLayout::avro_schema)
            .ok_or_else(|| self.no_such_column(column))
    }

    /// The cell storage variant for a column address.
    pub fn cell_storage(&self, column: &ColumnName) -> Result<SchemaStorage, QueryError> {
        self.cell_schema(column).map(|schema| schema.storage)
    }

    /// Reassemble the full normalized descriptor: rename and delete
    /// markers cleared, every assigned ID written back. Compiling this
    /// descriptor against `self` reproduces an equal layout.
    pub fn to_descriptor(&self) -> TableLayoutDesc {
        let mut desc = self.fields.clone();
        desc.locality_groups = self
            .locality_groups
            .iter()
            .map(LocalityGroupLayout::to_descriptor)
            .collect();
        desc
    }

    fn no_such_column(&self, column: &ColumnName) -> QueryError {
        QueryError::NoSuchColumn {
            table: self.fields.name.clone(),
            column: column.clone(),
        }
    }
}

impl fmt::Debug for TableLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableLayout")
            .field("name", &self.fields.name)
            .field("layout_id", &self.layout_id)
            .field("locality_groups", &self.locality_groups)
            .finish_non_exhaustive()
    }
}

/// Structural equality on the serialized descriptor.
impl PartialEq for TableLayout {
    fn eq(&self, other: &Self) -> bool {
        self.to_descriptor() == other.to_descriptor()
    }
}

impl Hash for TableLayout {
    fn hash<H: Hasher>(&self, state: &mut H) {
        serde_json::to_string(&self.to_descriptor())
            .unwrap_or_default()
            .hash(state);
    }
}

/// The descriptor serialized as pretty-printed JSON.
impl fmt::Display for TableLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string_pretty(&self.to_descriptor()).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::builder::TableDescBuilder;

    /// Helper: a table with one group family (`info`, alias `profile`,
    /// columns `email`/`name`) and one map family (`events`).
    fn sample_layout() -> TableLayout {
        let desc = TableDescBuilder::new("users")
            .locality_group("hot", |lg| {
                lg.group_family("info", |f| {
                    f.alias("profile")
                        .column("email", CellSchema::inline(r#""string""#))
                        .column_with("name", CellSchema::inline(r#""string""#), |c| {
                            c.aliases.push("full_name".to_string());
                        });
                });
            })
            .locality_group("cold", |lg| {
                lg.map_family(
                    "events",
                    CellSchema::counter().with_storage(crate::descriptor::SchemaStorage::Final),
                );
            })
            .build();
        TableLayout::new(desc, None).expect("sample layout should compile")
    }

    #[test]
    fn test_contains_column() {
        let layout = sample_layout();

        assert!(layout.contains_column(&ColumnName::qualified("info", "email")));
        assert!(!layout.contains_column(&ColumnName::qualified("info", "missing")));
        // Unqualified resolves for any existing family.
        assert!(layout.contains_column(&ColumnName::unqualified("info")));
        // Map families admit any qualifier.
        assert!(layout.contains_column(&ColumnName::qualified("events", "anything")));
        assert!(layout.contains_column(&ColumnName::unqualified("events")));
        assert!(!layout.contains_column(&ColumnName::unqualified("ghost")));
    }

    #[test]
    fn test_cell_schema_for_group_family_requires_qualifier() {
        let layout = sample_layout();

        let err = layout
            .cell_schema(&ColumnName::unqualified("info"))
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::QualifierRequired {
                family: "info".to_string()
            }
        );

        let schema = layout
            .cell_schema(&ColumnName::qualified("info", "email"))
            .unwrap();
        assert_eq!(schema, &CellSchema::inline(r#""string""#));
    }

    #[test]
    fn test_cell_schema_for_map_family_ignores_qualifier() {
        let layout = sample_layout();

        let unqualified = layout
            .cell_schema(&ColumnName::unqualified("events"))
            .unwrap();
        let qualified = layout
            .cell_schema(&ColumnName::qualified("events", "login"))
            .unwrap();
        assert_eq!(unqualified, qualified);
        assert_eq!(unqualified.schema_type, crate::descriptor::SchemaType::Counter);
    }

    #[test]
    fn test_cell_schema_unknown_lookups() {
        let layout = sample_layout();

        let err = layout
            .cell_schema(&ColumnName::qualified("ghost", "x"))
            .unwrap_err();
        assert!(matches!(err, QueryError::NoSuchColumn { .. }));

        let err = layout
            .cell_schema(&ColumnName::qualified("info", "missing"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "table 'users' has no column 'info:missing'"
        );
    }

    #[test]
    fn test_avro_schema_is_cached_resolution() {
        let layout = sample_layout();

        let resolved = layout
            .avro_schema(&ColumnName::qualified("info", "email"))
            .unwrap();
        assert_eq!(resolved, Some(&Schema::String));

        // Counters carry no Avro schema.
        let resolved = layout
            .avro_schema(&ColumnName::unqualified("events"))
            .unwrap();
        assert_eq!(resolved, None);
    }

    #[test]
    fn test_cell_storage() {
        let layout = sample_layout();

        assert_eq!(
            layout
                .cell_storage(&ColumnName::qualified("info", "email"))
                .unwrap(),
            SchemaStorage::Hash
        );
        assert_eq!(
            layout.cell_storage(&ColumnName::unqualified("events")).unwrap(),
            SchemaStorage::Final
        );
    }

    #[test]
    fn test_lookups_work_through_aliases() {
        let layout = sample_layout();

        let by_alias = layout.family("profile").unwrap();
        assert_eq!(by_alias.name(), "info");
        assert!(layout.contains_column(&ColumnName::qualified("profile", "email")));
        assert_eq!(
            by_alias.column("full_name").unwrap().name(),
            "name"
        );
    }

    #[test]
    fn test_column_names_enumerates_primaries() {
        let layout = sample_layout();
        let names: Vec<String> = layout.column_names().map(ColumnName::to_string).collect();
        assert_eq!(names, vec!["events", "info:email", "info:name"]);
    }

    #[test]
    fn test_locality_group_for_family() {
        let layout = sample_layout();
        assert_eq!(
            layout.locality_group_for_family("info").map(|lg| lg.name()),
            Some("hot")
        );
        assert_eq!(
            layout.locality_group_for_family("events").map(|lg| lg.name()),
            Some("cold")
        );
        assert!(layout.locality_group_for_family("ghost").is_none());
    }

    #[test]
    fn test_id_to_name_lookups() {
        let layout = sample_layout();

        let hot = layout.locality_group("hot").unwrap();
        assert_eq!(layout.locality_group_name_for_id(hot.id()), Some("hot"));

        let info = layout.family("info").unwrap();
        assert_eq!(hot.family_name_for_id(info.id()), Some("info"));

        let email = info.column("email").unwrap();
        assert_eq!(info.column_name_for_id(email.id()), Some("email"));
    }

    #[test]
    fn test_equality_is_structural_on_descriptor() {
        let a = sample_layout();
        let b = sample_layout();
        assert_eq!(a, b);

        let other = TableLayout::new(
            TableDescBuilder::new("users")
                .locality_group("hot", |lg| {
                    lg.group_family("info", |_| {});
                })
                .build(),
            None,
        )
        .unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn test_display_is_descriptor_json() {
        let layout = sample_layout();
        let text = layout.to_string();
        let decoded: TableLayoutDesc = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, layout.to_descriptor());
    }
}
