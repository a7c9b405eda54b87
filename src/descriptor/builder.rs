//! Test harness for building layout descriptors.
//!
//! A fluent API for constructing descriptor trees in tests without the
//! field noise of struct literals. Defaults are chosen so a minimal call
//! chain produces a valid descriptor.
//!
//! # Example
//!
//! ```ignore
//! let desc = TableDescBuilder::new("users")
//!     .locality_group("default", |lg| {
//!         lg.ttl_seconds(3600).group_family("info", |f| {
//!             f.column("email", CellSchema::inline(r#""string""#));
//!         });
//!     })
//!     .build();
//! ```

use crate::descriptor::{
    CellSchema, ColumnDesc, Compression, FamilyDesc, KeyFormat, LocalityGroupDesc, TableLayoutDesc,
};

/// Builder for a [`TableLayoutDesc`] in tests.
pub struct TableDescBuilder {
    desc: TableLayoutDesc,
}

impl TableDescBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            desc: TableLayoutDesc {
                name: name.to_string(),
                description: String::new(),
                keys_format: KeyFormat::Raw,
                layout_id: None,
                locality_groups: vec![],
                reference_layout: None,
            },
        }
    }

    pub fn keys_format(mut self, keys_format: KeyFormat) -> Self {
        self.desc.keys_format = keys_format;
        self
    }

    pub fn layout_id(mut self, layout_id: &str) -> Self {
        self.desc.layout_id = Some(layout_id.to_string());
        self
    }

    /// Add a locality group. The closure receives a `LocalityGroupBuilder`
    /// to configure properties and families.
    pub fn locality_group(mut self, name: &str, f: impl FnOnce(&mut LocalityGroupBuilder)) -> Self {
        let mut builder = LocalityGroupBuilder::new(name);
        f(&mut builder);
        self.desc.locality_groups.push(builder.desc);
        self
    }

    pub fn build(self) -> TableLayoutDesc {
        self.desc
    }
}

/// Builder for one locality group. Defaults: one-hour TTL, one version,
/// no compression, on-disk.
pub struct LocalityGroupBuilder {
    desc: LocalityGroupDesc,
}

impl LocalityGroupBuilder {
    fn new(name: &str) -> Self {
        Self {
            desc: LocalityGroupDesc {
                name: name.to_string(),
                aliases: vec![],
                description: String::new(),
                in_memory: false,
                ttl_seconds: 3600,
                max_versions: 1,
                compression: Compression::None,
                id: None,
                renamed_from: None,
                delete: false,
                families: vec![],
            },
        }
    }

    pub fn alias(&mut self, alias: &str) -> &mut Self {
        self.desc.aliases.push(alias.to_string());
        self
    }

    pub fn in_memory(&mut self) -> &mut Self {
        self.desc.in_memory = true;
        self
    }

    pub fn ttl_seconds(&mut self, ttl: i32) -> &mut Self {
        self.desc.ttl_seconds = ttl;
        self
    }

    pub fn max_versions(&mut self, versions: i32) -> &mut Self {
        self.desc.max_versions = versions;
        self
    }

    pub fn compression(&mut self, compression: Compression) -> &mut Self {
        self.desc.compression = compression;
        self
    }

    pub fn id(&mut self, id: i32) -> &mut Self {
        self.desc.id = Some(id);
        self
    }

    pub fn renamed_from(&mut self, prior_name: &str) -> &mut Self {
        self.desc.renamed_from = Some(prior_name.to_string());
        self
    }

    pub fn delete(&mut self) -> &mut Self {
        self.desc.delete = true;
        self
    }

    /// Add a group-type family. The closure receives a `FamilyBuilder` to
    /// configure aliases and columns.
    pub fn group_family(&mut self, name: &str, f: impl FnOnce(&mut FamilyBuilder)) -> &mut Self {
        let mut builder = FamilyBuilder::new(name);
        f(&mut builder);
        self.desc.families.push(builder.desc);
        self
    }

    /// Add a map-type family with the given value schema.
    pub fn map_family(&mut self, name: &str, value_schema: CellSchema) -> &mut Self {
        self.map_family_with(name, value_schema, |_| {})
    }

    /// Add a map-type family and further configure it.
    pub fn map_family_with(
        &mut self,
        name: &str,
        value_schema: CellSchema,
        f: impl FnOnce(&mut FamilyBuilder),
    ) -> &mut Self {
        let mut builder = FamilyBuilder::new(name);
        builder.desc.map_schema = Some(value_schema);
        f(&mut builder);
        self.desc.families.push(builder.desc);
        self
    }
}

/// Builder for one family.
pub struct FamilyBuilder {
    desc: FamilyDesc,
}

impl FamilyBuilder {
    fn new(name: &str) -> Self {
        Self {
            desc: FamilyDesc {
                name: name.to_string(),
                aliases: vec![],
                description: String::new(),
                id: None,
                renamed_from: None,
                delete: false,
                columns: vec![],
                map_schema: None,
            },
        }
    }

    pub fn alias(&mut self, alias: &str) -> &mut Self {
        self.desc.aliases.push(alias.to_string());
        self
    }

    pub fn id(&mut self, id: i32) -> &mut Self {
        self.desc.id = Some(id);
        self
    }

    pub fn renamed_from(&mut self, prior_name: &str) -> &mut Self {
        self.desc.renamed_from = Some(prior_name.to_string());
        self
    }

    pub fn delete(&mut self) -> &mut Self {
        self.desc.delete = true;
        self
    }

    /// Add a column with the given cell schema.
    pub fn column(&mut self, name: &str, schema: CellSchema) -> &mut Self {
        self.column_with(name, schema, |_| {})
    }

    /// Add a column and adjust its descriptor (aliases, explicit ID,
    /// rename or delete markers) before it is pushed.
    pub fn column_with(
        &mut self,
        name: &str,
        schema: CellSchema,
        f: impl FnOnce(&mut ColumnDesc),
    ) -> &mut Self {
        let mut column = ColumnDesc {
            name: name.to_string(),
            aliases: vec![],
            description: String::new(),
            id: None,
            renamed_from: None,
            delete: false,
            column_schema: schema,
        };
        f(&mut column);
        self.desc.columns.push(column);
        self
    }
}
