//! table-layout: layout compiler and validator for wide-column table stores
//!
//! This library compiles a declarative layout descriptor — locality groups,
//! column families, columns, cell schemas — into an immutable concrete
//! layout with validated names and stable short IDs. Presented as an update
//! against a prior layout, the descriptor's renames, deletions, and
//! modifications are checked against the mutation rules that guarantee
//! on-disk compatibility.

pub mod descriptor;
pub mod ids;
pub mod layout;
pub mod names;
pub mod schema;

// Re-export commonly used types
pub use descriptor::{
    CellSchema, ColumnDesc, Compression, FamilyDesc, KeyFormat, LoadError, LocalityGroupDesc,
    SchemaStorage, SchemaType, TableLayoutDesc,
};
pub use ids::ColumnId;
pub use layout::{
    ColumnLayout, FamilyLayout, LayoutError, LocalityGroupLayout, QueryError, TableLayout,
};
pub use names::ColumnName;
pub use schema::{NoClassLoader, SchemaClassLoader};
