//! Cell schema resolution.
//!
//! A cell schema is declared inline (an Avro schema literal), by compiled
//! class name, or as a counter. Resolution parses and type-checks the
//! declaration once, at layout build time; the resolved schema is cached
//! on the frozen layout for the read-side API.

use crate::descriptor::{CellSchema, SchemaType};
use crate::layout::LayoutError;
use crate::names::is_valid_class_name;
use apache_avro::Schema;

/// The ambient type-loading environment: maps a fully-qualified record
/// class name to its Avro schema, when the class is locatable.
///
/// Injectable so layouts can be validated on nodes that do not carry the
/// user's compiled classes.
pub trait SchemaClassLoader {
    fn load(&self, class_name: &str) -> Option<Schema>;
}

/// Loader for environments without compiled record classes. Never finds
/// anything; class-typed cells resolve to no schema.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoClassLoader;

impl SchemaClassLoader for NoClassLoader {
    fn load(&self, _class_name: &str) -> Option<Schema> {
        None
    }
}

/// Resolve a cell schema declaration.
///
/// Returns `Ok(None)` for counters (cell values are 64-bit big-endian
/// integers, no Avro schema) and for class schemas the environment cannot
/// locate. The latter is tolerated: the miss is logged and validation
/// succeeds, so a layout written against user classes can still be checked
/// elsewhere.
pub(crate) fn resolve(
    cell: &CellSchema,
    loader: &dyn SchemaClassLoader,
) -> Result<Option<Schema>, LayoutError> {
    match cell.schema_type {
        SchemaType::Inline => {
            let literal = cell.value.as_deref().ok_or_else(|| LayoutError::InvalidSchema {
                schema: cell.to_string(),
                reason: "INLINE schema declares no literal".to_string(),
            })?;
            let schema =
                Schema::parse_str(literal).map_err(|source| LayoutError::InvalidSchema {
                    schema: cell.to_string(),
                    reason: source.to_string(),
                })?;
            Ok(Some(schema))
        }
        SchemaType::Class => {
            let class_name = cell.value.as_deref().filter(|v| is_valid_class_name(v));
            let Some(class_name) = class_name else {
                return Err(LayoutError::InvalidSchema {
                    schema: cell.to_string(),
                    reason: "CLASS schema requires a fully-qualified class name".to_string(),
                });
            };
            match loader.load(class_name) {
                Some(schema) => Ok(Some(schema)),
                None => {
                    tracing::info!(
                        class = class_name,
                        "schema class not found in this environment; accepting without a schema"
                    );
                    Ok(None)
                }
            }
        }
        SchemaType::Counter => Ok(None),
    }
}
