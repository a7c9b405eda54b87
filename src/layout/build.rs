//! The layout build engine — compiles a descriptor into a frozen layout.
//!
//! One builder per nesting level: column, family, locality group, table.
//! Each level reconciles its children against the prior layout (rename,
//! delete, modify, add), checks sibling uniqueness of names and IDs, and
//! fills unassigned IDs with the smallest free values in declaration
//! order. Every prior child must be accounted for; a leftover is an
//! error, never a silent drop.

use crate::descriptor::{
    ColumnDesc, FamilyDesc, LocalityGroupDesc, TableLayoutDesc, effective_id, names_of,
};
use crate::ids::{ColumnId, IdAllocator};
use crate::layout::{
    ColumnLayout, FamilyLayout, LayoutError, LocalityGroupLayout, TableLayout,
};
use crate::names::{ColumnName, is_valid_alias, is_valid_layout_name};
use crate::schema::{self, SchemaClassLoader};
use apache_avro::Schema;
use std::collections::{BTreeSet, HashMap};


/// A compiled column whose ID may still be pending; the family builder
/// fills it from the allocator.
struct BuiltColumn {
    desc: ColumnDesc,
    id: Option<ColumnId>,
    schema: Option<Schema>,
}

/// A compiled family whose ID may still be pending at the locality-group
/// level. Its columns are already frozen.
struct BuiltFamily {
    fields: FamilyDesc,
    id: Option<ColumnId>,
    columns: Vec<ColumnLayout>,
    column_index: HashMap<String, usize>,
    id_to_name: HashMap<ColumnId, String>,
    map_schema: Option<Schema>,
}

/// A compiled locality group whose ID may still be pending at the table
/// level. Its families are already frozen.
struct BuiltGroup {
    fields: LocalityGroupDesc,
    id: Option<ColumnId>,
    families: Vec<FamilyLayout>,
    family_index: HashMap<String, usize>,
    id_to_name: HashMap<ColumnId, String>,
}

/// Compile a table descriptor, optionally as an update against a prior
/// concrete layout. The descriptor is owned: the stored copy is the one
/// normalized (rename markers cleared, deletions dropped, IDs written
/// back), so the caller's view is never aliased.
pub(crate) fn build_table(
    mut desc: TableLayoutDesc,
    prior: Option<&TableLayout>,
    loader: &dyn SchemaClassLoader,
) -> Result<TableLayout, LayoutError> {
    if !is_valid_layout_name(&desc.name) {
        return Err(LayoutError::InvalidName(desc.name));
    }

    if let Some(prior) = prior {
        if desc.name != prior.name() {
            return Err(LayoutError::ForbiddenMutation {
                entity: format!("table '{}'", prior.name()),
                change: format!("renamed to '{}'", desc.name),
            });
        }
        if desc.keys_format != prior.keys_format() {
            return Err(LayoutError::ForbiddenMutation {
                entity: format!("table '{}'", desc.name),
                change: format!(
                    "row key format changed from {} to {}",
                    prior.keys_format(),
                    desc.keys_format
                ),
            });
        }
    }

    let layout_id = match desc.layout_id.take() {
        Some(explicit) => explicit,
        None => match prior {
            Some(prior) => next_layout_id(prior.layout_id())?,
            None => "1".to_string(),
        },
    };
    desc.layout_id = Some(layout_id.clone());

    tracing::debug!(table = %desc.name, layout_id = %layout_id, "building table layout");

    let mut prior_groups: HashMap<&str, &LocalityGroupLayout> = prior
        .map(|p| p.locality_groups().iter().map(|lg| (lg.name(), lg)).collect())
        .unwrap_or_default();

    let table_scope = format!("table '{}'", desc.name);
    let mut built_groups: Vec<BuiltGroup> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut family_index: HashMap<String, (usize, usize)> = HashMap::new();
    let mut column_names: BTreeSet<ColumnName> = BTreeSet::new();
    let mut alloc = IdAllocator::new();

    for mut group_desc in std::mem::take(&mut desc.locality_groups) {
        let was_renamed = group_desc.renamed_from.is_some();
        let lookup_name = group_desc
            .renamed_from
            .take()
            .unwrap_or_else(|| group_desc.name.clone());
        let prior_group = prior_groups.remove(lookup_name.as_str());
        if was_renamed && prior_group.is_none() {
            return Err(LayoutError::InvalidRename {
                kind: "locality group",
                from: lookup_name,
            });
        }
        if group_desc.delete {
            if prior_group.is_none() {
                return Err(LayoutError::InvalidDelete {
                    kind: "locality group",
                    name: lookup_name,
                });
            }
            continue;
        }

        let group = build_locality_group(group_desc, prior_group, loader)?;
        let group_pos = built_groups.len();

        for name in names_of(&group.fields.name, &group.fields.aliases) {
            if group_index.insert(name.to_string(), group_pos).is_some() {
                return Err(LayoutError::DuplicateName {
                    name: name.to_string(),
                    scope: table_scope.clone(),
                });
            }
        }

        // Family names and aliases must be unique across the whole table,
        // not merely within their locality group.
        for (family_pos, family) in group.families.iter().enumerate() {
            for name in names_of(family.name(), family.aliases()) {
                if family_index
                    .insert(name.to_string(), (group_pos, family_pos))
                    .is_some()
                {
                    return Err(LayoutError::DuplicateName {
                        name: name.to_string(),
                        scope: table_scope.clone(),
                    });
                }
            }
            if family.is_map_type() {
                column_names.insert(ColumnName::unqualified(family.name()));
            } else {
                for column in family.columns() {
                    column_names.insert(ColumnName::qualified(family.name(), column.name()));
                }
            }
        }

        if let Some(id) = group.id
            && !alloc.reserve(id)
        {
            return Err(LayoutError::DuplicateId {
                id: id.get(),
                scope: table_scope,
            });
        }
        built_groups.push(group);
    }

    if !prior_groups.is_empty() {
        return Err(LayoutError::OrphanPrior {
            kind: "locality group",
            names: sorted_names(prior_groups.into_keys()),
        });
    }

    let mut locality_groups = Vec::with_capacity(built_groups.len());
    let mut id_to_group_name = HashMap::new();
    for group in built_groups {
        let id = group.id.unwrap_or_else(|| alloc.assign());
        let mut fields = group.fields;
        fields.id = Some(id.get());
        id_to_group_name.insert(id, fields.name.clone());
        locality_groups.push(LocalityGroupLayout {
            fields,
            id,
            families: group.families,
            family_index: group.family_index,
            id_to_name: group.id_to_name,
        });
    }

    Ok(TableLayout {
        fields: desc,
        layout_id,
        locality_groups,
        group_index,
        family_index,
        id_to_group_name,
        column_names,
    })
}

/// Compile one locality group, reconciling its families against the prior
/// group when present. Family IDs live in a namespace scoped to the
/// locality group.
fn build_locality_group(
    mut desc: LocalityGroupDesc,
    prior: Option<&LocalityGroupLayout>,
    loader: &dyn SchemaClassLoader,
) -> Result<BuiltGroup, LayoutError> {
    validate_entity_names(&desc.name, &desc.aliases)?;

    if desc.ttl_seconds <= 0 {
        return Err(LayoutError::InvalidParameter(format!(
            "locality group '{}': ttlSeconds must be positive, got {}",
            desc.name, desc.ttl_seconds
        )));
    }
    if desc.max_versions <= 0 {
        return Err(LayoutError::InvalidParameter(format!(
            "locality group '{}': maxVersions must be positive, got {}",
            desc.name, desc.max_versions
        )));
    }

    let id = reconcile_id(effective_id(desc.id), prior.map(|p| p.id()), &desc.name)?;

    let mut prior_families: HashMap<&str, &FamilyLayout> = prior
        .map(|p| p.families().iter().map(|f| (f.name(), f)).collect())
        .unwrap_or_default();

    let group_scope = format!("locality group '{}'", desc.name);
    let mut built: Vec<BuiltFamily> = Vec::new();
    let mut family_index: HashMap<String, usize> = HashMap::new();
    let mut alloc = IdAllocator::new();

    for mut family_desc in std::mem::take(&mut desc.families) {
        let was_renamed = family_desc.renamed_from.is_some();
        let lookup_name = family_desc
            .renamed_from
            .take()
            .unwrap_or_else(|| family_desc.name.clone());
        let prior_family = prior_families.remove(lookup_name.as_str());
        if was_renamed && prior_family.is_none() {
            return Err(LayoutError::InvalidRename {
                kind: "family",
                from: lookup_name,
            });
        }
        if family_desc.delete {
            if prior_family.is_none() {
                return Err(LayoutError::InvalidDelete {
                    kind: "family",
                    name: lookup_name,
                });
            }
            continue;
        }

        let family = build_family(family_desc, prior_family, loader)?;
        let family_pos = built.len();
        for name in names_of(&family.fields.name, &family.fields.aliases) {
            if family_index.insert(name.to_string(), family_pos).is_some() {
                return Err(LayoutError::DuplicateName {
                    name: name.to_string(),
                    scope: group_scope.clone(),
                });
            }
        }
        if let Some(id) = family.id
            && !alloc.reserve(id)
        {
            return Err(LayoutError::DuplicateId {
                id: id.get(),
                scope: group_scope,
            });
        }
        built.push(family);
    }

    if !prior_families.is_empty() {
        return Err(LayoutError::OrphanPrior {
            kind: "family",
            names: sorted_names(prior_families.into_keys()),
        });
    }

    let mut families = Vec::with_capacity(built.len());
    let mut id_to_name = HashMap::new();
    for family in built {
        let id = family.id.unwrap_or_else(|| alloc.assign());
        let mut fields = family.fields;
        fields.id = Some(id.get());
        id_to_name.insert(id, fields.name.clone());
        families.push(FamilyLayout {
            fields,
            id,
            columns: family.columns,
            column_index: family.column_index,
            id_to_name: family.id_to_name,
            map_schema: family.map_schema,
        });
    }

    Ok(BuiltGroup {
        fields: desc,
        id,
        families,
        family_index,
        id_to_name,
    })
}

/// Compile one family, reconciling its columns against the prior family
/// when present. The family's kind (group-type vs map-type) and any cell
/// storage variant must survive the update unchanged.
fn build_family(
    mut desc: FamilyDesc,
    prior: Option<&FamilyLayout>,
    loader: &dyn SchemaClassLoader,
) -> Result<BuiltFamily, LayoutError> {
    if !desc.columns.is_empty() && desc.map_schema.is_some() {
        return Err(LayoutError::InvalidParameter(format!(
            "family '{}' declares both columns and a map schema",
            desc.name
        )));
    }

    validate_entity_names(&desc.name, &desc.aliases)?;

    let id = reconcile_id(effective_id(desc.id), prior.map(|p| p.id()), &desc.name)?;

    if let Some(prior) = prior {
        if prior.is_map_type() != desc.is_map_type() {
            return Err(LayoutError::ForbiddenMutation {
                entity: format!("family '{}'", desc.name),
                change: "cannot convert between group-type and map-type".to_string(),
            });
        }
        if let (Some(prior_map), Some(new_map)) = (prior.map_schema(), desc.map_schema.as_ref())
            && prior_map.storage != new_map.storage
        {
            return Err(LayoutError::ForbiddenMutation {
                entity: format!("map family '{}'", desc.name),
                change: format!(
                    "cell storage changed from {} to {}",
                    prior_map.storage, new_map.storage
                ),
            });
        }
    }

    let map_schema = match desc.map_schema.as_ref() {
        Some(cell) => schema::resolve(cell, loader)?,
        None => None,
    };

    let mut prior_columns: HashMap<&str, &ColumnLayout> = prior
        .map(|p| p.columns().iter().map(|c| (c.name(), c)).collect())
        .unwrap_or_default();

    let family_scope = format!("family '{}'", desc.name);
    let mut built: Vec<BuiltColumn> = Vec::new();
    let mut column_index: HashMap<String, usize> = HashMap::new();
    let mut alloc = IdAllocator::new();

    for mut column_desc in std::mem::take(&mut desc.columns) {
        let was_renamed = column_desc.renamed_from.is_some();
        let lookup_name = column_desc
            .renamed_from
            .take()
            .unwrap_or_else(|| column_desc.name.clone());
        let prior_column = prior_columns.remove(lookup_name.as_str());
        if was_renamed && prior_column.is_none() {
            return Err(LayoutError::InvalidRename {
                kind: "column",
                from: lookup_name,
            });
        }
        if column_desc.delete {
            if prior_column.is_none() {
                return Err(LayoutError::InvalidDelete {
                    kind: "column",
                    name: lookup_name,
                });
            }
            continue;
        }

        let column = build_column(column_desc, prior_column, loader)?;
        let column_pos = built.len();
        for name in names_of(&column.desc.name, &column.desc.aliases) {
            if column_index.insert(name.to_string(), column_pos).is_some() {
                return Err(LayoutError::DuplicateName {
                    name: name.to_string(),
                    scope: family_scope.clone(),
                });
            }
        }
        if let Some(id) = column.id
            && !alloc.reserve(id)
        {
            return Err(LayoutError::DuplicateId {
                id: id.get(),
                scope: family_scope,
            });
        }
        built.push(column);
    }

    if !prior_columns.is_empty() {
        return Err(LayoutError::OrphanPrior {
            kind: "column",
            names: sorted_names(prior_columns.into_keys()),
        });
    }

    let mut columns = Vec::with_capacity(built.len());
    let mut id_to_name = HashMap::new();
    for column in built {
        let id = column.id.unwrap_or_else(|| alloc.assign());
        let mut column_desc = column.desc;
        column_desc.id = Some(id.get());
        id_to_name.insert(id, column_desc.name.clone());
        columns.push(ColumnLayout {
            desc: column_desc,
            id,
            schema: column.schema,
        });
    }

    Ok(BuiltFamily {
        fields: desc,
        id,
        columns,
        column_index,
        id_to_name,
        map_schema,
    })
}

/// Compile one column. The ID stays pending (`None`) when neither the
/// descriptor nor the prior layout supplies one.
fn build_column(
    desc: ColumnDesc,
    prior: Option<&ColumnLayout>,
    loader: &dyn SchemaClassLoader,
) -> Result<BuiltColumn, LayoutError> {
    validate_entity_names(&desc.name, &desc.aliases)?;

    let id = reconcile_id(effective_id(desc.id), prior.map(|p| p.id()), &desc.name)?;

    if let Some(prior) = prior
        && prior.cell_schema().storage != desc.column_schema.storage
    {
        return Err(LayoutError::ForbiddenMutation {
            entity: format!("column '{}'", desc.name),
            change: format!(
                "cell storage changed from {} to {}",
                prior.cell_schema().storage,
                desc.column_schema.storage
            ),
        });
    }

    let schema = schema::resolve(&desc.column_schema, loader)?;

    Ok(BuiltColumn { desc, id, schema })
}

/// Check the primary name, then run the primary name and every alias
/// through the alias predicate.
fn validate_entity_names(name: &str, aliases: &[String]) -> Result<(), LayoutError> {
    if !is_valid_layout_name(name) {
        return Err(LayoutError::InvalidName(name.to_string()));
    }
    for candidate in names_of(name, aliases) {
        if !is_valid_alias(candidate) {
            return Err(LayoutError::InvalidAlias(candidate.to_string()));
        }
    }
    Ok(())
}

/// Resolve an entity's ID against the prior layout: a supplied ID must
/// agree with the prior one; an absent ID adopts it.
fn reconcile_id(
    supplied: Option<ColumnId>,
    prior: Option<ColumnId>,
    name: &str,
) -> Result<Option<ColumnId>, LayoutError> {
    match (supplied, prior) {
        (Some(supplied), Some(prior)) if supplied != prior => Err(LayoutError::IdMismatch {
            name: name.to_string(),
            supplied: supplied.get(),
            prior: prior.get(),
        }),
        (Some(supplied), _) => Ok(Some(supplied)),
        (None, prior) => Ok(prior),
    }
}

/// The successor of a prior layout ID, for descriptors that do not supply
/// one. The prior value must be a decimal integer.
fn next_layout_id(prior: &str) -> Result<String, LayoutError> {
    let n: u64 = prior
        .parse()
        .map_err(|_| LayoutError::InvalidLayoutId(prior.to_string()))?;
    let next = n
        .checked_add(1)
        .ok_or_else(|| LayoutError::InvalidLayoutId(prior.to_string()))?;
    Ok(next.to_string())
}

fn sorted_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = names.map(str::to_string).collect();
    names.sort();
    names
}
