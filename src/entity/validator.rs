//! Definition validation: field/column uniqueness and relation integrity.

use crate::entity::types::{EntityDef, FieldKind};
use crate::error::EntityError;
use std::collections::HashSet;

pub fn validate(defs: &[EntityDef]) -> Result<(), EntityError> {
    let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
    let mut seen = HashSet::new();
    for n in &names {
        if !seen.insert(*n) {
            return Err(EntityError::DuplicateEntity((*n).to_string()));
        }
    }

    for def in defs {
        if def.fields.is_empty() {
            return Err(EntityError::EmptyEntity(def.name.clone()));
        }

        let mut fields = HashSet::new();
        let mut columns = HashSet::new();
        for f in &def.fields {
            if !fields.insert(f.name.as_str()) {
                return Err(EntityError::DuplicateField {
                    entity: def.name.clone(),
                    field: f.name.clone(),
                });
            }
            if let Some(col) = f.column_name() {
                if !columns.insert(col.to_ascii_lowercase()) {
                    return Err(EntityError::DuplicateColumn {
                        entity: def.name.clone(),
                        column: col.to_string(),
                    });
                }
            }
        }

        for f in &def.fields {
            let FieldKind::Relation {
                target,
                our_key,
                their_key,
            } = &f.kind
            else {
                continue;
            };
            let Some(related) = defs.iter().find(|d| d.name == *target) else {
                return Err(EntityError::UnknownRelationTarget {
                    entity: def.name.clone(),
                    field: f.name.clone(),
                    target: target.clone(),
                });
            };
            if def.field_for_column(our_key).is_none() {
                return Err(EntityError::UnknownJoinColumn {
                    entity: def.name.clone(),
                    field: f.name.clone(),
                    column: our_key.clone(),
                });
            }
            if related.field_for_column(their_key).is_none() {
                return Err(EntityError::UnknownJoinColumn {
                    entity: def.name.clone(),
                    field: f.name.clone(),
                    column: their_key.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::types::{ColumnType, FieldDef};

    fn widget() -> EntityDef {
        EntityDef::with_table(
            "Widget",
            "Widgets",
            vec![
                FieldDef::identity("Id", ColumnType::Integer),
                FieldDef::column("Name", ColumnType::Text),
                FieldDef::column("ParentId", ColumnType::Integer),
                FieldDef::relation("Parent", "Widget", "ParentId", "Id"),
            ],
        )
    }

    #[test]
    fn valid_self_referential_entity() {
        assert!(validate(&[widget()]).is_ok());
    }

    #[test]
    fn rejects_duplicate_entity() {
        let err = validate(&[widget(), widget()]).unwrap_err();
        assert!(matches!(err, EntityError::DuplicateEntity(n) if n == "Widget"));
    }

    #[test]
    fn rejects_duplicate_column_case_insensitively() {
        let mut def = widget();
        def.fields.push(FieldDef::column("NAME", ColumnType::Text));
        let err = validate(&[def]).unwrap_err();
        assert!(matches!(err, EntityError::DuplicateColumn { .. }));
    }

    #[test]
    fn rejects_unknown_relation_target() {
        let mut def = widget();
        def.fields
            .push(FieldDef::relation("Owner", "User", "ParentId", "Id"));
        let err = validate(&[def]).unwrap_err();
        assert!(matches!(err, EntityError::UnknownRelationTarget { target, .. } if target == "User"));
    }

    #[test]
    fn rejects_unknown_join_column() {
        let mut def = widget();
        def.fields[3] = FieldDef::relation("Parent", "Widget", "OwnerId", "Id");
        let err = validate(&[def]).unwrap_err();
        assert!(matches!(err, EntityError::UnknownJoinColumn { column, .. } if column == "OwnerId"));
    }

    #[test]
    fn rejects_empty_entity() {
        let def = EntityDef::new("Nothing", vec![]);
        let err = validate(&[def]).unwrap_err();
        assert!(matches!(err, EntityError::EmptyEntity(_)));
    }
}
