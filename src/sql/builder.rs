//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from entity metadata
//! and discovered schema.

use crate::entity::{EntityDef, FieldDef, FieldKind, MappingRegistry};
use crate::error::MapError;
use crate::schema::ColumnField;
use crate::sql::{quote_ident, BindValue};
use serde_json::Value;

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

/// Key comparison fragment: `"Col" = ?`, with NOCASE collation when the seek
/// is case-insensitive.
fn key_predicate(fields: &[ColumnField], case_sensitive: bool) -> String {
    fields
        .iter()
        .map(|f| {
            if case_sensitive {
                format!("{} = ?", quote_ident(&f.column))
            } else {
                format!("{} = ? COLLATE NOCASE", quote_ident(&f.column))
            }
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// SELECT by primary key over the given projection. Caller binds one value per
/// key column, in key order.
pub fn select_by_key(
    def: &EntityDef,
    projection: &str,
    key: &[ColumnField],
    case_sensitive: bool,
) -> String {
    format!(
        "SELECT {} FROM {} WHERE {}",
        projection,
        quote_ident(def.table_name()),
        key_predicate(key, case_sensitive)
    )
}

/// SELECT with every requested relation LEFT JOINed in, each joined table
/// aliased by its include path and projected under a dot-qualified prefix.
/// An empty include list yields the plain single-table SELECT.
pub fn select_with_includes(
    registry: &MappingRegistry,
    entity: &str,
    includes: &[&str],
) -> Result<String, MapError> {
    let root = registry.entity(entity)?.clone();

    // "A.B" implies joining A as well: expand to all path prefixes.
    let mut paths: Vec<String> = Vec::new();
    for inc in includes {
        let mut prefix = String::new();
        for seg in inc.split('.').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(seg);
            if !paths.iter().any(|p| p == &prefix) {
                paths.push(prefix.clone());
            }
        }
    }
    paths.sort();

    let mut parts = vec![registry.projection(entity, None, None)?];
    let mut joins = String::new();
    for path in &paths {
        let (owner, field) = resolve_relation(registry, root.as_ref(), path)?;
        let FieldKind::Relation {
            target,
            our_key,
            their_key,
        } = &field.kind
        else {
            unreachable!()
        };
        let related = registry.entity(target)?.clone();
        let alias = path.replace('.', "_");
        let owner_alias = match path.rsplit_once('.') {
            Some((head, _)) => head.replace('.', "_"),
            None => owner.table_name().to_string(),
        };
        parts.push(registry.projection(target, Some(alias.as_str()), Some(path.as_str()))?);
        joins.push_str(&format!(
            " LEFT JOIN {} {} ON {}.{} = {}.{}",
            quote_ident(related.table_name()),
            quote_ident(&alias),
            quote_ident(&alias),
            quote_ident(their_key),
            quote_ident(&owner_alias),
            quote_ident(our_key),
        ));
    }

    Ok(format!(
        "SELECT {} FROM {}{}",
        parts.join(", "),
        quote_ident(root.table_name()),
        joins
    ))
}

/// Walk a dot path from the root entity; returns the owning entity and the
/// relation field named by the last segment.
fn resolve_relation<'a>(
    registry: &'a MappingRegistry,
    root: &'a EntityDef,
    path: &str,
) -> Result<(&'a EntityDef, &'a FieldDef), MapError> {
    let mut current = root;
    let mut resolved = None;
    for seg in path.split('.') {
        let field = current
            .field(seg)
            .filter(|f| matches!(f.kind, FieldKind::Relation { .. }))
            .ok_or_else(|| MapError::UnknownInclude {
                entity: current.name.clone(),
                path: path.to_string(),
            })?;
        let target = field.relation_target().unwrap_or_default();
        resolved = Some((current, field));
        current = registry.entity(target)?.as_ref();
    }
    resolved.ok_or_else(|| MapError::UnknownInclude {
        entity: root.name.clone(),
        path: path.to_string(),
    })
}

/// Single-row INSERT over the given column split; absent item fields bind null.
pub fn insert_single(
    def: &EntityDef,
    columns: &[&ColumnField],
    item: &Value,
) -> Result<QueryBuf, MapError> {
    let mut params = Vec::with_capacity(columns.len());
    for c in columns {
        params.push(column_param(item, c)?);
    }
    let names: Vec<String> = columns.iter().map(|c| quote_ident(&c.column)).collect();
    let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
    Ok(QueryBuf {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(def.table_name()),
            names.join(", "),
            placeholders.join(", ")
        ),
        params,
    })
}

/// Multi-row INSERT: one statement carrying the whole batch, explicit nulls
/// preserved.
pub fn insert_bulk(
    def: &EntityDef,
    columns: &[&ColumnField],
    items: &[Value],
) -> Result<QueryBuf, MapError> {
    let mut params = Vec::with_capacity(columns.len() * items.len());
    for item in items {
        for c in columns {
            params.push(column_param(item, c)?);
        }
    }
    let names: Vec<String> = columns.iter().map(|c| quote_ident(&c.column)).collect();
    let row = format!(
        "({})",
        columns.iter().map(|_| "?").collect::<Vec<_>>().join(", ")
    );
    let rows: Vec<&str> = items.iter().map(|_| row.as_str()).collect();
    Ok(QueryBuf {
        sql: format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_ident(def.table_name()),
            names.join(", "),
            rows.join(", ")
        ),
        params,
    })
}

/// Single-row INSERT returning the store-assigned value of `identity`.
pub fn insert_returning(
    def: &EntityDef,
    columns: &[&ColumnField],
    identity: &ColumnField,
    item: &Value,
) -> Result<QueryBuf, MapError> {
    let mut q = insert_single(def, columns, item)?;
    q.sql.push_str(&format!(" RETURNING {}", quote_ident(&identity.column)));
    Ok(q)
}

/// UPDATE writing only the changed columns, seeking by primary key.
pub fn update_by_key(
    def: &EntityDef,
    changed: Vec<(String, BindValue)>,
    key: &[ColumnField],
    key_params: Vec<BindValue>,
    case_sensitive: bool,
) -> QueryBuf {
    let sets: Vec<String> = changed
        .iter()
        .map(|(col, _)| format!("{} = ?", quote_ident(col)))
        .collect();
    let mut params: Vec<BindValue> = changed.into_iter().map(|(_, v)| v).collect();
    params.extend(key_params);
    QueryBuf {
        sql: format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(def.table_name()),
            sets.join(", "),
            key_predicate(key, case_sensitive)
        ),
        params,
    }
}

/// DELETE seeking by primary key. Caller binds one value per key column.
pub fn delete_by_key(def: &EntityDef, key: &[ColumnField], case_sensitive: bool) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        quote_ident(def.table_name()),
        key_predicate(key, case_sensitive)
    )
}

fn column_param(item: &Value, c: &ColumnField) -> Result<BindValue, MapError> {
    match item.get(&c.field) {
        Some(v) => BindValue::for_column(v, c.ty, &c.column),
        None => Ok(BindValue::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ColumnType;
    use serde_json::json;

    fn def() -> EntityDef {
        EntityDef::with_table(
            "Widget",
            "Widgets",
            vec![
                crate::entity::FieldDef::identity("Id", ColumnType::Integer),
                crate::entity::FieldDef::column("Name", ColumnType::Text),
            ],
        )
    }

    fn name_col() -> ColumnField {
        ColumnField {
            field: "Name".into(),
            column: "Name".into(),
            ty: ColumnType::Text,
        }
    }

    fn id_col() -> ColumnField {
        ColumnField {
            field: "Id".into(),
            column: "Id".into(),
            ty: ColumnType::Integer,
        }
    }

    #[test]
    fn select_by_key_collation() {
        let key = [id_col()];
        assert_eq!(
            select_by_key(&def(), "*", &key, true),
            r#"SELECT * FROM "Widgets" WHERE "Id" = ?"#
        );
        assert_eq!(
            select_by_key(&def(), "*", &key, false),
            r#"SELECT * FROM "Widgets" WHERE "Id" = ? COLLATE NOCASE"#
        );
    }

    #[test]
    fn bulk_insert_one_statement_per_batch() {
        let cols = [name_col()];
        let cols: Vec<&ColumnField> = cols.iter().collect();
        let q = insert_bulk(&def(), &cols, &[json!({"Name": "a"}), json!({"Name": null})]).unwrap();
        assert_eq!(q.sql, r#"INSERT INTO "Widgets" ("Name") VALUES (?), (?)"#);
        assert_eq!(q.params.len(), 2);
        assert!(matches!(q.params[1], BindValue::Null));
    }

    #[test]
    fn absent_field_binds_null() {
        let cols = [name_col()];
        let cols: Vec<&ColumnField> = cols.iter().collect();
        let q = insert_single(&def(), &cols, &json!({})).unwrap();
        assert!(matches!(q.params[0], BindValue::Null));
    }

    #[test]
    fn update_writes_only_changed_columns() {
        let q = update_by_key(
            &def(),
            vec![("Name".into(), BindValue::Text("x".into()))],
            &[id_col()],
            vec![BindValue::Integer(1)],
            true,
        );
        assert_eq!(q.sql, r#"UPDATE "Widgets" SET "Name" = ? WHERE "Id" = ?"#);
        assert_eq!(q.params.len(), 2);
    }
}
