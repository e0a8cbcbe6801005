//! Write coordinator: bulk/single insert with optional identity insertion,
//! diff-based update, and delete by primary key. Seek misses during update
//! and delete are reported through the returned index list, never as errors.

use crate::entity::MappingRegistry;
use crate::error::MapError;
use crate::schema::{ColumnField, TableSchema};
use crate::sql::{self, BindValue, QueryBuf};
use crate::value::{decode_cell, values_equal};
use serde_json::Value;
use sqlx::sqlite::SqliteConnection;

fn insert_columns(schema: &TableSchema, identity_insert: bool) -> Vec<&ColumnField> {
    let mut cols: Vec<&ColumnField> = schema.insertable.iter().collect();
    if identity_insert {
        cols.extend(schema.identity.iter());
    }
    cols
}

fn ensure_objects(entity: &str, items: &[Value]) -> Result<(), MapError> {
    for (index, item) in items.iter().enumerate() {
        if !item.is_object() {
            return Err(MapError::ItemShape {
                entity: entity.to_string(),
                index,
            });
        }
    }
    Ok(())
}

fn key_params(entity: &str, key: &[ColumnField], item: &Value) -> Result<Vec<BindValue>, MapError> {
    key.iter()
        .map(|f| {
            let v = item.get(&f.field).ok_or_else(|| MapError::MissingKey {
                entity: entity.to_string(),
                field: f.field.clone(),
            })?;
            BindValue::for_column(v, f.ty, &f.column)
        })
        .collect()
}

async fn execute(conn: &mut SqliteConnection, q: &QueryBuf) -> Result<u64, MapError> {
    tracing::debug!(sql = %q.sql, "write");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    Ok(query.execute(&mut *conn).await?.rows_affected())
}

/// Insert a batch. More than one item takes the bulk path: a single statement
/// carrying every row of the insertable (plus, when `identity_insert`,
/// identity) columns, explicit nulls preserved. Exactly one item takes the
/// row-at-a-time path. Both paths store identical rows for identical input.
pub async fn insert_many(
    conn: &mut SqliteConnection,
    registry: &MappingRegistry,
    entity: &str,
    items: &[Value],
    identity_insert: bool,
) -> Result<(), MapError> {
    if items.is_empty() {
        return Ok(());
    }
    ensure_objects(entity, items)?;
    let def = registry.entity(entity)?.clone();
    let schema = registry.table_schema(conn, entity).await?;
    let cols = insert_columns(&schema, identity_insert);
    let q = if items.len() > 1 {
        sql::insert_bulk(&def, &cols, items)?
    } else {
        sql::insert_single(&def, &cols, &items[0])?
    };
    execute(conn, &q).await?;
    Ok(())
}

/// Insert one item and return the store-assigned identity value, or null for
/// a table with no identity column.
pub async fn insert_one(
    conn: &mut SqliteConnection,
    registry: &MappingRegistry,
    entity: &str,
    item: &Value,
) -> Result<Value, MapError> {
    ensure_objects(entity, std::slice::from_ref(item))?;
    let def = registry.entity(entity)?.clone();
    let schema = registry.table_schema(conn, entity).await?;
    let cols = insert_columns(&schema, false);
    match schema.identity.first() {
        Some(id_col) => {
            let q = sql::insert_returning(&def, &cols, id_col, item)?;
            tracing::debug!(sql = %q.sql, "write");
            let mut query = sqlx::query(&q.sql);
            for p in &q.params {
                query = query.bind(p.clone());
            }
            let row = query.fetch_one(&mut *conn).await?;
            decode_cell(&row, &id_col.column, id_col.ty)
        }
        None => {
            let q = sql::insert_single(&def, &cols, item)?;
            execute(conn, &q).await?;
            Ok(Value::Null)
        }
    }
}

/// Diff-based batch update: seek each item's stored row by primary key,
/// compare every insertable column, and write only the columns that differ.
/// An item whose key matches no row is recorded in the returned index list;
/// an item with no differing column issues no UPDATE at all.
pub async fn update_many(
    conn: &mut SqliteConnection,
    registry: &MappingRegistry,
    entity: &str,
    items: &[Value],
    search_case_sensitive: bool,
    compare_case_sensitive: bool,
) -> Result<Vec<usize>, MapError> {
    ensure_objects(entity, items)?;
    let def = registry.entity(entity)?.clone();
    let schema = registry.table_schema(conn, entity).await?;
    let pk = registry.primary_key(conn, entity).await?;
    let projection = registry.projection(entity, None, None)?;
    let seek_sql = sql::select_by_key(&def, &projection, &pk.fields, search_case_sensitive);

    let mut not_found = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let keys = key_params(entity, &pk.fields, item)?;
        tracing::debug!(sql = %seek_sql, "seek");
        let mut query = sqlx::query(&seek_sql);
        for p in keys.clone() {
            query = query.bind(p);
        }
        let Some(row) = query.fetch_optional(&mut *conn).await? else {
            not_found.push(i);
            continue;
        };

        let mut changed = Vec::new();
        for c in &schema.insertable {
            let stored = decode_cell(&row, &c.column, c.ty)?;
            let incoming = item.get(&c.field).cloned().unwrap_or(Value::Null);
            if !values_equal(&stored, &incoming, c.ty, compare_case_sensitive) {
                changed.push((c.column.clone(), BindValue::for_column(&incoming, c.ty, &c.column)?));
            }
        }
        if changed.is_empty() {
            continue;
        }
        let q = sql::update_by_key(&def, changed, &pk.fields, keys, search_case_sensitive);
        execute(conn, &q).await?;
    }
    Ok(not_found)
}

/// Batch delete by primary key; misses are recorded in the returned index
/// list in input order.
pub async fn delete_many(
    conn: &mut SqliteConnection,
    registry: &MappingRegistry,
    entity: &str,
    items: &[Value],
    case_sensitive: bool,
) -> Result<Vec<usize>, MapError> {
    ensure_objects(entity, items)?;
    let def = registry.entity(entity)?.clone();
    let pk = registry.primary_key(conn, entity).await?;
    let delete_sql = sql::delete_by_key(&def, &pk.fields, case_sensitive);

    let mut not_found = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let keys = key_params(entity, &pk.fields, item)?;
        tracing::debug!(sql = %delete_sql, "delete");
        let mut query = sqlx::query(&delete_sql);
        for p in keys {
            query = query.bind(p);
        }
        if query.execute(&mut *conn).await?.rows_affected() == 0 {
            not_found.push(i);
        }
    }
    Ok(not_found)
}
