//! Result streamer: execute a SELECT and lazily yield parsed object graphs,
//! silently skipping rows whose root object came back entirely null.

use crate::entity::MappingRegistry;
use crate::error::MapError;
use crate::sql::{self, quote_ident, BindValue};
use async_stream::try_stream;
use serde_json::Value;
use sqlx::sqlite::SqlitePool;
use tokio_stream::{Stream, StreamExt};

/// Lazy, single-pass sequence of object graphs for `sql`. The cursor lives for
/// the life of the stream and is released when the stream is dropped, on every
/// exit path.
pub fn fetch_graphs<'a>(
    registry: &'a MappingRegistry,
    pool: &'a SqlitePool,
    entity: &'a str,
    sql: &'a str,
    params: &'a [Value],
    includes: &'a [&'a str],
) -> impl Stream<Item = Result<Value, MapError>> + 'a {
    try_stream! {
        let parser = registry.parser_for(entity, includes)?;
        tracing::debug!(sql = %sql, params = ?params, "query");
        let mut conn = pool.acquire().await?;
        let mut query = sqlx::query(sql);
        for p in params {
            query = query.bind(BindValue::from_json(p));
        }
        let mut rows = query.fetch(&mut *conn);
        while let Some(row) = rows.next().await {
            let row = row?;
            let mut nulls = 0usize;
            let (value, all_null) = parser(&row, "", &mut nulls)?;
            if !all_null {
                yield value;
            }
        }
    }
}

/// Eager variant of [`fetch_graphs`].
pub async fn fetch_all_graphs(
    registry: &MappingRegistry,
    pool: &SqlitePool,
    entity: &str,
    sql: &str,
    params: &[Value],
    includes: &[&str],
) -> Result<Vec<Value>, MapError> {
    let stream = fetch_graphs(registry, pool, entity, sql, params, includes);
    tokio::pin!(stream);
    let mut out = Vec::new();
    while let Some(item) = stream.next().await {
        out.push(item?);
    }
    Ok(out)
}

/// Fetch one entity by primary key, with the requested relations populated.
/// Key values are given in discovered key order. Returns None on a seek miss
/// or when the stored row is entirely null.
pub async fn fetch_by_key(
    registry: &MappingRegistry,
    pool: &SqlitePool,
    entity: &str,
    key: &[Value],
    includes: &[&str],
) -> Result<Option<Value>, MapError> {
    let mut conn = pool.acquire().await?;
    let pk = registry.primary_key(&mut conn, entity).await?;
    let def = registry.entity(entity)?.clone();
    if key.len() != pk.fields.len() {
        return Err(MapError::MissingKey {
            entity: entity.to_string(),
            field: pk
                .fields
                .get(key.len())
                .map(|f| f.field.clone())
                .unwrap_or_default(),
        });
    }

    let base = sql::select_with_includes(registry, entity, includes)?;
    let predicate = pk
        .fields
        .iter()
        .map(|f| {
            format!(
                "{}.{} = ?",
                quote_ident(def.table_name()),
                quote_ident(&f.column)
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ");
    let sql_text = format!("{} WHERE {}", base, predicate);

    tracing::debug!(sql = %sql_text, "query");
    let mut query = sqlx::query(&sql_text);
    for (f, v) in pk.fields.iter().zip(key) {
        query = query.bind(BindValue::for_column(v, f.ty, &f.column)?);
    }
    let Some(row) = query.fetch_optional(&mut *conn).await? else {
        return Ok(None);
    };

    let parser = registry.parser_for(entity, includes)?;
    let mut nulls = 0usize;
    let (value, all_null) = parser(&row, "", &mut nulls)?;
    Ok(if all_null { None } else { Some(value) })
}
