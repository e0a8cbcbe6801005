//! Schema catalog: discover a table's columns, identity split, and primary key
//! from the store's metadata surface (PRAGMA table_info / index_list,
//! sqlite_master).

use crate::entity::{ColumnType, EntityDef};
use crate::error::MapError;
use crate::sql::{project_columns, quote_ident};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

/// A stored column resolved against the store: entity field name, physical
/// column, declared type.
#[derive(Clone, Debug)]
pub struct ColumnField {
    pub field: String,
    pub column: String,
    pub ty: ColumnType,
}

/// Discovered table shape: the insert column split plus a zero-row SELECT
/// template over all stored columns.
#[derive(Clone, Debug)]
pub struct TableSchema {
    pub insertable: Vec<ColumnField>,
    pub identity: Vec<ColumnField>,
    pub select_zero: String,
}

/// Discovered primary key: accessors ordered by the column's position within
/// the backing unique index, plus that index's name.
#[derive(Clone, Debug)]
pub struct PrimaryKey {
    pub fields: Vec<ColumnField>,
    pub index_name: String,
}

struct TableInfoRow {
    name: String,
    decl_type: String,
    pk: i64,
}

async fn table_info(
    conn: &mut SqliteConnection,
    table: &str,
) -> Result<Vec<TableInfoRow>, MapError> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    tracing::debug!(sql = %sql, "schema discovery");
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    if rows.is_empty() {
        return Err(MapError::MissingTable(table.to_string()));
    }
    rows.iter()
        .map(|r| {
            Ok(TableInfoRow {
                name: r.try_get::<String, _>("name")?,
                decl_type: r.try_get::<String, _>("type")?,
                pk: r.try_get::<i64, _>("pk")?,
            })
        })
        .collect()
}

/// The store auto-assigns a value exactly when the primary key is a single
/// INTEGER column (the rowid alias); AUTOINCREMENT is not required.
fn store_reports_identity(info: &[TableInfoRow], row: &TableInfoRow) -> bool {
    row.pk == 1
        && info.iter().filter(|r| r.pk > 0).count() == 1
        && row.decl_type.to_ascii_uppercase().contains("INT")
}

fn resolve_column(def: &EntityDef, table: &str, row: &TableInfoRow) -> Result<Option<ColumnField>, MapError> {
    let Some(field) = def.field_for_column(&row.name) else {
        // Stored columns the entity does not declare are simply not mapped.
        return Ok(None);
    };
    let ty = field.column_type().ok_or_else(|| MapError::Schema {
        table: table.to_string(),
        detail: format!("column '{}' maps to a relation field", row.name),
    })?;
    Ok(Some(ColumnField {
        field: field.name.clone(),
        column: row.name.clone(),
        ty,
    }))
}

/// Classify each mapped column as identity (store-assigned, or declared so)
/// or insertable, and render the zero-row SELECT template.
pub(crate) async fn discover_columns(
    conn: &mut SqliteConnection,
    def: &EntityDef,
) -> Result<TableSchema, MapError> {
    let table = def.table_name();
    let info = table_info(conn, table).await?;

    let mut insertable = Vec::new();
    let mut identity = Vec::new();
    for row in &info {
        let Some(col) = resolve_column(def, table, row)? else {
            continue;
        };
        let declared_identity = def
            .field_for_column(&row.name)
            .is_some_and(|f| f.is_identity());
        if store_reports_identity(&info, row) || declared_identity {
            identity.push(col);
        } else {
            insertable.push(col);
        }
    }

    for f in def.stored_fields() {
        let col = f.column_name().unwrap_or_default();
        if !info.iter().any(|r| r.name.eq_ignore_ascii_case(col)) {
            return Err(MapError::Schema {
                table: table.to_string(),
                detail: format!("declared column '{}' not found", col),
            });
        }
    }

    let select_zero = format!(
        "SELECT {} FROM {} WHERE 1 = 0",
        project_columns(def, None, None),
        quote_ident(table)
    );
    Ok(TableSchema {
        insertable,
        identity,
        select_zero,
    })
}

/// Primary-key accessors in index-ordinal order, plus the backing index name.
/// A rowid-alias key has no index in `PRAGMA index_list`; its descriptor gets
/// a synthesized `pk_<table>` name.
pub(crate) async fn discover_primary_key(
    conn: &mut SqliteConnection,
    def: &EntityDef,
) -> Result<PrimaryKey, MapError> {
    let table = def.table_name();
    let info = table_info(conn, table).await?;

    let mut key_rows: Vec<&TableInfoRow> = info.iter().filter(|r| r.pk > 0).collect();
    if key_rows.is_empty() {
        return Err(MapError::Schema {
            table: table.to_string(),
            detail: "no primary key".into(),
        });
    }
    key_rows.sort_by_key(|r| r.pk);

    let mut fields = Vec::with_capacity(key_rows.len());
    for row in key_rows {
        let col = resolve_column(def, table, row)?.ok_or_else(|| MapError::Schema {
            table: table.to_string(),
            detail: format!("key column '{}' is not mapped", row.name),
        })?;
        fields.push(col);
    }

    let sql = format!("PRAGMA index_list({})", quote_ident(table));
    tracing::debug!(sql = %sql, "schema discovery");
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    let mut index_name = None;
    for r in &rows {
        if r.try_get::<String, _>("origin")? == "pk" {
            index_name = Some(r.try_get::<String, _>("name")?);
            break;
        }
    }

    Ok(PrimaryKey {
        fields,
        index_name: index_name.unwrap_or_else(|| format!("pk_{}", table)),
    })
}
