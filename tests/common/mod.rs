//! Shared fixtures: in-memory store, entity definitions, DDL.

use rowgraph::{ColumnType, EntityDef, FieldDef, MappingRegistry};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub async fn pool() -> SqlitePool {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool")
}

pub fn defs() -> Vec<EntityDef> {
    vec![
        EntityDef::with_table(
            "Widget",
            "Widgets",
            vec![
                FieldDef::identity("Id", ColumnType::Integer),
                FieldDef::column("Name", ColumnType::Text),
                FieldDef::column("ParentId", ColumnType::Integer),
                FieldDef::relation("Parent", "Widget", "ParentId", "Id"),
            ],
        ),
        EntityDef::with_table(
            "Gadget",
            "Gadgets",
            vec![
                FieldDef::identity("Id", ColumnType::Integer),
                FieldDef::column("Name", ColumnType::Text),
                FieldDef::column("Price", ColumnType::Real),
                FieldDef::column("Active", ColumnType::Boolean),
                FieldDef::column("Tag", ColumnType::Uuid),
                FieldDef::column("Meta", ColumnType::Json),
            ],
        ),
        EntityDef::with_table(
            "Tag",
            "Tags",
            vec![
                FieldDef::column("Code", ColumnType::Text),
                FieldDef::column("Label", ColumnType::Text),
            ],
        ),
        EntityDef::with_table(
            "Note",
            "Notes",
            vec![
                FieldDef::column("Body", ColumnType::Text),
                FieldDef::column("Kind", ColumnType::Text),
            ],
        ),
    ]
}

pub fn registry() -> MappingRegistry {
    MappingRegistry::new(defs()).expect("valid definitions")
}

pub async fn create_tables(pool: &SqlitePool) {
    for ddl in [
        "CREATE TABLE Widgets (Id INTEGER PRIMARY KEY, Name TEXT, ParentId INTEGER)",
        "CREATE TABLE Gadgets (Id INTEGER PRIMARY KEY, Name TEXT, Price REAL, Active BOOLEAN, Tag TEXT, Meta TEXT)",
        "CREATE TABLE Tags (Code TEXT PRIMARY KEY, Label TEXT)",
        "CREATE TABLE Notes (Body TEXT, Kind TEXT)",
    ] {
        sqlx::query(ddl).execute(pool).await.expect("ddl");
    }
}
