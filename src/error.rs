//! Typed errors for entity definitions, schema discovery, and store access.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EntityError {
    #[error("duplicate entity '{0}'")]
    DuplicateEntity(String),
    #[error("entity '{0}' declares no fields")]
    EmptyEntity(String),
    #[error("entity '{entity}': duplicate field '{field}'")]
    DuplicateField { entity: String, field: String },
    #[error("entity '{entity}': duplicate column '{column}'")]
    DuplicateColumn { entity: String, column: String },
    #[error("entity '{entity}': relation '{field}' targets unknown entity '{target}'")]
    UnknownRelationTarget {
        entity: String,
        field: String,
        target: String,
    },
    #[error("entity '{entity}': relation '{field}' joins on unknown column '{column}'")]
    UnknownJoinColumn {
        entity: String,
        field: String,
        column: String,
    },
    #[error("definitions load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum MapError {
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),
    #[error("entity '{entity}': include path '{path}' does not name a relation")]
    UnknownInclude { entity: String, path: String },
    #[error("table '{0}' not found in store")]
    MissingTable(String),
    #[error("table '{table}': {detail}")]
    Schema { table: String, detail: String },
    #[error("item missing primary key field '{field}' of entity '{entity}'")]
    MissingKey { entity: String, field: String },
    #[error("entity '{entity}': item {index} is not an object")]
    ItemShape { entity: String, index: usize },
    #[error("cannot convert {value} to {ty} for column '{column}'")]
    Conversion {
        column: String,
        ty: &'static str,
        value: String,
    },
    #[error("registry lock poisoned")]
    Lock,
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}
