//! rowgraph: metadata-driven mapping between SQLite rows and JSON object graphs.
//!
//! Entities are declared as runtime metadata (table name, column roles,
//! joined relations), validated into a [`MappingRegistry`], and driven
//! against the store through compiled row parsers, schema discovery, and
//! diff-based writes.

pub mod entity;
pub mod error;
pub mod parser;
pub mod query;
pub mod schema;
pub mod sql;
pub mod value;
pub mod write;

pub use entity::{ColumnType, EntityDef, FieldDef, FieldKind, MappingRegistry};
pub use error::{EntityError, MapError};
pub use parser::RowParser;
pub use query::{fetch_all_graphs, fetch_by_key, fetch_graphs};
pub use schema::{ColumnField, PrimaryKey, TableSchema};
pub use sql::{select_with_includes, BindValue, QueryBuf};
pub use write::{delete_many, insert_many, insert_one, update_many};
