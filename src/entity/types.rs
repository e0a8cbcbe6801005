//! Declarative entity metadata: table name, column roles, joined relations.

use serde::{Deserialize, Serialize};

/// Declared storage type of a column. Drives row decoding, bind conversion,
/// and the coercing comparison used by diff updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Real,
    Boolean,
    Text,
    Uuid,
    Timestamp,
    Json,
}

impl ColumnType {
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Real => "real",
            ColumnType::Boolean => "boolean",
            ColumnType::Text => "text",
            ColumnType::Uuid => "uuid",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Json => "json",
        }
    }
}

/// Role of a field: stored column, store-assigned identity column, or joined relation.
/// Identity fields are stored columns for SELECT purposes but are excluded from
/// normal inserts and from diff updates.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum FieldKind {
    Column {
        /// Physical column name; defaults to the field name.
        #[serde(default)]
        column: Option<String>,
        #[serde(rename = "type")]
        ty: ColumnType,
    },
    Identity {
        #[serde(default)]
        column: Option<String>,
        #[serde(rename = "type")]
        ty: ColumnType,
    },
    Relation {
        /// Name of the related entity.
        target: String,
        /// Our column carrying the join value (the FK for a to-one relation).
        our_key: String,
        /// The related entity's column matched against `our_key`.
        their_key: String,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn column(name: &str, ty: ColumnType) -> Self {
        FieldDef {
            name: name.into(),
            kind: FieldKind::Column { column: None, ty },
        }
    }

    pub fn identity(name: &str, ty: ColumnType) -> Self {
        FieldDef {
            name: name.into(),
            kind: FieldKind::Identity { column: None, ty },
        }
    }

    pub fn relation(name: &str, target: &str, our_key: &str, their_key: &str) -> Self {
        FieldDef {
            name: name.into(),
            kind: FieldKind::Relation {
                target: target.into(),
                our_key: our_key.into(),
                their_key: their_key.into(),
            },
        }
    }

    /// Physical column name for stored kinds; None for relations.
    pub fn column_name(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Column { column, .. } | FieldKind::Identity { column, .. } => {
                Some(column.as_deref().unwrap_or(&self.name))
            }
            FieldKind::Relation { .. } => None,
        }
    }

    pub fn column_type(&self) -> Option<ColumnType> {
        match &self.kind {
            FieldKind::Column { ty, .. } | FieldKind::Identity { ty, .. } => Some(*ty),
            FieldKind::Relation { .. } => None,
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.kind, FieldKind::Identity { .. })
    }

    pub fn relation_target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Relation { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// One mapped entity: a table name (defaults to the entity name) and its fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    pub fn new(name: &str, fields: Vec<FieldDef>) -> Self {
        EntityDef {
            name: name.into(),
            table: None,
            fields,
        }
    }

    pub fn with_table(name: &str, table: &str, fields: Vec<FieldDef>) -> Self {
        EntityDef {
            name: name.into(),
            table: Some(table.into()),
            fields,
        }
    }

    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }

    /// Stored (column and identity) fields in declaration order.
    pub fn stored_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.column_name().is_some())
    }

    pub fn relation_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Relation { .. }))
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Stored field whose physical column matches `column` (identifiers are
    /// case-insensitive in the store).
    pub fn field_for_column(&self, column: &str) -> Option<&FieldDef> {
        self.stored_fields()
            .find(|f| f.column_name().is_some_and(|c| c.eq_ignore_ascii_case(column)))
    }
}
