//! Mapping registry: entity definitions plus every process-wide cache
//! (compiled parsers, projections, discovered schema and keys). Constructed
//! once and passed to every call; entries are never invalidated, the backing
//! schema is assumed fixed for the process lifetime.

use crate::entity::types::EntityDef;
use crate::entity::validator::validate;
use crate::error::{EntityError, MapError};
use crate::parser::{canonical_includes, parser_under_lock, ParserKey, RowParser};
use crate::schema::{self, PrimaryKey, TableSchema};
use crate::sql::project_columns;
use sqlx::sqlite::SqliteConnection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type ProjectionKey = (String, Option<String>, Option<String>);

pub struct MappingRegistry {
    entities: HashMap<String, Arc<EntityDef>>,
    parsers: Mutex<HashMap<ParserKey, RowParser>>,
    projections: Mutex<HashMap<ProjectionKey, String>>,
    // Discovery runs metadata queries; the async mutex is held across them so
    // concurrent first discoveries retain exactly one result per entity.
    schemas: tokio::sync::Mutex<HashMap<String, Arc<TableSchema>>>,
    keys: tokio::sync::Mutex<HashMap<String, Arc<PrimaryKey>>>,
}

impl std::fmt::Debug for MappingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingRegistry")
            .field("entities", &self.entities.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl MappingRegistry {
    pub fn new(defs: Vec<EntityDef>) -> Result<Self, EntityError> {
        validate(&defs)?;
        let entities = defs
            .into_iter()
            .map(|d| (d.name.clone(), Arc::new(d)))
            .collect();
        Ok(MappingRegistry {
            entities,
            parsers: Mutex::new(HashMap::new()),
            projections: Mutex::new(HashMap::new()),
            schemas: tokio::sync::Mutex::new(HashMap::new()),
            keys: tokio::sync::Mutex::new(HashMap::new()),
        })
    }

    /// Load definitions from a JSON array of entities.
    pub fn from_json(text: &str) -> Result<Self, EntityError> {
        let defs: Vec<EntityDef> =
            serde_json::from_str(text).map_err(|e| EntityError::Load(e.to_string()))?;
        Self::new(defs)
    }

    pub fn entity(&self, name: &str) -> Result<&Arc<EntityDef>, MapError> {
        self.entities
            .get(name)
            .ok_or_else(|| MapError::UnknownEntity(name.to_string()))
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Column-list fragment for SELECT, cached per (entity, alias, prefix).
    pub fn projection(
        &self,
        entity: &str,
        alias: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<String, MapError> {
        let def = self.entity(entity)?.clone();
        let key = (
            entity.to_string(),
            alias.map(str::to_string),
            prefix.map(str::to_string),
        );
        let mut cache = self.projections.lock().map_err(|_| MapError::Lock)?;
        if let Some(p) = cache.get(&key) {
            return Ok(p.clone());
        }
        let p = project_columns(&def, alias, prefix);
        cache.insert(key, p.clone());
        Ok(p)
    }

    /// Compiled parser for (entity, include set). Include sets with the same
    /// paths in any order share one cached closure; unknown paths are ignored
    /// the way an absent relation is.
    pub fn parser_for(&self, entity: &str, includes: &[&str]) -> Result<RowParser, MapError> {
        let def = self.entity(entity)?.clone();
        let canon = canonical_includes(includes);
        let mut cache = self.parsers.lock().map_err(|_| MapError::Lock)?;
        parser_under_lock(&self.entities, &def, canon, &mut cache)
    }

    /// Discovered insert/identity column split, once per entity.
    pub async fn table_schema(
        &self,
        conn: &mut SqliteConnection,
        entity: &str,
    ) -> Result<Arc<TableSchema>, MapError> {
        let def = self.entity(entity)?.clone();
        let mut cache = self.schemas.lock().await;
        if let Some(s) = cache.get(entity) {
            return Ok(s.clone());
        }
        let discovered = Arc::new(schema::discover_columns(conn, &def).await?);
        cache.insert(entity.to_string(), discovered.clone());
        Ok(discovered)
    }

    /// Discovered primary-key descriptor, once per entity.
    pub async fn primary_key(
        &self,
        conn: &mut SqliteConnection,
        entity: &str,
    ) -> Result<Arc<PrimaryKey>, MapError> {
        let def = self.entity(entity)?.clone();
        let mut cache = self.keys.lock().await;
        if let Some(k) = cache.get(entity) {
            return Ok(k.clone());
        }
        let discovered = Arc::new(schema::discover_primary_key(conn, &def).await?);
        cache.insert(entity.to_string(), discovered.clone());
        Ok(discovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFS: &str = r#"[{
        "name": "Widget",
        "table": "Widgets",
        "fields": [
            {"name": "Id", "role": "identity", "type": "integer"},
            {"name": "Name", "role": "column", "type": "text"},
            {"name": "ParentId", "role": "column", "type": "integer"},
            {"name": "Parent", "role": "relation", "target": "Widget",
             "our_key": "ParentId", "their_key": "Id"}
        ]
    }]"#;

    #[test]
    fn loads_definitions_from_json() {
        let registry = MappingRegistry::from_json(DEFS).unwrap();
        let def = registry.entity("Widget").unwrap();
        assert_eq!(def.table_name(), "Widgets");
        assert_eq!(def.stored_fields().count(), 3);
        assert!(def.field("Parent").unwrap().relation_target() == Some("Widget"));
    }

    #[test]
    fn rejects_invalid_definitions() {
        assert!(MappingRegistry::from_json("[]").is_ok());
        assert!(MappingRegistry::from_json("not json").is_err());
        let err = MappingRegistry::from_json(r#"[{"name": "X", "fields": []}]"#).unwrap_err();
        assert!(matches!(err, EntityError::EmptyEntity(_)));
    }

    #[test]
    fn unknown_entity_is_an_error() {
        let registry = MappingRegistry::from_json(DEFS).unwrap();
        assert!(matches!(
            registry.projection("Gizmo", None, None),
            Err(MapError::UnknownEntity(_))
        ));
    }

    #[test]
    fn projections_are_cached_per_alias_and_prefix() {
        let registry = MappingRegistry::from_json(DEFS).unwrap();
        let a = registry.projection("Widget", Some("p"), Some("p")).unwrap();
        let b = registry.projection("Widget", Some("p"), Some("p")).unwrap();
        assert_eq!(a, b);
        assert!(a.contains(r#""p"."Id" AS "p.Id""#));
    }
}
