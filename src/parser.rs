//! Row-parser compiler: builds, per (entity, include set), a reusable closure
//! that converts one flat row into an object graph, distinguishing "no related
//! row" from "related row with all-null columns".

use crate::entity::{ColumnType, EntityDef};
use crate::error::MapError;
use crate::value::decode_cell;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use std::collections::HashMap;
use std::sync::Arc;

/// Compiled parser: (row, column-name prefix, null counter) -> (object graph,
/// all-columns-were-null flag). The counter starts fresh per level; the flag
/// signals a semantically absent object (an unmatched outer join).
pub type RowParser =
    Arc<dyn Fn(&SqliteRow, &str, &mut usize) -> Result<(Value, bool), MapError> + Send + Sync>;

pub(crate) type ParserKey = (String, Vec<String>);

/// Canonical form of an include set: order-independent, duplicate-free.
pub(crate) fn canonical_includes(includes: &[&str]) -> Vec<String> {
    let mut v: Vec<String> = includes
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();
    v.sort();
    v.dedup();
    v
}

/// Build (or fetch) the parser for `def` under the given canonical include
/// set. Runs entirely under the caller-held cache lock, so concurrent first
/// builds for one key retain exactly one closure; recursion threads the same
/// map so sub-parsers are cached under their own keys without re-locking.
pub(crate) fn parser_under_lock(
    entities: &HashMap<String, Arc<EntityDef>>,
    def: &Arc<EntityDef>,
    includes: Vec<String>,
    cache: &mut HashMap<ParserKey, RowParser>,
) -> Result<RowParser, MapError> {
    let key = (def.name.clone(), includes.clone());
    if let Some(p) = cache.get(&key) {
        return Ok(p.clone());
    }

    let columns: Vec<(String, String, ColumnType)> = def
        .fields
        .iter()
        .filter_map(|f| {
            let col = f.column_name()?;
            let ty = f.column_type()?;
            Some((f.name.clone(), col.to_string(), ty))
        })
        .collect();

    // A relation is populated when the include set names it, exactly or as the
    // head of a deeper path. Relations not named stay at their zero value.
    let mut relations: Vec<(String, RowParser)> = Vec::new();
    for f in def.relation_fields() {
        let name = f.name.as_str();
        let included = includes
            .iter()
            .any(|p| p == name || p.strip_prefix(name).is_some_and(|r| r.starts_with('.')));
        if !included {
            continue;
        }
        let child_includes: Vec<String> = includes
            .iter()
            .filter_map(|p| p.strip_prefix(name)?.strip_prefix('.'))
            .map(str::to_string)
            .collect();
        let target = f.relation_target().unwrap_or_default();
        let child_def = entities
            .get(target)
            .ok_or_else(|| MapError::UnknownEntity(target.to_string()))?
            .clone();
        let child = parser_under_lock(entities, &child_def, child_includes, cache)?;
        relations.push((f.name.clone(), child));
    }

    let column_count = columns.len();
    let parser: RowParser = Arc::new(move |row, prefix, nulls| {
        let mut obj = Map::with_capacity(column_count + relations.len());
        let mut seen_null = 0usize;
        for (field, column, ty) in &columns {
            let name = format!("{}{}", prefix, column);
            let v = decode_cell(row, &name, *ty)?;
            if v.is_null() {
                seen_null += 1;
            }
            obj.insert(field.clone(), v);
        }
        for (field, child) in &relations {
            let child_prefix = format!("{}{}.", prefix, field);
            let mut child_nulls = 0usize;
            let (value, all_null) = child(row, &child_prefix, &mut child_nulls)?;
            obj.insert(field.clone(), if all_null { Value::Null } else { value });
        }
        *nulls += seen_null;
        // A level with no stored columns never reports itself absent.
        let all_null = column_count > 0 && seen_null == column_count;
        Ok((Value::Object(obj), all_null))
    });

    cache.insert(key, parser.clone());
    Ok(parser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_is_order_independent() {
        assert_eq!(
            canonical_includes(&["Parent.Parent", "Parent"]),
            canonical_includes(&["Parent", "Parent.Parent"])
        );
    }

    #[test]
    fn canonical_form_drops_duplicates_and_empties() {
        assert_eq!(canonical_includes(&["A", "", "A"]), vec!["A".to_string()]);
    }
}
