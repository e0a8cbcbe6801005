//! Column-list fragments for SELECT statements, with aliasing for joined
//! copies of a table and dot-qualified output names for nested result columns.

use crate::entity::EntityDef;
use crate::sql::quote_ident;

/// `<tableOrAlias>."Col"` for every stored column, optionally suffixed with
/// `AS "prefix.Col"` so one flat row can carry columns for several nested
/// objects without name collisions.
pub(crate) fn project_columns(
    def: &EntityDef,
    alias: Option<&str>,
    prefix: Option<&str>,
) -> String {
    let source = alias.unwrap_or_else(|| def.table_name());
    def.stored_fields()
        .filter_map(|f| f.column_name())
        .map(|col| {
            let expr = format!("{}.{}", quote_ident(source), quote_ident(col));
            match prefix {
                Some(p) => format!("{} AS {}", expr, quote_ident(&format!("{}.{}", p, col))),
                None => expr,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
