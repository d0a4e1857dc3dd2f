use sqlx::PgPool;

use pgmask_core::DbMap;

use crate::error::IntrospectError;
use crate::options::IntrospectOptions;

pub(crate) mod mapper;
pub(crate) mod queries;

/// Build a column-map skeleton from live database metadata.
///
/// Every in-scope column not already present in `existing` is added with an
/// `Identity` processor and, when a foreign-key edge exists, its parent
/// triple; entries already in the map are preserved unchanged.
///
/// Scope is driven by the `(schema_prefix, schemas)` pair: with no prefix
/// the named schemas (default `public`) are introspected one by one; a
/// prefix that extends one of the named schemas samples a single matching
/// schema and records it as `prefix*`; a prefix with no schemas at all is a
/// configuration error.
pub async fn build_map_skeleton(
    pool: &PgPool,
    existing: Option<DbMap>,
    opts: &IntrospectOptions,
) -> Result<DbMap, IntrospectError> {
    if !opts.schema_prefix.is_empty() && opts.schemas.is_empty() {
        return Err(IntrospectError::Config(
            "schema-prefix requires a schema to map it to".to_string(),
        ));
    }

    let db_name = queries::database_name(pool).await?;
    let mut map = existing.unwrap_or_default();
    if map.db_name.is_empty() {
        map.db_name = db_name;
    }
    if map.schema_prefix.is_empty() {
        map.schema_prefix = opts.schema_prefix.clone();
    }

    let mut schemas = opts.schemas.clone();
    if schemas.is_empty() {
        schemas.push("public".to_string());
    }
    tracing::info!(event = "mapping_schemas", schemas = ?schemas);

    let foreign_keys = queries::foreign_keys(pool).await?;

    for schema in &schemas {
        let prefix_present =
            !opts.schema_prefix.is_empty() && opts.schema_prefix.starts_with(schema.as_str());
        let raw_columns = if prefix_present {
            queries::schema_columns_like(pool, &opts.schema_prefix).await?
        } else {
            queries::schema_columns(pool, schema).await?
        };

        tracing::info!(event = "schema_mapped", schema = %schema, columns = raw_columns.len());
        mapper::merge_columns(&mut map, raw_columns, &foreign_keys, prefix_present, opts);
    }

    Ok(map)
}
