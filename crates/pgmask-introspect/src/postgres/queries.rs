use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::error::IntrospectError;

// The information schema exposes domain types (sql_identifier, yes_or_no,
// cardinal_number); the casts pin every column to a builtin wire type.
const COLUMN_FIELDS: &str = "select table_schema::text, table_name::text, column_name::text, \
     data_type::text, ordinal_position::int4, is_nullable::text \
     from information_schema.columns";

/// One column row from the information schema.
#[derive(Debug, Clone)]
pub struct RawColumn {
    pub table_schema: String,
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub ordinal_position: i32,
    pub is_nullable: bool,
}

/// A foreign-key edge between two columns.
#[derive(Debug, Clone)]
pub struct RawForeignKey {
    pub table_schema: String,
    pub table_name: String,
    pub column_name: String,
    pub foreign_table_schema: String,
    pub foreign_table_name: String,
    pub foreign_column_name: String,
}

pub async fn database_name(pool: &PgPool) -> Result<String, IntrospectError> {
    let name: String = sqlx::query_scalar("select current_database()::text")
        .fetch_one(pool)
        .await?;
    Ok(name)
}

/// Columns for a single schema.
pub async fn schema_columns(pool: &PgPool, schema: &str) -> Result<Vec<RawColumn>, IntrospectError> {
    let rows = sqlx::query(&format!(
        "{COLUMN_FIELDS} where table_schema = $1 \
         order by table_schema, table_name, ordinal_position"
    ))
    .bind(schema)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_column).collect()
}

/// Columns for one schema sampled by prefix. Shards are assumed uniform, so
/// a single matching schema serves as the map for all of them.
pub async fn schema_columns_like(
    pool: &PgPool,
    prefix: &str,
) -> Result<Vec<RawColumn>, IntrospectError> {
    let selected: Option<String> = sqlx::query_scalar(
        "select table_schema::text from information_schema.columns \
         where table_schema like $1 limit 1",
    )
    .bind(format!("{prefix}%"))
    .fetch_optional(pool)
    .await?;

    match selected {
        Some(schema) => schema_columns(pool, &schema).await,
        None => {
            tracing::warn!(event = "no_schema_for_prefix", prefix);
            Ok(Vec::new())
        }
    }
}

/// Every foreign-key edge in the database, one row per referencing column.
pub async fn foreign_keys(pool: &PgPool) -> Result<Vec<RawForeignKey>, IntrospectError> {
    let rows = sqlx::query(
        "select
           tc.table_schema::text,
           tc.table_name::text,
           kcu.column_name::text,
           ccu.table_schema::text as foreign_table_schema,
           ccu.table_name::text as foreign_table_name,
           ccu.column_name::text as foreign_column_name
         from information_schema.table_constraints tc
         join information_schema.key_column_usage kcu
           on kcu.constraint_name = tc.constraint_name
          and kcu.table_schema = tc.table_schema
         join information_schema.constraint_column_usage ccu
           on ccu.constraint_name = tc.constraint_name
          and ccu.constraint_schema = tc.constraint_schema
         where tc.constraint_type = 'FOREIGN KEY'",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(RawForeignKey {
                table_schema: row.try_get("table_schema")?,
                table_name: row.try_get("table_name")?,
                column_name: row.try_get("column_name")?,
                foreign_table_schema: row.try_get("foreign_table_schema")?,
                foreign_table_name: row.try_get("foreign_table_name")?,
                foreign_column_name: row.try_get("foreign_column_name")?,
            })
        })
        .collect()
}

/// Non-system `(schema, table)` pairs for row counting.
pub async fn user_tables(pool: &PgPool) -> Result<Vec<(String, String)>, IntrospectError> {
    let rows = sqlx::query(
        "select schemaname::text, tablename::text
         from pg_catalog.pg_tables
         where schemaname not like 'pg_%'
           and schemaname != 'information_schema'
         order by schemaname, tablename",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| Ok((row.try_get("schemaname")?, row.try_get("tablename")?)))
        .collect()
}

/// Exact row count for one table. Identifiers come from the catalog, so
/// quoting them is enough.
pub async fn count_rows(pool: &PgPool, schema: &str, table: &str) -> Result<i64, IntrospectError> {
    let count: i64 =
        sqlx::query_scalar(&format!("select count(*) from \"{schema}\".\"{table}\""))
            .fetch_one(pool)
            .await?;
    Ok(count)
}

fn map_column(row: &PgRow) -> Result<RawColumn, IntrospectError> {
    Ok(RawColumn {
        table_schema: row.try_get("table_schema")?,
        table_name: row.try_get("table_name")?,
        column_name: row.try_get("column_name")?,
        data_type: row.try_get("data_type")?,
        ordinal_position: row.try_get("ordinal_position")?,
        is_nullable: row.try_get::<String, _>("is_nullable")? == "YES",
    })
}
