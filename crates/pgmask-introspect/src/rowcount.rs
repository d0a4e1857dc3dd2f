use std::collections::HashMap;
use std::path::Path;

use sqlx::PgPool;

use crate::error::IntrospectError;
use crate::postgres::queries;

/// Per-table row count, the load-time verification artifact. Serialized as
/// a headerless 3-column CSV: `schema,table,count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowCount {
    pub schema: String,
    pub table: String,
    pub count: i64,
}

/// Count the rows of every non-system table, skipping excluded ones.
pub async fn table_row_counts(
    pool: &PgPool,
    schema_prefix: &str,
    exclude_tables: &[String],
) -> Result<Vec<RowCount>, IntrospectError> {
    let tables = queries::user_tables(pool).await?;

    let mut counts = Vec::new();
    for (schema, table) in tables {
        if is_excluded(&schema, &table, schema_prefix, exclude_tables) {
            continue;
        }
        let count = queries::count_rows(pool, &schema, &table).await?;
        counts.push(RowCount {
            schema,
            table,
            count,
        });
    }
    Ok(counts)
}

fn is_excluded(schema: &str, table: &str, prefix: &str, excludes: &[String]) -> bool {
    excludes.iter().any(|entry| {
        let Some((excluded_schema, excluded_table)) = entry.split_once('.') else {
            return false;
        };
        if !prefix.is_empty() && excluded_schema.starts_with(prefix) && excluded_table == table {
            return true;
        }
        excluded_schema == schema && excluded_table == table
    })
}

/// Write the row-count CSV.
pub fn write_row_counts(path: &Path, counts: &[RowCount]) -> Result<(), IntrospectError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in counts {
        writer.write_record([
            row.schema.as_str(),
            row.table.as_str(),
            &row.count.to_string(),
        ])?;
    }
    writer.flush().map_err(|err| IntrospectError::io(path, err))?;
    Ok(())
}

/// Read the row-count CSV. A record with a column count other than three is
/// a format error.
pub fn read_row_counts(path: &Path) -> Result<Vec<RowCount>, IntrospectError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut counts = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != 3 {
            return Err(IntrospectError::Format(format!(
                "{}:{}: expected 3 columns, found {}",
                path.display(),
                line + 1,
                record.len()
            )));
        }

        let count: i64 = record[2].parse().map_err(|_| {
            IntrospectError::Format(format!(
                "{}:{}: unparseable count '{}'",
                path.display(),
                line + 1,
                &record[2]
            ))
        })?;

        counts.push(RowCount {
            schema: record[0].to_string(),
            table: record[1].to_string(),
            count,
        });
    }
    Ok(counts)
}

/// Compare a row-count CSV against the live database. A mismatch is worth a
/// warning, not a failure: the processed copy may legitimately trail the
/// origin. Returns the number of mismatching tables.
pub async fn verify_row_counts(pool: &PgPool, path: &Path) -> Result<usize, IntrospectError> {
    let expected = read_row_counts(path)?;
    let actual = table_row_counts(pool, "", &[]).await?;

    let lookup: HashMap<(&str, &str), i64> = actual
        .iter()
        .map(|row| ((row.schema.as_str(), row.table.as_str()), row.count))
        .collect();

    let mut mismatches = 0;
    for row in &expected {
        let found = lookup
            .get(&(row.schema.as_str(), row.table.as_str()))
            .copied()
            .unwrap_or(0);
        if found != row.count {
            tracing::warn!(
                event = "row_count_mismatch",
                schema = %row.schema,
                table = %row.table,
                expected = row.count,
                actual = found,
            );
            mismatches += 1;
        }
    }
    Ok(mismatches)
}
