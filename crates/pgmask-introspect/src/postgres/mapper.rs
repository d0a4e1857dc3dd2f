use pgmask_core::{ColumnMap, DbMap, ProcessorDefinition};

use crate::options::IntrospectOptions;
use crate::postgres::queries::{RawColumn, RawForeignKey};

/// Fold raw catalog rows into the map. Columns already present are left
/// untouched so a regenerated skeleton never clobbers hand-tuned rules.
pub fn merge_columns(
    map: &mut DbMap,
    raw_columns: Vec<RawColumn>,
    foreign_keys: &[RawForeignKey],
    prefix_present: bool,
    opts: &IntrospectOptions,
) {
    for raw in raw_columns {
        let recorded_schema = if prefix_present {
            format!("{}*", opts.schema_prefix)
        } else {
            raw.table_schema.clone()
        };

        let schema_table = format!("{}.{}", recorded_schema, raw.table_name);
        if opts.exclude_tables.contains(&schema_table) {
            continue;
        }

        if find_column(&map.column_maps, &recorded_schema, &raw).is_some() {
            continue;
        }

        map.column_maps
            .push(new_column(recorded_schema, &raw, foreign_keys));
    }
}

// Match on the recorded schema, table, column, and data type; the ordinal
// position is informational and takes no part in identity.
fn find_column<'a>(
    columns: &'a [ColumnMap],
    recorded_schema: &str,
    raw: &RawColumn,
) -> Option<&'a ColumnMap> {
    columns.iter().find(|cmap| {
        cmap.column_name == raw.column_name
            && cmap.table_name == raw.table_name
            && cmap.table_schema == recorded_schema
            && cmap.data_type == raw.data_type
    })
}

fn new_column(recorded_schema: String, raw: &RawColumn, foreign_keys: &[RawForeignKey]) -> ColumnMap {
    let mut cmap = ColumnMap {
        table_schema: recorded_schema,
        table_name: raw.table_name.clone(),
        column_name: raw.column_name.clone(),
        data_type: raw.data_type.clone(),
        ordinal_position: raw.ordinal_position,
        is_nullable: raw.is_nullable,
        processors: vec![ProcessorDefinition::named("Identity")],
        ..ColumnMap::default()
    };

    // Prefer an edge registered under the column's own schema; sharded
    // schemas fall back to a table+column match.
    let edge = foreign_keys
        .iter()
        .find(|fk| {
            fk.table_schema == raw.table_schema
                && fk.table_name == raw.table_name
                && fk.column_name == raw.column_name
        })
        .or_else(|| {
            foreign_keys
                .iter()
                .find(|fk| fk.table_name == raw.table_name && fk.column_name == raw.column_name)
        });

    if let Some(edge) = edge {
        cmap.parent_schema = edge.foreign_table_schema.clone();
        cmap.parent_table = edge.foreign_table_name.clone();
        cmap.parent_column = edge.foreign_column_name.clone();
    }

    cmap
}
