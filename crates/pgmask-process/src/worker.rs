use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crossbeam_channel::Receiver;

use pgmask_core::{ColumnMap, ConsistencyCaches, DbMap, ProcessContext, Processor, chunk_rng};

use crate::chunk::{Chunk, classify, LineKind};
use crate::error::ProcessError;

/// The dump format's NULL sentinel. Never rewritten.
const NULL_SENTINEL: &str = "\\N";

/// Drain the chunk queue, rewriting each chunk into the partial file named
/// by its total order. Runs until the producer closes the queue.
///
/// Each chunk gets its own generator keyed by its position in the stream,
/// so the rewrite does not depend on which worker picks the chunk up.
pub fn run_worker(
    worker_index: usize,
    chunks: &Receiver<Chunk>,
    map: &DbMap,
    caches: &ConsistencyCaches,
    seed: i64,
    work_dir: &Path,
) -> Result<(), ProcessError> {
    tracing::info!(event = "worker_started", worker = worker_index);

    for chunk in chunks.iter() {
        let path = work_dir.join(chunk.filename());
        let file = File::create(&path).map_err(|err| ProcessError::io(&path, err))?;
        let mut writer = BufWriter::new(file);

        let mut rng = chunk_rng(seed, chunk.chunk_index, chunk.sub_chunk_index);
        let mut ctx = ProcessContext {
            rng: &mut rng,
            caches,
        };
        process_chunk(&chunk, map, &mut ctx, &mut writer)?;

        writer.flush().map_err(|err| ProcessError::io(&path, err))?;
        tracing::debug!(event = "chunk_written", file = %path.display());
    }

    Ok(())
}

/// Rewrite one chunk. Lines above `data_begins_at`, blank lines, the
/// end-of-copy token, and chunks with no COPY context pass through verbatim.
pub fn process_chunk<W: Write>(
    chunk: &Chunk,
    map: &DbMap,
    ctx: &mut ProcessContext<'_>,
    writer: &mut W,
) -> Result<(), ProcessError> {
    let cmaps = resolve_column_maps(map, chunk)?;

    for (index, line) in chunk.data.split_inclusive('\n').enumerate() {
        let passthrough = index < chunk.data_begins_at
            || chunk.columns.is_empty()
            || matches!(classify(line), LineKind::EndCopy | LineKind::Blank);

        if passthrough {
            writer
                .write_all(line.as_bytes())
                .map_err(|err| ProcessError::io(chunk.filename(), err))?;
            continue;
        }

        let output = process_row(&cmaps, line, ctx)?;
        writer
            .write_all(output.as_bytes())
            .map_err(|err| ProcessError::io(chunk.filename(), err))?;
    }

    Ok(())
}

/// Resolve the rewrite rule for each column of the chunk up front. In
/// inclusive mode a column missing from the map fails the run, naming the
/// column.
pub fn resolve_column_maps<'a>(
    map: &'a DbMap,
    chunk: &Chunk,
) -> Result<Vec<Option<&'a ColumnMap>>, ProcessError> {
    if chunk.columns.is_empty() {
        return Ok(Vec::new());
    }

    chunk
        .columns
        .iter()
        .map(|column| {
            let cmap = map.column_map(&chunk.schema, &chunk.table, column);
            if cmap.is_none() && chunk.inclusive {
                return Err(ProcessError::MissingColumn(format!(
                    "{}.{}.{}",
                    chunk.schema, chunk.table, column
                )));
            }
            Ok(cmap)
        })
        .collect()
}

/// Rewrite one data row: split on tab, process each field against its rule,
/// rejoin. Fields beyond the resolved column list pass through unchanged.
pub fn process_row(
    cmaps: &[Option<&ColumnMap>],
    line: &str,
    ctx: &mut ProcessContext<'_>,
) -> Result<String, ProcessError> {
    let values: Vec<&str> = line.split('\t').collect();
    let mut outputs = Vec::with_capacity(values.len());

    for (index, raw) in values.iter().enumerate() {
        let cmap = cmaps.get(index).copied().flatten();
        outputs.push(process_raw_value(raw, cmap, ctx)?);
    }

    Ok(outputs.join("\t"))
}

/// Rewrite one field. The trailing newline or tab is detached before
/// processing and reattached after, so processors see the bare value. The
/// NULL sentinel and unmapped columns pass through unchanged.
pub fn process_raw_value(
    raw: &str,
    cmap: Option<&ColumnMap>,
    ctx: &mut ProcessContext<'_>,
) -> Result<String, ProcessError> {
    let (value, terminator) = detach_terminator(raw);

    let Some(cmap) = cmap else {
        return Ok(raw.to_string());
    };
    if value == NULL_SENTINEL {
        return Ok(raw.to_string());
    }

    let mut output = value.to_string();
    for def in &cmap.processors {
        let processor = Processor::from_name(&def.name).ok_or_else(|| {
            pgmask_core::Error::InvalidMap(format!("unrecognized processor '{}'", def.name))
        })?;
        output = processor.apply(cmap, &output, ctx)?;
    }

    output.push_str(terminator);
    Ok(output)
}

fn detach_terminator(raw: &str) -> (&str, &str) {
    if let Some(value) = raw.strip_suffix('\n') {
        (value, "\n")
    } else if let Some(value) = raw.strip_suffix('\t') {
        (value, "\t")
    } else {
        (raw, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgmask_core::{ProcessorDefinition, chunk_rng};

    fn scrub_map() -> DbMap {
        DbMap {
            db_name: "appdb".to_string(),
            schema_prefix: String::new(),
            seed: 42,
            column_maps: vec![ColumnMap {
                table_schema: "public".to_string(),
                table_name: "t".to_string(),
                column_name: "foo".to_string(),
                processors: vec![ProcessorDefinition::named("ScrubString")],
                ..ColumnMap::default()
            }],
        }
    }

    fn with_context<T>(run: impl FnOnce(&mut ProcessContext<'_>) -> T) -> T {
        let caches = ConsistencyCaches::new();
        let mut rng = chunk_rng(42, 0, 0);
        let mut ctx = ProcessContext {
            rng: &mut rng,
            caches: &caches,
        };
        run(&mut ctx)
    }

    #[test]
    fn raw_value_keeps_trailing_newline() {
        let map = scrub_map();
        let cmap = map.column_map("public", "t", "foo");
        let out =
            with_context(|ctx| process_raw_value("abc\n", cmap, ctx)).unwrap();
        assert_eq!(out, "***\n");
    }

    #[test]
    fn raw_value_passes_null_sentinel() {
        let map = scrub_map();
        let cmap = map.column_map("public", "t", "foo");
        let out = with_context(|ctx| process_raw_value("\\N", cmap, ctx)).unwrap();
        assert_eq!(out, "\\N");
    }

    #[test]
    fn raw_value_passes_unmapped_columns() {
        let out = with_context(|ctx| process_raw_value("keep", None, ctx)).unwrap();
        assert_eq!(out, "keep");
    }

    #[test]
    fn row_processing_rewrites_each_mapped_field() {
        let map = scrub_map();
        let cmap = map.column_map("public", "t", "foo");
        let cmaps = vec![cmap, cmap];
        let out = with_context(|ctx| process_row(&cmaps, "aaa\tbbb\n", ctx)).unwrap();
        assert_eq!(out, "***\t***\n");
    }

    #[test]
    fn row_processing_passes_extra_fields() {
        let map = scrub_map();
        let cmaps = vec![map.column_map("public", "t", "foo")];
        let out = with_context(|ctx| process_row(&cmaps, "aaa\textra\n", ctx)).unwrap();
        assert_eq!(out, "***\textra\n");
    }

    #[test]
    fn processors_chain_left_to_right() {
        let cmap = ColumnMap {
            table_schema: "public".to_string(),
            table_name: "t".to_string(),
            column_name: "foo".to_string(),
            processors: vec![
                ProcessorDefinition::named("AlphaNumericScrambler"),
                ProcessorDefinition::named("ScrubString"),
            ],
            ..ColumnMap::default()
        };
        // The scrub consumes the scramble's output, so length is preserved.
        let out = with_context(|ctx| process_raw_value("abc12", Some(&cmap), ctx)).unwrap();
        assert_eq!(out, "*****");
    }

    #[test]
    fn inclusive_chunk_fails_on_missing_column() {
        let map = scrub_map();
        let chunk = Chunk {
            schema: "public".to_string(),
            table: "t".to_string(),
            columns: vec!["bar".to_string()],
            inclusive: true,
            ..Chunk::default()
        };
        let err = resolve_column_maps(&map, &chunk).unwrap_err();
        assert!(err.to_string().contains("public.t.bar"));
    }

    #[test]
    fn non_inclusive_chunk_tolerates_missing_columns() {
        let map = scrub_map();
        let chunk = Chunk {
            schema: "public".to_string(),
            table: "t".to_string(),
            columns: vec!["bar".to_string(), "foo".to_string()],
            inclusive: false,
            ..Chunk::default()
        };
        let cmaps = resolve_column_maps(&map, &chunk).unwrap();
        assert!(cmaps[0].is_none());
        assert!(cmaps[1].is_some());
    }

    #[test]
    fn chunk_passthrough_above_data_and_framing() {
        let map = scrub_map();
        let chunk = Chunk {
            data: "COPY public.t (foo) FROM stdin;\nabc\n   \n\\.\n".to_string(),
            schema: "public".to_string(),
            table: "t".to_string(),
            columns: vec!["foo".to_string()],
            data_begins_at: 1,
            sub_chunk_index: 1,
            ..Chunk::default()
        };

        let mut out = Vec::new();
        with_context(|ctx| process_chunk(&chunk, &map, ctx, &mut out)).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "COPY public.t (foo) FROM stdin;\n***\n   \n\\.\n"
        );
    }

    #[test]
    fn continuation_chunk_processes_from_line_zero() {
        let map = scrub_map();
        let chunk = Chunk {
            data: "aaa\tbbb\nccc\tddd\n".to_string(),
            schema: "public".to_string(),
            table: "t".to_string(),
            columns: vec!["foo".to_string(), "foo".to_string()],
            sub_chunk_index: 2,
            data_begins_at: 0,
            ..Chunk::default()
        };

        let mut out = Vec::new();
        with_context(|ctx| process_chunk(&chunk, &map, ctx, &mut out)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "***\t***\n***\t***\n");
    }

    #[test]
    fn chunk_without_context_is_verbatim() {
        let map = scrub_map();
        let chunk = Chunk {
            data: "-- comment\nanything goes here\n".to_string(),
            ..Chunk::default()
        };

        let mut out = Vec::new();
        with_context(|ctx| process_chunk(&chunk, &map, ctx, &mut out)).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "-- comment\nanything goes here\n"
        );
    }
}
