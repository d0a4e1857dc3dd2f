use std::io::BufRead;
use std::path::Path;

use crossbeam_channel::Sender;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ProcessError;

/// Upper bound on the number of lines carried by one chunk.
pub const MAX_LINES_PER_CHUNK: usize = 100_000;

/// Token opening a data section.
pub const BEGIN_COPY_TOKEN: &str = "COPY ";
/// Token closing a data section.
pub const END_COPY_TOKEN: &str = "\\.";

/// Input lines between progress log events.
const PROGRESS_INTERVAL: u64 = 100_000;

static COPY_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^COPY (?P<schema>[A-Za-z_]+)\."?(?P<table>\w+)"? \((?P<columns>[^)]*)\) .*$"#)
        .expect("copy header pattern")
});

/// Lexical class of one dump line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Comment,
    BeginCopy,
    EndCopy,
    Blank,
    Data,
}

/// Classify a line of the dump. Only the COPY framing is recognized; any
/// other non-blank, non-comment line is data for the active section.
pub fn classify(line: &str) -> LineKind {
    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        LineKind::Blank
    } else if trimmed.starts_with("--") {
        LineKind::Comment
    } else if trimmed.starts_with(BEGIN_COPY_TOKEN) {
        LineKind::BeginCopy
    } else if trimmed.starts_with(END_COPY_TOKEN) {
        LineKind::EndCopy
    } else {
        LineKind::Data
    }
}

/// Schema, table, and column list extracted from a COPY header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CopyContext {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
}

/// Parse a COPY header line. The table name may be quoted when it is a
/// reserved word; columns are comma-then-space separated.
pub fn parse_copy_header(line: &str) -> Result<CopyContext, ProcessError> {
    let trimmed = line.trim_start();
    let caps = COPY_HEADER
        .captures(trimmed)
        .ok_or_else(|| ProcessError::CopyHeader(trimmed.trim_end().to_string()))?;

    let columns = caps["columns"]
        .split(", ")
        .map(|column| column.trim().to_string())
        .collect();

    Ok(CopyContext {
        schema: caps["schema"].to_string(),
        table: caps["table"].to_string(),
        columns,
    })
}

/// A bounded slice of the dump together with its COPY context.
///
/// `sub_chunk_index` is 0 outside of a data section and >= 1 inside one;
/// sub-chunks of a single section share one `chunk_index` and are ordered by
/// `sub_chunk_index`. `data_begins_at` is the first in-chunk line index that
/// is a data row; lines before it are copied verbatim.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub data: String,
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    pub chunk_index: usize,
    pub sub_chunk_index: usize,
    pub num_lines: usize,
    pub data_begins_at: usize,
    pub inclusive: bool,
}

impl Chunk {
    /// Partial-file name for this chunk. Zero padding makes lexicographic
    /// order equal `(chunk_index, sub_chunk_index)` order, which is what the
    /// merger sorts by.
    pub fn filename(&self) -> String {
        format!("{:06}.{:06}.part", self.chunk_index, self.sub_chunk_index)
    }
}

/// Slice the input into chunks of at most `max_lines` lines and push them
/// onto the queue, carrying the rolling COPY context across cuts.
///
/// A chunk is cut when an end-of-copy token is seen, when the line cap is
/// reached, or at end of input. Cap cuts inside a data section bump the
/// sub-chunk counter so the continuation inherits the context. Returns the
/// number of completed top-level chunks.
pub fn produce_chunks<R: BufRead>(
    mut reader: R,
    source: &Path,
    chunks: &Sender<Chunk>,
    inclusive: bool,
    max_lines: usize,
) -> Result<usize, ProcessError> {
    let mut schema = String::new();
    let mut table = String::new();
    let mut columns: Vec<String> = Vec::new();
    let mut chunk_index = 0usize;
    let mut sub_chunk_index = 0usize;
    let mut has_sub_chunk = false;
    let mut eof = false;
    let mut total_lines = 0u64;

    while !eof {
        let mut chunk = Chunk {
            chunk_index,
            sub_chunk_index,
            schema: schema.clone(),
            table: table.clone(),
            columns: columns.clone(),
            inclusive,
            ..Chunk::default()
        };

        let mut line_index = 0;
        while line_index < max_lines {
            let mut line = String::new();
            let read = reader
                .read_line(&mut line)
                .map_err(|err| ProcessError::io(source, err))?;
            if read == 0 {
                eof = true;
                break;
            }

            chunk.data.push_str(&line);
            total_lines += 1;
            if total_lines % PROGRESS_INTERVAL == 0 {
                tracing::info!(event = "progress", lines = total_lines);
            }

            let kind = classify(&line);
            if kind == LineKind::EndCopy {
                sub_chunk_index = 0;
                schema.clear();
                table.clear();
                columns.clear();
                has_sub_chunk = false;
                line_index += 1;
                break;
            }

            if kind == LineKind::BeginCopy {
                let header = parse_copy_header(&line)?;
                schema = header.schema;
                table = header.table;
                columns = header.columns;

                sub_chunk_index += 1;
                chunk.schema = schema.clone();
                chunk.table = table.clone();
                chunk.columns = columns.clone();
                chunk.data_begins_at = line_index + 1;
                chunk.sub_chunk_index = sub_chunk_index;
                has_sub_chunk = true;
            }

            // A cap cut inside a data section: the continuation chunk gets
            // the next sub-chunk number.
            if line_index == max_lines - 1 && has_sub_chunk {
                sub_chunk_index += 1;
            }
            line_index += 1;
        }

        chunk.num_lines = line_index;
        if chunk.num_lines > 0 {
            chunks.send(chunk).map_err(|_| ProcessError::QueueClosed)?;
            if sub_chunk_index == 0 {
                chunk_index += 1;
            }
        }
    }

    tracing::info!(event = "chunking_finished", chunks = chunk_index, lines = total_lines);
    Ok(chunk_index)
}
