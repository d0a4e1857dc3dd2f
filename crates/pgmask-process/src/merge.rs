use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// SQL written before the first part so constraint checks stay out of the
/// way while the processed dump reloads.
const DISABLE_CONSTRAINTS: &str = "SET session_replication_role = 'replica';\n";
/// SQL restoring constraint checks at the end of the processed dump.
const ENABLE_CONSTRAINTS: &str = "SET session_replication_role = 'origin';\n";

use crate::error::ProcessError;

/// Reassemble the partial files into the destination dump.
///
/// Layout: optional preprocess injection, the replica-role statement, every
/// `*.part` file in lexicographic order, optional postprocess injection, the
/// origin-role statement. Each part is deleted only after it has been copied
/// into the destination.
pub fn merge_parts(
    work_dir: &Path,
    destination: &Path,
    preprocess: Option<&Path>,
    postprocess: Option<&Path>,
) -> Result<(), ProcessError> {
    tracing::info!(event = "merge_started", destination = %destination.display());

    let file = File::create(destination).map_err(|err| ProcessError::io(destination, err))?;
    let mut writer = BufWriter::new(file);

    if let Some(path) = preprocess {
        inject_file(path, &mut writer)?;
    }

    writer
        .write_all(DISABLE_CONSTRAINTS.as_bytes())
        .map_err(|err| ProcessError::io(destination, err))?;

    for path in part_files(work_dir)? {
        let part = File::open(&path).map_err(|err| ProcessError::io(&path, err))?;
        io::copy(&mut BufReader::new(part), &mut writer)
            .map_err(|err| ProcessError::io(&path, err))?;
        fs::remove_file(&path).map_err(|err| ProcessError::io(&path, err))?;
        tracing::debug!(event = "part_merged", file = %path.display());
    }

    if let Some(path) = postprocess {
        inject_file(path, &mut writer)?;
    }

    writer
        .write_all(ENABLE_CONSTRAINTS.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|err| ProcessError::io(destination, err))?;

    Ok(())
}

/// Partial files in the working directory, sorted by name. The zero-padded
/// naming scheme makes this the `(chunk_index, sub_chunk_index)` total
/// order.
pub fn part_files(work_dir: &Path) -> Result<Vec<PathBuf>, ProcessError> {
    let entries = fs::read_dir(work_dir).map_err(|err| ProcessError::io(work_dir, err))?;

    let mut parts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ProcessError::io(work_dir, err))?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "part") {
            parts.push(path);
        }
    }
    parts.sort();
    Ok(parts)
}

/// Copy an operator-supplied SQL file into the destination, framed by
/// comment tags naming the source so the injection is visible in the output.
pub fn inject_file<W: Write>(source: &Path, writer: &mut W) -> Result<(), ProcessError> {
    let file = File::open(source).map_err(|err| ProcessError::io(source, err))?;

    let start_tag = format!(
        "\n--\n-- Begin Gonymizer Injection from file: {}\n--\n\n",
        source.display()
    );
    writer
        .write_all(start_tag.as_bytes())
        .map_err(|err| ProcessError::io(source, err))?;

    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader
        .read_to_string(&mut contents)
        .map_err(|err| ProcessError::io(source, err))?;
    writer
        .write_all(contents.as_bytes())
        .map_err(|err| ProcessError::io(source, err))?;

    let end_tag = format!(
        "\n--\n-- End Gonymizer File Injection from file: {}\n--\n",
        source.display()
    );
    writer
        .write_all(end_tag.as_bytes())
        .map_err(|err| ProcessError::io(source, err))?;

    Ok(())
}
