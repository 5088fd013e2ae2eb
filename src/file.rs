// src/file.rs

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use crate::csv::write_row;
use crate::error::Result;
use crate::merge::{self, COLUMNS};
use crate::model::EnrichedRecord;

/// Create the directory (and parents) if missing.
pub fn ensure_directory(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Dump `records` with a header row to `path`, separated by `sep`.
/// Returns whether a file was written; an empty dataset writes nothing.
pub fn export_dataset(path: &Path, records: &[EnrichedRecord], sep: char) -> Result<bool> {
    if records.is_empty() {
        logf!("Nothing to export for {}", path.display());
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let mut w = BufWriter::new(File::create(path)?);
    write_row(&mut w, &COLUMNS, sep)?;
    for r in records {
        write_row(&mut w, &merge::to_fields(r), sep)?;
    }
    w.flush()?;
    logf!("Exported {} rows to {}", records.len(), path.display());
    Ok(true)
}
