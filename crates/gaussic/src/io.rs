//! Plain-text input and output: particle-ID files and spectrum tables.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use gaussic_core::{write_spectrum_table, Real, SpectrumBin};

use crate::error::{CliError, Result};

/// Read a particle-ID file: one flattened base-grid cell index per line.
/// Blank lines are skipped.
pub fn read_id_file(path: &Path) -> Result<Vec<usize>> {
    let reader = BufReader::new(File::open(path)?);
    let mut ids = Vec::new();
    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let token = match line.split_whitespace().next() {
            Some(token) => token,
            None => continue,
        };
        let id = token.parse::<f64>().map_err(|_| {
            CliError::Config(format!(
                "{}:{}: unparseable particle id '{token}'",
                path.display(),
                line_number + 1
            ))
        })?;
        ids.push(id as usize);
    }
    tracing::info!(count = ids.len(), file = %path.display(), "read particle ids");
    Ok(ids)
}

/// Write a particle-ID file, one id per line.
pub fn write_id_file(path: &Path, ids: &[usize]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for id in ids {
        writeln!(writer, "{id}")?;
    }
    Ok(())
}

/// Write a measured spectrum as the five-column text table.
pub fn write_spectrum_file<T: Real>(path: &Path, bins: &[SpectrumBin<T>]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_spectrum_table(bins, &mut writer)?;
    tracing::info!(file = %path.display(), bins = bins.len(), "wrote power spectrum");
    Ok(())
}

/// Write a level's real-space field values as plain text, one per line.
pub fn write_grid_dump<T: Real>(path: &Path, values: &[T]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for value in values {
        writeln!(writer, "{:.10e}", value.as_f64())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("gaussic-io-test-{}-{name}", std::process::id()));
        path
    }

    #[test]
    fn test_id_file_round_trip() {
        let path = temp_path("ids");
        write_id_file(&path, &[3, 17, 4096]).unwrap();
        let ids = read_id_file(&path).unwrap();
        assert_eq!(ids, vec![3, 17, 4096]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_id_file_rejects_garbage() {
        let path = temp_path("bad-ids");
        std::fs::write(&path, "12\nnot-a-number\n").unwrap();
        assert!(read_id_file(&path).is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_id_file(Path::new("/nonexistent/ids.txt")).unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }
}
