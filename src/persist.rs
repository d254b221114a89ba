//! Result archives: named arrays in a NumPy `.npz` container, published atomically.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::{Array1, ArrayView1};
use ndarray_npy::{NpzReader, NpzWriter};

use crate::error::{Result, ScanError};

/// Writes `records` to `dir/file_name` without ever exposing a partial file under that name.
///
/// The archive is assembled in the hidden sibling `.file_name` and renamed
/// once every record is flushed to disk. On failure the hidden file is left
/// behind and the final name is not created.
pub fn write_atomic(dir: &Path, file_name: &str, records: &[(&str, &[f64])]) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|source| ScanError::persistence(dir, source))?;
    let final_path = dir.join(file_name);
    let temp_path = dir.join(format!(".{file_name}"));

    let file = File::create(&temp_path).map_err(|source| ScanError::persistence(&temp_path, source))?;
    let mut npz = NpzWriter::new(BufWriter::new(file));
    for (name, values) in records {
        npz.add_array(*name, &ArrayView1::from(*values))
            .map_err(|source| ScanError::Archive {
                path: temp_path.clone(),
                source,
            })?;
        debug!("appended record {} ({} values)", name, values.len());
    }

    let writer = npz.finish().map_err(|source| ScanError::Archive {
        path: temp_path.clone(),
        source,
    })?;
    let file = writer
        .into_inner()
        .map_err(|error| ScanError::persistence(&temp_path, error.into_error()))?;
    file.sync_all()
        .map_err(|source| ScanError::persistence(&temp_path, source))?;

    fs::rename(&temp_path, &final_path)
        .map_err(|source| ScanError::persistence(&final_path, source))?;
    Ok(final_path)
}

/// Loads every record of an archive, in the order the names are stored.
pub fn read_records(path: &Path) -> Result<Vec<(String, Vec<f64>)>> {
    let file = File::open(path).map_err(|source| ScanError::persistence(path, source))?;
    let mut npz = NpzReader::new(file).map_err(|source| ScanError::ArchiveRead {
        path: path.to_path_buf(),
        source,
    })?;
    let names = npz.names().map_err(|source| ScanError::ArchiveRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut records = Vec::with_capacity(names.len());
    for name in names {
        let array: Array1<f64> = npz.by_name(&name).map_err(|source| ScanError::ArchiveRead {
            path: path.to_path_buf(),
            source,
        })?;
        records.push((name, array.to_vec()));
    }
    Ok(records)
}

/// Published result files in `dir`, sorted by name. Hidden in-progress files are skipped.
pub fn list_results(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|source| ScanError::persistence(dir, source))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ScanError::persistence(dir, source))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn archive_is_published_under_final_name_only() {
        let dir = TempDir::new().unwrap();
        let temperature = [0.1, 0.2, 0.3];
        let power = [1.0, 0.5, 0.25];
        let path = write_atomic(
            dir.path(),
            "run.npz",
            &[("temperature_up", &temperature[..]), ("power_up", &power[..])],
        )
        .unwrap();

        assert_eq!(path, dir.path().join("run.npz"));
        assert!(!dir.path().join(".run.npz").exists());

        let records = read_records(&path).unwrap();
        let lookup = |key: &str| {
            records
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, values)| values.clone())
                .unwrap()
        };
        assert_eq!(lookup("temperature_up"), temperature.to_vec());
        assert_eq!(lookup("power_up"), power.to_vec());
    }

    #[test]
    fn creates_missing_destination_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("data").join("scans");
        write_atomic(&nested, "a.npz", &[("x", &[1.0][..])]).unwrap();
        assert_eq!(list_results(&nested).unwrap(), ["a.npz"]);
    }

    #[test]
    fn failed_rename_leaves_temp_file_and_no_final_file() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory squatting on the final name makes the rename fail.
        let blocker = dir.path().join("run.npz");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), b"x").unwrap();

        let result = write_atomic(dir.path(), "run.npz", &[("x", &[1.0][..])]);
        assert!(matches!(result, Err(ScanError::Persistence { .. })));
        assert!(dir.path().join(".run.npz").is_file());
        assert!(blocker.is_dir());
    }

    #[test]
    fn listing_skips_hidden_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.npz"), b"").unwrap();
        fs::write(dir.path().join("a.npz"), b"").unwrap();
        fs::write(dir.path().join(".c.npz"), b"").unwrap();
        assert_eq!(list_results(dir.path()).unwrap(), ["a.npz", "b.npz"]);
    }
}
