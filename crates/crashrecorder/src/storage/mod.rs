//! Storage layer for crashrecorder.
//!
//! This module persists a dump of the ring buffer as a CSV snapshot file. The
//! file is written to a temporary file next to the target and renamed over it,
//! so readers only ever see a complete previous snapshot or a complete new one.

pub mod schema;

use std::fs::Permissions;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::sample::Sample;

/// Mode given to a new snapshot file.
#[cfg(unix)]
const SNAPSHOT_MODE: u32 = 0o644;

/// Writes snapshot files to a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    /// Path of the snapshot file.
    path: PathBuf,
}

impl SnapshotWriter {
    /// Create a writer targeting `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the snapshot file with `samples`.
    ///
    /// Creates the parent directories if they don't exist. On failure the
    /// previous snapshot file, if any, is left untouched.
    ///
    /// Returns the number of data rows written.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory, the temporary file, or the final
    /// rename can't be created or written.
    pub fn write(&self, samples: &[Sample]) -> Result<usize> {
        let dir = self.directory();

        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let mut tmp = NamedTempFile::new_in(dir).map_err(|source| self.write_error(source))?;
        debug!(
            tmp = %tmp.path().display(),
            rows = samples.len(),
            "Writing snapshot"
        );

        {
            let mut writer = csv::Writer::from_writer(&mut tmp);
            writer.write_record(schema::header())?;
            for sample in samples {
                writer.write_record(sample.to_record())?;
            }
            writer.flush().map_err(|source| self.write_error(source))?;
        }

        if let Some(permissions) = self.snapshot_permissions() {
            tmp.as_file()
                .set_permissions(permissions)
                .map_err(|source| self.write_error(source))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|source| self.write_error(source))?;
        tmp.persist(&self.path)
            .map_err(|err| self.write_error(err.error))?;

        info!(
            path = %self.path.display(),
            rows = samples.len(),
            "Snapshot written"
        );
        Ok(samples.len())
    }

    /// Directory the snapshot file lives in.
    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Mode for the replacement file: the existing snapshot's, or 0644.
    ///
    /// Temporary files are created owner-only, which would otherwise leak
    /// into every snapshot.
    fn snapshot_permissions(&self) -> Option<Permissions> {
        if let Ok(metadata) = std::fs::metadata(&self.path) {
            return Some(metadata.permissions());
        }
        default_permissions()
    }

    fn write_error(&self, source: std::io::Error) -> Error {
        Error::StorageWrite {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(SNAPSHOT_MODE))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<Permissions> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SignalReadings;
    use chrono::{TimeZone, Utc};

    fn create_test_sample(secs: i64, speed: f64) -> Sample {
        Sample::new(
            Utc.timestamp_opt(secs, 0).unwrap(),
            SignalReadings {
                speed,
                ..SignalReadings::default()
            },
        )
    }

    #[test]
    fn test_write_header_and_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("vehicle_data.csv"));

        let samples = vec![
            create_test_sample(1, 10.0),
            create_test_sample(2, 20.0),
            create_test_sample(3, 30.0),
        ];
        assert_eq!(writer.write(&samples).unwrap(), 3);

        let contents = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "timestamp,distance,accel,speed,displacement",
                "1.000000,false,0,10,0",
                "2.000000,false,0,20,0",
                "3.000000,false,0,30,0",
            ]
        );
    }

    #[test]
    fn test_write_empty_snapshot_has_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("vehicle_data.csv"));

        assert_eq!(writer.write(&[]).unwrap(), 0);

        let contents = std::fs::read_to_string(writer.path()).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_write_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("vehicle_data.csv"));

        writer
            .write(&[create_test_sample(1, 1.0), create_test_sample(2, 2.0)])
            .unwrap();
        writer.write(&[create_test_sample(3, 3.0)]).unwrap();

        let contents = std::fs::read_to_string(writer.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("3.000000"));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/vehicle_data.csv");
        let writer = SnapshotWriter::new(&path);

        writer.write(&[create_test_sample(1, 1.0)]).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_leaves_no_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path().join("vehicle_data.csv"));
        writer.write(&[create_test_sample(1, 1.0)]).unwrap();

        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_write_failure_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "x").unwrap();

        let writer = SnapshotWriter::new(blocker.join("vehicle_data.csv"));
        let err = writer.write(&[create_test_sample(1, 1.0)]).unwrap_err();
        assert!(matches!(err, Error::StorageWrite { .. }));
        assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "x");
    }

    #[test]
    fn test_bare_file_name_writes_to_current_dir() {
        let writer = SnapshotWriter::new("vehicle_data.csv");
        assert_eq!(writer.directory(), Path::new("."));
    }

    #[cfg(unix)]
    #[test]
    fn test_new_snapshot_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vehicle_data.csv");
        SnapshotWriter::new(&path)
            .write(&[create_test_sample(1, 1.0)])
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn test_overwrite_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vehicle_data.csv");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, Permissions::from_mode(0o640)).unwrap();

        SnapshotWriter::new(&path)
            .write(&[create_test_sample(1, 1.0)])
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}
