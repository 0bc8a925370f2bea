//! Per-request scratch space: the transient template and the output staging area.
//!
//! Both are `tempfile` handles, so they are removed when dropped, including
//! on panic or when the async task driving the batch is cancelled. The
//! explicit [`ScratchTemplate::cleanup`] / [`StagingArea::discard`] paths
//! exist so that a failed removal is logged instead of silently ignored.
//!
//! ## Naming
//!
//! The template lands in the scratch directory as
//! `temp_<groupId>_<random>_<originalFileName>`. The random part makes two
//! concurrent uploads of the same file for the same group independent.

use crate::error::BatchVaultError;
use crate::model::GroupId;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile, TempDir};
use tracing::{debug, warn};

/// The uploaded template, held on disk for the duration of one batch.
#[derive(Debug)]
pub struct ScratchTemplate {
    file: NamedTempFile,
}

impl ScratchTemplate {
    /// Write `bytes` to a fresh, uniquely named file in `scratch_dir`.
    pub fn create(
        scratch_dir: &Path,
        group_id: GroupId,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<Self, BatchVaultError> {
        std::fs::create_dir_all(scratch_dir).map_err(|e| BatchVaultError::Storage {
            path: scratch_dir.to_path_buf(),
            source: e,
        })?;

        let mut file = Builder::new()
            .prefix(&format!("temp_{}_", group_id))
            .suffix(&format!("_{}", file_name_component(original_name)))
            .rand_bytes(8)
            .tempfile_in(scratch_dir)
            .map_err(|e| BatchVaultError::Storage {
                path: scratch_dir.to_path_buf(),
                source: e,
            })?;

        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| BatchVaultError::Storage {
                path: file.path().to_path_buf(),
                source: e,
            })?;

        debug!(
            "Stored template ({} bytes) at {}",
            bytes.len(),
            file.path().display()
        );
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Remove the file now. Failure is logged, never returned.
    pub fn cleanup(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!("Removed transient template {}", path.display()),
            Err(e) => warn!("Failed to remove transient template {}: {}", path.display(), e),
        }
    }
}

/// Last path component of a caller-supplied file name; never empty.
fn file_name_component(name: &str) -> &str {
    let base = name.rsplit(&['/', '\\'][..]).next().unwrap_or(name);
    if base.is_empty() || base == "." || base == ".." {
        "upload"
    } else {
        base
    }
}

/// Hidden directory inside the output directory where a batch renders its
/// files before they are published.
///
/// Living inside the output directory keeps the final move a same-filesystem
/// rename.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    pub fn create(output_dir: &Path) -> Result<Self, BatchVaultError> {
        let dir = Builder::new()
            .prefix(".staging-")
            .tempdir_in(output_dir)
            .map_err(|e| BatchVaultError::Storage {
                path: output_dir.to_path_buf(),
                source: e,
            })?;
        debug!("Staging renders in {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the staged copy of `file_name` is written.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.path().join(file_name)
    }

    /// Remove the staging directory and anything left in it.
    pub fn discard(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove staging directory {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_name_carries_group_and_original_name() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchTemplate::create(dir.path(), 42, "syllabus.pdf", b"%PDF-1.5").unwrap();
        let name = scratch.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("temp_42_"), "got {name}");
        assert!(name.ends_with("_syllabus.pdf"), "got {name}");
        assert_eq!(std::fs::read(scratch.path()).unwrap(), b"%PDF-1.5");
    }

    #[test]
    fn same_upload_twice_gets_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = ScratchTemplate::create(dir.path(), 1, "notes.pdf", b"a").unwrap();
        let b = ScratchTemplate::create(dir.path(), 1, "notes.pdf", b"b").unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(std::fs::read(a.path()).unwrap(), b"a");
        assert_eq!(std::fs::read(b.path()).unwrap(), b"b");
    }

    #[test]
    fn cleanup_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchTemplate::create(dir.path(), 1, "notes.pdf", b"x").unwrap();
        let path = scratch.path().to_path_buf();
        scratch.cleanup();
        assert!(!path.exists());
    }

    #[test]
    fn drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchTemplate::create(dir.path(), 1, "notes.pdf", b"x").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn path_components_are_stripped_from_original_name() {
        assert_eq!(file_name_component("../../etc/passwd"), "passwd");
        assert_eq!(file_name_component("C:\\Users\\me\\notes.pdf"), "notes.pdf");
        assert_eq!(file_name_component("dir/"), "upload");
        assert_eq!(file_name_component(""), "upload");

        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchTemplate::create(dir.path(), 3, "../escape.pdf", b"x").unwrap();
        assert_eq!(scratch.path().parent().unwrap(), dir.path());
    }

    #[test]
    fn missing_scratch_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let scratch = ScratchTemplate::create(&nested, 1, "t.pdf", b"x").unwrap();
        assert!(scratch.path().starts_with(&nested));
    }

    #[test]
    fn staging_lives_in_output_dir_and_is_discarded() {
        let out = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(out.path()).unwrap();
        assert_eq!(staging.path().parent().unwrap(), out.path());
        assert!(staging
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(".staging-"));

        let staged = staging.path_for("t (Ann).pdf");
        std::fs::write(&staged, b"x").unwrap();
        let dir = staging.path().to_path_buf();
        staging.discard();
        assert!(!dir.exists());
    }
}
