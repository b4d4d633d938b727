use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::{ConvertError, Result};

/// Filesystem writes of a conversion run. In dry-run mode nothing is touched.
pub struct FileManager {
    dry_run: bool,
}

impl FileManager {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn ensure_directory(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.dry_run {
            debug!("Dry run: not creating {}", path.display());
            return Ok(());
        }
        fs::create_dir_all(path)?;
        Ok(())
    }

    /// Copies `src` to `dest` byte for byte. `dest` only appears once the
    /// copy is complete, and an existing `dest` is never replaced.
    pub fn copy_file(&self, src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<u64> {
        let (src, dest) = (src.as_ref(), dest.as_ref());
        if self.dry_run {
            return Ok(0);
        }

        let mut input = File::open(src).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConvertError::NotFound(src.to_path_buf()),
            _ => ConvertError::Io(e),
        })?;
        let mut staged = staging_file(dest)?;
        let bytes = io::copy(&mut input, staged.as_file_mut())?;
        staged.as_file().sync_all()?;
        persist(staged, dest, src)?;
        Ok(bytes)
    }
}

/// A hidden file next to `dest` that output is written to before it is
/// moved into place. Dropping it removes it.
pub fn staging_file(dest: &Path) -> Result<NamedTempFile> {
    let dir = dest
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let staged = tempfile::Builder::new()
        .prefix(".")
        .suffix(".partial")
        .tempfile_in(dir)?;
    Ok(staged)
}

/// Moves `staged` onto `dest` with the permissions of `template`, the file
/// it was made from. Fails with `AlreadyExists` if `dest` appeared meanwhile.
pub fn persist(staged: NamedTempFile, dest: &Path, template: &Path) -> Result<()> {
    let permissions = fs::metadata(template)?.permissions();
    staged.as_file().set_permissions(permissions)?;
    staged
        .persist_noclobber(dest)
        .map_err(|e| ConvertError::Io(e.error))?;
    Ok(())
}

/// Every regular file under `root`, following links, in file-name order.
pub fn collect_files(root: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Error accessing entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}
