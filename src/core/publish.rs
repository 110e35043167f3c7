use std::io;
use std::path::{Path, PathBuf};

use super::copy::copy_atomic;

/// Mirrors selected images into a publicly servable tree, `<root>/<code>/<file>`.
#[derive(Debug, Clone)]
pub struct Publisher {
    root: PathBuf,
}

impl Publisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public path for `source`. Copies only when the copy is missing or older
    /// than the source; on any filesystem error the source path is returned.
    pub fn publish(&self, source: &Path, code: &str) -> PathBuf {
        match self.try_publish(source, code) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(
                    code,
                    source = %source.display(),
                    error = %e,
                    "public copy failed, serving private path"
                );
                source.to_path_buf()
            }
        }
    }

    fn try_publish(&self, source: &Path, code: &str) -> io::Result<PathBuf> {
        let file_name = source
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"))?;
        let target_dir = self.root.join(code);
        std::fs::create_dir_all(&target_dir)?;
        let dest = target_dir.join(file_name);

        if needs_refresh(source, &dest)? {
            copy_atomic(source, &dest)?;
            tracing::debug!(code, dest = %dest.display(), "refreshed public copy");
        }
        Ok(dest)
    }
}

fn needs_refresh(source: &Path, dest: &Path) -> io::Result<bool> {
    let dest_meta = match std::fs::metadata(dest) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };
    let source_modified = std::fs::metadata(source)?.modified()?;
    Ok(source_modified > dest_meta.modified()?)
}
