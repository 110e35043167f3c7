use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Copy `src` to `dest` through a uniquely named temporary sibling and a
/// rename, so readers never observe a half-written file and concurrent copies
/// to the same destination never share a temporary. Parent directories are
/// created and the source modification time is carried over.
pub fn copy_atomic(src: &Path, dest: &Path) -> io::Result<u64> {
    let mut tmp = temp_sibling(dest)?;
    let mut source = File::open(src)?;
    let n = io::copy(&mut source, tmp.as_file_mut())?;
    let modified = source.metadata()?.modified()?;
    tmp.as_file().set_modified(modified)?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(n)
}

/// Write `bytes` to `dest` through a uniquely named temporary sibling and a rename.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut tmp = temp_sibling(dest)?;
    tmp.write_all(bytes)?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

/// Dot-prefixed temporary next to `dest`; never matches the image allow-list.
/// Removed on drop unless persisted.
fn temp_sibling(dest: &Path) -> io::Result<NamedTempFile> {
    let parent = dest.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tempfile::Builder::new()
        .prefix(&format!(".{}.", name))
        .suffix(".part")
        .tempfile_in(parent)
}
