use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

/// Raster formats served as character images.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// An image file under `<images-root>/<code>/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageAsset {
    pub file_name: String,
    pub path: PathBuf,
    pub extension: String,
}

impl ImageAsset {
    /// Build an asset from a path whose extension is allow-listed.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let extension = image_extension(path)?;
        Some(Self {
            file_name,
            path: path.to_path_buf(),
            extension,
        })
    }

    pub fn mime_type(&self) -> &'static str {
        mime_for_path(&self.path)
    }
}

/// Lower-cased extension when it is in [`IMAGE_EXTENSIONS`].
pub fn image_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// True for names that look like images and are not dotfiles.
pub fn is_image_name(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('.'));
    !hidden && image_extension(path).is_some()
}

/// MIME type inferred from the file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        Some("json") => "application/json",
        Some("yaml" | "yml") => "application/yaml",
        _ => "application/octet-stream",
    }
}

/// Directory holding the images of one character.
pub fn character_dir(images_root: &Path, code: &str) -> PathBuf {
    images_root.join(code)
}

/// Images for `code`: non-empty regular files under `<images_root>/<code>/` with an
/// allow-listed extension, sorted by file name. A missing directory yields nothing.
pub fn list_local_images(images_root: &Path, code: &str) -> Vec<ImageAsset> {
    let dir = character_dir(images_root, code);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };

    let mut images: Vec<ImageAsset> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| is_image_name(p))
        .filter(|p| {
            std::fs::metadata(p)
                .map(|m| m.is_file() && m.len() > 0)
                .unwrap_or(false)
        })
        .filter_map(|p| ImageAsset::from_path(&p))
        .collect();
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    images
}

/// Search the whole image tree for an image called `name`, in walk order sorted
/// by name. Dotfiles and names outside the allow-list never match.
pub fn find_image_by_name(images_root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(images_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_image_name(e.path()))
        .find(|e| e.file_name().to_str() == Some(name))
        .map(|e| e.into_path())
}
