use std::path::{Path, PathBuf};

use serde::Serialize;
use url::Url;

use super::assets::{ImageAsset, find_image_by_name};

/// Which rule picked the representative image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    /// `profile_image` is a path that exists on disk.
    ProfilePath,
    /// `profile_image` names one of the character's own images.
    ProfileLocal,
    /// `profile_image` names a file found elsewhere under the image root.
    ProfileSearch,
    /// First local image by file name.
    FirstLocal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSelection {
    pub path: PathBuf,
    pub rule: SelectionRule,
}

impl ImageSelection {
    fn new(path: impl Into<PathBuf>, rule: SelectionRule) -> Self {
        Self {
            path: path.into(),
            rule,
        }
    }
}

/// File name component of a profile reference. URLs contribute the last path
/// segment; they are never fetched.
pub fn profile_file_name(reference: &str) -> Option<String> {
    if let Ok(url) = Url::parse(reference) {
        // single-letter schemes are drive letters, not URLs
        if url.scheme().len() > 1 {
            return url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }
    }
    Path::new(reference)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Choose the image representing a character.
///
/// Order: an existing path named by `profile_ref`, a local image with the
/// referenced file name, the same name anywhere under `images_root`, then the
/// first local image.
pub fn select_image(
    profile_ref: Option<&str>,
    local: &[ImageAsset],
    images_root: &Path,
) -> Option<ImageSelection> {
    if let Some(reference) = profile_ref.filter(|r| !r.is_empty()) {
        let candidate = Path::new(reference);
        if candidate.is_file() {
            return Some(ImageSelection::new(candidate, SelectionRule::ProfilePath));
        }

        if let Some(name) = profile_file_name(reference) {
            if let Some(asset) = local.iter().find(|a| a.file_name == name) {
                return Some(ImageSelection::new(&asset.path, SelectionRule::ProfileLocal));
            }
            if let Some(found) = find_image_by_name(images_root, &name) {
                return Some(ImageSelection::new(found, SelectionRule::ProfileSearch));
            }
        }
    }

    local
        .first()
        .map(|a| ImageSelection::new(&a.path, SelectionRule::FirstLocal))
}
