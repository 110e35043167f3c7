pub mod types;

use std::path::{Path, PathBuf};

use crate::error::{Result, StoryworldError};
use types::StoryworldConfig;

/// Load config: defaults, then the TOML file (if any), then process environment.
///
/// With `path == None` the XDG location is tried; a missing file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<StoryworldConfig> {
    let file = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    let mut cfg = read_config_file(&file)?;
    apply_env(&mut cfg, |key| std::env::var(key).ok());
    Ok(cfg)
}

/// Parse a TOML config file, falling back to defaults when it does not exist.
pub fn read_config_file(path: &Path) -> Result<StoryworldConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => toml::from_str(&text)
            .map_err(|e| StoryworldError::Config(format!("{}: {}", path.display(), e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoryworldConfig::default()),
        Err(e) => Err(StoryworldError::io(path, e)),
    }
}

/// Overlay environment variables onto `cfg`. `lookup` abstracts `std::env::var`.
pub fn apply_env(cfg: &mut StoryworldConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(dir) = non_empty("CHARACTERS_DIR") {
        cfg.paths.characters = PathBuf::from(dir);
    }
    if let Some(dir) = non_empty("CHARACTERS_DESC_DIR") {
        cfg.paths.descriptions = Some(PathBuf::from(dir));
    }
    if let Some(dir) = non_empty("CHARACTERS_IMAGE_DIR") {
        cfg.paths.images = Some(PathBuf::from(dir));
    }
    if let Some(dir) = non_empty("PUBLIC_IMAGES_DIR") {
        cfg.paths.public_images = Some(PathBuf::from(dir));
    }

    if let Some(repo) = non_empty("GITHUB_CHARACTERS_REPO") {
        cfg.remote.github_repo = repo;
    }
    if let Some(path) = non_empty("GITHUB_CHARACTERS_PATH") {
        cfg.remote.github_path = path;
    }
    if let Some(dataset) = non_empty("HF_IMAGES_DATASET") {
        cfg.remote.hf_dataset = dataset;
    }
    if let Some(endpoint) = non_empty("HF_ENDPOINT") {
        cfg.remote.hf_endpoint = endpoint;
    }

    if let Some(flag) = lookup("DISABLE_AUTO_DOWNLOAD") {
        if matches!(flag.as_str(), "1" | "true" | "True") {
            cfg.behavior.auto_download = false;
        }
    }
}

/// Return XDG config dir (~/.config/storyworld/)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("storyworld")
}

/// Return the default config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}
