use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryworldConfig {
    pub paths: PathsConfig,
    pub remote: RemoteConfig,
    pub behavior: BehaviorConfig,
}

/// Local directory roots. Unset sub-roots resolve to folders under `characters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub characters: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptions: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_images: Option<PathBuf>,
}

impl PathsConfig {
    pub fn under(characters: impl Into<PathBuf>) -> Self {
        Self {
            characters: characters.into(),
            descriptions: None,
            images: None,
            public_images: None,
        }
    }

    pub fn descriptions(&self) -> PathBuf {
        self.descriptions
            .clone()
            .unwrap_or_else(|| self.characters.join("descriptions"))
    }

    pub fn images(&self) -> PathBuf {
        self.images
            .clone()
            .unwrap_or_else(|| self.characters.join("images"))
    }

    pub fn public_images(&self) -> PathBuf {
        self.public_images
            .clone()
            .unwrap_or_else(|| self.characters.join("public_images"))
    }

    /// Resolve every root to a concrete path.
    pub fn resolve(&self) -> ResolvedPaths {
        ResolvedPaths {
            descriptions: self.descriptions(),
            images: self.images(),
            public_images: self.public_images(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::under("./characters")
    }
}

/// Concrete directory roots handed to the core components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPaths {
    pub descriptions: PathBuf,
    pub images: PathBuf,
    pub public_images: PathBuf,
}

impl ResolvedPaths {
    /// Create every root that does not exist yet.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.descriptions, &self.images, &self.public_images] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// `owner/name` of the repository holding description files.
    pub github_repo: String,
    pub github_path: String,
    pub github_api: String,
    /// `owner/name` of the dataset holding character images.
    pub hf_dataset: String,
    pub hf_endpoint: String,
    pub cache_dir: PathBuf,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            github_repo: "venetanji/polyu-storyworld".into(),
            github_path: "characters".into(),
            github_api: "https://api.github.com".into(),
            hf_dataset: "venetanji/polyu-storyworld-characters".into(),
            hf_endpoint: "https://huggingface.co".into(),
            cache_dir: PathBuf::from(".cache").join("hf-datasets"),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Fetch remote data on first run when no descriptions exist locally.
    pub auto_download: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            auto_download: true,
        }
    }
}
