use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{ImageSource, RemoteSource, copy_snapshot, get_bytes, get_json, is_safe_relative};
use crate::config::types::RemoteConfig;
use crate::core::assets::is_image_name;
use crate::core::copy::write_atomic;
use crate::core::progress::{NoProgress, ProgressSink};
use crate::error::{Result, StoryworldError};

const DEFAULT_REVISION: &str = "main";

/// Revision metadata returned by the dataset API.
#[derive(Debug, Clone, Deserialize)]
pub struct RevisionInfo {
    pub sha: String,
    #[serde(default)]
    pub siblings: Vec<Sibling>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sibling {
    pub rfilename: String,
}

/// Images published in a Hugging Face dataset, mirrored through a local
/// snapshot cache laid out as
/// `<cache>/datasets--<owner>--<name>/{refs/<revision>, snapshots/<sha>/...}`.
pub struct DatasetImages {
    client: reqwest::Client,
    endpoint: String,
    dataset_id: String,
    cache_dir: PathBuf,
    revision: String,
}

impl DatasetImages {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        dataset_id: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let dataset_id = dataset_id.into();
        if !is_safe_relative(&dataset_id) {
            return Err(StoryworldError::Config(format!(
                "invalid dataset id '{dataset_id}'"
            )));
        }
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            dataset_id,
            cache_dir: cache_dir.into(),
            revision: DEFAULT_REVISION.to_string(),
        })
    }

    pub fn from_config(client: reqwest::Client, cfg: &RemoteConfig) -> Result<Self> {
        Self::new(
            client,
            cfg.hf_endpoint.clone(),
            cfg.hf_dataset.clone(),
            cfg.cache_dir.clone(),
        )
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    /// Cache folder for this dataset, keyed by id.
    pub fn repo_cache(&self) -> PathBuf {
        self.cache_dir
            .join(format!("datasets--{}", self.dataset_id.replace('/', "--")))
    }

    fn ref_file(&self) -> PathBuf {
        self.repo_cache().join("refs").join(&self.revision)
    }

    fn endpoint_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| StoryworldError::Config(format!("dataset endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StoryworldError::Config(format!("dataset endpoint cannot be a base: {}", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn revision_url(&self) -> Result<Url> {
        let mut segments = vec!["api", "datasets"];
        segments.extend(self.dataset_id.split('/'));
        segments.extend(["revision", self.revision.as_str()]);
        self.endpoint_url(&segments)
    }

    fn file_url(&self, sha: &str, rfilename: &str) -> Result<Url> {
        let mut segments = vec!["datasets"];
        segments.extend(self.dataset_id.split('/'));
        segments.extend(["resolve", sha]);
        segments.extend(rfilename.split('/'));
        self.endpoint_url(&segments)
    }

    pub async fn revision_info(&self) -> Result<RevisionInfo> {
        let url = self.revision_url()?;
        get_json(&self.client, url.as_str()).await
    }

    /// Snapshot the previously resolved revision, if it is still on disk.
    pub fn cached_snapshot(&self) -> Option<PathBuf> {
        let sha = std::fs::read_to_string(self.ref_file()).ok()?;
        let sha = sha.trim();
        if !is_safe_relative(sha) {
            return None;
        }
        let dir = self.repo_cache().join("snapshots").join(sha);
        dir.is_dir().then_some(dir)
    }

    /// Make sure the current revision's images are in the local cache and return
    /// the snapshot directory. Files already cached are not downloaded again.
    /// When the dataset API is unreachable, a previously cached snapshot is used.
    pub async fn snapshot(&self) -> Result<PathBuf> {
        let info = match self.revision_info().await {
            Ok(info) => info,
            Err(e) if e.is_remote() => {
                if let Some(dir) = self.cached_snapshot() {
                    tracing::warn!(
                        dataset = %self.dataset_id,
                        error = %e,
                        "dataset API unavailable, using cached snapshot"
                    );
                    return Ok(dir);
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        if !is_safe_relative(&info.sha) {
            return Err(StoryworldError::Config(format!(
                "dataset returned unusable revision '{}'",
                info.sha
            )));
        }

        let snapshot_dir = self.repo_cache().join("snapshots").join(&info.sha);
        let mut fetched = 0usize;
        for sibling in &info.siblings {
            let name = sibling.rfilename.as_str();
            if !is_safe_relative(name) || !is_image_name(Path::new(name)) {
                continue;
            }
            let target = snapshot_dir.join(name);
            if target.is_file() {
                continue;
            }

            let url = self.file_url(&info.sha, name)?;
            let bytes = get_bytes(&self.client, url.as_str()).await?;
            let path = target.clone();
            tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
                .await?
                .map_err(|e| StoryworldError::io(&target, e))?;
            fetched += 1;
        }

        let ref_file = self.ref_file();
        let sha = info.sha.clone();
        let ref_path = ref_file.clone();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&snapshot_dir)?;
            write_atomic(&ref_path, sha.as_bytes())
        })
        .await?
        .map_err(|e| StoryworldError::io(&ref_file, e))?;

        tracing::info!(
            dataset = %self.dataset_id,
            revision = %info.sha,
            fetched,
            "dataset snapshot ready"
        );
        Ok(self.repo_cache().join("snapshots").join(&info.sha))
    }
}

#[async_trait]
impl RemoteSource for DatasetImages {
    fn label(&self) -> String {
        format!("dataset:{}", self.dataset_id)
    }

    async fn fetch_all(&self, dest: &Path) -> Result<usize> {
        let snapshot = self.snapshot().await?;
        copy_snapshot(snapshot, dest.to_path_buf(), None, Arc::new(NoProgress)).await
    }
}

#[async_trait]
impl ImageSource for DatasetImages {
    async fn fetch_images_for_code(
        &self,
        code: &str,
        dest_root: &Path,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<usize> {
        let snapshot = self.snapshot().await?;
        copy_snapshot(
            snapshot,
            dest_root.to_path_buf(),
            Some(code.to_string()),
            progress,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::core::progress::{ProgressUpdate, SinkError};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mock_dataset(server: &MockServer, expect_file_hits: u64) {
        let info = serde_json::json!({
            "sha": "abc123",
            "siblings": [
                {"rfilename": ".gitattributes"},
                {"rfilename": "README.md"},
                {"rfilename": "0000g/ann.png"},
                {"rfilename": "0000g/zz.png"},
                {"rfilename": "0001a/bob.jpg"}
            ]
        });
        Mock::given(method("GET"))
            .and(path("/api/datasets/acme/pics/revision/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(info))
            .mount(server)
            .await;
        for file in ["0000g/ann.png", "0000g/zz.png", "0001a/bob.jpg"] {
            Mock::given(method("GET"))
                .and(path(format!("/datasets/acme/pics/resolve/abc123/{file}")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(file.as_bytes().to_vec()))
                .expect(expect_file_hits)
                .mount(server)
                .await;
        }
    }

    fn images(server: &MockServer, cache: &Path) -> DatasetImages {
        DatasetImages::new(reqwest::Client::new(), server.uri(), "acme/pics", cache).unwrap()
    }

    #[test]
    fn cache_is_keyed_by_dataset_id() {
        let ds = DatasetImages::new(reqwest::Client::new(), "http://x", "acme/pics", "/c").unwrap();
        assert_eq!(ds.repo_cache(), PathBuf::from("/c/datasets--acme--pics"));
        assert!(DatasetImages::new(reqwest::Client::new(), "http://x", "../x", "/c").is_err());
    }

    #[tokio::test]
    async fn snapshot_downloads_images_once() {
        let server = MockServer::start().await;
        mock_dataset(&server, 1).await;
        let cache = tempfile::tempdir().unwrap();
        let ds = images(&server, cache.path());

        let first = ds.snapshot().await.unwrap();
        let second = ds.snapshot().await.unwrap();
        assert_eq!(first, second);
        assert!(first.join("0000g/ann.png").is_file());
        assert!(!first.join("README.md").exists());
        assert_eq!(
            std::fs::read_to_string(ds.repo_cache().join("refs/main")).unwrap(),
            "abc123"
        );
    }

    #[tokio::test]
    async fn fetch_for_code_copies_only_that_code() {
        let server = MockServer::start().await;
        mock_dataset(&server, 1).await;
        let cache = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let sink = move |u: ProgressUpdate| -> std::result::Result<(), SinkError> {
            sink_seen.lock().unwrap().push(u.message);
            Ok(())
        };

        let copied = images(&server, cache.path())
            .fetch_images_for_code("0000g", dest.path(), Arc::new(sink))
            .await
            .unwrap();

        assert_eq!(copied, 2);
        assert!(dest.path().join("0000g/ann.png").is_file());
        assert!(dest.path().join("0000g/zz.png").is_file());
        assert!(!dest.path().join("0001a").exists());
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["Downloading 0000g/ann.png", "Downloading 0000g/zz.png"]
        );
    }

    #[tokio::test]
    async fn unknown_code_copies_nothing() {
        let server = MockServer::start().await;
        mock_dataset(&server, 1).await;
        let cache = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();

        let copied = images(&server, cache.path())
            .fetch_images_for_code("9999z", dest.path(), Arc::new(NoProgress))
            .await
            .unwrap();
        assert_eq!(copied, 0);
    }

    #[tokio::test]
    async fn offline_reuses_cached_snapshot() {
        let cache = tempfile::tempdir().unwrap();
        {
            let server = MockServer::start().await;
            mock_dataset(&server, 1).await;
            images(&server, cache.path()).snapshot().await.unwrap();
        }

        let down = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&down)
            .await;
        let dir = images(&down, cache.path()).snapshot().await.unwrap();
        assert!(dir.join("0001a/bob.jpg").is_file());
    }

    #[tokio::test]
    async fn unreachable_without_cache_is_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let cache = tempfile::tempdir().unwrap();
        let err = images(&server, cache.path()).snapshot().await.unwrap_err();
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn bulk_fetch_copies_every_image() {
        let server = MockServer::start().await;
        mock_dataset(&server, 1).await;
        let cache = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();

        let copied = images(&server, cache.path()).fetch_all(dest.path()).await.unwrap();
        assert_eq!(copied, 3);
        assert!(dest.path().join("0001a/bob.jpg").is_file());
    }
}
