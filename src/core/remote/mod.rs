//! Remote asset sources: description files from a repository contents API and
//! images from a dataset snapshot.
//!
//! Both sit behind [`RemoteSource`] ("fetch everything into this directory").
//! The dataset source also implements [`ImageSource`] for on-demand completion
//! of a single character. Snapshot-to-destination copying is a plain
//! list → filter → copy pipeline over files on disk, independent of how the
//! snapshot was obtained.

pub mod bootstrap;
pub mod dataset;
pub mod github;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use walkdir::WalkDir;

use super::assets::is_image_name;
use super::copy::copy_atomic;
use super::progress::{ProgressSink, ProgressUpdate, emit};
use crate::error::{Result, StoryworldError};

pub use bootstrap::{BootstrapReport, fetch_all};
pub use dataset::DatasetImages;
pub use github::GithubDescriptions;

/// Fetch every asset a source offers into `dest`.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Short label for logs, e.g. `github:owner/repo/path`.
    fn label(&self) -> String;

    /// Returns the number of files written.
    async fn fetch_all(&self, dest: &Path) -> Result<usize>;
}

/// Fetch the images of one character into `<dest_root>/<code>/...`.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Returns the number of files copied; zero means the source has none.
    async fn fetch_images_for_code(
        &self,
        code: &str,
        dest_root: &Path,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<usize>;
}

/// A file inside a snapshot and its path relative to the snapshot root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub path: PathBuf,
    pub relative: PathBuf,
}

/// Every regular file under `root`, sorted by relative path.
pub fn snapshot_files(root: &Path) -> Vec<SnapshotFile> {
    let mut files: Vec<SnapshotFile> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e.path().strip_prefix(root).ok()?.to_path_buf();
            Some(SnapshotFile {
                path: e.into_path(),
                relative,
            })
        })
        .collect();
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    files
}

/// Keep allow-listed images and, when `code` is given, only those whose first
/// relative path segment equals it.
pub fn plan_copies(files: Vec<SnapshotFile>, code: Option<&str>) -> Vec<SnapshotFile> {
    files
        .into_iter()
        .filter(|f| is_image_name(&f.relative))
        .filter(|f| match code {
            Some(code) => first_segment(&f.relative) == Some(code),
            None => true,
        })
        .collect()
}

fn first_segment(path: &Path) -> Option<&str> {
    match path.components().next()? {
        Component::Normal(s) => s.to_str(),
        _ => None,
    }
}

/// Copy planned files under `dest_root`, preserving relative paths and reporting
/// `(n, total, "Downloading <relpath>")` after each file.
pub fn copy_planned(
    files: &[SnapshotFile],
    dest_root: &Path,
    progress: &dyn ProgressSink,
) -> Result<usize> {
    let total = files.len();
    for (idx, file) in files.iter().enumerate() {
        let dest = dest_root.join(&file.relative);
        copy_atomic(&file.path, &dest).map_err(|e| StoryworldError::io(&dest, e))?;
        tracing::debug!(src = %file.path.display(), dest = %dest.display(), "copied image");
        emit(
            progress,
            ProgressUpdate::new(idx + 1, total, format!("Downloading {}", display_relative(&file.relative))),
        );
    }
    Ok(total)
}

/// Relative path with `/` separators regardless of platform.
fn display_relative(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Run the snapshot → filter → copy pipeline off the async runtime.
pub async fn copy_snapshot(
    snapshot_root: PathBuf,
    dest_root: PathBuf,
    code: Option<String>,
    progress: Arc<dyn ProgressSink>,
) -> Result<usize> {
    tokio::task::spawn_blocking(move || {
        let planned = plan_copies(snapshot_files(&snapshot_root), code.as_deref());
        copy_planned(&planned, &dest_root, progress.as_ref())
    })
    .await?
}

/// HTTP client shared by the remote sources.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| StoryworldError::Config(format!("http client: {e}")))
}

/// GET `url`, mapping transport failures and non-2xx statuses to remote errors.
pub(crate) async fn get_checked(client: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| StoryworldError::RemoteUnavailable {
            target: url.to_string(),
            source,
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(StoryworldError::RemoteRejected {
            target: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

pub(crate) async fn get_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = get_checked(client, url).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|source| StoryworldError::RemoteUnavailable {
            target: url.to_string(),
            source,
        })?;
    Ok(bytes.to_vec())
}

pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T> {
    get_checked(client, url)
        .await?
        .json::<T>()
        .await
        .map_err(|source| StoryworldError::RemoteUnavailable {
            target: url.to_string(),
            source,
        })
}

/// Relative remote paths must stay inside the destination.
pub(crate) fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    use crate::core::progress::{NoProgress, SinkError};

    fn fake_snapshot(root: &Path) {
        for rel in [
            "0000g/ann.png",
            "0000g/alt/side.jpg",
            "0000g/readme.txt",
            "0000gx/other.png",
            "0001a/bob.webp",
            "cover.png",
            ".gitattributes",
        ] {
            let p = root.join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, rel.as_bytes()).unwrap();
        }
    }

    fn relatives(files: &[SnapshotFile]) -> Vec<String> {
        files.iter().map(|f| display_relative(&f.relative)).collect()
    }

    #[test]
    fn plan_filters_by_code_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        fake_snapshot(dir.path());

        let planned = plan_copies(snapshot_files(dir.path()), Some("0000g"));
        assert_eq!(relatives(&planned), ["0000g/alt/side.jpg", "0000g/ann.png"]);
    }

    #[test]
    fn plan_without_code_keeps_all_images() {
        let dir = tempfile::tempdir().unwrap();
        fake_snapshot(dir.path());

        let planned = plan_copies(snapshot_files(dir.path()), None);
        assert_eq!(
            relatives(&planned),
            [
                "0000g/alt/side.jpg",
                "0000g/ann.png",
                "0000gx/other.png",
                "0001a/bob.webp",
                "cover.png"
            ]
        );
    }

    #[test]
    fn unknown_code_plans_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fake_snapshot(dir.path());
        assert!(plan_copies(snapshot_files(dir.path()), Some("9999z")).is_empty());
    }

    #[test]
    fn copy_preserves_structure_and_reports_each_file() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fake_snapshot(src.path());
        let planned = plan_copies(snapshot_files(src.path()), Some("0000g"));

        let seen = Mutex::new(Vec::new());
        let sink = |u: ProgressUpdate| -> std::result::Result<(), SinkError> {
            seen.lock().unwrap().push((u.done, u.total, u.message));
            Ok(())
        };
        let copied = copy_planned(&planned, dest.path(), &sink).unwrap();

        assert_eq!(copied, 2);
        assert!(dest.path().join("0000g/ann.png").is_file());
        assert!(dest.path().join("0000g/alt/side.jpg").is_file());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (1, 2, "Downloading 0000g/alt/side.jpg".to_string()),
                (2, 2, "Downloading 0000g/ann.png".to_string()),
            ]
        );
    }

    #[test]
    fn broken_sink_does_not_abort_copy() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fake_snapshot(src.path());
        let planned = plan_copies(snapshot_files(src.path()), None);

        let sink = |_: ProgressUpdate| -> std::result::Result<(), SinkError> {
            Err(SinkError("transport closed".into()))
        };
        assert_eq!(copy_planned(&planned, dest.path(), &sink).unwrap(), 5);
    }

    #[tokio::test]
    async fn copy_snapshot_runs_off_runtime() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fake_snapshot(src.path());

        let copied = copy_snapshot(
            src.path().to_path_buf(),
            dest.path().to_path_buf(),
            Some("0001a".into()),
            Arc::new(NoProgress),
        )
        .await
        .unwrap();
        assert_eq!(copied, 1);
        assert!(dest.path().join("0001a/bob.webp").is_file());
    }

    #[test]
    fn safe_relative_paths() {
        assert!(is_safe_relative("0000g/ann.png"));
        assert!(!is_safe_relative("../etc/passwd"));
        assert!(!is_safe_relative("/abs.png"));
        assert!(!is_safe_relative(""));
    }
}
