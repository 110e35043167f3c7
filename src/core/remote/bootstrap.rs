use serde::Serialize;

use super::RemoteSource;
use crate::config::types::ResolvedPaths;
use crate::core::record::description_files;
use crate::error::{Result, StoryworldError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub descriptions: usize,
    /// `None` when the image fetch failed.
    pub images: Option<usize>,
}

/// Populate the local roots: descriptions first (failure is fatal), then images
/// (failure is logged and leaves the descriptions in place).
pub async fn fetch_all(
    descriptions: &dyn RemoteSource,
    images: &dyn RemoteSource,
    paths: &ResolvedPaths,
) -> Result<BootstrapReport> {
    for dir in [&paths.descriptions, &paths.images] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StoryworldError::io(dir, e))?;
    }

    tracing::info!(
        source = %descriptions.label(),
        dest = %paths.descriptions.display(),
        "fetching character descriptions"
    );
    let description_count = descriptions.fetch_all(&paths.descriptions).await?;

    tracing::info!(
        source = %images.label(),
        dest = %paths.images.display(),
        "fetching character images"
    );
    let image_count = match images.fetch_all(&paths.images).await {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(source = %images.label(), error = %e, "image download failed");
            None
        }
    };

    Ok(BootstrapReport {
        descriptions: description_count,
        images: image_count,
    })
}

/// First-run bootstrap: fetch everything when no description exists locally.
/// Failures are logged; the caller keeps running with whatever is on disk.
pub async fn bootstrap_if_empty(
    descriptions: &dyn RemoteSource,
    images: &dyn RemoteSource,
    paths: &ResolvedPaths,
) -> Option<BootstrapReport> {
    if !description_files(&paths.descriptions).is_empty() {
        return None;
    }
    tracing::info!("no local character descriptions found, fetching remote data");
    match fetch_all(descriptions, images, paths).await {
        Ok(report) => Some(report),
        Err(e) => {
            tracing::warn!(error = %e, "initial fetch failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    struct WritesFile {
        name: &'static str,
        calls: AtomicUsize,
    }

    impl WritesFile {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RemoteSource for WritesFile {
        fn label(&self) -> String {
            format!("fake:{}", self.name)
        }

        async fn fetch_all(&self, dest: &Path) -> Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::fs::write(dest.join(self.name), b"x").unwrap();
            Ok(1)
        }
    }

    struct Unreachable;

    #[async_trait]
    impl RemoteSource for Unreachable {
        fn label(&self) -> String {
            "fake:down".into()
        }

        async fn fetch_all(&self, _dest: &Path) -> Result<usize> {
            Err(StoryworldError::RemoteRejected {
                target: "fake".into(),
                status: 503,
            })
        }
    }

    fn paths(root: &Path) -> ResolvedPaths {
        ResolvedPaths {
            descriptions: root.join("descriptions"),
            images: root.join("images"),
            public_images: root.join("public"),
        }
    }

    #[tokio::test]
    async fn image_failure_is_soft() {
        let dir = tempfile::tempdir().unwrap();
        let p = paths(dir.path());

        let report = fetch_all(&WritesFile::new("0000g.yaml"), &Unreachable, &p)
            .await
            .unwrap();
        assert_eq!(report, BootstrapReport { descriptions: 1, images: None });
        assert!(p.descriptions.join("0000g.yaml").is_file());
    }

    #[tokio::test]
    async fn description_failure_is_fatal_and_skips_images() {
        let dir = tempfile::tempdir().unwrap();
        let p = paths(dir.path());
        let images = WritesFile::new("a.png");

        let err = fetch_all(&Unreachable, &images, &p).await.unwrap_err();
        assert!(err.is_remote());
        assert_eq!(images.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bootstrap_skipped_when_descriptions_exist() {
        let dir = tempfile::tempdir().unwrap();
        let p = paths(dir.path());
        std::fs::create_dir_all(&p.descriptions).unwrap();
        std::fs::write(p.descriptions.join("x.yaml"), "name: X\n").unwrap();
        let descriptions = WritesFile::new("0000g.yaml");

        assert!(bootstrap_if_empty(&descriptions, &Unreachable, &p).await.is_none());
        assert_eq!(descriptions.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bootstrap_runs_on_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let p = paths(dir.path());

        let report = bootstrap_if_empty(&WritesFile::new("0000g.yaml"), &WritesFile::new("a.png"), &p)
            .await
            .unwrap();
        assert_eq!(report.images, Some(1));
    }
}
