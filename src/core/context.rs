//! Character context assembly.
//!
//! A context is the character's record, minus the raw `images` key, plus at
//! most one embedded image. When a character has no local images the builder
//! asks the configured [`ImageSource`] for them before choosing one. Only a
//! missing description fails the request; every image-related problem degrades
//! to a context without an image.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value;

use super::assets::{ImageAsset, list_local_images, mime_for_path};
use super::progress::ProgressSink;
use super::publish::Publisher;
use super::record::{CharacterRecord, Fields, load_record};
use super::remote::ImageSource;
use super::selection::{ImageSelection, SelectionRule, select_image};
use crate::config::types::ResolvedPaths;
use crate::error::Result;

/// Keys never copied from the record into the context.
const SUPPRESSED_KEYS: &[&str] = &["images"];

/// An image ready to embed in a protocol response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Path the bytes were read from (the public copy when publishing succeeded).
    pub path: PathBuf,
    pub mime_type: &'static str,
    pub data: Vec<u8>,
}

impl ImagePayload {
    pub fn read(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            mime_type: mime_for_path(path),
            data: std::fs::read(path)?,
        })
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    pub fn base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CharacterContext {
    pub code: String,
    pub content: Fields,
    #[serde(skip)]
    pub image: Option<ImagePayload>,
}

/// Copy record fields into context content, dropping suppressed keys.
pub fn normalize(record: &CharacterRecord) -> Fields {
    record
        .fields
        .iter()
        .filter(|(k, _)| !SUPPRESSED_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub struct ContextBuilder {
    paths: ResolvedPaths,
    publisher: Publisher,
    images: Option<Arc<dyn ImageSource>>,
}

impl ContextBuilder {
    pub fn new(paths: ResolvedPaths) -> Self {
        Self {
            publisher: Publisher::new(&paths.public_images),
            paths,
            images: None,
        }
    }

    /// Enable on-demand completion from `source`.
    pub fn with_image_source(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.images = Some(source);
        self
    }

    pub fn paths(&self) -> &ResolvedPaths {
        &self.paths
    }

    pub fn load_record(&self, code: &str) -> Result<CharacterRecord> {
        load_record(&self.paths.descriptions, code)
    }

    pub fn local_images(&self, code: &str) -> Vec<ImageAsset> {
        list_local_images(&self.paths.images, code)
    }

    /// Selected image for `code` from local files only.
    pub fn local_selection(&self, code: &str) -> Result<Option<ImageSelection>> {
        let record = self.load_record(code)?;
        let local = self.local_images(code);
        Ok(select_image(record.profile_image(), &local, &self.paths.images))
    }

    /// Build the context for `code`, completing missing images remotely and
    /// reporting copy progress to `progress`.
    pub async fn build(
        &self,
        code: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<CharacterContext> {
        let descriptions = self.paths.descriptions.clone();
        let owned_code = code.to_string();
        let record =
            tokio::task::spawn_blocking(move || load_record(&descriptions, &owned_code)).await??;

        let mut content = normalize(&record);
        let profile_ref = record.profile_image().map(str::to_string);

        let (mut local, mut selection) = self.scan(code, profile_ref.clone()).await?;

        if local.is_empty() {
            if let Some(source) = &self.images {
                match source
                    .fetch_images_for_code(code, &self.paths.images, progress)
                    .await
                {
                    Ok(0) => tracing::debug!(code, "remote source has no images for character"),
                    Ok(copied) => {
                        tracing::info!(code, copied, "fetched character images on demand");
                        local = self.scan(code, None).await?.0;
                        if selection.is_none() {
                            selection = local.first().map(|a| ImageSelection {
                                path: a.path.clone(),
                                rule: SelectionRule::FirstLocal,
                            });
                        }
                    }
                    Err(e) => tracing::warn!(code, error = %e, "on-demand image download failed"),
                }
            }
        }

        let image = match selection {
            Some(selection) => self.embed(code, selection).await,
            None => None,
        };

        if !local.is_empty() {
            content.insert("images_count".to_string(), Value::from(local.len()));
        }

        Ok(CharacterContext {
            code: record.code,
            content,
            image,
        })
    }

    /// List local images and select one, off the async runtime.
    async fn scan(
        &self,
        code: &str,
        profile_ref: Option<String>,
    ) -> Result<(Vec<ImageAsset>, Option<ImageSelection>)> {
        let images_root = self.paths.images.clone();
        let code = code.to_string();
        let scanned = tokio::task::spawn_blocking(move || {
            let local = list_local_images(&images_root, &code);
            let selection = select_image(profile_ref.as_deref(), &local, &images_root);
            (local, selection)
        })
        .await?;
        Ok(scanned)
    }

    /// Publish and read the selected image; any failure yields no image.
    async fn embed(&self, code: &str, selection: ImageSelection) -> Option<ImagePayload> {
        let publisher = self.publisher.clone();
        let code = code.to_string();
        let joined = tokio::task::spawn_blocking(move || {
            if !selection.path.is_file() {
                return Ok(None);
            }
            let public = publisher.publish(&selection.path, &code);
            ImagePayload::read(&public).map(Some)
        })
        .await;

        match joined {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "could not read selected image");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "image embedding task failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::core::progress::{NoProgress, ProgressUpdate, SinkError, emit};
    use crate::error::StoryworldError;

    struct FakeSource {
        files: Vec<&'static str>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn with(files: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                files,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                files: vec![],
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ImageSource for FakeSource {
        async fn fetch_images_for_code(
            &self,
            code: &str,
            dest_root: &Path,
            progress: Arc<dyn ProgressSink>,
        ) -> Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StoryworldError::RemoteRejected {
                    target: "fake".into(),
                    status: 502,
                });
            }
            let total = self.files.len();
            for (i, name) in self.files.iter().enumerate() {
                let dest = dest_root.join(code).join(name);
                fs::create_dir_all(dest.parent().unwrap()).unwrap();
                fs::write(&dest, name.as_bytes()).unwrap();
                emit(
                    progress.as_ref(),
                    ProgressUpdate::new(i + 1, total, format!("Downloading {code}/{name}")),
                );
            }
            Ok(total)
        }
    }

    struct World {
        _dir: tempfile::TempDir,
        paths: ResolvedPaths,
    }

    impl World {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let paths = ResolvedPaths {
                descriptions: dir.path().join("descriptions"),
                images: dir.path().join("images"),
                public_images: dir.path().join("public"),
            };
            paths.ensure_dirs().unwrap();
            Self { _dir: dir, paths }
        }

        fn describe(&self, code: &str, yaml: &str) {
            fs::write(self.paths.descriptions.join(format!("{code}.yaml")), yaml).unwrap();
        }

        fn image(&self, rel: &str) {
            let p = self.paths.images.join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, rel.as_bytes()).unwrap();
        }

        fn builder(&self) -> ContextBuilder {
            ContextBuilder::new(self.paths.clone())
        }
    }

    #[tokio::test]
    async fn profile_scenario() {
        let world = World::new();
        world.describe("0000g", "name: Ann\nprofile_image: ann.png\n");
        world.image("0000g/ann.png");
        world.image("0000g/zz.png");

        let ctx = world.builder().build("0000g", Arc::new(NoProgress)).await.unwrap();

        insta::assert_json_snapshot!(ctx.content, @r#"
        {
          "name": "Ann",
          "profile_image": "ann.png",
          "images_count": 2
        }
        "#);
        let image = ctx.image.unwrap();
        assert_eq!(image.file_name(), Some("ann.png"));
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.path, world.paths.public_images.join("0000g/ann.png"));
        assert_eq!(image.data, b"0000g/ann.png");
    }

    #[tokio::test]
    async fn images_key_is_suppressed_and_others_kept() {
        let world = World::new();
        world.describe(
            "0001a",
            "name: Bob\nimages: [a.png, b.png]\npersona: calm\nstats: {hp: 3}\nage: 30\n",
        );

        let ctx = world.builder().build("0001a", Arc::new(NoProgress)).await.unwrap();
        assert_eq!(
            Value::Object(ctx.content),
            serde_json::json!({"name": "Bob", "persona": "calm", "stats": {"hp": 3}, "age": 30})
        );
        assert!(ctx.image.is_none());
    }

    #[tokio::test]
    async fn missing_description_is_not_found() {
        let world = World::new();
        let source = FakeSource::with(vec!["a.png"]);
        let builder = world.builder().with_image_source(source.clone());

        let err = builder.build("ghost", Arc::new(NoProgress)).await.unwrap_err();
        assert!(matches!(err, StoryworldError::CharacterNotFound(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn on_demand_completion_fills_images() {
        let world = World::new();
        world.describe("0002b", "name: Cy\n");
        let source = FakeSource::with(vec!["b.png", "a.png"]);
        let builder = world.builder().with_image_source(source.clone());

        let updates = Arc::new(Mutex::new(Vec::new()));
        let seen = updates.clone();
        let sink = move |u: ProgressUpdate| -> std::result::Result<(), SinkError> {
            seen.lock().unwrap().push((u.done, u.total));
            Ok(())
        };

        let ctx = builder.build("0002b", Arc::new(sink)).await.unwrap();
        assert_eq!(ctx.content["images_count"], Value::from(2));
        assert_eq!(ctx.image.unwrap().file_name(), Some("a.png"));
        assert_eq!(*updates.lock().unwrap(), vec![(1, 2), (2, 2)]);
        assert_eq!(world.paths.images.join("0002b").read_dir().unwrap().count(), 2);
    }

    #[tokio::test]
    async fn remote_without_matches_leaves_no_image() {
        let world = World::new();
        world.describe("0003c", "name: Di\n");
        let builder = world.builder().with_image_source(FakeSource::with(vec![]));

        let ctx = builder.build("0003c", Arc::new(NoProgress)).await.unwrap();
        assert!(ctx.image.is_none());
        assert!(!ctx.content.contains_key("images_count"));
        assert_eq!(ctx.content["name"], "Di");
    }

    #[tokio::test]
    async fn remote_failure_keeps_prior_selection() {
        let world = World::new();
        world.describe("0004d", "name: Ed\nprofile_image: https://cdn.example.com/ed.png\n");
        world.image("shared/ed.png");
        let source = FakeSource::failing();
        let builder = world.builder().with_image_source(source.clone());

        let ctx = builder.build("0004d", Arc::new(NoProgress)).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.image.unwrap().file_name(), Some("ed.png"));
        assert!(!ctx.content.contains_key("images_count"));
        assert_eq!(ctx.content["profile_image"], "https://cdn.example.com/ed.png");
    }

    #[tokio::test]
    async fn early_selection_survives_completion() {
        let world = World::new();
        world.describe("0005e", "name: Fa\nprofile_image: fa.png\n");
        world.image("elsewhere/fa.png");
        let builder = world
            .builder()
            .with_image_source(FakeSource::with(vec!["aaa.png"]));

        let ctx = builder.build("0005e", Arc::new(NoProgress)).await.unwrap();
        assert_eq!(ctx.content["images_count"], Value::from(1));
        assert_eq!(ctx.image.unwrap().file_name(), Some("fa.png"));
    }

    #[tokio::test]
    async fn local_images_skip_remote() {
        let world = World::new();
        world.describe("0006f", "name: Gu\n");
        world.image("0006f/g.webp");
        let source = FakeSource::with(vec!["x.png"]);
        let builder = world.builder().with_image_source(source.clone());

        let ctx = builder.build("0006f", Arc::new(NoProgress)).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.image.unwrap().mime_type, "image/webp");
    }

    #[tokio::test]
    async fn unwritable_public_root_still_embeds_private_image() {
        let world = World::new();
        world.describe("0007g", "name: Ho\n");
        world.image("0007g/h.png");
        fs::remove_dir_all(&world.paths.public_images).unwrap();
        fs::write(&world.paths.public_images, b"not a dir").unwrap();

        let ctx = world.builder().build("0007g", Arc::new(NoProgress)).await.unwrap();
        let image = ctx.image.unwrap();
        assert_eq!(image.path, world.paths.images.join("0007g/h.png"));
    }

    #[test]
    fn payload_base64() {
        let payload = ImagePayload {
            path: PathBuf::from("a.png"),
            mime_type: "image/png",
            data: b"hi".to_vec(),
        };
        assert_eq!(payload.base64(), "aGk=");
    }

    #[test]
    fn local_selection_uses_profile() {
        let world = World::new();
        world.describe("0008h", "name: Io\nprofile_image: b.png\n");
        world.image("0008h/a.png");
        world.image("0008h/b.png");

        let sel = world.builder().local_selection("0008h").unwrap().unwrap();
        assert_eq!(sel.path, world.paths.images.join("0008h/b.png"));
    }
}
