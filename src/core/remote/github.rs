use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::{RemoteSource, get_bytes, get_json, is_safe_relative};
use crate::config::types::RemoteConfig;
use crate::core::copy::write_atomic;
use crate::error::{Result, StoryworldError};

/// One entry of a repository contents listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub download_url: Option<String>,
}

impl ContentEntry {
    /// Files ending in `.yaml` with a download URL.
    pub fn is_description(&self) -> bool {
        self.kind == "file" && self.name.ends_with(".yaml") && self.download_url.is_some()
    }
}

/// Description files listed under a path of a GitHub repository.
pub struct GithubDescriptions {
    client: reqwest::Client,
    api_base: String,
    owner: String,
    name: String,
    path: String,
}

impl GithubDescriptions {
    /// `repo` must be `owner/name`.
    pub fn new(
        client: reqwest::Client,
        api_base: impl Into<String>,
        repo: &str,
        path: impl Into<String>,
    ) -> Result<Self> {
        let (owner, name) = split_repo(repo)?;
        Ok(Self {
            client,
            api_base: api_base.into(),
            owner,
            name,
            path: path.into(),
        })
    }

    pub fn from_config(client: reqwest::Client, cfg: &RemoteConfig) -> Result<Self> {
        Self::new(client, cfg.github_api.clone(), &cfg.github_repo, cfg.github_path.clone())
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base.trim_end_matches('/'),
            self.owner,
            self.name,
            self.path.trim_matches('/')
        )
    }

    pub async fn list(&self) -> Result<Vec<ContentEntry>> {
        get_json(&self.client, &self.contents_url()).await
    }

    /// Download every `.yaml` file in the listing into `dest`, overwriting.
    pub async fn fetch_descriptions(&self, dest: &Path) -> Result<usize> {
        let entries = self.list().await?;
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|e| StoryworldError::io(dest, e))?;

        let mut written = 0;
        for entry in entries.iter().filter(|e| e.is_description()) {
            if !is_safe_relative(&entry.name) || entry.name.contains('/') {
                tracing::warn!(name = %entry.name, "skipping description with unsafe name");
                continue;
            }
            let Some(url) = entry.download_url.as_deref() else {
                continue;
            };

            let bytes = get_bytes(&self.client, url).await?;
            let target = dest.join(&entry.name);
            let path = target.clone();
            tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
                .await?
                .map_err(|e| StoryworldError::io(&target, e))?;

            tracing::info!(name = %entry.name, dest = %target.display(), "downloaded description");
            written += 1;
        }
        Ok(written)
    }
}

#[async_trait]
impl RemoteSource for GithubDescriptions {
    fn label(&self) -> String {
        format!("github:{}/{}/{}", self.owner, self.name, self.path)
    }

    async fn fetch_all(&self, dest: &Path) -> Result<usize> {
        self.fetch_descriptions(dest).await
    }
}

fn split_repo(repo: &str) -> Result<(String, String)> {
    match repo.split('/').collect::<Vec<_>>().as_slice() {
        [owner, name] if !owner.is_empty() && !name.is_empty() => {
            Ok((owner.to_string(), name.to_string()))
        }
        _ => Err(StoryworldError::Config(format!(
            "repository must look like owner/name, got '{repo}'"
        ))),
    }
}
