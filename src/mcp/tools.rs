// MCP tool implementations
//
// Tools:
// - list_characters: roster of local descriptions
// - get_character_context: record + selected image, with on-demand image fetch
// - list_character_images: every local image of one character
// - get_character_profile_image: the selected image, local files only
// - fetch_characters: bulk download of descriptions and images

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ListResourcesResult, PaginatedRequestParam,
    ProgressNotificationParam, ReadResourceRequestParam, ReadResourceResult, ServerCapabilities,
    ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler, tool, tool_handler, tool_router};
use serde::Deserialize;

use storyworld::config::types::RemoteConfig;
use storyworld::core::context::{CharacterContext, ContextBuilder, ImagePayload};
use storyworld::core::progress::{ChannelSink, NoProgress, ProgressSink};
use storyworld::core::remote::{self, DatasetImages, GithubDescriptions};
use storyworld::core::roster;
use storyworld::error::{self, StoryworldError};

use super::format;
use super::resources;

const PROGRESS_BUFFER: usize = 64;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CodeParams {
    /// Character code, e.g. "0000g"
    pub code: String,
}

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct FetchParams {
    /// Override the descriptions repository ("owner/name")
    pub github_repo: Option<String>,
    /// Override the directory inside the descriptions repository
    pub github_path: Option<String>,
    /// Override the image dataset id ("owner/name")
    pub hf_dataset: Option<String>,
}

#[derive(Clone)]
pub struct StoryworldServer {
    builder: Arc<ContextBuilder>,
    remote: RemoteConfig,
    client: reqwest::Client,
    tool_router: ToolRouter<Self>,
}

impl StoryworldServer {
    pub fn new(builder: ContextBuilder, remote: RemoteConfig, client: reqwest::Client) -> Self {
        Self {
            builder: Arc::new(builder),
            remote,
            client,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl StoryworldServer {
    #[tool(description = "List every locally described character with code, name, age and up to eight personality traits.")]
    async fn list_characters(&self) -> Result<CallToolResult, McpError> {
        let root = self.builder.paths().descriptions.clone();
        let roster = tokio::task::spawn_blocking(move || roster::list_characters(&root))
            .await
            .map_err(internal)?;
        Ok(CallToolResult::success(vec![Content::json(roster)?]))
    }

    #[tool(description = "Get a character's description record and profile image. Missing images are downloaded from the image dataset on first use.")]
    async fn get_character_context(
        &self,
        Parameters(CodeParams { code }): Parameters<CodeParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let (sink, forwarder): (Arc<dyn ProgressSink>, Option<tokio::task::JoinHandle<()>>) =
            match context.meta.get_progress_token() {
                Some(token) => {
                    let (sink, mut rx) = ChannelSink::bounded(PROGRESS_BUFFER);
                    let peer = context.peer.clone();
                    let task = tokio::spawn(async move {
                        while let Some(update) = rx.recv().await {
                            let param = ProgressNotificationParam {
                                progress_token: token.clone(),
                                progress: update.done as f64,
                                total: Some(update.total as f64),
                                message: Some(update.message),
                            };
                            if let Err(e) = peer.notify_progress(param).await {
                                tracing::debug!(error = %e, "progress notification dropped");
                            }
                        }
                    });
                    let sink: Arc<dyn ProgressSink> = Arc::new(sink);
                    (sink, Some(task))
                }
                None => {
                    let sink: Arc<dyn ProgressSink> = Arc::new(NoProgress);
                    (sink, None)
                }
            };

        let built = self.builder.build(&code, sink).await;

        // Flush queued notifications before the result goes out.
        if let Some(task) = forwarder {
            let _ = task.await;
        }

        context_result(built)
    }

    #[tool(description = "Return every local image of a character, sorted by file name.")]
    async fn list_character_images(
        &self,
        Parameters(CodeParams { code }): Parameters<CodeParams>,
    ) -> Result<CallToolResult, McpError> {
        let builder = Arc::clone(&self.builder);
        let payloads = tokio::task::spawn_blocking(move || local_payloads(&builder, &code))
            .await
            .map_err(internal)?;
        Ok(images_result(&payloads))
    }

    #[tool(description = "Return the selected profile image of a character from local files only. Empty when none is available.")]
    async fn get_character_profile_image(
        &self,
        Parameters(CodeParams { code }): Parameters<CodeParams>,
    ) -> Result<CallToolResult, McpError> {
        let builder = Arc::clone(&self.builder);
        let payload = tokio::task::spawn_blocking(move || profile_payload(&builder, &code))
            .await
            .map_err(internal)?
            .map_err(internal)?;
        Ok(images_result(payload.as_slice()))
    }

    #[tool(description = "Download all character descriptions and images from the configured remote sources. Arguments override the configured repository and dataset.")]
    async fn fetch_characters(
        &self,
        Parameters(params): Parameters<FetchParams>,
    ) -> Result<CallToolResult, McpError> {
        let mut cfg = self.remote.clone();
        if let Some(repo) = params.github_repo {
            cfg.github_repo = repo;
        }
        if let Some(path) = params.github_path {
            cfg.github_path = path;
        }
        if let Some(dataset) = params.hf_dataset {
            cfg.hf_dataset = dataset;
        }

        let sources = GithubDescriptions::from_config(self.client.clone(), &cfg).and_then(|d| {
            DatasetImages::from_config(self.client.clone(), &cfg).map(|i| (d, i))
        });
        let result = match sources {
            Ok((descriptions, images)) => {
                remote::fetch_all(&descriptions, &images, self.builder.paths()).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => Ok(CallToolResult::success(vec![
                Content::text(format::format_fetch_report(&report)),
                Content::json(&report)?,
            ])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(
                format::format_fetch_failed(&e.to_string()),
            )])),
        }
    }
}

#[tool_handler]
impl ServerHandler for StoryworldServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("Storyworld serves character descriptions and images. Use 'list_characters' to see who exists, 'get_character_context' for a character's record and profile image, and 'fetch_characters' to download the collection.".into()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let root = self.builder.paths().descriptions.clone();
        let listed = tokio::task::spawn_blocking(move || resources::list_character_resources(&root))
            .await
            .map_err(internal)?;
        Ok(ListResourcesResult::with_all_items(listed))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let builder = Arc::clone(&self.builder);
        let uri = request.uri;
        let contents =
            tokio::task::spawn_blocking(move || resources::read_character_resource(&builder, &uri))
                .await
                .map_err(internal)??;
        Ok(ReadResourceResult {
            contents: vec![contents],
        })
    }
}

/// Content JSON followed by at most one image; unknown codes become a tool error.
fn context_result(built: error::Result<CharacterContext>) -> Result<CallToolResult, McpError> {
    match built {
        Ok(ctx) => {
            let mut contents = vec![Content::json(&ctx.content)?];
            if let Some(image) = &ctx.image {
                contents.push(image_content(image));
            }
            Ok(CallToolResult::success(contents))
        }
        Err(StoryworldError::CharacterNotFound(code)) => Ok(CallToolResult::error(vec![
            Content::text(format::format_not_found(&code)),
        ])),
        Err(e) => Err(internal(e)),
    }
}

/// One image content per payload; no images is an empty success.
fn images_result(payloads: &[ImagePayload]) -> CallToolResult {
    CallToolResult::success(payloads.iter().map(image_content).collect())
}

/// Every readable local image of `code`. Unreadable files are skipped.
fn local_payloads(builder: &ContextBuilder, code: &str) -> Vec<ImagePayload> {
    builder
        .local_images(code)
        .iter()
        .filter_map(|asset| match ImagePayload::read(&asset.path) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(path = %asset.path.display(), error = %e, "unreadable image");
                None
            }
        })
        .collect()
}

/// Selected local image of `code`; unknown codes and missing images yield `None`.
fn profile_payload(builder: &ContextBuilder, code: &str) -> error::Result<Option<ImagePayload>> {
    let selection = match builder.local_selection(code) {
        Ok(Some(s)) => s,
        Ok(None) | Err(StoryworldError::CharacterNotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };
    Ok(ImagePayload::read(&selection.path).ok())
}

fn image_content(image: &ImagePayload) -> Content {
    Content::image(image.base64(), image.mime_type)
}

fn internal(e: impl std::fmt::Display) -> McpError {
    McpError::internal_error(e.to_string(), None)
}
