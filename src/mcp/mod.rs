pub mod format;
pub mod resources;
pub mod tools;

use std::sync::Arc;

use rmcp::ServiceExt;

use storyworld::config::types::StoryworldConfig;
use storyworld::core::context::ContextBuilder;
use storyworld::core::remote::{self, DatasetImages, GithubDescriptions};
use tools::StoryworldServer;

/// Start the MCP server over stdio. Blocks until the connection closes.
pub fn serve_stdio(cfg: StoryworldConfig) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let paths = cfg.paths.resolve();
        paths.ensure_dirs()?;

        let client = remote::http_client(cfg.remote.timeout_secs)?;
        let descriptions = GithubDescriptions::from_config(client.clone(), &cfg.remote)?;
        let images = Arc::new(DatasetImages::from_config(client.clone(), &cfg.remote)?);

        if cfg.behavior.auto_download {
            if let Some(report) =
                remote::bootstrap::bootstrap_if_empty(&descriptions, images.as_ref(), &paths).await
            {
                tracing::info!(
                    descriptions = report.descriptions,
                    images = ?report.images,
                    "initial fetch complete"
                );
            }
        } else {
            tracing::debug!("automatic download disabled");
        }

        let builder = ContextBuilder::new(paths).with_image_source(images);
        let server = StoryworldServer::new(builder, cfg.remote.clone(), client);

        tracing::info!("serving MCP over stdio");
        let service = server.serve(rmcp::transport::stdio()).await?;
        service.waiting().await?;

        Ok(())
    })
}
