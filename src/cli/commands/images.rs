use crate::cli::OutputFormat;
use crate::cli::output::output_images;
use storyworld::config::types::StoryworldConfig;
use storyworld::core::assets::list_local_images;

#[derive(clap::Args)]
pub struct ImagesArgs {
    /// Character code
    pub code: String,
}

pub fn run(args: ImagesArgs, cfg: &StoryworldConfig, format: OutputFormat) -> anyhow::Result<()> {
    let paths = cfg.paths.resolve();
    let images = list_local_images(&paths.images, &args.code);
    if images.is_empty() {
        tracing::info!(code = %args.code, "no local images");
    }
    output_images(&images, format, &mut std::io::stdout().lock())
}
