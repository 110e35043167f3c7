use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::OutputFormat;
use crate::cli::output::output_context;
use storyworld::config::types::StoryworldConfig;
use storyworld::core::context::ContextBuilder;
use storyworld::core::progress::{ProgressSink, ProgressUpdate, SinkError};
use storyworld::core::remote::{self, DatasetImages};

#[derive(clap::Args)]
pub struct ContextArgs {
    /// Character code
    pub code: String,

    /// Never download missing images
    #[arg(long)]
    pub offline: bool,
}

pub fn run(args: ContextArgs, cfg: &StoryworldConfig, format: OutputFormat) -> anyhow::Result<()> {
    let paths = cfg.paths.resolve();
    let mut builder = ContextBuilder::new(paths);
    if !args.offline {
        let client = remote::http_client(cfg.remote.timeout_secs)?;
        let images = DatasetImages::from_config(client, &cfg.remote)?;
        builder = builder.with_image_source(Arc::new(images));
    }

    let bar = ProgressBar::hidden();
    if format == OutputFormat::Human {
        bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }
    bar.set_style(
        ProgressStyle::with_template("  {bar:30.cyan/blue} {pos}/{len} {wide_msg}")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    let sink_bar = bar.clone();
    let sink: Arc<dyn ProgressSink> =
        Arc::new(move |update: ProgressUpdate| -> Result<(), SinkError> {
            sink_bar.set_length(update.total as u64);
            sink_bar.set_position(update.done as u64);
            sink_bar.set_message(update.message);
            Ok(())
        });

    let rt = tokio::runtime::Runtime::new()?;
    let built = rt.block_on(builder.build(&args.code, sink));
    bar.finish_and_clear();

    let ctx = built?;
    output_context(&ctx, format, &mut std::io::stdout().lock())
}
