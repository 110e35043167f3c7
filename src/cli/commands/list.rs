use crate::cli::OutputFormat;
use crate::cli::output::output_roster;
use storyworld::config::types::StoryworldConfig;
use storyworld::core::roster;

pub fn run(cfg: &StoryworldConfig, format: OutputFormat) -> anyhow::Result<()> {
    let paths = cfg.paths.resolve();
    let roster = roster::list_characters(&paths.descriptions);
    if roster.count == 0 {
        tracing::info!(
            dir = %paths.descriptions.display(),
            "no character descriptions found; run `storyworld fetch`"
        );
    }
    output_roster(&roster, format, &mut std::io::stdout().lock())
}
