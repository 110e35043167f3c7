use crate::cli::OutputFormat;
use storyworld::config::{self, types::StoryworldConfig};

pub fn run(cfg: &StoryworldConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let resolved = serde_json::json!({
                "config": cfg,
                "resolved_paths": cfg.paths.resolve(),
            });
            serde_json::to_writer_pretty(std::io::stdout(), &resolved)?;
            println!();
        }
        OutputFormat::Paths => {
            println!("{}", config::config_path().display());
        }
        OutputFormat::Human => {
            // Human-readable: just use TOML format
            let toml_str = toml::to_string_pretty(cfg)?;
            println!("{}", toml_str);
        }
    }

    Ok(())
}
