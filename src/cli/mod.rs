pub mod commands;
pub mod display;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use storyworld::config;
use storyworld::config::types::StoryworldConfig;

#[derive(Parser)]
#[command(
    name = "storyworld",
    about = "Serve character descriptions and images to agents.",
    version
)]
pub struct Cli {
    /// Start MCP server over stdio
    #[arg(long)]
    pub mcp: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub paths: PathArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Directory overrides, applied after the config file and environment.
#[derive(clap::Args, Default)]
pub struct PathArgs {
    /// Directory holding <code>.yaml description files
    #[arg(long, global = true)]
    pub descriptions_dir: Option<PathBuf>,

    /// Directory holding <code>/ image folders
    #[arg(long, global = true)]
    pub images_dir: Option<PathBuf>,

    /// Directory receiving published profile images
    #[arg(long, global = true)]
    pub public_images_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download descriptions and images from the remote sources
    Fetch(commands::fetch::FetchArgs),
    /// List locally described characters
    List,
    /// Build the context of one character
    Context(commands::context::ContextArgs),
    /// List the local images of one character
    Images(commands::images::ImagesArgs),
    /// Show the resolved configuration
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Paths,
}

impl Cli {
    /// Layered configuration with command-line path overrides on top.
    pub fn load_config(&self) -> anyhow::Result<StoryworldConfig> {
        let mut cfg = config::load_config(self.config.as_deref())?;
        self.paths.apply(&mut cfg);
        Ok(cfg)
    }
}

impl PathArgs {
    pub fn apply(&self, cfg: &mut StoryworldConfig) {
        if let Some(dir) = &self.descriptions_dir {
            cfg.paths.descriptions = Some(dir.clone());
        }
        if let Some(dir) = &self.images_dir {
            cfg.paths.images = Some(dir.clone());
        }
        if let Some(dir) = &self.public_images_dir {
            cfg.paths.public_images = Some(dir.clone());
        }
    }
}

/// Dispatch a CLI command.
pub fn run(cli: Cli, cfg: StoryworldConfig) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Fetch(args)) => commands::fetch::run(args, &cfg, cli.format),
        Some(Commands::List) => commands::list::run(&cfg, cli.format),
        Some(Commands::Context(args)) => commands::context::run(args, &cfg, cli.format),
        Some(Commands::Images(args)) => commands::images::run(args, &cfg, cli.format),
        Some(Commands::Config) => commands::config::run(&cfg, cli.format),
        None => {
            // No subcommand: print help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}
