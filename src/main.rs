use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod mcp;

fn main() -> anyhow::Result<()> {
    // .env fills variables the environment leaves unset
    dotenvy::dotenv().ok();
    init_tracing();

    let args = cli::Cli::parse();
    let cfg = args.load_config()?;

    if args.mcp {
        mcp::serve_stdio(cfg)?;
    } else {
        cli::run(args, cfg)?;
    }

    Ok(())
}

/// Logs go to stderr; stdout carries command output or the MCP stream.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("storyworld=info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();
}
