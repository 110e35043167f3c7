use crate::cli::OutputFormat;
use crate::cli::display::render_report;
use storyworld::config::types::StoryworldConfig;
use storyworld::core::remote::{self, DatasetImages, GithubDescriptions};

#[derive(clap::Args)]
pub struct FetchArgs {
    /// Descriptions repository ("owner/name")
    #[arg(long)]
    pub github_repo: Option<String>,

    /// Directory inside the descriptions repository
    #[arg(long)]
    pub github_path: Option<String>,

    /// Image dataset id ("owner/name")
    #[arg(long)]
    pub hf_dataset: Option<String>,
}

pub fn run(args: FetchArgs, cfg: &StoryworldConfig, format: OutputFormat) -> anyhow::Result<()> {
    let mut remote_cfg = cfg.remote.clone();
    if let Some(repo) = args.github_repo {
        remote_cfg.github_repo = repo;
    }
    if let Some(path) = args.github_path {
        remote_cfg.github_path = path;
    }
    if let Some(dataset) = args.hf_dataset {
        remote_cfg.hf_dataset = dataset;
    }
    let paths = cfg.paths.resolve();

    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        let client = remote::http_client(remote_cfg.timeout_secs)?;
        let descriptions = GithubDescriptions::from_config(client.clone(), &remote_cfg)?;
        let images = DatasetImages::from_config(client, &remote_cfg)?;
        remote::fetch_all(&descriptions, &images, &paths).await
    })?;

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(std::io::stdout(), &report)?;
            println!();
        }
        OutputFormat::Paths => {
            println!("{}", paths.descriptions.display());
            if report.images.is_some() {
                println!("{}", paths.images.display());
            }
        }
        OutputFormat::Human => println!("{}", render_report(&report)),
    }
    Ok(())
}
