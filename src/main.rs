use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use github_uploader::{server, Backend, Config};

/// Accept file uploads over HTTP and commit them to a GitHub repository
#[derive(Debug, Parser)]
#[command(name = "github-uploader", version)]
struct Args {
    /// Config file (YAML); defaults to ~/.config/github-uploader/config.yaml
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP listen port (overrides SERVER_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Remote backend: github or memory (overrides REMOTE_BACKEND)
    #[arg(long)]
    backend: Option<Backend>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    tracing::debug!("loaded configuration: {:?}", config);

    server::run(config).await
}
