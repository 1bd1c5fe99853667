use std::path::PathBuf;

use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

use lydian_core::platform::{AgentPlatform, LydianSettings};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional TOML settings file; falls back to compiled defaults and
    /// `LYDIAN__`-prefixed environment variables.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Args::parse();
    let settings = LydianSettings::load_from_path(args.config)?;

    info!(port = settings.service.port, "starting lydian agent");

    let runtime = AgentPlatform::new(settings).start().await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    runtime.shutdown().await?;
    Ok(())
}
