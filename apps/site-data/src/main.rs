mod discussions;
mod github;
mod projects;
mod snapshot;
mod stats;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::github::{GitHubClient, RepoRef};

/// Fetches GitHub repository data into static JSON snapshots for the site.
#[derive(Debug, Parser)]
#[command(name = "gpt-builder-site-data", version, about)]
struct Cli {
    /// Repository to describe, as <owner>/<name>.
    #[arg(long, env = "GITHUB_REPOSITORY", default_value = "cywf/gpt-builder")]
    repo: RepoRef,

    /// Token sent as `Authorization: token ...`. Optional for public data.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Directory the snapshot files are written to.
    #[arg(long, short, default_value = "public/data")]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stars, forks, languages and recent commit activity (stats.json).
    Stats,
    /// Most recently updated discussions (discussions.json).
    Discussions,
    /// Project board items or labelled issues (projects.json).
    Projects,
    /// All of the above.
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{}=info", env!("CARGO_CRATE_NAME")))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Fetching {:?} for {}", cli.command, cli.repo);
    let client = GitHubClient::new(cli.repo, cli.token);
    let out_dir = cli.out_dir;

    match cli.command {
        Command::Stats => stats::run(&client, &out_dir).await,
        Command::Discussions => discussions::run(&client, &out_dir).await,
        Command::Projects => projects::run(&client, &out_dir).await,
        Command::All => {
            discussions::run(&client, &out_dir).await?;
            projects::run(&client, &out_dir).await?;
            // Only the stats fetch is allowed to fail the build.
            stats::run(&client, &out_dir).await
        }
    }
}
