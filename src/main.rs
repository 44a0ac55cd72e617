use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    topshelf::logging::init().context("init logging")?;

    let cli = topshelf::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        topshelf::cli::Command::Extract(args) => {
            topshelf::pipeline::extract(args).await.context("extract")?;
        }
        topshelf::cli::Command::Rank(args) => {
            topshelf::pipeline::rank(args).context("rank")?;
        }
        topshelf::cli::Command::Details(args) => {
            topshelf::pipeline::details(args).await.context("details")?;
        }
        topshelf::cli::Command::Run(args) => {
            topshelf::pipeline::run(args).await.context("run")?;
        }
    }

    Ok(())
}
