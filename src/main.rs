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
    dotenvy::dotenv().ok();
    roastmysite::logging::init().context("init logging")?;

    let cli = roastmysite::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        roastmysite::cli::Command::Analyze(args) => {
            roastmysite::analyze::run(args).await.context("analyze")?;
        }
        roastmysite::cli::Command::Extract(args) => {
            roastmysite::extract::run(args).await.context("extract")?;
        }
    }

    Ok(())
}
