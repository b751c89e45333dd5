use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;

use roastmysite::analyze::Analyzer;
use roastmysite::app::AppState;
use roastmysite::app::rate_limit::SlidingWindowLimiter;
use roastmysite::config::Settings;
use roastmysite::fetch::PageFetcher;
use roastmysite::openai::OpenAiChatClient;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, env = "ROASTMYSITE_ADDR", default_value = "127.0.0.1:3000")]
    addr: SocketAddr,

    /// Static web assets directory (serve if it contains index.html).
    #[arg(long, default_value = "public")]
    web_dir: PathBuf,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    roastmysite::logging::init()?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting roastmysite-app");

    let settings = Settings::from_env().context("load settings")?;
    let completion = OpenAiChatClient::new(
        &settings.openai_base_url,
        settings.require_api_key()?,
        settings.openai_model.clone(),
    )?;
    tracing::info!(
        model = completion.model(),
        fetch_timeout_secs = settings.fetch_timeout.as_secs(),
        rate_limit_max = settings.rate_limit_max,
        rate_limit_window_secs = settings.rate_limit_window.as_secs(),
        error_detail = ?settings.error_detail,
        "configured analyzer"
    );

    let fetcher = PageFetcher::new(settings.fetch_timeout, settings.max_body_bytes)?;
    let analyzer = Analyzer::new(fetcher, Arc::new(completion), settings.analyze_options());
    let rate_limiter = Arc::new(SlidingWindowLimiter::new(
        settings.rate_limit_window,
        settings.rate_limit_max,
    ));
    let state = AppState::new(analyzer, rate_limiter);

    let app = roastmysite::app::router(state, Some(&args.web_dir));

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
