use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch a page and print the roast.
    Analyze(AnalyzeArgs),
    /// Fetch (or read) a page and print the extracted content as JSON.
    Extract(ExtractArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Target page URL (must be http/https).
    #[arg(long)]
    pub url: String,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Target page URL (must be http/https).
    #[arg(long, conflicts_with = "input", required_unless_present = "input")]
    pub url: Option<String>,

    /// Local HTML file to extract instead of fetching.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Maximum characters of extracted content (defaults to ROASTMYSITE_MAX_CONTENT_CHARS).
    #[arg(long)]
    pub max_chars: Option<usize>,
}
