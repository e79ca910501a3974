mod crawl;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tagscout")]
#[command(about = "Hashtag-driven creator discovery and scoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Crawl hashtags for creators, then score and rank them
    Crawl {
        /// Hashtag to seed discovery with; repeatable
        #[arg(long = "hashtag", value_name = "TAG")]
        hashtags: Vec<String>,
        /// YAML seed file; defaults to `TAGSCOUT_HASHTAGS_PATH` when no
        /// `--hashtag` is given
        #[arg(long, value_name = "PATH")]
        hashtags_file: Option<PathBuf>,
        /// Skip comment collection; audience quality is left undefined
        #[arg(long)]
        no_comments: bool,
        /// Write the crawl output and ranking as one JSON document
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Print what would be crawled without opening a session
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the resolved configuration with secrets redacted
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = tagscout_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Crawl {
            hashtags,
            hashtags_file,
            no_comments,
            output,
            dry_run,
        } => {
            let args = crawl::CrawlArgs {
                hashtags,
                hashtags_file,
                no_comments,
                output,
                dry_run,
            };
            crawl::run_crawl(&config, &args).await?;
        }
        Commands::Config => println!("{config:#?}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests;
