//! The `crawl` command: resolve seeds, run the pipeline, score, report.
//!
//! A crawl that ends early still reports and writes whatever it cleaned;
//! the abort reason is printed with the summary.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tagscout_browser::{BrowserClient, RemoteLauncher};
use tagscout_core::{load_accounts, load_hashtags, AppConfig, Hashtag};
use tagscout_crawler::{CrawlOutput, CrawlPipeline, SessionManager};
use tagscout_scoring::{ScoreResult, Scorer};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub(crate) struct CrawlArgs {
    pub hashtags: Vec<String>,
    pub hashtags_file: Option<PathBuf>,
    pub no_comments: bool,
    pub output: Option<PathBuf>,
    pub dry_run: bool,
}

/// The JSON document written by `--output`.
#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    output: &'a CrawlOutput,
    ranking: &'a [ScoreResult],
}

/// Build the ordered hashtag list for a run.
///
/// An explicit `--hashtags-file` is read first; the configured seed file is
/// used only when neither a file nor any `--hashtag` flag is given. Flag
/// hashtags follow in order, and a tag already present is skipped.
pub(crate) fn resolve_hashtags(
    flags: &[String],
    file: Option<&Path>,
    default_file: &Path,
    quota: usize,
) -> anyhow::Result<Vec<Hashtag>> {
    let mut hashtags = match file {
        Some(path) => load_hashtags(path, quota)
            .with_context(|| format!("loading hashtags from {}", path.display()))?,
        None if flags.is_empty() => load_hashtags(default_file, quota)
            .with_context(|| format!("loading hashtags from {}", default_file.display()))?,
        None => Vec::new(),
    };

    for raw in flags {
        let hashtag = Hashtag::new(raw, quota)
            .ok_or_else(|| anyhow::anyhow!("invalid hashtag: '{raw}'"))?;
        if hashtags.iter().any(|h| h.tag == hashtag.tag) {
            tracing::warn!(tag = %hashtag.tag, "duplicate hashtag ignored");
            continue;
        }
        hashtags.push(hashtag);
    }

    anyhow::ensure!(!hashtags.is_empty(), "no hashtags to crawl");
    Ok(hashtags)
}

/// Run one crawl end to end.
///
/// # Errors
///
/// Returns an error for invalid configuration or seeds, an unreadable
/// account file, a browser client that cannot be built, or a failure to
/// write `--output`. Crawl failures themselves end up in the run summary.
pub(crate) async fn run_crawl(config: &AppConfig, args: &CrawlArgs) -> anyhow::Result<()> {
    let mut crawl = config.crawl.clone();
    if args.no_comments {
        crawl.collect_comments = false;
    }
    crawl.validate()?;
    let scorer = Scorer::new(crawl.scoring.clone())?;

    let hashtags = resolve_hashtags(
        &args.hashtags,
        args.hashtags_file.as_deref(),
        &config.hashtags_path,
        crawl.max_profiles_per_hashtag,
    )?;
    let accounts = match &config.accounts_path {
        Some(path) => load_accounts(path)
            .with_context(|| format!("loading accounts from {}", path.display()))?,
        None => Vec::new(),
    };

    if args.dry_run {
        println!(
            "dry-run: would crawl {} hashtags with {} accounts (comments {}):",
            hashtags.len(),
            accounts.len(),
            if crawl.collect_comments { "on" } else { "off" }
        );
        for hashtag in &hashtags {
            println!("  {:<32} up to {} profiles", hashtag.tag, hashtag.quota);
        }
        return Ok(());
    }

    let client = BrowserClient::new(
        &config.browser_url,
        config.browser_token.as_deref(),
        crawl.session.action_timeout,
    )
    .context("failed to build browser client")?;

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let session = Arc::new(SessionManager::new(
        Arc::new(RemoteLauncher::new(client)),
        accounts,
        crawl.session.clone(),
        cancel,
    ));
    let output = CrawlPipeline::new(crawl, session).run(hashtags).await;
    ctrl_c.abort();

    let ranking = scorer.score_all(&output.profiles, &output.posts, &output.comments);

    println!("{}", output.summary);
    println!();
    print!("{}", ranking_table(&ranking));

    if let Some(path) = &args.output {
        write_report(path, &output, &ranking)?;
        tracing::info!(path = %path.display(), "report written");
    }

    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::warn!("received ctrl-c, cancelling crawl");
            cancel.cancel();
        }
        Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
    }
}

fn write_report(path: &Path, output: &CrawlOutput, ranking: &[ScoreResult]) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(&Report { output, ranking })?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn ranking_table(ranking: &[ScoreResult]) -> String {
    let mut out = format!(
        "{:>4} {:<28} {:<6} {:>10} {:>9} {:>10} {:>8} {:>11}\n",
        "#", "handle", "tier", "followers", "composite", "engagement", "quality", "consistency"
    );
    for (i, r) in ranking.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>4} {:<28} {:<6} {:>10} {:>9} {:>10} {:>8} {:>11}",
            i + 1,
            r.handle,
            r.tier.to_string(),
            r.follower_count,
            fmt_score(r.composite),
            fmt_score(r.engagement),
            fmt_score(r.audience_quality),
            fmt_score(r.consistency),
        );
    }
    out
}

fn fmt_score(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{s:.4}"))
}
