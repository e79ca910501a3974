use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::app_config::{AppConfig, Environment};
use crate::crawl_config::{CrawlConfig, DelayRange};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let or_default =
        |var: &str, default: &str| -> String { optional(var).unwrap_or_else(|| default.to_string()) };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let browser_url = require("TAGSCOUT_BROWSER_URL")?;
    if !(browser_url.starts_with("http://") || browser_url.starts_with("https://")) {
        return Err(invalid(
            "TAGSCOUT_BROWSER_URL",
            format!("expected an http(s) URL, got \"{browser_url}\""),
        ));
    }

    let env = parse_environment(&or_default("TAGSCOUT_ENV", "development"))?;
    let log_level = or_default("TAGSCOUT_LOG_LEVEL", "info");
    let browser_token = optional("TAGSCOUT_BROWSER_TOKEN");
    let hashtags_path = PathBuf::from(or_default(
        "TAGSCOUT_HASHTAGS_PATH",
        "./config/hashtags.yaml",
    ));
    let accounts_path = optional("TAGSCOUT_ACCOUNTS_PATH").map(PathBuf::from);

    let mut crawl = CrawlConfig::default();

    override_parsed(&optional, "TAGSCOUT_MAX_PROFILES_PER_HASHTAG", &mut crawl.max_profiles_per_hashtag)?;
    override_parsed(&optional, "TAGSCOUT_MAX_POSTS_PER_PROFILE", &mut crawl.max_posts_per_profile)?;
    override_parsed(&optional, "TAGSCOUT_MAX_COMMENTS_PER_POST", &mut crawl.max_comments_per_post)?;
    override_parsed(
        &optional,
        "TAGSCOUT_MAX_COMMENT_POSTS_PER_PROFILE",
        &mut crawl.max_comment_posts_per_profile,
    )?;
    override_bool(&optional, "TAGSCOUT_COLLECT_COMMENTS", &mut crawl.collect_comments)?;
    override_bool(
        &optional,
        "TAGSCOUT_HUMAN_LIKE_DELAYS",
        &mut crawl.pacing.human_like_delays,
    )?;

    override_parsed(&optional, "TAGSCOUT_DISCOVERY_WORKERS", &mut crawl.workers.discovery)?;
    override_parsed(&optional, "TAGSCOUT_PROFILE_WORKERS", &mut crawl.workers.profiles)?;
    override_parsed(&optional, "TAGSCOUT_CONTENT_WORKERS", &mut crawl.workers.content)?;
    override_parsed(&optional, "TAGSCOUT_COMMENT_WORKERS", &mut crawl.workers.comments)?;
    override_parsed(&optional, "TAGSCOUT_QUEUE_CAPACITY", &mut crawl.queue_capacity)?;

    override_parsed(&optional, "TAGSCOUT_RETRY_MAX_ATTEMPTS", &mut crawl.retry.max_attempts)?;
    override_parsed(
        &optional,
        "TAGSCOUT_BREAKER_THRESHOLD",
        &mut crawl.breaker.failure_threshold,
    )?;
    override_secs(&optional, "TAGSCOUT_BREAKER_WINDOW_SECS", &mut crawl.breaker.window)?;
    override_secs(&optional, "TAGSCOUT_BREAKER_COOLDOWN_SECS", &mut crawl.breaker.cooldown)?;

    override_range(&optional, "TAGSCOUT_PACING_SEARCH_MS", &mut crawl.pacing.search)?;
    override_range(&optional, "TAGSCOUT_PACING_PROFILE_MS", &mut crawl.pacing.profile_visit)?;
    override_range(&optional, "TAGSCOUT_PACING_SCROLL_MS", &mut crawl.pacing.scroll)?;
    override_range(&optional, "TAGSCOUT_PACING_COMMENT_MS", &mut crawl.pacing.comment_read)?;
    override_parsed(
        &optional,
        "TAGSCOUT_BACKOFF_MULTIPLIER",
        &mut crawl.pacing.backoff_multiplier,
    )?;
    override_parsed(&optional, "TAGSCOUT_BACKOFF_CEILING", &mut crawl.pacing.backoff_ceiling)?;
    override_parsed(
        &optional,
        "TAGSCOUT_BACKOFF_RESET_AFTER",
        &mut crawl.pacing.reset_after_successes,
    )?;

    override_secs(
        &optional,
        "TAGSCOUT_ACTION_TIMEOUT_SECS",
        &mut crawl.session.action_timeout,
    )?;
    override_parsed(
        &optional,
        "TAGSCOUT_SESSION_VALIDATE_EVERY",
        &mut crawl.session.validate_every,
    )?;
    override_secs(
        &optional,
        "TAGSCOUT_ACCOUNT_COOLDOWN_SECS",
        &mut crawl.session.account_cooldown,
    )?;

    override_parsed(&optional, "TAGSCOUT_MAX_SEARCH_SCROLLS", &mut crawl.max_search_scrolls)?;
    override_parsed(&optional, "TAGSCOUT_MAX_CONTENT_SCROLLS", &mut crawl.max_content_scrolls)?;
    override_parsed(&optional, "TAGSCOUT_MAX_COMMENT_SCROLLS", &mut crawl.max_comment_scrolls)?;

    if let Some(raw) = optional("TAGSCOUT_MAX_RUN_SECS") {
        let secs = raw
            .parse::<u64>()
            .map_err(|e| invalid("TAGSCOUT_MAX_RUN_SECS", e.to_string()))?;
        crawl.max_run_duration = Some(Duration::from_secs(secs));
    }

    override_parsed(
        &optional,
        "TAGSCOUT_WEIGHT_ENGAGEMENT",
        &mut crawl.scoring.weights.engagement,
    )?;
    override_parsed(
        &optional,
        "TAGSCOUT_WEIGHT_QUALITY",
        &mut crawl.scoring.weights.audience_quality,
    )?;
    override_parsed(
        &optional,
        "TAGSCOUT_WEIGHT_CONSISTENCY",
        &mut crawl.scoring.weights.consistency,
    )?;
    override_parsed(
        &optional,
        "TAGSCOUT_SUBSTANTIVE_MIN_CHARS",
        &mut crawl.scoring.substantive_min_chars,
    )?;
    override_parsed(
        &optional,
        "TAGSCOUT_TIER_MID_FOLLOWERS",
        &mut crawl.scoring.mid_tier_followers,
    )?;
    override_parsed(
        &optional,
        "TAGSCOUT_TIER_MACRO_FOLLOWERS",
        &mut crawl.scoring.macro_tier_followers,
    )?;

    crawl.validate()?;

    Ok(AppConfig {
        env,
        log_level,
        browser_url,
        browser_token,
        hashtags_path,
        accounts_path,
        crawl,
    })
}

/// Overwrite `slot` with the parsed value of `var` when it is set.
fn override_parsed<T, L>(lookup: &L, var: &str, slot: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    L: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(var) {
        *slot = raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

fn override_secs<L>(lookup: &L, var: &str, slot: &mut Duration) -> Result<(), ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    let mut secs = slot.as_secs();
    override_parsed(lookup, var, &mut secs)?;
    *slot = Duration::from_secs(secs);
    Ok(())
}

fn override_range<L>(lookup: &L, var: &str, slot: &mut DelayRange) -> Result<(), ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(var) {
        *slot = DelayRange::parse(&raw).map_err(|reason| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason,
        })?;
    }
    Ok(())
}

fn override_bool<L>(lookup: &L, var: &str, slot: &mut bool) -> Result<(), ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(var) {
        *slot = parse_bool(&raw).ok_or_else(|| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected true/false, got \"{raw}\""),
        })?;
    }
    Ok(())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "TAGSCOUT_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
