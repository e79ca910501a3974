use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

/// Returns a map with all required env vars populated with valid defaults.
fn full_env<'a>() -> HashMap<&'a str, &'a str> {
    let mut m = HashMap::new();
    m.insert("TAGSCOUT_BROWSER_URL", "http://localhost:9222");
    m
}

#[test]
fn parse_environment_development() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
}

#[test]
fn parse_environment_production() {
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "TAGSCOUT_ENV"));
}

#[test]
fn build_app_config_fails_without_browser_url() {
    let map: HashMap<&str, &str> = HashMap::new();
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "TAGSCOUT_BROWSER_URL"),
        "expected MissingEnvVar(TAGSCOUT_BROWSER_URL), got: {result:?}"
    );
}

#[test]
fn build_app_config_rejects_non_http_browser_url() {
    let mut map = full_env();
    map.insert("TAGSCOUT_BROWSER_URL", "ws://localhost:9222");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "TAGSCOUT_BROWSER_URL"),
        "expected InvalidEnvVar(TAGSCOUT_BROWSER_URL), got: {result:?}"
    );
}

#[test]
fn build_app_config_succeeds_with_defaults() {
    let map = full_env();
    let result = build_app_config(lookup_from_map(&map));
    assert!(result.is_ok(), "expected Ok, got: {result:?}");
    let cfg = result.unwrap();
    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.browser_url, "http://localhost:9222");
    assert!(cfg.browser_token.is_none());
    assert!(cfg.accounts_path.is_none());
    assert_eq!(cfg.hashtags_path, PathBuf::from("./config/hashtags.yaml"));
    assert_eq!(cfg.crawl, CrawlConfig::default());
}

#[test]
fn quotas_override() {
    let mut map = full_env();
    map.insert("TAGSCOUT_MAX_PROFILES_PER_HASHTAG", "2");
    map.insert("TAGSCOUT_MAX_POSTS_PER_PROFILE", "10");
    map.insert("TAGSCOUT_MAX_COMMENTS_PER_POST", "25");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.crawl.max_profiles_per_hashtag, 2);
    assert_eq!(cfg.crawl.max_posts_per_profile, 10);
    assert_eq!(cfg.crawl.max_comments_per_post, 25);
}

#[test]
fn quota_invalid_number() {
    let mut map = full_env();
    map.insert("TAGSCOUT_MAX_POSTS_PER_PROFILE", "lots");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "TAGSCOUT_MAX_POSTS_PER_PROFILE"),
        "expected InvalidEnvVar(TAGSCOUT_MAX_POSTS_PER_PROFILE), got: {result:?}"
    );
}

#[test]
fn collect_comments_can_be_disabled() {
    let mut map = full_env();
    map.insert("TAGSCOUT_COLLECT_COMMENTS", "false");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert!(!cfg.crawl.collect_comments);
}

#[test]
fn human_like_delays_rejects_garbage() {
    let mut map = full_env();
    map.insert("TAGSCOUT_HUMAN_LIKE_DELAYS", "sometimes");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "TAGSCOUT_HUMAN_LIKE_DELAYS"),
        "expected InvalidEnvVar(TAGSCOUT_HUMAN_LIKE_DELAYS), got: {result:?}"
    );
}

#[test]
fn nan_backoff_ceiling_is_rejected() {
    let mut map = full_env();
    map.insert("TAGSCOUT_BACKOFF_CEILING", "NaN");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("finite")),
        "expected Validation error, got: {result:?}"
    );
}

#[test]
fn infinite_ceiling_with_zero_range_is_rejected() {
    let mut map = full_env();
    map.insert("TAGSCOUT_PACING_SCROLL_MS", "0-0");
    map.insert("TAGSCOUT_BACKOFF_CEILING", "inf");
    assert!(matches!(
        build_app_config(lookup_from_map(&map)),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn pacing_range_override() {
    let mut map = full_env();
    map.insert("TAGSCOUT_PACING_SCROLL_MS", "100-250");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.crawl.pacing.scroll, DelayRange::new(100, 250));
}

#[test]
fn pacing_range_invalid() {
    let mut map = full_env();
    map.insert("TAGSCOUT_PACING_SEARCH_MS", "900-100");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "TAGSCOUT_PACING_SEARCH_MS"),
        "expected InvalidEnvVar(TAGSCOUT_PACING_SEARCH_MS), got: {result:?}"
    );
}

#[test]
fn breaker_settings_override() {
    let mut map = full_env();
    map.insert("TAGSCOUT_BREAKER_THRESHOLD", "3");
    map.insert("TAGSCOUT_BREAKER_WINDOW_SECS", "60");
    map.insert("TAGSCOUT_BREAKER_COOLDOWN_SECS", "30");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.crawl.breaker.failure_threshold, 3);
    assert_eq!(cfg.crawl.breaker.window, Duration::from_secs(60));
    assert_eq!(cfg.crawl.breaker.cooldown, Duration::from_secs(30));
}

#[test]
fn zero_workers_fail_validation() {
    let mut map = full_env();
    map.insert("TAGSCOUT_PROFILE_WORKERS", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::Validation(_))),
        "expected Validation error, got: {result:?}"
    );
}

#[test]
fn max_run_secs_sets_budget() {
    let mut map = full_env();
    map.insert("TAGSCOUT_MAX_RUN_SECS", "3600");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.crawl.max_run_duration, Some(Duration::from_secs(3600)));
}

#[test]
fn scoring_weights_override() {
    let mut map = full_env();
    map.insert("TAGSCOUT_WEIGHT_ENGAGEMENT", "1");
    map.insert("TAGSCOUT_WEIGHT_QUALITY", "1");
    map.insert("TAGSCOUT_WEIGHT_CONSISTENCY", "0");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    let w = cfg.crawl.scoring.weights;
    assert!((w.engagement - 1.0).abs() < f64::EPSILON);
    assert!((w.audience_quality - 1.0).abs() < f64::EPSILON);
    assert!(w.consistency.abs() < f64::EPSILON);
}

#[test]
fn debug_output_redacts_browser_token() {
    let mut map = full_env();
    map.insert("TAGSCOUT_BROWSER_TOKEN", "super-secret");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    let rendered = format!("{cfg:?}");
    assert!(!rendered.contains("super-secret"));
    assert!(rendered.contains("[redacted]"));
}
