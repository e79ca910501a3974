use chrono::{TimeZone, Utc};

use super::*;

const DAY: i64 = 86_400;

fn post(id: &str, published: i64, views: u64, likes: u64, comments: u64, shares: u64) -> Post {
    Post {
        post_id: id.into(),
        profile_handle: "ana".into(),
        description: String::new(),
        duration_secs: Some(30),
        view_count: views,
        like_count: likes,
        comment_count: comments,
        share_count: shares,
        save_count: 0,
        published_at: Utc.timestamp_opt(1_700_000_000 + published, 0).single().unwrap(),
        hashtags: Vec::new(),
        is_ad: false,
        is_pinned: false,
    }
}

fn comment(id: &str, text: &str) -> CommentSample {
    CommentSample {
        comment_id: Some(id.into()),
        post_id: "p1".into(),
        parent_id: None,
        author_handle: None,
        text: text.into(),
        like_count: 0,
        reply_count: 0,
        created_at: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
    }
}

fn profile(handle: &str, followers: u64) -> InfluencerProfile {
    InfluencerProfile {
        handle: handle.into(),
        user_id: None,
        display_name: None,
        bio: None,
        follower_count: followers,
        following_count: 0,
        total_likes: 0,
        video_count: 0,
        is_verified: false,
        is_private: false,
        account_age_days: None,
        source_hashtag: "#skincare".into(),
        discovered_at: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap(),
    }
}

fn close(a: Option<f64>, b: f64) -> bool {
    a.is_some_and(|a| (a - b).abs() < 1e-9)
}

// ---------------------------------------------------------------------------
// Engagement
// ---------------------------------------------------------------------------

#[test]
fn engagement_is_mean_of_per_post_rates() {
    let a = post("a", 0, 1000, 40, 10, 5);
    let b = post("b", DAY, 200, 10, 0, 0);
    assert!(close(engagement_rate(&[&a]), 0.055));
    assert!(close(engagement_rate(&[&a, &b]), (0.055 + 0.05) / 2.0));
}

#[test]
fn engagement_ignores_post_order() {
    let a = post("a", 0, 1000, 100, 50, 50);
    let b = post("b", DAY, 300, 30, 20, 10);
    let c = post("c", 2 * DAY, 700, 90, 30, 20);
    let forward = engagement_rate(&[&a, &b, &c]);
    let reversed = engagement_rate(&[&c, &b, &a]);
    let shuffled = engagement_rate(&[&b, &a, &c]);
    assert_eq!(forward.map(f64::to_bits), reversed.map(f64::to_bits));
    assert_eq!(forward.map(f64::to_bits), shuffled.map(f64::to_bits));
}

#[test]
fn engagement_is_undefined_without_views() {
    let silent = post("a", 0, 0, 3, 0, 0);
    assert_eq!(engagement_rate(&[&silent]), None);
    assert_eq!(engagement_rate(&[]), None);
}

// ---------------------------------------------------------------------------
// Audience quality
// ---------------------------------------------------------------------------

#[test]
fn audience_quality_is_substantive_share() {
    let good = comment("1", "which sunscreen do you use for oily skin?");
    let spam = comment("2", "follow me back for more");
    let emoji = comment("3", "😍😍😍");
    let (q, n) = audience_quality(&[&good, &spam, &emoji], &CommentClassifier::default());
    assert!(close(q, 1.0 / 3.0));
    assert_eq!(n, 1);
}

#[test]
fn audience_quality_is_undefined_without_comments() {
    assert_eq!(
        audience_quality(&[], &CommentClassifier::default()),
        (None, 0)
    );
}

// ---------------------------------------------------------------------------
// Consistency
// ---------------------------------------------------------------------------

#[test]
fn perfectly_regular_posting_scores_one() {
    let posts: Vec<Post> = (0..4).map(|i| post(&i.to_string(), i * DAY, 1, 0, 0, 0)).collect();
    let refs: Vec<&Post> = posts.iter().collect();
    assert!(close(consistency(&refs), 1.0));
}

#[test]
fn irregular_posting_scores_lower() {
    // gaps of 1 and 3 days: mean 2, population sd 1, CoV 0.5
    let posts = [
        post("a", 0, 1, 0, 0, 0),
        post("b", DAY, 1, 0, 0, 0),
        post("c", 4 * DAY, 1, 0, 0, 0),
    ];
    let refs: Vec<&Post> = posts.iter().collect();
    assert!(close(consistency(&refs), 1.0 / 1.5));
}

#[test]
fn consistency_needs_three_posts_and_distinct_times() {
    let a = post("a", 0, 1, 0, 0, 0);
    let b = post("b", DAY, 1, 0, 0, 0);
    assert_eq!(consistency(&[&a, &b]), None);

    let same = [post("x", 0, 1, 0, 0, 0), post("y", 0, 1, 0, 0, 0), post("z", 0, 1, 0, 0, 0)];
    let refs: Vec<&Post> = same.iter().collect();
    assert_eq!(consistency(&refs), None);
}

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

#[test]
fn composite_weights_defined_dimensions() {
    let w = ScoringWeights::default();
    let all = composite(&w, Some(0.1), Some(0.8), Some(0.5));
    assert!(close(all, 0.5 * 0.1 + 0.3 * 0.8 + 0.2 * 0.5));
}

#[test]
fn composite_renormalizes_over_missing_dimensions() {
    let w = ScoringWeights::default();
    // quality missing: (0.5*0.1 + 0.2*0.5) / 0.7
    assert!(close(
        composite(&w, Some(0.1), None, Some(0.5)),
        (0.05 + 0.1) / 0.7
    ));
    assert!(close(composite(&w, Some(0.055), None, None), 0.055));
    assert_eq!(composite(&w, None, None, None), None);
}

#[test]
fn composite_is_undefined_when_only_zero_weight_dimensions_exist() {
    let w = ScoringWeights {
        engagement: 1.0,
        audience_quality: 0.0,
        consistency: 0.0,
    };
    assert_eq!(composite(&w, None, Some(0.9), None), None);
}

// ---------------------------------------------------------------------------
// Whole-profile scoring
// ---------------------------------------------------------------------------

#[test]
fn follower_tier_does_not_change_composite() {
    let config = ScoringConfig::default();
    let classifier = CommentClassifier::new(config.substantive_min_chars);
    let p = post("a", 0, 1000, 40, 10, 5);
    let c = comment("1", "this routine cleared my skin in two weeks");

    let small = score(&config, &classifier, &profile("small", 2_000), &[&p], &[&c]);
    let big = score(&config, &classifier, &profile("big", 5_000_000), &[&p], &[&c]);

    assert_eq!(small.tier, ReachTier::Micro);
    assert_eq!(big.tier, ReachTier::Macro);
    assert_eq!(small.composite, big.composite);
}

#[test]
fn score_is_deterministic_and_records_its_inputs() {
    let config = ScoringConfig::default();
    let classifier = CommentClassifier::new(config.substantive_min_chars);
    let posts = [post("b", DAY, 500, 5, 0, 0), post("a", 0, 1000, 40, 10, 5)];
    let comments = [comment("c2", "love how gentle the cleanser feels"), comment("c1", "ok")];
    let post_refs: Vec<&Post> = posts.iter().collect();
    let comment_refs: Vec<&CommentSample> = comments.iter().collect();
    let who = profile("ana", 150_000);

    let first = score(&config, &classifier, &who, &post_refs, &comment_refs);
    let second = score(&config, &classifier, &who, &post_refs, &comment_refs);
    assert_eq!(first, second);
    assert_eq!(first.post_ids, vec!["a", "b"]);
    assert_eq!(first.comment_ids, vec!["c1", "c2"]);
    assert_eq!(first.comments_sampled, 2);
    assert_eq!(first.comments_substantive, 1);
    assert_eq!(first.tier, ReachTier::Mid);
}

#[test]
fn undefined_metrics_serialize_as_null() {
    let config = ScoringConfig::default();
    let result = score(
        &config,
        &CommentClassifier::default(),
        &profile("quiet", 10),
        &[],
        &[],
    );
    let json = serde_json::to_value(&result).unwrap();
    assert!(json["composite"].is_null());
    assert!(json["engagement"].is_null());
    assert!(json["audience_quality"].is_null());
    assert_eq!(json["tier"], "micro");
}

#[test]
fn config_checks_reject_bad_weights_and_tiers() {
    let mut config = ScoringConfig::default();
    config.weights.consistency = -0.1;
    assert_eq!(
        check_config(&config),
        Err(ScoringError::InvalidWeight {
            name: "consistency",
            value: -0.1
        })
    );

    config.weights = ScoringWeights {
        engagement: 0.0,
        audience_quality: 0.0,
        consistency: 0.0,
    };
    assert_eq!(check_config(&config), Err(ScoringError::ZeroWeightSum));

    let mut config = ScoringConfig::default();
    config.mid_tier_followers = config.macro_tier_followers;
    assert!(matches!(
        check_config(&config),
        Err(ScoringError::InvalidTiers { .. })
    ));
}

#[test]
fn same_record_set_in_any_order_scores_identically() {
    let config = ScoringConfig::default();
    let classifier = CommentClassifier::new(config.substantive_min_chars);
    let posts = [
        post("a", 0, 1000, 100, 50, 50),
        post("b", DAY, 300, 30, 20, 10),
        post("c", 3 * DAY, 700, 90, 30, 20),
    ];
    let comments = [
        comment("c1", "which serum do you layer under this?"),
        comment("c2", "nice"),
        comment("c3", "my skin broke out with this one sadly"),
    ];
    let who = profile("ana", 50_000);

    let forward = score(
        &config,
        &classifier,
        &who,
        &[&posts[0], &posts[1], &posts[2]],
        &[&comments[0], &comments[1], &comments[2]],
    );
    let permuted = score(
        &config,
        &classifier,
        &who,
        &[&posts[2], &posts[0], &posts[1]],
        &[&comments[2], &comments[1], &comments[0]],
    );
    assert_eq!(forward, permuted);
    assert_eq!(
        forward.composite.map(f64::to_bits),
        permuted.composite.map(f64::to_bits)
    );
}
