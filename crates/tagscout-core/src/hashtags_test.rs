use std::io::Write;

use super::*;

#[test]
fn normalize_adds_hash_and_lowercases() {
    assert_eq!(normalize_hashtag("SkinCare").as_deref(), Some("#skincare"));
}

#[test]
fn normalize_collapses_repeated_hashes() {
    assert_eq!(normalize_hashtag("  ##glow ").as_deref(), Some("#glow"));
}

#[test]
fn normalize_rejects_empty_and_spaced() {
    assert!(normalize_hashtag("#").is_none());
    assert!(normalize_hashtag("   ").is_none());
    assert!(normalize_hashtag("skin care").is_none());
}

#[test]
fn term_strips_hash() {
    let tag = Hashtag::new("#skincare", 2).unwrap();
    assert_eq!(tag.term(), "skincare");
    assert_eq!(tag.to_string(), "#skincare");
}

#[test]
fn resolve_applies_default_and_override_quota() {
    let file: HashtagsFile = serde_yaml::from_str(
        "hashtags:\n  - tag: skincare\n  - tag: \"#GlowUp\"\n    max_profiles: 5\n",
    )
    .unwrap();
    let tags = file.resolve(50).unwrap();
    assert_eq!(
        tags,
        vec![
            Hashtag {
                tag: "#skincare".to_string(),
                quota: 50
            },
            Hashtag {
                tag: "#glowup".to_string(),
                quota: 5
            },
        ]
    );
}

#[test]
fn resolve_rejects_duplicates_after_normalization() {
    let file: HashtagsFile =
        serde_yaml::from_str("hashtags:\n  - tag: skincare\n  - tag: \"#SKINCARE\"\n").unwrap();
    let err = file.resolve(10).unwrap_err();
    assert!(err.to_string().contains("duplicate hashtag"));
}

#[test]
fn resolve_rejects_zero_quota() {
    let file: HashtagsFile =
        serde_yaml::from_str("hashtags:\n  - tag: skincare\n    max_profiles: 0\n").unwrap();
    assert!(file.resolve(10).is_err());
}

#[test]
fn load_hashtags_reads_file() {
    let path = std::env::temp_dir().join(format!("tagscout-hashtags-{}.yaml", std::process::id()));
    {
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "hashtags:\n  - tag: skincare").unwrap();
    }
    let tags = load_hashtags(&path, 3).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].quota, 3);
}

#[test]
fn load_hashtags_missing_file_is_io_error() {
    let err = load_hashtags(Path::new("/nonexistent/hashtags.yaml"), 3).unwrap_err();
    assert!(matches!(err, ConfigError::FileIo { .. }));
}
