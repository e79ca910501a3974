use super::*;

#[test]
fn parses_config_command() {
    let cli = Cli::try_parse_from(["tagscout", "config"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Commands::Config));
}

#[test]
fn subcommand_is_required() {
    assert!(Cli::try_parse_from(["tagscout"]).is_err());
}

#[test]
fn crawl_defaults_to_seed_file_with_comments() {
    let cli = Cli::try_parse_from(["tagscout", "crawl"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Crawl {
            ref hashtags,
            hashtags_file: None,
            no_comments: false,
            output: None,
            dry_run: false,
        } if hashtags.is_empty()
    ));
}

#[test]
fn crawl_collects_repeated_hashtag_flags_in_order() {
    let cli = Cli::try_parse_from([
        "tagscout",
        "crawl",
        "--hashtag",
        "#skincare",
        "--hashtag",
        "glowup",
    ])
    .unwrap();
    let Commands::Crawl { hashtags, .. } = cli.command else {
        panic!("expected crawl command");
    };
    assert_eq!(hashtags, vec!["#skincare", "glowup"]);
}

#[test]
fn crawl_accepts_file_output_and_switches() {
    let cli = Cli::try_parse_from([
        "tagscout",
        "crawl",
        "--hashtags-file",
        "seeds.yaml",
        "--no-comments",
        "--output",
        "out/run.json",
        "--dry-run",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Commands::Crawl {
            hashtags_file: Some(ref f),
            no_comments: true,
            output: Some(ref o),
            dry_run: true,
            ..
        } if f == &PathBuf::from("seeds.yaml") && o == &PathBuf::from("out/run.json")
    ));
}

#[test]
fn hashtag_flag_requires_a_value() {
    assert!(Cli::try_parse_from(["tagscout", "crawl", "--hashtag"]).is_err());
}

#[test]
fn unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["tagscout", "collect"]).is_err());
}
