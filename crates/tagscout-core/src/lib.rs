//! Shared configuration and record types for the tagscout workspace.

pub mod accounts;
pub mod app_config;
pub mod config;
pub mod crawl_config;
pub mod hashtags;
pub mod records;

pub use accounts::{load_accounts, Account, AccountsFile};
pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use crawl_config::{
    BreakerSettings, CrawlConfig, DelayRange, PacingSettings, RetrySettings, ScoringConfig,
    ScoringWeights, SessionSettings, StagePoolSizes,
};
pub use hashtags::{load_hashtags, normalize_hashtag, Hashtag, HashtagSeed, HashtagsFile};
pub use records::{
    CandidateProfile, CleanedRecord, CommentSample, InfluencerProfile, Post, RejectReason,
    ValidationOutcome,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read {path}: {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    FileParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),
}
