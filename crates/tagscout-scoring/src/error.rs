use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ScoringError {
    #[error("scoring weight `{name}` must be a non-negative number, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("scoring weights must sum to a positive value")]
    ZeroWeightSum,

    #[error("mid tier threshold ({mid}) must be below macro tier threshold ({macro_tier})")]
    InvalidTiers { mid: u64, macro_tier: u64 },
}
