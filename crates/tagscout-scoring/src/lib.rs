//! Creator qualification scoring.
//!
//! Scores each accepted profile on engagement, audience quality, and
//! posting consistency from its cleaned posts and comment samples, attaches
//! a reach tier for filtering, and ranks the results. Scoring is pure: it
//! reads records and returns values, with no I/O or hidden state.

pub mod classifier;
pub mod error;
pub mod rank;
pub mod score;

pub use classifier::CommentClassifier;
pub use error::ScoringError;
pub use rank::{rank, Scorer};
pub use score::{ReachTier, ScoreResult};
