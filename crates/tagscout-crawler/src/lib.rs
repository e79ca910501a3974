//! Crawl orchestration: one browsing session, four paced stages, and the
//! cleaning that guards what reaches scoring.

pub mod breaker;
pub mod clean;
pub mod engine;
pub mod error;
pub mod pacing;
pub mod parse;
pub mod pipeline;
pub mod retry;
pub mod session;
pub mod stages;
pub mod summary;
pub mod types;

pub use breaker::{BreakerPhase, CircuitBreaker};
pub use clean::RecordCleaner;
pub use engine::{BrowsingEngine, InterceptedResponse, SessionLauncher};
pub use error::{CrawlError, ErrorKind};
pub use pacing::{ActionKind, PacingController};
pub use pipeline::{CrawlOutput, CrawlPipeline, HashtagFrequency, DEFAULT_ORIGIN};
pub use retry::{ActionFailure, Attempted, RetryCoordinator, RetryPolicy};
pub use session::{Session, SessionHealth, SessionManager};
pub use stages::Stage;
pub use summary::{RunSummary, StageSummary};
