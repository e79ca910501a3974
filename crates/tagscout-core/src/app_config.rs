use std::path::PathBuf;

use crate::crawl_config::CrawlConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub browser_url: String,
    pub browser_token: Option<String>,
    pub hashtags_path: PathBuf,
    pub accounts_path: Option<PathBuf>,
    pub crawl: CrawlConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("browser_url", &self.browser_url)
            .field(
                "browser_token",
                &self.browser_token.as_ref().map(|_| "[redacted]"),
            )
            .field("hashtags_path", &self.hashtags_path)
            .field("accounts_path", &self.accounts_path)
            .field("crawl", &self.crawl)
            .finish()
    }
}
