use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::ConfigError;

/// Login credentials for one scraping account.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct AccountsFile {
    pub accounts: Vec<Account>,
}

/// Load the account pool from YAML.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed, or if a
/// username is empty or repeated.
pub fn load_accounts(path: &Path) -> Result<Vec<Account>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    let file: AccountsFile = serde_yaml::from_str(&content)?;

    let mut seen = HashSet::new();
    for account in &file.accounts {
        if account.username.trim().is_empty() {
            return Err(ConfigError::Validation(
                "account username must be non-empty".to_string(),
            ));
        }
        if !seen.insert(account.username.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate account: '{}'",
                account.username
            )));
        }
    }

    Ok(file.accounts)
}
