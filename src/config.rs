/// Runtime configuration
///
/// Resolved once at startup from command line flags (each with an
/// environment variable fallback, see `main.rs`) and turned into a session.
use std::path::PathBuf;

use crate::error::StorageError;
use crate::session::{Account, Session};
use crate::state::data::AccountTier;
use crate::state::library::SqliteStore;
use crate::state::quota::QuotaPolicy;

/// Account used when none is given
pub const DEFAULT_ACCOUNT: &str = "guest";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite catalog holding the history slots
    pub db_path: PathBuf,
    pub account: Account,
    /// Hard cap on one stored history blob, independent of the tier budget
    pub max_value_bytes: Option<usize>,
    pub policy: QuotaPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: SqliteStore::default_db_path(),
            account: Account::new(DEFAULT_ACCOUNT, AccountTier::default()),
            max_value_bytes: None,
            policy: QuotaPolicy::default(),
        }
    }
}

impl Config {
    /// Fill in defaults for anything not given explicitly
    pub fn resolve(
        db_path: Option<PathBuf>,
        account_id: Option<String>,
        tier: Option<AccountTier>,
        max_value_bytes: Option<usize>,
    ) -> Self {
        let defaults = Self::default();
        let account_id = account_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or(defaults.account.id);

        Self {
            db_path: db_path.unwrap_or(defaults.db_path),
            account: Account::new(account_id, tier.unwrap_or(defaults.account.tier)),
            max_value_bytes: max_value_bytes.filter(|&max| max > 0),
            policy: defaults.policy,
        }
    }

    /// Open the catalog and load this account's history
    pub fn open_session(&self) -> Result<Session<SqliteStore>, StorageError> {
        let store = SqliteStore::open(&self.db_path)?.with_max_value_bytes(self.max_value_bytes);
        Ok(Session::open(store, self.account.clone(), self.policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_defaults() {
        let config = Config::resolve(None, None, None, None);
        assert_eq!(config, Config::default());
        assert_eq!(config.account.id, DEFAULT_ACCOUNT);
        assert_eq!(config.account.tier, AccountTier::None);
    }

    #[test]
    fn test_resolve_overrides() {
        let config = Config::resolve(
            Some(PathBuf::from("/tmp/h.db")),
            Some("  alice ".to_string()),
            Some(AccountTier::Ssvip),
            Some(0),
        );
        assert_eq!(config.db_path, PathBuf::from("/tmp/h.db"));
        assert_eq!(config.account, Account::new("alice", AccountTier::Ssvip));
        // zero means "no cap"
        assert_eq!(config.max_value_bytes, None);
    }

    #[test]
    fn test_blank_account_falls_back() {
        let config = Config::resolve(None, Some("   ".to_string()), None, Some(4096));
        assert_eq!(config.account.id, DEFAULT_ACCOUNT);
        assert_eq!(config.max_value_bytes, Some(4096));
    }

    #[test]
    fn test_open_session_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::resolve(
            Some(dir.path().join("style_extract.db")),
            Some("alice".to_string()),
            Some(AccountTier::Vip),
            None,
        );

        let session = config.open_session().unwrap();
        assert!(session.list().is_empty());
        assert_eq!(session.budget_bytes(), 10 * 1024 * 1024);
    }
}
