//! Store configuration.

use std::time::Duration;

/// Database name used by the POWA application.
pub const DEFAULT_DATABASE_NAME: &str = "POWA";

/// Configuration for a [`StorageService`](crate::StorageService).
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the database; also the directory name under a storage root.
    pub database_name: String,

    /// Whether to create the database directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the record log on every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Close the connection once its last active transaction completes.
    ///
    /// Every following operation has to re-initialize. This bounds the
    /// connection's lifetime at the cost of a re-open per call.
    pub close_after_transaction: bool,

    /// Upper bound on opening (and upgrading) the database.
    pub open_timeout: Duration,

    /// Upper bound on waiting for another transaction to release a store.
    pub transaction_timeout: Duration,

    /// How many times a collection re-initializes before giving up.
    pub init_retry_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            create_if_missing: true,
            sync_on_commit: true,
            close_after_transaction: true,
            open_timeout: Duration::from_secs(10),
            transaction_timeout: Duration::from_secs(5),
            init_retry_limit: 1,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the database name.
    #[must_use]
    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets whether the connection closes after its last transaction.
    #[must_use]
    pub const fn close_after_transaction(mut self, value: bool) -> Self {
        self.close_after_transaction = value;
        self
    }

    /// Sets the open timeout.
    #[must_use]
    pub const fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Sets the transaction begin timeout.
    #[must_use]
    pub const fn transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Sets the collection re-initialization limit.
    #[must_use]
    pub const fn init_retry_limit(mut self, limit: u32) -> Self {
        self.init_retry_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.database_name, "POWA");
        assert!(config.create_if_missing);
        assert!(config.close_after_transaction);
        assert_eq!(config.init_retry_limit, 1);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .database_name("scratch")
            .close_after_transaction(false)
            .transaction_timeout(Duration::from_millis(50))
            .init_retry_limit(3);

        assert_eq!(config.database_name, "scratch");
        assert!(!config.close_after_transaction);
        assert_eq!(config.transaction_timeout, Duration::from_millis(50));
        assert_eq!(config.init_retry_limit, 3);
    }
}
