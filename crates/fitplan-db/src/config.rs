use std::env;

/// Database configuration.
///
/// Reads from the `FITPLAN_DATABASE_URL` environment variable, falling back to
/// `postgresql://localhost:5432/fitplan` when unset.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
}

impl DbConfig {
    /// The default connection URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/fitplan";

    /// Environment variable consulted by [`DbConfig::from_env`].
    pub const URL_ENV: &str = "FITPLAN_DATABASE_URL";

    /// Build a config from the environment.
    pub fn from_env() -> Self {
        let database_url =
            env::var(Self::URL_ENV).unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        Self { database_url }
    }

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Extract the database name from the URL.
    ///
    /// Returns `None` if the URL has no path component.
    pub fn database_name(&self) -> Option<&str> {
        let without_query = self
            .database_url
            .split('?')
            .next()
            .unwrap_or(&self.database_url);
        without_query.rsplit('/').next().filter(|s| !s.is_empty())
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
