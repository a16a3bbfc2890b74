use std::time::Duration;

use curriculum_core::types::DbId;
use curriculum_db::tree_manager::TreeSettings;
use curriculum_db::PoolSettings;

/// Tree-check configuration loaded from environment variables.
///
/// All fields except the database URL have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub database_url: String,
    /// Pool size (default: `20`).
    pub max_connections: u32,
    /// Pool acquire timeout in seconds (default: `10`).
    pub acquire_timeout_secs: u64,
    /// Lock wait bound for manager transactions in ms (default: `5000`).
    pub lock_timeout_ms: u64,
    /// Scan only this curriculum instead of every live one.
    pub curriculum_id: Option<DbId>,
}

impl CheckConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default    |
    /// |---------------------------|------------|
    /// | `DATABASE_URL`            | (required) |
    /// | `DB_MAX_CONNECTIONS`      | `20`       |
    /// | `DB_ACQUIRE_TIMEOUT_SECS` | `10`       |
    /// | `TREE_LOCK_TIMEOUT_MS`    | `5000`     |
    /// | `CHECK_CURRICULUM_ID`     | unset      |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Panics on missing or malformed required values, like [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = lookup("DATABASE_URL").expect("DATABASE_URL must be set");

        let max_connections: u32 = lookup("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "20".into())
            .parse()
            .expect("DB_MAX_CONNECTIONS must be a valid u32");

        let acquire_timeout_secs: u64 = lookup("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".into())
            .parse()
            .expect("DB_ACQUIRE_TIMEOUT_SECS must be a valid u64");

        let lock_timeout_ms: u64 = lookup("TREE_LOCK_TIMEOUT_MS")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .expect("TREE_LOCK_TIMEOUT_MS must be a valid u64");

        let curriculum_id = lookup("CHECK_CURRICULUM_ID")
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.trim()
                    .parse::<DbId>()
                    .expect("CHECK_CURRICULUM_ID must be a valid i64")
            });

        Self {
            database_url,
            max_connections,
            acquire_timeout_secs,
            lock_timeout_ms,
            curriculum_id,
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
        }
    }

    pub fn tree_settings(&self) -> TreeSettings {
        TreeSettings {
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = CheckConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")]));
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.acquire_timeout_secs, 10);
        assert_eq!(config.lock_timeout_ms, 5000);
        assert_eq!(config.curriculum_id, None);
        assert_eq!(config.tree_settings().lock_timeout, Duration::from_secs(5));
    }

    #[test]
    fn defaults_match_library_settings() {
        let config = CheckConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")]));
        let pool = PoolSettings::default();
        assert_eq!(config.pool_settings().max_connections, pool.max_connections);
        assert_eq!(config.pool_settings().acquire_timeout, pool.acquire_timeout);
        assert_eq!(
            config.tree_settings().lock_timeout,
            TreeSettings::default().lock_timeout
        );
    }

    #[test]
    fn overrides_apply() {
        let config = CheckConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("TREE_LOCK_TIMEOUT_MS", "250"),
            ("CHECK_CURRICULUM_ID", " 17 "),
        ]));
        assert_eq!(config.pool_settings().max_connections, 4);
        assert_eq!(config.tree_settings().lock_timeout, Duration::from_millis(250));
        assert_eq!(config.curriculum_id, Some(17));
    }

    #[test]
    fn blank_curriculum_id_means_all() {
        let config = CheckConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("CHECK_CURRICULUM_ID", ""),
        ]));
        assert_eq!(config.curriculum_id, None);
    }

    #[test]
    #[should_panic(expected = "DATABASE_URL must be set")]
    fn database_url_is_required() {
        CheckConfig::from_lookup(lookup_from(&[]));
    }
}
