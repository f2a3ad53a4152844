//! Process settings, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration.
///
/// Every field has a default so the service starts without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Settings {
    /// TCP address to bind (`MODS_BIND_ADDRESS`, default `"0.0.0.0:3000"`).
    pub bind_address: String,
    /// Root of the content store and default database location (`MODS_DATA_DIR`).
    pub data_dir: PathBuf,
    /// sqlx SQLite URL (`MODS_DATABASE_URL`, default `sqlite://{data_dir}/mods.sqlite`).
    pub database_url: String,
    /// Catalog JSON file (`MODS_CATALOG_PATH`); the built-in catalog when unset.
    pub catalog_path: Option<PathBuf>,
    /// Prefix for published download URLs (`MODS_PUBLIC_BASE_URL`).
    pub public_base_url: String,
    /// Period between reconciliation passes (`MODS_SYNC_INTERVAL_SECS`).
    pub sync_interval: Duration,
    /// Connect and per-read bound on upstream calls (`MODS_HTTP_TIMEOUT_SECS`).
    pub http_timeout: Duration,
    /// Token accepted for every tag and for manual sync (`MODS_UPLOAD_TOKEN`).
    pub admin_token: Option<String>,
    /// Log filter used when `RUST_LOG` is unset (`MODS_LOG`).
    pub log_level: String,
    pub game_version_lesta: String,
    pub game_version_wargaming: String,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = PathBuf::from("./store");
        Self {
            bind_address: "0.0.0.0:3000".into(),
            database_url: default_database_url(&data_dir),
            data_dir,
            catalog_path: None,
            public_base_url: String::new(),
            sync_interval: Duration::from_secs(12 * 60 * 60),
            http_timeout: Duration::from_secs(30),
            admin_token: None,
            log_level: "info".into(),
            game_version_lesta: "0.9.0".into(),
            game_version_wargaming: "0.9.0".into(),
        }
    }
}

fn default_database_url(data_dir: &std::path::Path) -> String {
    format!("sqlite://{}", data_dir.join("mods.sqlite").display())
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; `from_env` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str, fallback: Duration| {
            var(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        let data_dir = var("MODS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        Self {
            bind_address: var("MODS_BIND_ADDRESS").unwrap_or(defaults.bind_address),
            database_url: var("MODS_DATABASE_URL")
                .unwrap_or_else(|| default_database_url(&data_dir)),
            data_dir,
            catalog_path: var("MODS_CATALOG_PATH").map(PathBuf::from),
            public_base_url: var("MODS_PUBLIC_BASE_URL").unwrap_or(defaults.public_base_url),
            sync_interval: secs("MODS_SYNC_INTERVAL_SECS", defaults.sync_interval),
            http_timeout: secs("MODS_HTTP_TIMEOUT_SECS", defaults.http_timeout),
            admin_token: var("MODS_UPLOAD_TOKEN"),
            log_level: var("MODS_LOG").unwrap_or(defaults.log_level),
            game_version_lesta: var("MODS_GAME_VERSION_LESTA")
                .unwrap_or(defaults.game_version_lesta),
            game_version_wargaming: var("MODS_GAME_VERSION_WARGAMING")
                .unwrap_or(defaults.game_version_wargaming),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let s = Settings::from_lookup(lookup(&[]));
        assert_eq!(s.bind_address, "0.0.0.0:3000");
        assert_eq!(s.sync_interval, Duration::from_secs(43200));
        assert!(s.database_url.starts_with("sqlite://"));
        assert!(s.database_url.ends_with("mods.sqlite"));
        assert_eq!(s.admin_token, None);
    }

    #[test]
    fn database_follows_data_dir() {
        let s = Settings::from_lookup(lookup(&[("MODS_DATA_DIR", "/var/lib/mods")]));
        assert_eq!(s.data_dir, PathBuf::from("/var/lib/mods"));
        assert_eq!(s.database_url, "sqlite:///var/lib/mods/mods.sqlite");
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let s = Settings::from_lookup(lookup(&[
            ("MODS_HTTP_TIMEOUT_SECS", "soon"),
            ("MODS_SYNC_INTERVAL_SECS", "60"),
            ("MODS_UPLOAD_TOKEN", "  "),
        ]));
        assert_eq!(s.http_timeout, Duration::from_secs(30));
        assert_eq!(s.sync_interval, Duration::from_secs(60));
        assert_eq!(s.admin_token, None);
    }
}
