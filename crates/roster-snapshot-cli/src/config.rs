use std::path::{Path, PathBuf};

use roster_snapshot::{Endpoint, PromotionPolicy, RetryPolicy};
use roster_snapshot_store::SyncOptions;
use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// SQLite database file. Defaults to the user cache directory.
    pub database: Option<PathBuf>,
    /// Directory of `<endpoint>.json` payloads served by the fixture fetcher.
    pub fixtures: Option<PathBuf>,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub promotion: PromotionSection,
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncSection {
    pub max_retries: u32,
    pub concurrency: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_retries: retry.max_retries,
            concurrency: 4,
            base_delay_ms: retry.base_delay_ms,
            max_delay_ms: retry.max_delay_ms,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PromotionSection {
    pub auto_promote: bool,
    pub allow_partial: bool,
    pub keep_previous: usize,
}

impl Default for PromotionSection {
    fn default() -> Self {
        let policy = PromotionPolicy::default();
        Self {
            auto_promote: true,
            allow_partial: policy.allow_partial,
            keep_previous: policy.keep_previous,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: None,
            fixtures: None,
            sync: SyncSection::default(),
            promotion: PromotionSection::default(),
            endpoints: default_endpoints(),
        }
    }
}

impl AppConfig {
    pub fn promotion_policy(&self) -> PromotionPolicy {
        PromotionPolicy {
            allow_partial: self.promotion.allow_partial,
            keep_previous: self.promotion.keep_previous,
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            retry: RetryPolicy {
                max_retries: self.sync.max_retries,
                base_delay_ms: self.sync.base_delay_ms,
                max_delay_ms: self.sync.max_delay_ms,
            },
            concurrency: self.sync.concurrency,
            auto_promote: self.promotion.auto_promote,
            promotion: self.promotion_policy(),
        }
    }
}

/// The world-level endpoints every download needs, plus avatars as a
/// best-effort extra.
pub fn default_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::new("worlddetails", "1.9"),
        Endpoint::new("worldlanguages", "1.2"),
        Endpoint::new("leaguedetails", "1.6"),
        Endpoint::new("teamdetails", "3.7"),
        Endpoint::new("players", "2.6"),
        Endpoint::new("avatars", "1.1").optional(),
    ]
}

/// Config file path: `~/.config/roster-snapshot/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("roster-snapshot").join("config.toml"))
}

/// Load config from `path` (or the default location), falling back to
/// defaults if missing or unreadable.
pub fn load_config(path: Option<&Path>) -> AppConfig {
    let path = path.map(Path::to_path_buf).or_else(config_path);
    if let Some(path) = path
        && let Ok(contents) = std::fs::read_to_string(&path)
    {
        match toml::from_str::<AppConfig>(&contents) {
            Ok(config) => return config,
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to parse config, using defaults"
            ),
        }
    }

    AppConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_retry_policy() {
        let config = AppConfig::default();
        let options = config.sync_options();
        assert_eq!(options.retry, RetryPolicy::default());
        assert_eq!(options.concurrency, 4);
        assert!(options.auto_promote);
        assert_eq!(options.promotion.keep_previous, 2);
        assert!(config.database.is_none());
    }

    #[test]
    fn default_endpoints_mark_avatars_optional() {
        let endpoints = default_endpoints();
        let avatars = endpoints.iter().find(|e| e.name == "avatars").unwrap();
        assert!(!avatars.required);
        assert!(endpoints.iter().filter(|e| e.name != "avatars").all(|e| e.required));
    }

    #[test]
    fn parse_full_config_from_toml() {
        let toml_str = r#"
database = "/var/lib/roster/snapshot.db"
fixtures = "fixtures"

[sync]
max_retries = 5
concurrency = 2

[promotion]
allow_partial = true
keep_previous = 0

[[endpoints]]
name = "worlddetails"
version = "1.9"

[[endpoints]]
name = "teamdetails"
version = "3.7"
user_id = 42
required = false
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.database.as_deref(),
            Some(Path::new("/var/lib/roster/snapshot.db"))
        );
        assert_eq!(config.sync.max_retries, 5);
        assert_eq!(config.sync.concurrency, 2);
        assert_eq!(config.sync.base_delay_ms, 1_000);
        assert!(config.promotion.auto_promote);
        assert!(config.promotion.allow_partial);
        assert_eq!(config.promotion.keep_previous, 0);

        assert_eq!(config.endpoints.len(), 2);
        assert!(config.endpoints[0].required);
        assert_eq!(config.endpoints[1].user_id, Some(42));
        assert!(!config.endpoints[1].required);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.endpoints, default_endpoints());
        assert_eq!(config.sync.max_retries, 3);
    }

    #[test]
    fn unparseable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sync = [not toml").unwrap();

        let config = load_config(Some(&path));
        assert_eq!(config.sync.max_retries, 3);
    }

    #[test]
    fn explicit_path_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sync]\nconcurrency = 9\n").unwrap();

        let config = load_config(Some(&path));
        assert_eq!(config.sync.concurrency, 9);
    }
}
