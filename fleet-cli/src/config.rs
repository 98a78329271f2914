use serde_derive::{Deserialize, Serialize};

const DEFAULT_LOG_DIR: &str = ".fleet-cli";

/// Top-level configuration: the reaper's two durations and the two driver
/// tick intervals, plus logging. Loaded from YAML; a missing or malformed
/// file falls back to [`ConfigLoad::default`] rather than failing the
/// process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigLoad {
    pub log_level: String,
    pub log_dir: Option<String>,

    /// Seconds an `Active` agent may go silent before it's marked `Missing`.
    pub mark_missing_after_secs: i64,
    /// Seconds a `Missing` agent may go silent before it's removed.
    pub remove_stale_after_secs: i64,

    /// How often `fleet-cli run` ticks the reaper.
    pub reaper_tick_secs: u64,
    /// How often `fleet-cli run` attempts to place queued sessions.
    pub placement_tick_secs: u64,
}

impl Default for ConfigLoad {
    fn default() -> Self {
        ConfigLoad {
            log_level: "info".to_string(),
            log_dir: None,
            mark_missing_after_secs: 30,
            remove_stale_after_secs: 300,
            reaper_tick_secs: 5,
            placement_tick_secs: 2,
        }
    }
}

impl ConfigLoad {
    /// Loads a YAML config file from `path`. Callers are expected to fall
    /// back to `ConfigLoad::default()` on error, as `main` does.
    pub fn new(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let cfg = serde_yaml::from_str(&contents)?;
        Ok(cfg)
    }

    pub fn get_log_dir(&self) -> String {
        self.log_dir.clone().unwrap_or_else(|| {
            format!("{}/{}", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()), DEFAULT_LOG_DIR)
        })
    }
}
