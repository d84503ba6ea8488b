use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_QUALIFIER: &str = "io";
const APP_ORGANIZATION: &str = "scriptrelay";
const APP_NAME: &str = "script_relay";
const CONFIG_FILE: &str = "config.json";

/// Default TCP port for the switch channel to the runtime target.
pub const SWITCH_PORT: u16 = 8171;

/// Default port for the static browser UI.
pub const HTTP_PORT: u16 = 8172;

/// Default port for WebSocket script uploads.
pub const WS_PORT: u16 = 8173;

/// Relay configuration: the three listener ports plus the asset root for
/// the browser UI. Each port is independently configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub switch_port: u16,
    pub http_port: u16,
    pub ws_port: u16,
    pub asset_dir: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            switch_port: SWITCH_PORT,
            http_port: HTTP_PORT,
            ws_port: WS_PORT,
            asset_dir: PathBuf::from("web"),
        }
    }
}

impl RelayConfig {
    /// Get the config file path
    fn get_config_path() -> Option<PathBuf> {
        if let Ok(test_path) = std::env::var("RELAY_CONFIG_DIR") {
            return Some(PathBuf::from(test_path).join(CONFIG_FILE));
        }

        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load config from disk or return default
    pub fn load() -> Self {
        match Self::get_config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Save config to disk
    pub fn save(&self) {
        if let Some(path) = Self::get_config_path() {
            self.save_to(&path);
        }
    }

    fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = fs::write(path, json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        let config = RelayConfig::default();
        assert_eq!(config.switch_port, 8171);
        assert_eq!(config.http_port, 8172);
        assert_eq!(config.ws_port, 8173);
        assert_eq!(config.asset_dir, PathBuf::from("web"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let config = RelayConfig {
            switch_port: 9001,
            http_port: 9002,
            ws_port: 9003,
            asset_dir: PathBuf::from("assets"),
        };
        config.save_to(&path);

        let loaded = RelayConfig::load_from(&path);
        assert_eq!(loaded.switch_port, 9001);
        assert_eq!(loaded.http_port, 9002);
        assert_eq!(loaded.ws_port, 9003);
        assert_eq!(loaded.asset_dir, PathBuf::from("assets"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = RelayConfig::load_from(&dir.path().join("nope.json"));
        assert_eq!(loaded.switch_port, SWITCH_PORT);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{not json").unwrap();

        let loaded = RelayConfig::load_from(&path);
        assert_eq!(loaded.ws_port, WS_PORT);
    }
}
