use crate::utils::ensure_directory_exists;
use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

const CONFIG_FILE_NAME: &str = "dice_bridge_config.json";

/// User-tunable bridge settings, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Whether a roll fires a local notification.
    pub notifications_enabled: bool,

    /// Whether a roll triggers vibration.
    pub haptics_enabled: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            notifications_enabled: true,
            haptics_enabled: true,
        }
    }
}

impl BridgeConfig {
    /// Loads the config from `config_dir`, falling back to defaults when no
    /// file exists yet.
    pub async fn load_config(config_dir: &Path) -> Result<Self> {
        let file_path = config_dir.join(CONFIG_FILE_NAME);

        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(&file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the current config under `config_dir`, creating the directory
    /// if needed.
    pub async fn save_config(&self, config_dir: &Path) -> Result<()> {
        ensure_directory_exists(config_dir).await?;
        let file_path = config_dir.join(CONFIG_FILE_NAME);

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize bridge config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(&file_path, config_json).await?;

        info!("Bridge config saved to {:?}.", file_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = std::env::temp_dir().join("dice-bridge-test-missing");
        let config = BridgeConfig::load_config(&dir).await.unwrap();
        assert!(config.notifications_enabled);
        assert!(config.haptics_enabled);
    }

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = std::env::temp_dir().join("dice-bridge-test-roundtrip");
        let config = BridgeConfig {
            notifications_enabled: false,
            haptics_enabled: true,
        };
        config.save_config(&dir).await.unwrap();

        let loaded = BridgeConfig::load_config(&dir).await.unwrap();
        assert!(!loaded.notifications_enabled);
        assert!(loaded.haptics_enabled);

        let _ = fs::remove_dir_all(&dir).await;
    }
}
