use super::schema::SiteProfile;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./mirage.yaml
    /// 2. ~/.mirage/config.yaml
    /// 3. Default profile
    pub async fn load_default() -> Result<SiteProfile, ConfigError> {
        // Check current directory
        let local_config = PathBuf::from("./mirage.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        // Check home directory
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".mirage").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        // Return default
        Ok(SiteProfile::default())
    }

    pub async fn load_from(path: &Path) -> Result<SiteProfile, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let profile: SiteProfile = serde_yaml::from_str(&content)?;
        Ok(profile)
    }
}
