use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub photos: PhotoStoreConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("facesync")
        .join("facesync.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Cardholder-management API connection and field mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the cardholder API, e.g. `http://server/api/`.
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Sent as the `WAccessUtcOffset` header, in minutes.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Cardholder field that receives the rounded quality score.
    #[serde(default = "default_quality_field")]
    pub quality_field: String,

    /// Cardholder field that receives the photo-update timestamp.
    #[serde(default = "default_last_photo_update_field")]
    pub last_photo_update_field: String,
}

fn default_utc_offset_minutes() -> i32 {
    -180
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_quality_field() -> String {
    "AuxNum01".to_string()
}

fn default_last_photo_update_field() -> String {
    "AuxDte05".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            user: String::new(),
            password: String::new(),
            utc_offset_minutes: default_utc_offset_minutes(),
            timeout_secs: default_timeout_secs(),
            quality_field: default_quality_field(),
            last_photo_update_field: default_last_photo_update_field(),
        }
    }
}

/// Slot-addressed photo directories of the cardholder system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoStoreConfig {
    /// Directory holding the primary photos, named `{id}_1.jpg`.
    #[serde(default = "default_primary_dir")]
    pub primary_dir: PathBuf,

    /// Directory receiving pre-crop originals, named `{id}_2.jpg`.
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_primary_dir() -> PathBuf {
    PathBuf::from("PhotoID/Photo_1")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("PhotoID/Photo_2")
}

fn default_jpeg_quality() -> u8 {
    90
}

impl Default for PhotoStoreConfig {
    fn default() -> Self {
        Self {
            primary_dir: default_primary_dir(),
            archive_dir: default_archive_dir(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Scoring and update-decision tunables. The defaults reproduce the
/// historical behavior; change them only with confirmed intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_cropping_enabled")]
    pub cropping_enabled: bool,

    /// Quality score below which no crop is attempted.
    #[serde(default = "default_quality_floor")]
    pub quality_floor: f64,

    /// Seconds below which the biometric and photo timestamps are
    /// considered already synchronized.
    #[serde(default = "default_update_tolerance_secs")]
    pub update_tolerance_secs: i64,

    /// Rolling window of biometric updates to scan, in hours.
    #[serde(default = "default_recent_window_hours")]
    pub recent_window_hours: i64,

    /// Margin around the face box, as a ratio of its dimensions.
    #[serde(default = "default_crop_margin_ratio")]
    pub crop_margin_ratio: f64,
}

fn default_cropping_enabled() -> bool {
    true
}

fn default_quality_floor() -> f64 {
    30.0
}

fn default_update_tolerance_secs() -> i64 {
    10
}

fn default_recent_window_hours() -> i64 {
    24
}

fn default_crop_margin_ratio() -> f64 {
    0.40
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cropping_enabled: default_cropping_enabled(),
            quality_floor: default_quality_floor(),
            update_tolerance_secs: default_update_tolerance_secs(),
            recent_window_hours: default_recent_window_hours(),
            crop_margin_ratio: default_crop_margin_ratio(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Startup validation; failures abort the run before any record is
    /// processed.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            bail!("api.base_url is not configured");
        }
        if self.api.user.trim().is_empty() {
            bail!("api.user is not configured");
        }
        if self.pipeline.recent_window_hours <= 0 {
            bail!("pipeline.recent_window_hours must be positive");
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("facesync")
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("FACESYNC_CONFIG") {
            return PathBuf::from(path);
        }

        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_historical_tuning() {
        let config = Config::default();
        assert!(config.pipeline.cropping_enabled);
        assert_eq!(config.pipeline.quality_floor, 30.0);
        assert_eq!(config.pipeline.update_tolerance_secs, 10);
        assert_eq!(config.pipeline.recent_window_hours, 24);
        assert_eq!(config.pipeline.crop_margin_ratio, 0.40);
        assert_eq!(config.api.last_photo_update_field, "AuxDte05");
    }

    #[test]
    fn validate_rejects_missing_endpoint() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_configured_api() {
        let mut config = Config::default();
        config.api.base_url = "http://localhost/api/".to_string();
        config.api.user = "svc".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [api]
            base_url = "http://localhost/api/"
            user = "svc"
            password = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.pipeline.quality_floor, 30.0);
        assert_eq!(config.photos.jpeg_quality, 90);
    }
}
