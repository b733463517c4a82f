// Runtime configuration for both pipelines.
//
// A flat JSON file whose keys override the built-in defaults one by one.
// Loading never fails: a missing or broken file only produces a warning.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// File name looked up by [`Config::discover`].
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Resolved configuration, constructed once and handed to each component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "IMAGE_API_BASE_URL")]
    pub image_api_base_url: String,
    #[serde(rename = "IMAGE_API_KEY")]
    pub image_api_key: String,
    #[serde(rename = "IMAGE_MODEL_NAME")]
    pub image_model: String,
    #[serde(rename = "IMAGE_FALLBACK_MODEL_NAME")]
    pub image_fallback_model: String,
    #[serde(rename = "IMAGE_PRIMARY_TIMEOUT_SECS")]
    pub image_primary_timeout_secs: u64,
    #[serde(rename = "IMAGE_FALLBACK_TIMEOUT_SECS")]
    pub image_fallback_timeout_secs: u64,

    #[serde(rename = "WECHAT_APPID")]
    pub wechat_app_id: String,
    #[serde(rename = "WECHAT_APPSECRET")]
    pub wechat_app_secret: String,
    #[serde(rename = "WECHAT_AUTHOR")]
    pub wechat_author: String,
    #[serde(rename = "WECHAT_API_BASE_URL")]
    pub wechat_api_base_url: String,

    /// Extra font files tried before the platform list when drawing cover text.
    #[serde(rename = "OVERLAY_FONT_PATHS")]
    pub overlay_font_paths: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_api_base_url: "https://xxx.com/v1".into(),
            image_api_key: "sk-xxx".into(),
            image_model: "gemini-3-pro-image-preview".into(),
            image_fallback_model: "gemini-2.0-flash-exp-image-generation".into(),
            image_primary_timeout_secs: 300,
            image_fallback_timeout_secs: 45,
            wechat_app_id: "wxxxxx".into(),
            wechat_app_secret: "0axxxx".into(),
            wechat_author: "xxxx".into(),
            wechat_api_base_url: "https://api.weixin.qq.com".into(),
            overlay_font_paths: Vec::new(),
        }
    }
}

impl Config {
    /// Load `path`, falling back to defaults with a warning when the file is
    /// missing, unreadable or not valid JSON.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            warn!(
                "config file not found: {}, using defaults",
                path.display()
            );
            return Self::default();
        }
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("failed to read config {}: {}, using defaults", path.display(), e);
                return Self::default();
            }
        };
        match Self::from_json(&raw) {
            Ok(config) => {
                debug!("loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("failed to parse config {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse a flat JSON object; absent keys keep their default value.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Find `config.json` next to the executable, in the working directory or
    /// in the user config directory, in that order.
    pub fn discover() -> Self {
        match Self::candidate_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load(&path),
            None => {
                warn!("no {} found, using defaults", CONFIG_FILE_NAME);
                Self::default()
            }
        }
    }

    /// Load `explicit` when given, otherwise discover a config file, then
    /// apply environment overrides.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        let config = match explicit {
            Some(path) => Self::load(path),
            None => Self::discover(),
        };
        config.apply_env()
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            paths.push(dir.join(CONFIG_FILE_NAME));
        }
        paths.push(PathBuf::from(CONFIG_FILE_NAME));
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("wechat-article").join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Override credentials from the environment. Blank values are ignored.
    pub fn apply_env(mut self) -> Self {
        self.apply_vars(|key| std::env::var(key).ok());
        self
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields: [(&str, &mut String); 4] = [
            ("IMAGE_API_KEY", &mut self.image_api_key),
            ("IMAGE_API_BASE_URL", &mut self.image_api_base_url),
            ("WECHAT_APP_ID", &mut self.wechat_app_id),
            ("WECHAT_APP_SECRET", &mut self.wechat_app_secret),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    *field = trimmed.to_string();
                }
            }
        }
    }

    pub fn primary_timeout(&self) -> Duration {
        Duration::from_secs(self.image_primary_timeout_secs)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.image_fallback_timeout_secs)
    }
}
