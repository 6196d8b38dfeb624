use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use dexsync_fetch::{DEFAULT_USER_AGENT, EngineOptions};
use serde::{Deserialize, Serialize};

use crate::cli::Overrides;

/// Languages published by the catalog API.
pub const DEFAULT_LANGUAGES: [&str; 18] = [
    "de", "en", "es", "es-mx", "fr", "id", "it", "ja", "ko", "nl", "pl", "pt", "pt-br", "pt-pt",
    "ru", "th", "zh-cn", "zh-tw",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the mirrored tree.
    pub data_dir: PathBuf,

    /// Validator database.
    pub store_path: PathBuf,

    /// Base URL of the catalog API, without trailing slash.
    pub api_base: String,

    pub languages: Vec<String>,

    /// Maximum number of transfers open at once.
    pub window: usize,

    /// Per-transfer deadline in seconds.
    pub timeout_secs: u64,

    pub poll_interval_ms: u64,

    pub user_agent: String,

    /// Image variant requested from the asset host (`high` or `low`).
    pub image_quality: String,

    pub image_extension: String,

    /// Send stored validators even for files missing from `data_dir`.
    pub revalidate_missing: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            store_path: PathBuf::from("metadata.db"),
            api_base: "https://api.tcgdex.net/v2".to_string(),
            languages: DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
            window: 50,
            timeout_secs: 30,
            poll_interval_ms: 100,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            image_quality: "high".to_string(),
            image_extension: "jpg".to_string(),
            revalidate_missing: false,
        }
    }
}

impl AppConfig {
    /// Load from `path`, or defaults when no file is given.
    ///
    /// A path that was given explicitly must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> { Ok(toml::from_str(content)?) }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(data_dir) = &overrides.data_dir {
            self.data_dir = data_dir.clone();
        }
        if let Some(window) = overrides.window {
            self.window = window;
        }
        if let Some(timeout) = overrides.timeout {
            self.timeout_secs = timeout;
        }
        if overrides.revalidate_missing {
            self.revalidate_missing = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.window > 0, "window must be at least 1");
        ensure!(self.timeout_secs > 0, "timeout_secs must be at least 1");
        ensure!(self.poll_interval_ms > 0, "poll_interval_ms must be at least 1");
        ensure!(!self.languages.is_empty(), "at least one language is required");
        ensure!(!self.image_quality.is_empty(), "image_quality must not be empty");
        ensure!(!self.image_extension.is_empty(), "image_extension must not be empty");

        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            bail!("api_base must be an http(s) URL, got {:?}", self.api_base);
        }
        let unusable = |lang: &&String| {
            matches!(lang.as_str(), "" | "." | "..") || lang.contains(['/', '\\'])
        };
        if let Some(lang) = self.languages.iter().find(unusable) {
            bail!("invalid language code {lang:?}");
        }
        Ok(())
    }

    pub fn api_base(&self) -> &str { self.api_base.trim_end_matches('/') }

    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::default()
            .window(self.window)
            .transfer_timeout(self.timeout())
            .poll_interval(Duration::from_millis(self.poll_interval_ms))
            .user_agent(self.user_agent.as_str())
            .revalidate_missing(self.revalidate_missing)
    }

    pub fn show(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
