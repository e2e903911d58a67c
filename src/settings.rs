use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{AppError, Result};

pub const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub slack: SlackSettings,
    #[serde(default)]
    pub award: AwardSettings,
    #[serde(default)]
    pub harvest: HarvestSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SlackSettings {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "post-channel")]
    pub post_channel: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AwardSettings {
    pub year: Option<i32>,
    pub time_zone: String,
    pub funny_reactions: Vec<String>,
    pub podium_size: usize,
    pub top_reactions: usize,
}

impl Default for AwardSettings {
    fn default() -> Self {
        Self {
            year: None,
            time_zone: "Asia/Tokyo".to_string(),
            funny_reactions: ["kusa", "kusa_1", "omoroi", "warota", "wwww", "草生える"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            podium_size: 3,
            top_reactions: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HarvestSettings {
    pub history_page_size: u16,
    pub parallel_histories: usize,
    pub parallel_channels: usize,
    pub parallel_ranking: usize,
    pub abort_on_channel_error: bool,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            history_page_size: 1000,
            parallel_histories: 10,
            parallel_channels: 200,
            parallel_ranking: 100,
            abort_on_channel_error: true,
        }
    }
}

impl HarvestSettings {
    /// Same settings with every pool size and the page size at least 1.
    pub fn clamped(&self) -> Self {
        Self {
            history_page_size: self.history_page_size.max(1),
            parallel_histories: self.parallel_histories.max(1),
            parallel_channels: self.parallel_channels.max(1),
            parallel_ranking: self.parallel_ranking.max(1),
            abort_on_channel_error: self.abort_on_channel_error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetrySettings {
    /// `0` retries forever.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(SETTINGS_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| AppError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| AppError::TomlParse(e.to_string()))
    }

    /// `SLACK_TOKEN` from the environment, falling back to `[slack] token`.
    pub fn token(&self) -> Result<String> {
        std::env::var("SLACK_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.slack.token.clone().filter(|t| !t.is_empty()))
            .ok_or(AppError::MissingToken)
    }
}
