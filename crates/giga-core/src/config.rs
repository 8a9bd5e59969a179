use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::http::CurlOptions;
use crate::mission::MissionOptions;
use crate::retry::RetryPolicy;
use crate::segmenter::BLOCK_SIZE;
use crate::selection::MediaFormat;

/// Backoff between attempts (optional section in config.toml). Zero by
/// default: curl already waits out DNS failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryDelayConfig {
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

/// Global configuration loaded from `~/.config/giga/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GigaConfig {
    /// Worker threads per mission.
    pub threads: usize,
    /// Block size in bytes.
    pub block_size: u64,
    /// Extra attempts per probe or block after the first.
    pub max_retry: u32,
    /// How often expired source URLs may be re-resolved per run.
    pub max_recoveries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<RetryDelayConfig>,
    pub connect_timeout_secs: u64,
    /// Abort a transfer below this many bytes/s ...
    pub low_speed_limit: u32,
    /// ... sustained for this long.
    pub low_speed_time_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Program invoked for remuxing.
    pub remux_tool: String,
    /// Where finished files go; `None` = XDG download dir, then the current dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
    pub default_resolution: String,
    /// Format id (`m4a`, `opus`, `webma`, `mp3`) preferred on equal bitrate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_audio_format: Option<String>,
}

impl Default for GigaConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            block_size: BLOCK_SIZE,
            max_retry: 3,
            max_recoveries: 3,
            retry_delay: None,
            connect_timeout_secs: 30,
            low_speed_limit: 1024,
            low_speed_time_secs: 60,
            user_agent: None,
            remux_tool: "ffmpeg".to_string(),
            download_dir: None,
            default_resolution: "720p".to_string(),
            preferred_audio_format: None,
        }
    }
}

impl GigaConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::from_max_retry(self.max_retry);
        match &self.retry_delay {
            Some(d) => policy.with_backoff(
                Duration::from_secs_f64(d.base_delay_secs.max(0.0)),
                Duration::from_secs(d.max_delay_secs),
            ),
            None => policy,
        }
    }

    pub fn curl_options(&self) -> CurlOptions {
        CurlOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            low_speed_limit: self.low_speed_limit,
            low_speed_time: Duration::from_secs(self.low_speed_time_secs),
            user_agent: self.user_agent.clone(),
            ..CurlOptions::default()
        }
    }

    pub fn mission_options(&self) -> MissionOptions {
        MissionOptions {
            threads: self.threads.max(1),
            block_size: self.block_size.max(1),
            retry: self.retry_policy(),
            max_recoveries: self.max_recoveries,
            headers: Vec::new(),
        }
    }

    pub fn preferred_audio(&self) -> Option<MediaFormat> {
        let id = self.preferred_audio_format.as_deref()?;
        let format = MediaFormat::from_id(id);
        if format.is_none() {
            tracing::warn!("unknown preferred_audio_format {:?} ignored", id);
        }
        format
    }

    /// Configured download dir, else the XDG user download dir, else `.`.
    pub fn download_dir(&self) -> PathBuf {
        if let Some(dir) = &self.download_dir {
            return dir.clone();
        }
        std::env::var_os("XDG_DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("giga")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GigaConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = GigaConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: GigaConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
