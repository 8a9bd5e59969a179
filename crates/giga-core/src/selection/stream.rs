//! Stream descriptors as delivered by an extraction backend.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaFormat {
    Mpeg4,
    WebM,
    M4a,
    /// Vorbis in WebM.
    WebMAudio,
    WebMOpus,
    Mp3,
    ThreeGpp,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 7] = [
        MediaFormat::Mpeg4,
        MediaFormat::WebM,
        MediaFormat::M4a,
        MediaFormat::WebMAudio,
        MediaFormat::WebMOpus,
        MediaFormat::Mp3,
        MediaFormat::ThreeGpp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MediaFormat::Mpeg4 => "MPEG-4",
            MediaFormat::WebM => "WebM",
            MediaFormat::M4a => "m4a",
            MediaFormat::WebMAudio => "WebM",
            MediaFormat::WebMOpus => "WebM Opus",
            MediaFormat::Mp3 => "MP3",
            MediaFormat::ThreeGpp => "3GPP",
        }
    }

    /// File suffix without the dot.
    pub fn suffix(self) -> &'static str {
        match self {
            MediaFormat::Mpeg4 => "mp4",
            MediaFormat::WebM => "webm",
            MediaFormat::M4a => "m4a",
            MediaFormat::WebMAudio => "webm",
            MediaFormat::WebMOpus => "webm",
            MediaFormat::Mp3 => "mp3",
            MediaFormat::ThreeGpp => "3gp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            MediaFormat::Mpeg4 => "video/mp4",
            MediaFormat::WebM => "video/webm",
            MediaFormat::M4a => "audio/mp4",
            MediaFormat::WebMAudio => "audio/webm",
            MediaFormat::WebMOpus => "audio/webm",
            MediaFormat::Mp3 => "audio/mpeg",
            MediaFormat::ThreeGpp => "video/3gpp",
        }
    }

    /// Stable identifier used in ledger hints and config.
    pub fn id(self) -> &'static str {
        match self {
            MediaFormat::Mpeg4 => "mpeg4",
            MediaFormat::WebM => "webm",
            MediaFormat::M4a => "m4a",
            MediaFormat::WebMAudio => "webma",
            MediaFormat::WebMOpus => "opus",
            MediaFormat::Mp3 => "mp3",
            MediaFormat::ThreeGpp => "3gpp",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        MediaFormat::ALL.into_iter().find(|f| f.id() == id)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStream {
    pub url: String,
    pub format: MediaFormat,
    /// Label such as `720p` or `1080p60`.
    pub resolution: String,
    #[serde(default)]
    pub fps: u32,
    /// No audio track; needs a secondary audio stream.
    #[serde(default)]
    pub video_only: bool,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStream {
    pub url: String,
    pub format: MediaFormat,
    /// Average bitrate in kbit/s.
    pub bitrate: u32,
    #[serde(default)]
    pub size: Option<u64>,
}

impl AudioStream {
    /// Quality label kept in the ledger hint, e.g. `128k`.
    pub fn quality(&self) -> String {
        format!("{}k", self.bitrate)
    }
}

/// Site the page came from, where it changes post-processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingService {
    /// Mp4 video muxes with the two-pass tool mux; m4a audio is kept as is.
    BiliBili,
    /// Cookie-gated HLS; the remux tool fetches it.
    NicoNico,
    #[default]
    Other,
}

/// Everything an extractor found on one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Title; becomes the file name.
    pub name: String,
    pub page_url: String,
    #[serde(default)]
    pub service: StreamingService,
    #[serde(default)]
    pub video_streams: Vec<VideoStream>,
    #[serde(default)]
    pub video_only_streams: Vec<VideoStream>,
    #[serde(default)]
    pub audio_streams: Vec<AudioStream>,
}

/// An extraction backend: resolves a page URL into its streams.
pub trait StreamExtractor: Send + Sync {
    fn extract(&self, page_url: &str) -> anyhow::Result<StreamInfo>;
}
