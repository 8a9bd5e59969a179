//! Finishing algorithm attached to a mission.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target container for remuxing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    WebM,
    Mkv,
    Ogg,
    M4a,
}

impl Container {
    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::WebM => "webm",
            Container::Mkv => "mkv",
            Container::Ogg => "ogg",
            Container::M4a => "m4a",
        }
    }
}

impl FromStr for Container {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" | "mpeg4" => Ok(Container::Mp4),
            "webm" => Ok(Container::WebM),
            "mkv" | "matroska" => Ok(Container::Mkv),
            "ogg" | "opus" => Ok(Container::Ogg),
            "m4a" => Ok(Container::M4a),
            other => Err(format!("unknown container: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "target", rename_all = "kebab-case")]
pub enum Algorithm {
    /// The raw file is the final file.
    CopyOnly,
    /// Repackage a single audio track (e.g. Opus out of WebM into Ogg).
    DemuxRemux(Container),
    /// Interleave the primary video and secondary audio into one container.
    MultiTrackMux(Container),
    /// The remux tool fetches the HLS sources itself; no raw file is
    /// downloaded.
    DirectHls,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProcessingSpec {
    pub algorithm: Algorithm,
    /// Extra tool arguments inserted before the output path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl Default for PostProcessingSpec {
    fn default() -> Self {
        Self::new(Algorithm::CopyOnly)
    }
}

impl PostProcessingSpec {
    pub fn new(algorithm: Algorithm) -> Self {
        PostProcessingSpec {
            algorithm,
            args: Vec::new(),
        }
    }

    /// Whether the raw file keeps leading room in front of the first source.
    pub fn reserves_space(&self) -> bool {
        matches!(self.algorithm, Algorithm::DemuxRemux(_) | Algorithm::MultiTrackMux(_))
    }

    /// Whether the engine downloads the sources, or leaves that to the tool.
    pub fn downloads_sources(&self) -> bool {
        self.algorithm != Algorithm::DirectHls
    }

    pub fn name(&self) -> &'static str {
        match self.algorithm {
            Algorithm::CopyOnly => "copy-only",
            Algorithm::DemuxRemux(_) => "demux-remux",
            Algorithm::MultiTrackMux(_) => "multi-track-mux",
            Algorithm::DirectHls => "direct-hls",
        }
    }
}

impl fmt::Display for PostProcessingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.algorithm {
            Algorithm::CopyOnly => write!(f, "copy"),
            Algorithm::DemuxRemux(c) => write!(f, "demux:{}", c.extension()),
            Algorithm::MultiTrackMux(c) => write!(f, "mux:{}", c.extension()),
            Algorithm::DirectHls => write!(f, "hls"),
        }
    }
}

/// Parses `copy`, `hls`, `demux:<container>` or `mux:<container>`.
impl FromStr for PostProcessingSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let algorithm = match s.split_once(':') {
            None if s == "copy" || s == "copy-only" => Algorithm::CopyOnly,
            None if s == "hls" => Algorithm::DirectHls,
            Some(("demux", c)) => Algorithm::DemuxRemux(c.parse()?),
            Some(("mux", c)) => Algorithm::MultiTrackMux(c.parse()?),
            _ => return Err(format!("unknown post-processing: {}", s)),
        };
        Ok(PostProcessingSpec::new(algorithm))
    }
}
