//! What a mission downloads and the collaborators it runs with.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use super::state::MissionEvent;
use crate::http::HttpExecutor;
use crate::ledger::{MissionId, RecoveryRecord, SourceRecord};
use crate::postprocess::{PostProcessingSpec, RemuxTool};
use crate::retry::RetryPolicy;
use crate::segmenter::BLOCK_SIZE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionKind {
    Video,
    Audio,
    Subtitle,
    #[default]
    File,
}

impl MissionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MissionKind::Video => "video",
            MissionKind::Audio => "audio",
            MissionKind::Subtitle => "subtitle",
            MissionKind::File => "file",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "video" => MissionKind::Video,
            "audio" => MissionKind::Audio,
            "subtitle" => MissionKind::Subtitle,
            _ => MissionKind::File,
        }
    }
}

/// One logical download into a single output file.
#[derive(Debug, Clone)]
pub struct MissionRequest {
    pub id: MissionId,
    pub kind: MissionKind,
    pub final_path: PathBuf,
    pub post: PostProcessingSpec,
    /// Sources plus, for a resumed mission, its layout and bitmap.
    pub record: RecoveryRecord,
}

impl MissionRequest {
    pub fn new(final_path: impl Into<PathBuf>, sources: Vec<SourceRecord>) -> Self {
        MissionRequest {
            id: 0,
            kind: MissionKind::default(),
            final_path: final_path.into(),
            post: PostProcessingSpec::default(),
            record: RecoveryRecord::new(sources),
        }
    }

    pub fn with_id(mut self, id: MissionId) -> Self {
        self.id = id;
        self
    }

    pub fn with_kind(mut self, kind: MissionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_post(mut self, post: PostProcessingSpec) -> Self {
        self.post = post;
        self
    }

    /// Resume from a stored ledger instead of planning from scratch.
    pub fn with_record(mut self, record: RecoveryRecord) -> Self {
        self.record = record;
        self
    }
}

/// Tuning knobs, usually derived from [`crate::config::GigaConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionOptions {
    /// Worker threads; `<= 1` disables block splitting.
    pub threads: usize,
    pub block_size: u64,
    pub retry: RetryPolicy,
    /// How many times expired source URLs may be re-resolved.
    pub max_recoveries: u32,
    /// Extra request headers for every probe and fetch.
    pub headers: Vec<(String, String)>,
}

impl Default for MissionOptions {
    fn default() -> Self {
        MissionOptions {
            threads: 4,
            block_size: BLOCK_SIZE,
            retry: RetryPolicy::default(),
            max_recoveries: 3,
            headers: Vec::new(),
        }
    }
}

/// Fetches a fresh URL for a source whose signed URL expired.
pub trait SourceResolver: Send + Sync {
    fn resolve(&self, source: &SourceRecord) -> anyhow::Result<String>;
}

/// External collaborators a mission calls into.
#[derive(Clone)]
pub struct MissionServices {
    pub http: Arc<dyn HttpExecutor>,
    pub tool: Arc<dyn RemuxTool>,
    pub resolver: Option<Arc<dyn SourceResolver>>,
    pub events: Option<UnboundedSender<MissionEvent>>,
}

impl MissionServices {
    pub fn new(http: Arc<dyn HttpExecutor>, tool: Arc<dyn RemuxTool>) -> Self {
        MissionServices {
            http,
            tool,
            resolver: None,
            events: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn SourceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<MissionEvent>) -> Self {
        self.events = Some(events);
        self
    }
}
