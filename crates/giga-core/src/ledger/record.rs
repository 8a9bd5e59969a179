//! The resume record: per-source layout and validators plus the block bitmap.

use serde::{Deserialize, Serialize};

use crate::segmenter::Block;
use crate::storage::SourceSpan;

/// Which part of a mission a source feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    /// The main stream (video, or the only stream).
    Primary,
    /// A separately delivered track, typically audio for a video-only stream.
    Secondary,
}

/// What a resolver needs to find the same stream again once its URL expires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Resolution (`720p`) for video, bitrate (`128k`) for audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

/// How a source is fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TransferMode {
    /// Flattened block indices `first..first + count` of the mission bitmap.
    Blocks { first: usize, count: usize },
    /// One unbounded GET written sequentially.
    #[default]
    Stream,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub url: String,
    pub role: SourceRole,
    #[serde(default)]
    pub hint: StreamHint,
    /// Content length; `None` until probed or when the server does not say.
    pub length: Option<u64>,
    /// Byte offset of this source inside the raw file.
    pub offset: u64,
    /// ETag, or Last-Modified when no ETag was sent.
    pub validator: Option<String>,
    #[serde(default)]
    pub mode: TransferMode,
    /// Stream-mode completion (block-mode sources use the bitmap).
    #[serde(default)]
    pub done: bool,
}

impl SourceRecord {
    pub fn new(url: impl Into<String>, role: SourceRole) -> Self {
        SourceRecord {
            url: url.into(),
            role,
            hint: StreamHint::default(),
            length: None,
            offset: 0,
            validator: None,
            mode: TransferMode::Stream,
            done: false,
        }
    }

    pub fn with_hint(mut self, hint: StreamHint) -> Self {
        self.hint = hint;
        self
    }

    /// Location in the raw file, once the length is known.
    pub fn span(&self) -> Option<SourceSpan> {
        self.length.map(|length| SourceSpan {
            offset: self.offset,
            length,
        })
    }

    /// `file://` source; subtitle missions copy it from disk.
    pub fn is_local(&self) -> bool {
        self.url.starts_with("file:")
    }

    fn reset(&mut self) {
        self.length = None;
        self.offset = 0;
        self.validator = None;
        self.mode = TransferMode::Stream;
        self.done = false;
    }
}

/// Everything needed to resume a mission without refetching finished blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub sources: Vec<SourceRecord>,
    /// True once the initializer has sized and laid out the sources.
    #[serde(default)]
    pub planned: bool,
    #[serde(default)]
    pub block_size: u64,
    #[serde(default)]
    pub block_count: usize,
    /// Leading bytes kept free for post-processing.
    #[serde(default)]
    pub reserved: u64,
    /// Some source had no length: sources run one after another.
    #[serde(default)]
    pub unknown_length: bool,
    /// Completion bitmap bytes; stored in its own ledger column.
    #[serde(skip)]
    pub bitmap: Vec<u8>,
}

impl RecoveryRecord {
    pub fn new(sources: Vec<SourceRecord>) -> Self {
        RecoveryRecord {
            sources,
            ..Default::default()
        }
    }

    /// Forget sizing, layout and progress; URLs and hints are kept.
    pub fn reset_plan(&mut self) {
        for s in &mut self.sources {
            s.reset();
        }
        self.planned = false;
        self.block_size = 0;
        self.block_count = 0;
        self.reserved = 0;
        self.unknown_length = false;
        self.bitmap.clear();
    }

    /// Order in which sources sit in the raw file: secondary tracks first,
    /// right after the reserved space, then the primary.
    pub fn layout_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.sources.len()).collect();
        order.sort_by_key(|&i| match self.sources[i].role {
            SourceRole::Secondary => 0,
            SourceRole::Primary => 1,
        });
        order
    }

    /// Source index and byte range of flattened block `index`.
    pub fn locate_block(&self, index: usize) -> Option<(usize, Block)> {
        self.sources.iter().enumerate().find_map(|(i, s)| match s.mode {
            TransferMode::Blocks { first, count } if (first..first + count).contains(&index) => {
                let length = s.length?;
                let start = (index - first) as u64 * self.block_size;
                Some((
                    i,
                    Block {
                        start,
                        end: (start + self.block_size).min(length),
                    },
                ))
            }
            _ => None,
        })
    }

    /// Sum of all source lengths, when every one is known.
    pub fn total_length(&self) -> Option<u64> {
        self.sources.iter().map(|s| s.length).sum()
    }

    /// Expected raw file size: reserve plus every source, when all lengths are known.
    pub fn file_length(&self) -> Option<u64> {
        let mut end = self.reserved;
        for s in &self.sources {
            end = end.max(s.offset + s.length?);
        }
        Some(end)
    }

    pub fn source_with_role(&self, role: SourceRole) -> Option<&SourceRecord> {
        self.sources.iter().find(|s| s.role == role)
    }
}
