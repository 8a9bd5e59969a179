//! Re-resolution of expired stream URLs through the extractor.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

use super::stream::{MediaFormat, StreamExtractor};
use crate::ledger::SourceRecord;
use crate::mission::SourceResolver;

/// Re-extracts the page a mission came from and picks the stream matching
/// the stored format/quality hint.
#[derive(Clone)]
pub struct ExtractorResolver {
    extractor: Arc<dyn StreamExtractor>,
    page_url: String,
}

impl ExtractorResolver {
    pub fn new(extractor: Arc<dyn StreamExtractor>, page_url: impl Into<String>) -> Self {
        ExtractorResolver {
            extractor,
            page_url: page_url.into(),
        }
    }
}

fn is_audio(format: MediaFormat) -> bool {
    matches!(
        format,
        MediaFormat::M4a | MediaFormat::WebMAudio | MediaFormat::WebMOpus | MediaFormat::Mp3
    )
}

impl SourceResolver for ExtractorResolver {
    fn resolve(&self, source: &SourceRecord) -> Result<String> {
        let format = source
            .hint
            .format
            .as_deref()
            .and_then(MediaFormat::from_id)
            .ok_or_else(|| anyhow!("source has no format hint"))?;
        let quality = source.hint.quality.as_deref();

        let info = self
            .extractor
            .extract(&self.page_url)
            .with_context(|| format!("re-extracting {}", self.page_url))?;

        let url = if is_audio(format) {
            info.audio_streams
                .iter()
                .filter(|a| a.format == format)
                .find(|a| quality.map_or(true, |q| a.quality() == q))
                .map(|a| a.url.clone())
        } else {
            info.video_streams
                .iter()
                .chain(&info.video_only_streams)
                .filter(|v| v.format == format)
                .find(|v| quality.map_or(true, |q| v.resolution == q))
                .map(|v| v.url.clone())
        };
        let url = url.ok_or_else(|| {
            anyhow!(
                "no {} stream at {} on {}",
                format,
                quality.unwrap_or("any quality"),
                self.page_url
            )
        })?;
        tracing::debug!(page = %self.page_url, %format, "stream re-resolved");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{SourceRole, StreamHint};
    use crate::selection::{AudioStream, StreamInfo, StreamingService, VideoStream};
    use std::sync::Mutex;

    struct Fixed {
        info: StreamInfo,
        calls: Mutex<Vec<String>>,
    }

    impl StreamExtractor for Fixed {
        fn extract(&self, page_url: &str) -> Result<StreamInfo> {
            self.calls.lock().unwrap().push(page_url.to_string());
            Ok(self.info.clone())
        }
    }

    fn extractor() -> Arc<Fixed> {
        Arc::new(Fixed {
            info: StreamInfo {
                name: "t".to_string(),
                page_url: "https://video.example/watch?v=1".to_string(),
                service: StreamingService::Other,
                video_streams: vec![],
                video_only_streams: vec![VideoStream {
                    url: "https://cdn/fresh-720.mp4".to_string(),
                    format: MediaFormat::Mpeg4,
                    resolution: "720p".to_string(),
                    fps: 30,
                    video_only: true,
                    size: None,
                }],
                audio_streams: vec![AudioStream {
                    url: "https://cdn/fresh-128.m4a".to_string(),
                    format: MediaFormat::M4a,
                    bitrate: 128,
                    size: None,
                }],
            },
            calls: Mutex::new(Vec::new()),
        })
    }

    fn source(format: &str, quality: &str, role: SourceRole) -> SourceRecord {
        SourceRecord::new("https://cdn/expired", role).with_hint(StreamHint {
            format: Some(format.to_string()),
            quality: Some(quality.to_string()),
        })
    }

    #[test]
    fn finds_video_and_audio_by_hint() {
        let ex = extractor();
        let resolver = ExtractorResolver::new(ex.clone(), "https://video.example/watch?v=1");
        assert_eq!(
            resolver.resolve(&source("mpeg4", "720p", SourceRole::Primary)).unwrap(),
            "https://cdn/fresh-720.mp4"
        );
        assert_eq!(
            resolver.resolve(&source("m4a", "128k", SourceRole::Secondary)).unwrap(),
            "https://cdn/fresh-128.m4a"
        );
        assert_eq!(ex.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn missing_stream_or_hint_fails() {
        let resolver = ExtractorResolver::new(extractor(), "https://video.example/watch?v=1");
        assert!(resolver.resolve(&source("mpeg4", "1080p", SourceRole::Primary)).is_err());
        let bare = SourceRecord::new("https://cdn/x", SourceRole::Primary);
        assert!(resolver.resolve(&bare).is_err());
    }
}
