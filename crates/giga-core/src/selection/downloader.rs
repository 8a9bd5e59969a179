//! Turns extracted streams into a ready-to-queue mission.

use std::io;
use std::path::PathBuf;

use super::filename::build_filename;
use super::rank::{best_audio_index, default_video_index, secondary_audio_for, sorted_videos};
use super::stream::{AudioStream, MediaFormat, StreamInfo, StreamingService, VideoStream};
use crate::ledger::{
    MissionSettings, NewMission, RecoveryRecord, SourceRecord, SourceRole, StreamHint,
};
use crate::mission::MissionKind;
use crate::postprocess::{Algorithm, Container, PostProcessingSpec};
use crate::storage::OutputDirectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadType {
    Audio,
    Video,
}

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("no downloadable {0:?} stream")]
    NoStream(DownloadType),
    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),
    #[error("cannot create directory {}: {source}", .path.display())]
    Directory { path: PathBuf, source: io::Error },
    #[error("cannot create {}: {source}", .path.display())]
    FileCreation { path: PathBuf, source: io::Error },
}

/// A mission ready to be queued, plus what the caller may want to show.
#[derive(Debug, Clone)]
pub struct Selection {
    pub mission: NewMission,
    pub mime: &'static str,
    /// Combined size of both tracks when both are known in advance.
    pub near_length: Option<u64>,
}

/// Picks streams for a page and prepares the output file.
#[derive(Debug, Clone)]
pub struct DirectDownloader {
    output: OutputDirectory,
    default_resolution: String,
    preferred_audio: Option<MediaFormat>,
}

/// Chosen video plus its secondary audio track, if it needs one.
struct VideoChoice {
    video: VideoStream,
    audio: Option<AudioStream>,
}

impl DirectDownloader {
    pub fn new(output: OutputDirectory) -> Self {
        DirectDownloader {
            output,
            default_resolution: "720p".to_string(),
            preferred_audio: None,
        }
    }

    pub fn with_default_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.default_resolution = resolution.into();
        self
    }

    pub fn with_preferred_audio(mut self, format: Option<MediaFormat>) -> Self {
        self.preferred_audio = format;
        self
    }

    /// Video streams on offer, best first. Video-only streams without a
    /// compatible audio track are left out.
    fn offered_videos(&self, info: &StreamInfo) -> Vec<VideoChoice> {
        sorted_videos(&info.video_streams, &info.video_only_streams)
            .into_iter()
            .filter_map(|video| {
                if !video.video_only {
                    return Some(VideoChoice { video, audio: None });
                }
                let audio = secondary_audio_for(&video, &info.audio_streams)?.clone();
                Some(VideoChoice {
                    video,
                    audio: Some(audio),
                })
            })
            .collect()
    }

    /// Choose streams, reserve the output file and describe the mission.
    ///
    /// The page's service overrides the format-based post-processing: NicoNico
    /// sources are fetched by the remux tool, BiliBili video always muxes to
    /// mp4 and its m4a audio is kept as downloaded.
    pub fn select(
        &self,
        info: &StreamInfo,
        kind: DownloadType,
    ) -> Result<Selection, SelectionError> {
        let (sources, post, suffix, mime, near_length, mission_kind) = match kind {
            DownloadType::Audio => {
                let index = best_audio_index(&info.audio_streams, self.preferred_audio)
                    .ok_or(SelectionError::NoStream(kind))?;
                let audio = &info.audio_streams[index];
                let (algorithm, suffix, mime) = match (info.service, audio.format) {
                    (StreamingService::NicoNico, format) => {
                        (Algorithm::DirectHls, format.suffix(), format.mime_type())
                    }
                    (_, MediaFormat::WebMOpus) => {
                        (Algorithm::DemuxRemux(Container::Ogg), "opus", "audio/ogg")
                    }
                    (service, MediaFormat::M4a) if service != StreamingService::BiliBili => (
                        Algorithm::DemuxRemux(Container::M4a),
                        audio.format.suffix(),
                        audio.format.mime_type(),
                    ),
                    (_, other) => (Algorithm::CopyOnly, other.suffix(), other.mime_type()),
                };
                let post = PostProcessingSpec::new(algorithm);
                let source = audio_source(audio, SourceRole::Primary);
                (vec![source], post, suffix, mime, audio.size, MissionKind::Audio)
            }
            DownloadType::Video => {
                let offered = self.offered_videos(info);
                let videos: Vec<VideoStream> = offered.iter().map(|c| c.video.clone()).collect();
                let index = default_video_index(&videos, &self.default_resolution)
                    .ok_or(SelectionError::NoStream(kind))?;
                let choice = &offered[index];
                let video = &choice.video;
                let mut sources = vec![video_source(video)];
                let mut near_length = video.size;
                let mut format = video.format;
                let post = match &choice.audio {
                    Some(audio) => {
                        sources.push(audio_source(audio, SourceRole::Secondary));
                        near_length = video.size.zip(audio.size).map(|(v, a)| v + a);
                        let algorithm = match info.service {
                            StreamingService::NicoNico => Algorithm::DirectHls,
                            StreamingService::BiliBili => {
                                format = MediaFormat::Mpeg4;
                                Algorithm::MultiTrackMux(Container::Mp4)
                            }
                            StreamingService::Other if format == MediaFormat::Mpeg4 => {
                                Algorithm::MultiTrackMux(Container::Mp4)
                            }
                            StreamingService::Other => Algorithm::MultiTrackMux(Container::WebM),
                        };
                        PostProcessingSpec::new(algorithm)
                    }
                    None => PostProcessingSpec::default(),
                };
                (
                    sources,
                    post,
                    format.suffix(),
                    format.mime_type(),
                    near_length,
                    MissionKind::Video,
                )
            }
        };

        let final_path = self.reserve_file(&build_filename(&info.name, suffix))?;
        tracing::info!(
            path = %final_path.display(),
            post = %post,
            sources = sources.len(),
            "stream selected"
        );
        Ok(Selection {
            mission: NewMission {
                kind: mission_kind,
                final_path,
                post,
                record: RecoveryRecord::new(sources),
                settings: MissionSettings {
                    page_url: Some(info.page_url.clone()),
                    ..Default::default()
                },
            },
            mime,
            near_length,
        })
    }

    /// Create the directory and an empty target file; refuse existing ones.
    fn reserve_file(&self, name: &str) -> Result<PathBuf, SelectionError> {
        if let Some(existing) = self.output.find_file(name) {
            return Err(SelectionError::AlreadyExists(existing));
        }
        self.output.mkdirs().map_err(|source| SelectionError::Directory {
            path: self.output.root().to_path_buf(),
            source,
        })?;
        self.output.create_file(name).map_err(|source| {
            let path = self.output.root().join(name);
            if source.kind() == io::ErrorKind::AlreadyExists {
                SelectionError::AlreadyExists(path)
            } else {
                SelectionError::FileCreation { path, source }
            }
        })
    }
}

fn video_source(video: &VideoStream) -> SourceRecord {
    SourceRecord::new(&video.url, SourceRole::Primary).with_hint(StreamHint {
        format: Some(video.format.id().to_string()),
        quality: Some(video.resolution.clone()),
    })
}

fn audio_source(audio: &AudioStream, role: SourceRole) -> SourceRecord {
    SourceRecord::new(&audio.url, role).with_hint(StreamHint {
        format: Some(audio.format.id().to_string()),
        quality: Some(audio.quality()),
    })
}
