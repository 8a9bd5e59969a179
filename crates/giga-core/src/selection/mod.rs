//! Stream selection: the entry point that turns an extracted page into a
//! mission.
//!
//! [`DirectDownloader`] ranks the offered streams, pairs video-only streams
//! with a compatible audio track, derives the file name, MIME type and
//! post-processing, and reserves the output file. [`ExtractorResolver`]
//! finds the same streams again once their signed URLs expire.

mod downloader;
mod filename;
mod rank;
mod resolver;
mod stream;

pub use downloader::{DirectDownloader, DownloadType, Selection, SelectionError};
pub use filename::{build_filename, filename_from_url_path, sanitize_filename};
pub use rank::{
    best_audio_index, default_video_index, resolution_height, secondary_audio_for, sorted_videos,
};
pub use resolver::ExtractorResolver;
pub use stream::{
    AudioStream, MediaFormat, StreamExtractor, StreamInfo, StreamingService, VideoStream,
};
