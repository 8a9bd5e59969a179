//! Quality ranking for video and audio streams.

use std::cmp::Ordering;

use super::stream::{AudioStream, MediaFormat, VideoStream};

/// Video formats from lowest to highest quality.
const VIDEO_FORMAT_RANKING: [MediaFormat; 3] =
    [MediaFormat::ThreeGpp, MediaFormat::WebM, MediaFormat::Mpeg4];
/// Audio formats from lowest to highest quality.
const AUDIO_FORMAT_RANKING: [MediaFormat; 4] = [
    MediaFormat::Mp3,
    MediaFormat::WebMAudio,
    MediaFormat::WebMOpus,
    MediaFormat::M4a,
];

fn rank_of(ranking: &[MediaFormat], format: MediaFormat) -> Option<usize> {
    ranking.iter().position(|&f| f == format)
}

/// Vertical resolution of a label: `720p60` → 720, `4K` → 2160.
pub fn resolution_height(label: &str) -> Option<u32> {
    let upper = label.to_ascii_uppercase();
    if upper.contains("8K") {
        return Some(4320);
    }
    if upper.contains("4K") {
        return Some(2160);
    }
    let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Orders `a` before `b` when it is the better stream: higher resolution,
/// then higher fps, then muxed over video-only, then the better format.
fn compare_video(a: &VideoStream, b: &VideoStream) -> Ordering {
    let height = |s: &VideoStream| resolution_height(&s.resolution).unwrap_or(0);
    height(b)
        .cmp(&height(a))
        .then(b.fps.cmp(&a.fps))
        .then(a.video_only.cmp(&b.video_only))
        .then(
            rank_of(&VIDEO_FORMAT_RANKING, b.format)
                .cmp(&rank_of(&VIDEO_FORMAT_RANKING, a.format)),
        )
}

/// Muxed and video-only streams merged, best first. A video-only stream is
/// dropped when a muxed one has the same resolution, fps and format.
pub fn sorted_videos(muxed: &[VideoStream], video_only: &[VideoStream]) -> Vec<VideoStream> {
    let mut all: Vec<VideoStream> = muxed.to_vec();
    for v in video_only {
        let duplicate = muxed
            .iter()
            .any(|m| m.resolution == v.resolution && m.fps == v.fps && m.format == v.format);
        if !duplicate {
            all.push(VideoStream {
                video_only: true,
                ..v.clone()
            });
        }
    }
    all.sort_by(compare_video);
    all
}

/// Index into best-first `videos` for the configured resolution: an exact
/// height match, else the highest below it, else the lowest available.
pub fn default_video_index(videos: &[VideoStream], target: &str) -> Option<usize> {
    if videos.is_empty() {
        return None;
    }
    let Some(target) = resolution_height(target) else {
        return Some(0);
    };
    videos
        .iter()
        .position(|v| resolution_height(&v.resolution).is_some_and(|h| h <= target))
        .or(Some(videos.len() - 1))
}

/// Highest bitrate wins; on equal bitrate the preferred format, then the
/// better format.
pub fn best_audio_index(audios: &[AudioStream], preferred: Option<MediaFormat>) -> Option<usize> {
    let key = |a: &AudioStream| {
        (
            a.bitrate,
            Some(a.format) == preferred,
            rank_of(&AUDIO_FORMAT_RANKING, a.format),
        )
    };
    audios
        .iter()
        .enumerate()
        .max_by(|(i, a), (j, b)| key(a).cmp(&key(b)).then(j.cmp(i)))
        .map(|(i, _)| i)
}

/// Audio formats that can be muxed with a video format.
fn compatible_audio(video: MediaFormat) -> &'static [MediaFormat] {
    match video {
        MediaFormat::Mpeg4 => &[MediaFormat::M4a],
        MediaFormat::WebM => &[MediaFormat::WebMAudio, MediaFormat::WebMOpus],
        _ => &[],
    }
}

/// Best audio track to pair with a video-only stream, if any fits its container.
pub fn secondary_audio_for<'a>(
    video: &VideoStream,
    audios: &'a [AudioStream],
) -> Option<&'a AudioStream> {
    let wanted = compatible_audio(video.format);
    let candidates: Vec<AudioStream> =
        audios.iter().filter(|a| wanted.contains(&a.format)).cloned().collect();
    let best = best_audio_index(&candidates, None)?;
    let chosen = &candidates[best];
    audios.iter().find(|a| *a == chosen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(res: &str, fps: u32, format: MediaFormat, video_only: bool) -> VideoStream {
        VideoStream {
            url: format!("http://cdn/{}-{}-{:?}", res, fps, format),
            format,
            resolution: res.to_string(),
            fps,
            video_only,
            size: None,
        }
    }

    fn audio(bitrate: u32, format: MediaFormat) -> AudioStream {
        AudioStream {
            url: format!("http://cdn/{}-{:?}", bitrate, format),
            format,
            bitrate,
            size: None,
        }
    }

    #[test]
    fn heights() {
        assert_eq!(resolution_height("720p"), Some(720));
        assert_eq!(resolution_height("1080p60"), Some(1080));
        assert_eq!(resolution_height("4K"), Some(2160));
        assert_eq!(resolution_height("best"), None);
    }

    #[test]
    fn videos_sort_by_resolution_then_fps_and_prefer_muxed() {
        let muxed = vec![
            video("360p", 30, MediaFormat::Mpeg4, false),
            video("720p", 30, MediaFormat::Mpeg4, false),
        ];
        let only = vec![
            video("1080p", 30, MediaFormat::Mpeg4, true),
            video("720p", 60, MediaFormat::WebM, true),
            video("720p", 30, MediaFormat::WebM, true),
        ];
        let sorted = sorted_videos(&muxed, &only);
        let labels: Vec<(String, u32, bool)> = sorted
            .iter()
            .map(|v| (v.resolution.clone(), v.fps, v.video_only))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("1080p".to_string(), 30, true),
                ("720p".to_string(), 60, true),
                ("720p".to_string(), 30, false),
                ("720p".to_string(), 30, true),
                ("360p".to_string(), 30, false),
            ]
        );
    }

    #[test]
    fn default_resolution_falls_back_to_highest_below() {
        let videos = sorted_videos(
            &[
                video("1080p", 30, MediaFormat::Mpeg4, false),
                video("480p", 30, MediaFormat::Mpeg4, false),
            ],
            &[],
        );
        assert_eq!(default_video_index(&videos, "720p"), Some(1));
        assert_eq!(default_video_index(&videos, "1080p"), Some(0));
        assert_eq!(default_video_index(&videos, "240p"), Some(1));
        assert_eq!(default_video_index(&videos, "best"), Some(0));
        assert_eq!(default_video_index(&[], "720p"), None);
    }

    #[test]
    fn audio_prefers_bitrate_then_format() {
        let audios = vec![
            audio(128, MediaFormat::WebMOpus),
            audio(160, MediaFormat::Mp3),
            audio(160, MediaFormat::M4a),
        ];
        assert_eq!(best_audio_index(&audios, None), Some(2));
        assert_eq!(best_audio_index(&audios, Some(MediaFormat::Mp3)), Some(1));
        assert_eq!(best_audio_index(&[], None), None);
    }

    #[test]
    fn secondary_audio_matches_container() {
        let audios = vec![
            audio(128, MediaFormat::M4a),
            audio(160, MediaFormat::WebMOpus),
            audio(48, MediaFormat::M4a),
        ];
        let mp4 = video("1080p", 30, MediaFormat::Mpeg4, true);
        let webm = video("1080p", 30, MediaFormat::WebM, true);
        let gpp = video("144p", 30, MediaFormat::ThreeGpp, true);
        assert_eq!(secondary_audio_for(&mp4, &audios).map(|a| a.bitrate), Some(128));
        assert_eq!(
            secondary_audio_for(&webm, &audios).map(|a| a.format),
            Some(MediaFormat::WebMOpus)
        );
        assert!(secondary_audio_for(&gpp, &audios).is_none());
    }
}
