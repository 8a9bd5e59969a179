//! Sources the remux tool downloads itself: cookie-gated HLS playlists.

use std::path::Path;

use url::form_urlencoded;

use super::handlers::{invoke, path_arg, strings, PostProcessError};
use super::spec::PostProcessingSpec;
use super::tool::RemuxTool;

/// Protocols the tool may follow from a playlist.
const PROTOCOL_WHITELIST: &str = "file,http,https,tcp,tls,httpproxy,crypto";

/// One tool input: the playlist URL and what its fragment carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HlsInput {
    pub url: String,
    pub cookie: Option<String>,
    /// Expected size when the extractor knew it.
    pub length: Option<u64>,
}

impl HlsInput {
    /// Splits `<url>#cookie=<value>&length=<n>`. The fragment may also come
    /// percent-encoded as a whole.
    pub fn parse(raw: &str) -> Self {
        let Some((url, fragment)) = raw.split_once('#') else {
            return HlsInput {
                url: raw.to_string(),
                cookie: None,
                length: None,
            };
        };
        let mut cookie = None;
        let mut length = None;
        for (key, value) in form_urlencoded::parse(fragment.as_bytes()) {
            match key.as_ref() {
                "cookie" => cookie = Some(value.into_owned()),
                "length" => length = value.parse().ok(),
                _ => {}
            }
        }
        let packed = cookie
            .as_deref()
            .and_then(|c| c.split_once("&length="))
            .map(|(value, rest)| (value.to_string(), rest.parse().ok()));
        if let Some((value, packed_length)) = packed {
            cookie = Some(value);
            length = length.or(packed_length);
        }
        HlsInput {
            url: url.to_string(),
            cookie: cookie.filter(|c| !c.is_empty()),
            length,
        }
    }

    /// Audio-only playlists carry ADTS frames that MP4-family outputs reject.
    fn is_audio(&self) -> bool {
        self.url.contains("audio")
    }
}

/// `Name: value\r\n` lines for the tool's `-headers` option.
fn header_block(headers: &[(String, String)], cookie: Option<&str>) -> String {
    let mut block = String::new();
    for (name, value) in headers {
        if cookie.is_some() && name.eq_ignore_ascii_case("cookie") {
            continue;
        }
        block.push_str(&format!("{}: {}\r\n", name, value));
    }
    if let Some(cookie) = cookie {
        block.push_str(&format!("Cookie: {}\r\n", cookie));
    }
    block
}

/// Have the tool pull every input straight into `final_path`.
///
/// The first input's cookie also applies to later inputs without one.
/// `headers` go out with every input.
pub fn fetch_direct(
    spec: &PostProcessingSpec,
    urls: &[String],
    headers: &[(String, String)],
    final_path: &Path,
    tool: &dyn RemuxTool,
) -> Result<(), PostProcessError> {
    let inputs: Vec<HlsInput> = urls.iter().map(|u| HlsInput::parse(u)).collect();
    let Some(first) = inputs.first() else {
        return Err(PostProcessError::NoInput);
    };
    tracing::info!(
        inputs = inputs.len(),
        cookie = first.cookie.is_some(),
        length = ?first.length,
        output = %final_path.display(),
        "remux tool fetching directly"
    );

    let mut args = strings(&["-y"]);
    for (i, input) in inputs.iter().enumerate() {
        let cookie = input.cookie.as_deref().or(first.cookie.as_deref());
        let block = header_block(headers, cookie);
        if !block.is_empty() {
            args.push("-headers".to_string());
            args.push(block);
        }
        if i == 0 {
            args.push("-protocol_whitelist".to_string());
            args.push(PROTOCOL_WHITELIST.to_string());
        }
        args.push("-i".to_string());
        args.push(input.url.clone());
    }
    args.extend(strings(&["-c", "copy"]));
    if first.is_audio() {
        args.extend(strings(&["-bsf:a", "aac_adtstoasc"]));
    }
    args.extend(spec.args.iter().cloned());
    args.push(path_arg(final_path));

    invoke(tool, 1, &args).inspect_err(|_| {
        tracing::warn!(output = %final_path.display(), "direct fetch failed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postprocess::Algorithm;
    use std::io;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Vec<String>>>,
        status: i32,
    }

    impl RemuxTool for Recorder {
        fn execute(&self, args: &[String]) -> io::Result<i32> {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok(self.status)
        }
    }

    fn hls() -> PostProcessingSpec {
        PostProcessingSpec::new(Algorithm::DirectHls)
    }

    #[test]
    fn fragment_carries_cookie_and_length() {
        let input =
            HlsInput::parse("https://dmc.example/master.m3u8#cookie=nicosid=1; a=b&length=4096");
        assert_eq!(input.url, "https://dmc.example/master.m3u8");
        assert_eq!(input.cookie.as_deref(), Some("nicosid=1; a=b"));
        assert_eq!(input.length, Some(4096));
    }

    #[test]
    fn encoded_fragment_is_decoded_as_a_whole() {
        let input = HlsInput::parse(
            "https://dmc.example/v.m3u8#cookie=nicosid%3D1%3B%20a%3Db%26length%3D77",
        );
        assert_eq!(input.cookie.as_deref(), Some("nicosid=1; a=b"));
        assert_eq!(input.length, Some(77));
    }

    #[test]
    fn plain_url_has_no_cookie() {
        let input = HlsInput::parse("https://cdn.example/v.m3u8");
        assert_eq!(input.url, "https://cdn.example/v.m3u8");
        assert!(input.cookie.is_none());
        assert!(input.length.is_none());
    }

    #[test]
    fn video_and_audio_share_the_cookie_and_headers() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("clip.mp4");
        let tool = Recorder::default();
        let urls = vec![
            "https://dmc.example/video.m3u8#cookie=s%3D1&length=10".to_string(),
            "https://dmc.example/sound.m3u8".to_string(),
        ];
        let headers = vec![("Referer".to_string(), "https://nico.example/".to_string())];
        fetch_direct(&hls(), &urls, &headers, &out, &tool).unwrap();

        let calls = tool.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let args = &calls[0];
        let block = "Referer: https://nico.example/\r\nCookie: s=1\r\n";
        let header_values: Vec<&String> = args
            .windows(2)
            .filter(|w| w[0] == "-headers")
            .map(|w| &w[1])
            .collect();
        assert_eq!(header_values, vec![block, block]);
        let inputs: Vec<&String> =
            args.windows(2).filter(|w| w[0] == "-i").map(|w| &w[1]).collect();
        assert_eq!(
            inputs,
            vec!["https://dmc.example/video.m3u8", "https://dmc.example/sound.m3u8"]
        );
        assert!(args.contains(&PROTOCOL_WHITELIST.to_string()));
        assert!(!args.contains(&"-bsf:a".to_string()));
        assert_eq!(args.last().unwrap(), &out.to_string_lossy().into_owned());
    }

    #[test]
    fn audio_playlist_gets_the_adts_filter() {
        let dir = tempfile::tempdir().unwrap();
        let tool = Recorder::default();
        let urls = vec!["https://dmc.example/audio/main.m3u8#cookie=s%3D1".to_string()];
        fetch_direct(&hls(), &urls, &[], &dir.path().join("a.m4a"), &tool).unwrap();
        let calls = tool.calls.lock().unwrap();
        let filter = calls[0].windows(2).any(|w| w[0] == "-bsf:a" && w[1] == "aac_adtstoasc");
        assert!(filter);
    }

    #[test]
    fn tool_failure_and_missing_input_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("x.mp4");
        let tool = Recorder {
            status: 1,
            ..Default::default()
        };
        let urls = vec!["https://dmc.example/v.m3u8".to_string()];
        let err = fetch_direct(&hls(), &urls, &[], &out, &tool).unwrap_err();
        assert!(matches!(err, PostProcessError::ToolFailed { pass: 1, status: 1 }));
        let err = fetch_direct(&hls(), &[], &[], &out, &tool).unwrap_err();
        assert!(matches!(err, PostProcessError::NoInput));
    }
}
