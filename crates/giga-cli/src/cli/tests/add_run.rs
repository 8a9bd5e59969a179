//! Tests for the add and run subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use giga_core::postprocess::{Algorithm, Container};

#[test]
fn cli_parse_add() {
    match parse(&["giga", "add", "https://example.com/file.iso"]) {
        CliCommand::Add {
            url,
            audio,
            post,
            output,
            download_dir,
            threads,
            headers,
            subtitle,
        } => {
            assert_eq!(url, "https://example.com/file.iso");
            assert!(audio.is_none());
            assert!(post.is_none());
            assert!(output.is_none());
            assert!(download_dir.is_none());
            assert!(threads.is_none());
            assert!(headers.is_empty());
            assert!(!subtitle);
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_parse_add_subtitle() {
    match parse(&["giga", "add", "file:///tmp/a.srt", "--subtitle"]) {
        CliCommand::Add { url, subtitle, .. } => {
            assert_eq!(url, "file:///tmp/a.srt");
            assert!(subtitle);
        }
        _ => panic!("expected Add with --subtitle"),
    }
}

#[test]
fn cli_parse_add_with_audio_and_post() {
    match parse(&[
        "giga",
        "add",
        "https://cdn.example/video",
        "--audio",
        "https://cdn.example/audio",
        "--post",
        "mux:webm",
        "-o",
        "clip.webm",
        "--threads",
        "8",
        "-H",
        "Referer: https://example.com/",
        "--header",
        "Cookie: a=b",
    ]) {
        CliCommand::Add {
            audio,
            post,
            output,
            threads,
            headers,
            ..
        } => {
            assert_eq!(audio.as_deref(), Some("https://cdn.example/audio"));
            assert_eq!(post.unwrap().algorithm, Algorithm::MultiTrackMux(Container::WebM));
            assert_eq!(output.as_deref(), Some("clip.webm"));
            assert_eq!(threads, Some(8));
            assert_eq!(headers.len(), 2);
        }
        _ => panic!("expected Add with options"),
    }
}

#[test]
fn cli_parse_add_hls() {
    match parse(&["giga", "add", "https://dmc.example/v.m3u8", "--post", "hls", "-o", "v.mp4"]) {
        CliCommand::Add { post, .. } => assert_eq!(post.unwrap().algorithm, Algorithm::DirectHls),
        _ => panic!("expected Add with --post hls"),
    }
}

#[test]
fn cli_parse_add_download_dir() {
    match parse(&["giga", "add", "https://example.com/x", "--download-dir", "/tmp"]) {
        CliCommand::Add { download_dir, .. } => {
            assert_eq!(download_dir.as_deref(), Some(std::path::Path::new("/tmp")));
        }
        _ => panic!("expected Add with --download-dir"),
    }
}

#[test]
fn cli_rejects_unknown_post_processing() {
    let parsed = Cli::try_parse_from(["giga", "add", "https://example.com/x", "--post", "zip"]);
    assert!(parsed.is_err());
}

#[test]
fn cli_parse_run() {
    match parse(&["giga", "run"]) {
        CliCommand::Run => {}
        _ => panic!("expected Run"),
    }
}
