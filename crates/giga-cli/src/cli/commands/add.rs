//! `giga add <url>` – queue a new mission.

use anyhow::{anyhow, bail, Context, Result};
use giga_core::config::GigaConfig;
use giga_core::ledger::{
    MissionDb, MissionSettings, NewMission, RecoveryRecord, SourceRecord, SourceRole,
};
use giga_core::mission::MissionKind;
use giga_core::postprocess::{Algorithm, Container, PostProcessingSpec};
use giga_core::selection::{filename_from_url_path, sanitize_filename};
use giga_core::storage::OutputDirectory;
use std::path::{Path, PathBuf};

/// Longest output name; leaves room for the `.part` suffix.
const NAME_MAX: usize = 240;

#[derive(Debug, Clone, Default)]
pub struct AddArgs {
    pub url: String,
    pub audio: Option<String>,
    pub post: Option<PostProcessingSpec>,
    pub output: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub threads: Option<usize>,
    pub headers: Vec<String>,
    pub subtitle: bool,
}

pub async fn run_add(db: &MissionDb, cfg: &GigaConfig, args: AddArgs) -> Result<()> {
    let dir = args.download_dir.clone().unwrap_or_else(|| cfg.download_dir());
    let mission = prepare_mission(&args, &dir)?;
    let id = db.add_mission(&mission).await?;
    println!("Added mission {id}: {} -> {}", args.url, mission.final_path.display());
    Ok(())
}

/// Resolves names and post-processing, and reserves the output file.
pub(crate) fn prepare_mission(args: &AddArgs, dir: &Path) -> Result<NewMission> {
    if args.subtitle && args.audio.is_some() {
        bail!("a subtitle mission takes a single source");
    }
    let name = output_name(args)?;
    let post = args.post.clone().unwrap_or_else(|| default_post(args, &name));
    if args.audio.is_none() && matches!(post.algorithm, Algorithm::MultiTrackMux(_)) {
        bail!("{} needs a second track (--audio)", post);
    }
    let headers = args
        .headers
        .iter()
        .map(|h| parse_header(h))
        .collect::<Result<Vec<_>>>()?;

    let output = OutputDirectory::new(dir);
    output
        .mkdirs()
        .with_context(|| format!("create download directory {}", dir.display()))?;
    if let Some(existing) = output.find_file(&name) {
        bail!("{} already exists", existing.display());
    }
    let final_path = output
        .create_file(&name)
        .with_context(|| format!("reserve {}", dir.join(&name).display()))?;

    let mut sources = vec![SourceRecord::new(&args.url, SourceRole::Primary)];
    if let Some(audio) = &args.audio {
        sources.push(SourceRecord::new(audio, SourceRole::Secondary));
    }
    Ok(NewMission {
        kind: if args.subtitle {
            MissionKind::Subtitle
        } else if args.audio.is_some() {
            MissionKind::Video
        } else {
            MissionKind::File
        },
        final_path,
        post,
        record: RecoveryRecord::new(sources),
        settings: MissionSettings {
            page_url: None,
            threads: args.threads,
            headers,
        },
    })
}

fn output_name(args: &AddArgs) -> Result<String> {
    let raw = match &args.output {
        Some(name) => name.clone(),
        None => filename_from_url_path(&args.url)
            .ok_or_else(|| anyhow!("cannot derive a file name from {}; use --output", args.url))?,
    };
    let name = sanitize_filename(&raw, NAME_MAX);
    if name.is_empty() {
        bail!("invalid output name {:?}", raw);
    }
    Ok(name)
}

/// Muxing when a second track is given (container from the output
/// extension, MP4 otherwise); plain copy for a single stream.
fn default_post(args: &AddArgs, name: &str) -> PostProcessingSpec {
    if args.audio.is_none() {
        return PostProcessingSpec::default();
    }
    let container = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(|e| e.parse::<Container>().ok())
        .unwrap_or(Container::Mp4);
    PostProcessingSpec::new(Algorithm::MultiTrackMux(container))
}

fn parse_header(header: &str) -> Result<(String, String)> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| anyhow!("header {:?} is not \"Name: value\"", header))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("header {:?} has no name", header);
    }
    Ok((name.to_string(), value.trim().to_string()))
}
