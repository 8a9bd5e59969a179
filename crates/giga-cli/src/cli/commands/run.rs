//! `giga run` – run queued missions until the queue is empty.

use anyhow::Result;
use giga_core::config::GigaConfig;
use giga_core::control::MissionControl;
use giga_core::http::CurlExecutor;
use giga_core::ledger::MissionDb;
use giga_core::mission::{MissionServices, MissionState};
use giga_core::postprocess::FfmpegTool;
use giga_core::scheduler::{self, ProgressStats};
use std::sync::Arc;
use std::time::Instant;

use crate::cli::control_socket;

const PROGRESS_INTERVAL_MS: u128 = 500;
const MIB: f64 = 1_048_576.0;

pub async fn run_scheduler(db: &MissionDb, cfg: &GigaConfig) -> Result<()> {
    let recovered = db.recover_running_missions().await?;
    if recovered > 0 {
        tracing::info!("recovered {} mission(s) from previous run", recovered);
    }

    let control = Arc::new(MissionControl::new());
    let mut listener = None;
    if let Ok(socket_path) = giga_core::control::default_control_socket_path() {
        match control_socket::spawn_control_listener(Arc::clone(&control), &socket_path) {
            Ok(handle) => {
                tracing::debug!(path = %socket_path.display(), "control socket listening");
                listener = Some((handle, socket_path));
            }
            Err(e) => tracing::warn!(path = %socket_path.display(), "control socket bind: {}", e),
        }
    }

    let services = MissionServices::new(
        Arc::new(CurlExecutor::new(cfg.curl_options())),
        Arc::new(FfmpegTool::new(&cfg.remux_tool)),
    );

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<ProgressStats>(16);
    let progress_handle = tokio::spawn(async move {
        let mut last_print = Instant::now();
        while let Some(stats) = progress_rx.recv().await {
            let now = Instant::now();
            let complete = stats.total_bytes.is_some_and(|t| stats.bytes_done >= t);
            if now.duration_since(last_print).as_millis() >= PROGRESS_INTERVAL_MS || complete {
                println!("{}", progress_line(&stats));
                last_print = now;
            }
        }
    });

    let mut run_count = 0u32;
    while let Some((id, state)) = scheduler::run_next_mission(
        db,
        cfg,
        services.clone(),
        Some(&control),
        Some(&progress_tx),
    )
    .await?
    {
        run_count += 1;
        match state {
            MissionState::Finished => println!("Mission {id} finished"),
            MissionState::Paused => println!("Mission {id} paused"),
            MissionState::Deleted => println!("Mission {id} cancelled"),
            other => println!("Mission {id}: {other}"),
        }
    }
    drop(progress_tx);
    let _ = progress_handle.await;

    if let Some((handle, path)) = listener {
        handle.abort();
        let _ = std::fs::remove_file(path);
    }

    if run_count == 0 {
        println!("No queued missions.");
    } else {
        tracing::info!("run completed {} mission(s)", run_count);
    }
    Ok(())
}

fn progress_line(stats: &ProgressStats) -> String {
    let done_mib = stats.bytes_done as f64 / MIB;
    let rate_mib = stats.bytes_per_sec() / MIB;
    let eta = stats
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    match (stats.total_bytes, stats.fraction()) {
        (Some(total), Some(fraction)) => format!(
            "  [{}] {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}",
            stats.mission,
            done_mib,
            total as f64 / MIB,
            fraction * 100.0,
            rate_mib,
            eta
        ),
        _ => format!("  [{}] {:.1} MiB  {:.2} MiB/s", stats.mission, done_mib, rate_mib),
    }
}
