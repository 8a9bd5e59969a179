//! Run one stored mission to a settled state.

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use super::progress::ProgressStats;
use crate::config::GigaConfig;
use crate::control::MissionControl;
use crate::ledger::{MissionDb, MissionId, QueueState, RecoveryRecord};
use crate::mission::{
    DownloadMission, MissionEvent, MissionRequest, MissionServices, MissionState,
};

/// Runs mission `id` until it finishes, pauses, fails or is cancelled, and
/// returns the state it settled in.
///
/// Checkpoints are saved as they arrive; ones that only add completed
/// blocks rewrite just the bitmap column. The queue row then becomes
/// `completed` (ledger cleared), `paused`, `error` with its kind, or is
/// removed when the mission was cancelled.
pub async fn run_mission(
    db: &MissionDb,
    id: MissionId,
    cfg: &GigaConfig,
    services: MissionServices,
    control: Option<&Arc<MissionControl>>,
    progress: Option<&mpsc::Sender<ProgressStats>>,
) -> Result<MissionState> {
    let details = db
        .get_mission(id)
        .await?
        .ok_or_else(|| anyhow!("mission {} not found", id))?;
    if details.state == QueueState::Completed {
        return Ok(MissionState::Finished);
    }

    let mut options = cfg.mission_options();
    if let Some(threads) = details.settings.threads {
        options.threads = threads.max(1);
    }
    options.headers = details.settings.headers.clone();

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let request = MissionRequest::new(details.final_path.clone(), Vec::new())
        .with_id(id)
        .with_kind(details.kind)
        .with_post(details.post.clone())
        .with_record(details.record);
    let mission = Arc::new(DownloadMission::new(
        request,
        options,
        services.with_events(events_tx),
    ));

    db.set_state(id, QueueState::Running).await?;
    mission.start().context("spawn mission thread")?;
    if let Some(control) = control {
        control.register(Arc::clone(&mission));
    }
    tracing::info!(mission = id, path = %details.final_path.display(), "mission started");

    let mut run = RunLog::new();
    let mut waiter = tokio::task::spawn_blocking({
        let mission = Arc::clone(&mission);
        move || mission.wait()
    });

    let state = loop {
        tokio::select! {
            joined = &mut waiter => break joined.context("mission wait task")?,
            Some(event) = events.recv() => {
                handle_event(db, event, &mut run, progress).await?;
            }
        }
    };
    // Events sent just before the coordinator exited.
    while let Ok(event) = events.try_recv() {
        handle_event(db, event, &mut run, progress).await?;
    }
    if let Some(control) = control {
        control.unregister(id);
    }

    settle(db, &mission, state).await?;
    Ok(state)
}

/// Bookkeeping for one run's event stream.
struct RunLog {
    started: Instant,
    resumed_bytes: Option<u64>,
    /// Layout (bitmap stripped) of the last full ledger write.
    saved_layout: Option<RecoveryRecord>,
}

impl RunLog {
    fn new() -> Self {
        RunLog {
            started: Instant::now(),
            resumed_bytes: None,
            saved_layout: None,
        }
    }
}

async fn save_checkpoint(
    db: &MissionDb,
    id: MissionId,
    record: &RecoveryRecord,
    run: &mut RunLog,
) -> Result<()> {
    let mut layout = record.clone();
    layout.bitmap = Vec::new();
    if run.saved_layout.as_ref() == Some(&layout) {
        db.update_bitmap(id, &record.bitmap)
            .await
            .with_context(|| format!("save bitmap for mission {}", id))?;
        tracing::trace!(mission = id, "bitmap saved");
        return Ok(());
    }
    db.save_ledger(id, record)
        .await
        .with_context(|| format!("save ledger for mission {}", id))?;
    run.saved_layout = Some(layout);
    tracing::debug!(mission = id, "ledger saved");
    Ok(())
}

async fn handle_event(
    db: &MissionDb,
    event: MissionEvent,
    run: &mut RunLog,
    progress: Option<&mpsc::Sender<ProgressStats>>,
) -> Result<()> {
    match event {
        MissionEvent::Checkpoint { id, record } => save_checkpoint(db, id, &record, run).await?,
        MissionEvent::Progress { id, done, total } => {
            // The first report of a run approximates what was already on disk.
            let resumed = *run.resumed_bytes.get_or_insert(done);
            if let Some(tx) = progress {
                // A full channel only means the consumer is behind; skip this update.
                let _ = tx.try_send(ProgressStats {
                    mission: id,
                    bytes_done: done,
                    total_bytes: total,
                    resumed_bytes: resumed.min(done),
                    elapsed_secs: run.started.elapsed().as_secs_f64(),
                });
            }
        }
        MissionEvent::State { id, state } => tracing::debug!(mission = id, %state, "mission state"),
        MissionEvent::SourceRefreshed { id, source } => {
            tracing::info!(mission = id, source, "source URL refreshed")
        }
        MissionEvent::Failed { id, kind, message } => {
            tracing::warn!(mission = id, %kind, "mission failed: {}", message)
        }
    }
    Ok(())
}

/// Map the settled mission state onto the queue row.
async fn settle(db: &MissionDb, mission: &DownloadMission, state: MissionState) -> Result<()> {
    let id = mission.id();
    match state {
        MissionState::Finished => {
            db.clear_ledger(id).await?;
            db.set_state(id, QueueState::Completed).await?;
        }
        MissionState::Deleted => db.remove_mission(id).await?,
        MissionState::Error(kind) => {
            db.save_ledger(id, &mission.recovery_record()).await?;
            let message = mission.error().map(|(_, m)| m).unwrap_or_default();
            db.set_error(id, kind, &message).await?;
        }
        _ => {
            db.save_ledger(id, &mission.recovery_record()).await?;
            db.set_state(id, QueueState::Paused).await?;
        }
    }
    tracing::info!(mission = id, %state, "mission settled");
    Ok(())
}

/// Claim the oldest queued mission and run it. `None` when the queue is empty.
pub async fn run_next_mission(
    db: &MissionDb,
    cfg: &GigaConfig,
    services: MissionServices,
    control: Option<&Arc<MissionControl>>,
    progress: Option<&mpsc::Sender<ProgressStats>>,
) -> Result<Option<(MissionId, MissionState)>> {
    let Some(id) = db.next_queued_mission().await? else {
        return Ok(None);
    };
    let state = run_mission(db, id, cfg, services, control, progress).await?;
    Ok(Some((id, state)))
}
