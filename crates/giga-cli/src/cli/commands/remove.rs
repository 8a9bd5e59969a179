//! `giga remove <id>` – remove a mission; optionally delete its files with --delete-files.

use anyhow::{anyhow, Result};
use giga_core::ledger::{MissionDb, MissionId, QueueState};
use giga_core::storage::temp_path;
use std::path::Path;

use crate::cli::control_socket::{self, ControlCommand};

/// A running mission is cancelled through `giga run`, which deletes its
/// partial output and the row. Otherwise the row is removed here and, with
/// `delete_files`, the output and `.part` files too.
pub async fn run_remove(db: &MissionDb, id: MissionId, delete_files: bool) -> Result<()> {
    let mission = db
        .get_mission(id)
        .await?
        .ok_or_else(|| anyhow!("mission {} not found", id))?;

    if mission.state == QueueState::Running {
        let path = giga_core::control::default_control_socket_path()?;
        if control_socket::send(&path, ControlCommand::Cancel(id)).await {
            println!("Cancel requested for mission {id}");
            return Ok(());
        }
    }

    if delete_files {
        for path in [temp_path(&mission.final_path), mission.final_path.clone()] {
            delete_quietly(&path).await;
        }
    }
    db.remove_mission(id).await?;
    println!("Removed mission {id}");
    Ok(())
}

async fn delete_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "deleted file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "could not delete file: {}", e),
    }
}
