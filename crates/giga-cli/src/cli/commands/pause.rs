//! `giga pause <id>` – pause a mission. A running one is stopped through the
//! control socket of the active `giga run`.

use anyhow::{anyhow, Result};
use giga_core::ledger::{MissionDb, MissionId, QueueState};

use crate::cli::control_socket::{self, ControlCommand};

pub async fn run_pause(db: &MissionDb, id: MissionId) -> Result<()> {
    let mission = db
        .get_mission(id)
        .await?
        .ok_or_else(|| anyhow!("mission {} not found", id))?;
    match mission.state {
        QueueState::Running => {
            let path = giga_core::control::default_control_socket_path()?;
            if control_socket::send(&path, ControlCommand::Pause(id)).await {
                println!("Pause requested for mission {id}");
                return Ok(());
            }
            // No runner is listening: the row is stale from a crashed run.
            db.set_state(id, QueueState::Paused).await?;
        }
        QueueState::Queued => db.set_state(id, QueueState::Paused).await?,
        other => {
            println!("Mission {id} is {}; nothing to pause", other.as_str());
            return Ok(());
        }
    }
    println!("Paused mission {id}");
    Ok(())
}
