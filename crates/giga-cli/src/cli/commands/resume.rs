//! `giga resume <id>` – queue a paused or failed mission again.

use anyhow::{anyhow, Result};
use giga_core::ledger::{MissionDb, MissionId, QueueState};

pub async fn run_resume(db: &MissionDb, id: MissionId) -> Result<()> {
    let mission = db
        .get_mission(id)
        .await?
        .ok_or_else(|| anyhow!("mission {} not found", id))?;
    if !matches!(mission.state, QueueState::Paused | QueueState::Error) {
        println!("Mission {id} is {}; nothing to resume", mission.state.as_str());
        return Ok(());
    }
    db.set_state(id, QueueState::Queued).await?;
    println!("Resumed mission {id}");
    Ok(())
}
