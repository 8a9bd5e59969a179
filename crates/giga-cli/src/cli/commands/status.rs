//! `giga status` – show all missions.

use anyhow::Result;
use giga_core::ledger::MissionDb;

pub async fn run_status(db: &MissionDb) -> Result<()> {
    let missions = db.list_missions().await?;
    if missions.is_empty() {
        println!("No missions in database.");
        return Ok(());
    }
    println!("{:<6} {:<10} {:<9} {:<12} {}", "ID", "STATE", "KIND", "SIZE", "PATH");
    for m in missions {
        let size = m
            .total_size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let state = match m.error_kind {
            Some(kind) => format!("{} ({})", m.state.as_str(), kind),
            None => m.state.as_str().to_string(),
        };
        println!(
            "{:<6} {:<10} {:<9} {:<12} {}",
            m.id,
            state,
            m.kind.as_str(),
            size,
            m.final_path.display()
        );
    }
    Ok(())
}
