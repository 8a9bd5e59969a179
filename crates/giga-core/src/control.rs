//! Live mission registry for pause/cancel.
//!
//! The scheduler registers each running mission; a control client (e.g.
//! `giga pause 3` over the control socket) asks for a pause or cancel and the
//! scheduler forwards it to the mission.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use crate::ledger::MissionId;
use crate::mission::DownloadMission;

/// Shared registry of mission id -> running mission.
#[derive(Default)]
pub struct MissionControl {
    missions: RwLock<HashMap<MissionId, Arc<DownloadMission>>>,
}

impl MissionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a started mission. Unregister once it settles.
    pub fn register(&self, mission: Arc<DownloadMission>) {
        self.missions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(mission.id(), mission);
    }

    pub fn unregister(&self, id: MissionId) {
        self.missions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn get(&self, id: MissionId) -> Option<Arc<DownloadMission>> {
        self.missions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn running(&self) -> Vec<MissionId> {
        let mut ids: Vec<MissionId> = self
            .missions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Pause a running mission. False if it is not running here.
    pub fn request_pause(&self, id: MissionId) -> bool {
        match self.get(id) {
            Some(m) => {
                m.pause();
                true
            }
            None => false,
        }
    }

    /// Stop a running mission and delete its partial output. Returns
    /// without waiting; the scheduler observes the `Deleted` state.
    pub fn request_cancel(&self, id: MissionId) -> bool {
        match self.get(id) {
            Some(m) => {
                std::thread::spawn(move || m.cancel());
                true
            }
            None => false,
        }
    }
}

/// Default control socket path (XDG runtime dir, else the state dir).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("giga")?;
    if let Ok(path) = dirs.place_runtime_file("control.sock") {
        return Ok(path);
    }
    dirs.place_state_file("control.sock")
}
