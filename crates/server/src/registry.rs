use std::collections::HashMap;

use shared::{domain::CraneId, protocol::CraneDetails};
use tokio::sync::RwLock;
use tracing::info;

use crate::{
    crane::{CraneHandle, CraneProfile},
    fleet::Fleet,
};

/// One live room per crane identifier, spawned on demand. Ids the fleet does
/// not know about get a default profile rather than being rejected.
pub struct Registry {
    fleet: Fleet,
    rooms: RwLock<HashMap<CraneId, CraneHandle>>,
}

impl Registry {
    pub fn new(fleet: Fleet) -> Self {
        Self {
            fleet,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_create(&self, id: &CraneId) -> CraneHandle {
        if let Some(handle) = self.rooms.read().await.get(id) {
            return handle.clone();
        }

        let mut rooms = self.rooms.write().await;
        if let Some(handle) = rooms.get(id) {
            return handle.clone();
        }

        let profile = self
            .fleet
            .profile(id)
            .unwrap_or_else(|| CraneProfile::with_defaults(id.clone()));
        info!(%id, "starting crane room");
        let handle = CraneHandle::spawn(profile);
        rooms.insert(id.clone(), handle.clone());
        handle
    }

    /// Details for every configured crane, with live state where a room is
    /// already running.
    pub async fn all_details(&self) -> Vec<CraneDetails> {
        let mut details = Vec::new();
        for id in self.fleet.ids() {
            let handle = self.get_or_create(&id).await;
            if let Some(crane) = handle.details().await {
                details.push(crane);
            }
        }
        details
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
