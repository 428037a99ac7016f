//! Room registry: the process-wide directory of rooms.

use std::collections::HashMap;
use std::sync::Arc;

use planpoker_protocol::{PlayerId, RoomId};
use tokio::sync::RwLock;

use crate::{Room, RoomConfig};

/// Owns every live room and answers "does room X exist".
///
/// The registry is a directory, nothing more: a map from id to a shared
/// [`Room`] handle. Its lock is separate from each room's own lock and
/// is only held for an insert, lookup or delete. Room operations run on
/// the `Arc<Room>` handed out by [`get`](Self::get), so unrelated rooms
/// never wait on each other, and the directory lock is never held while
/// waiting on a room.
///
/// A handle may outlive its registration. Removal of an empty room goes
/// through [`delete_if_empty`](Self::delete_if_empty), which closes the
/// room before forgetting it, so a caller still holding the handle gets
/// `RoomNotFound` from `join` or `subscribe` instead of a room only it
/// can see.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomId, Arc<Room>>>,
    config: RoomConfig,
}

impl RoomRegistry {
    /// Creates an empty registry with the given room settings.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Settings applied to new rooms.
    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a room with `creator_name` as its creator and registers it.
    pub async fn create(&self, creator_name: &str) -> (Arc<Room>, PlayerId) {
        let (room, creator_id) = Room::new(creator_name, self.config.clone());
        let room = Arc::new(room);

        let mut rooms = self.rooms.write().await;
        rooms.insert(room.id().clone(), Arc::clone(&room));
        tracing::info!(room_id = %room.id(), rooms = rooms.len(), "room created");

        (room, creator_id)
    }

    /// Looks up a room.
    pub async fn get(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Removes a room. Returns whether it existed.
    pub async fn delete(&self, room_id: &RoomId) -> bool {
        let removed = self.rooms.write().await.remove(room_id).is_some();
        if removed {
            tracing::info!(%room_id, "room deleted");
        }
        removed
    }

    /// Removes `room` if it has no players and is still the registered
    /// instance for its id. Returns whether this call removed it.
    ///
    /// The room is closed first, under its own lock and without the
    /// directory lock held. Once closed it refuses joins and
    /// subscriptions, so the removal that follows can't strand a player
    /// in a room nobody can look up. The identity check keeps a stale
    /// handle from removing a newer room registered under the same id,
    /// and lets concurrent deletions of one room agree on a single
    /// winner.
    pub async fn delete_if_empty(&self, room: &Arc<Room>) -> bool {
        if !room.close_if_empty().await {
            return false;
        }

        let mut rooms = self.rooms.write().await;
        let registered = rooms
            .get(room.id())
            .is_some_and(|current| Arc::ptr_eq(current, room));
        if !registered {
            return false;
        }
        rooms.remove(room.id());
        tracing::info!(room_id = %room.id(), rooms = rooms.len(), "empty room deleted");
        true
    }

    /// Deletes every room that currently has zero players and returns
    /// how many were removed.
    ///
    /// Candidates are snapshotted under a read lock so lookups keep
    /// flowing while the sweep runs. Each one is then handed to
    /// [`delete_if_empty`](Self::delete_if_empty), which re-checks it
    /// under the room's own lock; a room someone joined in the meantime
    /// is left alone.
    pub async fn sweep_empty(&self) -> usize {
        let candidates: Vec<Arc<Room>> = self.rooms.read().await.values().cloned().collect();

        let mut removed = 0;
        for room in candidates {
            if self.delete_if_empty(&room).await {
                removed += 1;
            }
        }
        removed
    }

    /// Number of registered rooms.
    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Returns `true` if no rooms are registered.
    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }

    /// Ids of all registered rooms.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.read().await.keys().cloned().collect()
    }
}
