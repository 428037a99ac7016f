//! Command facade used by connection handlers.
//!
//! Each method resolves the room from the registry, then runs one state
//! machine operation on it. Adapters (socket handlers, HTTP routes,
//! tests) only ever talk to this type.

use std::sync::Arc;

use planpoker_protocol::{Card, PlayerId, RoomId, RoomSnapshot};

use crate::hub::{SubscriberId, Subscription};
use crate::player::validate_name;
use crate::{Room, RoomError, RoomRegistry};

/// Cheap-to-clone handle over a shared [`RoomRegistry`].
///
/// Errors come back as [`RoomError`]; an unknown or already deleted room
/// is always `RoomNotFound`, whether the id never existed or the room
/// was closed between lookup and use. Of the player commands, only
/// leaving can delete a room.
#[derive(Debug, Clone)]
pub struct PokerService {
    registry: Arc<RoomRegistry>,
}

impl PokerService {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this service operates on.
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    async fn room(&self, room_id: &RoomId) -> Result<Arc<Room>, RoomError> {
        self.registry
            .get(room_id)
            .await
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))
    }

    /// Opens a room with `name` as creator.
    pub async fn create_room(&self, name: &str) -> Result<(RoomId, PlayerId), RoomError> {
        let name = validate_name(name, self.registry.config().max_name_len)?;
        let (room, creator_id) = self.registry.create(&name).await;
        Ok((room.id().clone(), creator_id))
    }

    pub async fn join_room(&self, room_id: &RoomId, name: &str) -> Result<PlayerId, RoomError> {
        self.room(room_id).await?.join(name).await
    }

    /// Removes a player, deleting the room once it is empty.
    pub async fn leave_room(&self, room_id: &RoomId, player_id: &PlayerId) -> Result<(), RoomError> {
        let room = self.room(room_id).await?;
        let outcome = room.leave(player_id).await?;
        if outcome.remaining == 0 {
            self.registry.delete_if_empty(&room).await;
        }
        Ok(())
    }

    /// Snapshot for a member of the room.
    pub async fn get_room_snapshot(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
    ) -> Result<RoomSnapshot, RoomError> {
        self.room(room_id).await?.snapshot_for(player_id).await
    }

    /// Records a vote given in its wire spelling.
    pub async fn submit_vote(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        card: &str,
    ) -> Result<(), RoomError> {
        let card: Card = card
            .parse()
            .map_err(|_| RoomError::InvalidCard(card.to_string()))?;
        self.room(room_id).await?.submit_vote(player_id, card).await
    }

    pub async fn reveal_cards(&self, room_id: &RoomId, player_id: &PlayerId) -> Result<(), RoomError> {
        self.room(room_id).await?.reveal(player_id).await
    }

    pub async fn reset_voting(&self, room_id: &RoomId, player_id: &PlayerId) -> Result<(), RoomError> {
        self.room(room_id).await?.reset(player_id).await
    }

    pub async fn update_link(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        link: String,
    ) -> Result<(), RoomError> {
        self.room(room_id).await?.update_link(player_id, link).await
    }

    pub async fn transfer_creator(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        target_id: &PlayerId,
    ) -> Result<(), RoomError> {
        self.room(room_id)
            .await?
            .transfer_creator(player_id, target_id)
            .await
    }

    /// Subscribes to a room's events, returning the starting snapshot.
    pub async fn subscribe(
        &self,
        room_id: &RoomId,
    ) -> Result<(Subscription, RoomSnapshot), RoomError> {
        self.room(room_id).await?.subscribe().await
    }

    /// Releases a subscription. A room that is already gone has nothing
    /// to release, so this never fails.
    pub async fn unsubscribe(&self, room_id: &RoomId, id: SubscriberId) {
        if let Some(room) = self.registry.get(room_id).await {
            room.unsubscribe(id).await;
        }
    }
}
