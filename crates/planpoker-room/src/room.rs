//! A single planning-poker room and its state machine.
//!
//! Every mutating operation takes the room's write lock for its whole
//! duration: validate, mutate, then publish through the hub. Nothing
//! awaits while the lock is held, and publishing never waits on a
//! subscriber, so one room's operations are short and other rooms are
//! never involved.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use planpoker_protocol::{
    Card, PlayerId, PlayerSnapshot, RoomEvent, RoomId, RoomSnapshot, RoomStatus, VoteSession,
    VoteSummary,
};
use tokio::sync::RwLock;

use crate::hub::{EventHub, SubscriberId, Subscription};
use crate::player::{Player, validate_name};
use crate::{RoomConfig, RoomError};

/// What a successful [`Room::leave`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Players still in the room.
    pub remaining: usize,
    /// Set when the leaver was creator and someone was promoted.
    pub new_creator: Option<PlayerId>,
}

/// Mutable room state, only reachable through the lock.
#[derive(Debug)]
struct RoomState {
    players: HashMap<PlayerId, Player>,
    status: RoomStatus,
    link: String,
    history: Vec<VoteSession>,
    hub: EventHub,
    next_seq: u64,
    /// Set once the room is empty and on its way out of the registry.
    /// A closed room never takes players or subscribers again.
    closed: bool,
}

impl RoomState {
    fn is_revealed(&self) -> bool {
        self.status == RoomStatus::Revealed
    }

    fn player_snapshots(&self, revealed: bool) -> BTreeMap<PlayerId, PlayerSnapshot> {
        self.players
            .iter()
            .map(|(id, p)| (id.clone(), p.snapshot(revealed)))
            .collect()
    }

    fn summary(&self) -> VoteSummary {
        VoteSummary::from_cards(self.players.values().map(|p| p.card))
    }

    /// Fails unless `id` is a member holding the creator flag.
    fn require_creator(&self, id: &PlayerId) -> Result<&Player, RoomError> {
        match self.players.get(id) {
            Some(player) if player.is_creator => Ok(player),
            _ => Err(RoomError::NotCreator(id.clone())),
        }
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// One voting session.
///
/// The id and creation time never change and live outside the lock.
/// Everything else sits behind a single `RwLock` shared by the state
/// machine and the hub's subscribe/unsubscribe.
///
/// Because subscribing and mutating share that lock, a subscriber's
/// snapshot and its event stream line up exactly: every event it
/// receives happened after the snapshot it was handed.
///
/// A room has two lifecycles layered on each other. The round cycles
/// `voting` → `revealed` → `voting` through [`reveal`](Self::reveal)
/// and [`reset`](Self::reset). The room itself is open until its last
/// player leaves and the registry closes it; after that it refuses new
/// players and subscribers for good.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    created_at: DateTime<Utc>,
    config: RoomConfig,
    state: RwLock<RoomState>,
}

impl Room {
    /// Creates a room with `creator_name` installed as its creator.
    ///
    /// The name is taken as given; callers validate it first.
    pub(crate) fn new(creator_name: &str, config: RoomConfig) -> (Self, PlayerId) {
        let creator = Player::new(creator_name.to_string(), true, 0);
        let creator_id = creator.id.clone();

        let mut players = HashMap::new();
        players.insert(creator_id.clone(), creator);

        let room = Self {
            id: RoomId::generate(),
            created_at: Utc::now(),
            state: RwLock::new(RoomState {
                players,
                status: RoomStatus::Voting,
                link: String::new(),
                history: Vec::new(),
                hub: EventHub::new(config.subscriber_capacity),
                next_seq: 1,
                closed: false,
            }),
            config,
        };
        (room, creator_id)
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // -----------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------

    /// Full room snapshot. Cards are masked unless revealed.
    pub async fn snapshot(&self) -> RoomSnapshot {
        let state = self.state.read().await;
        self.snapshot_of(&state)
    }

    /// Snapshot for a member. Non-members get `PlayerNotFound`.
    pub async fn snapshot_for(&self, player_id: &PlayerId) -> Result<RoomSnapshot, RoomError> {
        let state = self.state.read().await;
        if !state.players.contains_key(player_id) {
            return Err(RoomError::PlayerNotFound(player_id.clone()));
        }
        Ok(self.snapshot_of(&state))
    }

    pub async fn player_count(&self) -> usize {
        self.state.read().await.players.len()
    }

    /// Returns `true` once [`close_if_empty`](Self::close_if_empty)
    /// has retired the room.
    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }

    pub async fn status(&self) -> RoomStatus {
        self.state.read().await.status
    }

    pub async fn subscriber_count(&self) -> usize {
        self.state.read().await.hub.len()
    }

    fn snapshot_of(&self, state: &RoomState) -> RoomSnapshot {
        let revealed = state.is_revealed();
        RoomSnapshot {
            id: self.id.clone(),
            players: state.player_snapshots(revealed),
            status: state.status,
            link: state.link.clone(),
            created_at: self.created_at,
            vote_history: state.history.clone(),
            summary: revealed.then(|| state.summary()),
        }
    }

    // -----------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------

    /// Registers a listener and returns it with the snapshot it starts
    /// from. Both happen under one lock, so no event falls between the
    /// snapshot and the first delivered event.
    ///
    /// A closed room answers `RoomNotFound`, the same as a lookup that
    /// lost the race with deletion.
    pub async fn subscribe(&self) -> Result<(Subscription, RoomSnapshot), RoomError> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(RoomError::RoomNotFound(self.id.clone()));
        }
        let subscription = state.hub.subscribe();
        let snapshot = self.snapshot_of(&state);
        Ok((subscription, snapshot))
    }

    /// Releases a listener. Returns whether it was registered.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.state.write().await.hub.unsubscribe(id)
    }

    // -----------------------------------------------------------------
    // State machine
    // -----------------------------------------------------------------

    /// Adds a player under a name no one else in the room holds.
    ///
    /// Joiners are ordinary players, except that someone joining a room
    /// that emptied out but hasn't been deleted yet takes the creator
    /// flag, so a non-empty room always has exactly one creator.
    pub async fn join(&self, name: &str) -> Result<PlayerId, RoomError> {
        let name = validate_name(name, self.config.max_name_len)?;

        let mut state = self.state.write().await;
        if state.closed {
            return Err(RoomError::RoomNotFound(self.id.clone()));
        }
        if state.players.values().any(|p| p.name == name) {
            return Err(RoomError::NameTaken(name));
        }

        let seq = state.next_seq();
        let is_creator = state.players.is_empty();
        let player = Player::new(name, is_creator, seq);
        let player_id = player.id.clone();
        let joined = player.snapshot(false);
        state.players.insert(player_id.clone(), player);

        tracing::info!(
            room_id = %self.id,
            %player_id,
            players = state.players.len(),
            is_creator,
            "player joined"
        );
        state.hub.publish(&RoomEvent::PlayerJoined(joined));
        Ok(player_id)
    }

    /// Retires the room if it has no players, and reports whether it is
    /// now closed.
    ///
    /// The emptiness check and the flag flip happen under the room's
    /// write lock, so a concurrent [`join`](Self::join) either lands
    /// first (and the room stays open) or sees the flag and fails with
    /// `RoomNotFound`. Nobody can slip into a room the registry is about
    /// to forget. Closing is one-way; calling this again on a closed
    /// room returns `true`.
    pub async fn close_if_empty(&self) -> bool {
        let mut state = self.state.write().await;
        if !state.closed && state.players.is_empty() {
            state.closed = true;
            tracing::debug!(room_id = %self.id, "room closed");
        }
        state.closed
    }

    /// Removes a player. If they held the creator flag and anyone is
    /// left, the earliest-joined remaining player becomes creator.
    pub async fn leave(&self, player_id: &PlayerId) -> Result<LeaveOutcome, RoomError> {
        let mut state = self.state.write().await;
        let removed = state
            .players
            .remove(player_id)
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))?;

        let promoted = if removed.is_creator {
            state
                .players
                .values_mut()
                .min_by_key(|p| p.seniority())
                .map(|p| {
                    p.is_creator = true;
                    (p.id.clone(), p.name.clone())
                })
        } else {
            None
        };

        let remaining = state.players.len();
        tracing::info!(room_id = %self.id, %player_id, players = remaining, "player left");
        state.hub.publish(&RoomEvent::PlayerLeft { name: removed.name });

        if let Some((id, name)) = &promoted {
            tracing::info!(room_id = %self.id, player_id = %id, "creator promoted");
            state
                .hub
                .publish(&RoomEvent::CreatorChanged { name: name.clone() });
        }

        Ok(LeaveOutcome {
            remaining,
            new_creator: promoted.map(|(id, _)| id),
        })
    }

    /// Records a vote. Only the voter's name is broadcast.
    pub async fn submit_vote(&self, player_id: &PlayerId, card: Card) -> Result<(), RoomError> {
        if card.is_unknown() {
            return Err(RoomError::InvalidCard(card.to_string()));
        }

        let mut state = self.state.write().await;
        let player = state
            .players
            .get_mut(player_id)
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone()))?;
        player.card = card;
        let name = player.name.clone();

        tracing::debug!(room_id = %self.id, %player_id, "vote submitted");
        state.hub.publish(&RoomEvent::VoteSubmitted { name });
        Ok(())
    }

    /// Turns every card face up. Creator only.
    pub async fn reveal(&self, initiator: &PlayerId) -> Result<(), RoomError> {
        let mut state = self.state.write().await;
        state.require_creator(initiator)?;

        state.status = RoomStatus::Revealed;
        let snapshot = self.snapshot_of(&state);

        let votes = snapshot.summary.as_ref().map_or(0, |s| s.votes);
        tracing::info!(room_id = %self.id, votes, "cards revealed");
        state.hub.publish(&RoomEvent::CardsRevealed(snapshot));
        Ok(())
    }

    /// Starts a new round. Creator only.
    ///
    /// A revealed round is archived to history first. The link is
    /// cleared and every card goes back to unknown. If a link was set,
    /// a `link_updated` with an empty link follows the reset event.
    pub async fn reset(&self, initiator: &PlayerId) -> Result<(), RoomError> {
        let mut state = self.state.write().await;
        state.require_creator(initiator)?;

        if state.is_revealed() {
            let session = VoteSession {
                players: state.player_snapshots(true),
                link: state.link.clone(),
                timestamp: Utc::now(),
                summary: state.summary(),
            };
            state.history.push(session);
        }

        state.status = RoomStatus::Voting;
        let old_link = std::mem::take(&mut state.link);
        for player in state.players.values_mut() {
            player.card = Card::Unknown;
        }

        let snapshot = self.snapshot_of(&state);
        tracing::info!(room_id = %self.id, rounds = state.history.len(), "voting reset");
        state.hub.publish(&RoomEvent::VotingReset(snapshot));

        if !old_link.is_empty() {
            state.hub.publish(&RoomEvent::LinkUpdated { link: String::new() });
        }
        Ok(())
    }

    /// Sets the round's link; an empty string clears it. Creator only.
    pub async fn update_link(&self, initiator: &PlayerId, link: String) -> Result<(), RoomError> {
        let mut state = self.state.write().await;
        state.require_creator(initiator)?;

        state.link = link.clone();
        tracing::debug!(room_id = %self.id, "link updated");
        state.hub.publish(&RoomEvent::LinkUpdated { link });
        Ok(())
    }

    /// Hands the creator flag to `target`. Creator only.
    pub async fn transfer_creator(
        &self,
        initiator: &PlayerId,
        target: &PlayerId,
    ) -> Result<(), RoomError> {
        let mut state = self.state.write().await;
        let previous_creator = state.require_creator(initiator)?.name.clone();
        let new_creator = state
            .players
            .get(target)
            .map(|p| p.name.clone())
            .ok_or_else(|| RoomError::PlayerNotFound(target.clone()))?;

        if let Some(player) = state.players.get_mut(initiator) {
            player.is_creator = false;
        }
        if let Some(player) = state.players.get_mut(target) {
            player.is_creator = true;
        }

        tracing::info!(room_id = %self.id, from = %initiator, to = %target, "creator transferred");
        state.hub.publish(&RoomEvent::CreatorTransferred {
            previous_creator,
            new_creator,
        });
        Ok(())
    }
}
