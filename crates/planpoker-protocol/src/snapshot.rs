//! Serializable views of room state.
//!
//! These are what clients see. The room crate builds them under its
//! lock; nothing here holds a reference back into live state, so a
//! snapshot taken into history can't be disturbed by later mutation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Card, PlayerId, RoomId, RoomStatus};

/// One player as seen on the wire.
///
/// While a round is hidden, `card` is always [`Card::Unknown`] and
/// `has_voted` tells clients whether a vote is in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub card: Card,
    pub has_voted: bool,
    pub is_creator: bool,
    pub joined_at: DateTime<Utc>,
}

/// Tally of a revealed round.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VoteSummary {
    /// Number of players that voted.
    pub votes: usize,
    /// Mean of the numeric cards, `None` if nobody played one.
    pub average: Option<f64>,
    /// How many players played each card.
    pub distribution: BTreeMap<Card, usize>,
}

impl VoteSummary {
    /// Tallies a set of cards, ignoring [`Card::Unknown`].
    pub fn from_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        let mut summary = Self::default();
        let mut total = 0.0;
        let mut numeric = 0usize;

        for card in cards.into_iter().filter(|c| !c.is_unknown()) {
            summary.votes += 1;
            *summary.distribution.entry(card).or_insert(0) += 1;
            if let Some(value) = card.value() {
                total += value;
                numeric += 1;
            }
        }

        if numeric > 0 {
            summary.average = Some(total / numeric as f64);
        }
        summary
    }
}

/// A completed, revealed round archived on reset. Never mutated after
/// it is appended to a room's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteSession {
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
    pub link: String,
    pub timestamp: DateTime<Utc>,
    pub summary: VoteSummary,
}

/// Full state of one room, as sent in `initial_state`, `cards_revealed`,
/// `voting_reset` and in reply to `get_room`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
    pub status: RoomStatus,
    pub link: String,
    pub created_at: DateTime<Utc>,
    pub vote_history: Vec<VoteSession>,
    /// Present only while revealed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<VoteSummary>,
}

impl RoomSnapshot {
    /// The current creator, if the room has any players.
    pub fn creator(&self) -> Option<&PlayerSnapshot> {
        self.players.values().find(|p| p.is_creator)
    }
}
