//! Room events pushed to live subscribers.

use serde::{Deserialize, Serialize};

use crate::{PlayerSnapshot, RoomSnapshot};

/// A state change in one room.
///
/// Serialized adjacently tagged, e.g.
/// `{"type": "vote_submitted", "payload": {"name": "Bob"}}`.
///
/// `InitialState`, `CardsRevealed` and `VotingReset` carry a full
/// snapshot, so a subscriber that missed intermediate events is caught
/// up by the next one of these. `VoteSubmitted` carries the voter's
/// name only, never the card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum RoomEvent {
    InitialState(RoomSnapshot),
    PlayerJoined(PlayerSnapshot),
    PlayerLeft { name: String },
    VoteSubmitted { name: String },
    CardsRevealed(RoomSnapshot),
    VotingReset(RoomSnapshot),
    LinkUpdated { link: String },
    CreatorChanged { name: String },
    CreatorTransferred {
        previous_creator: String,
        new_creator: String,
    },
}

impl RoomEvent {
    /// The wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InitialState(_) => "initial_state",
            Self::PlayerJoined(_) => "player_joined",
            Self::PlayerLeft { .. } => "player_left",
            Self::VoteSubmitted { .. } => "vote_submitted",
            Self::CardsRevealed(_) => "cards_revealed",
            Self::VotingReset(_) => "voting_reset",
            Self::LinkUpdated { .. } => "link_updated",
            Self::CreatorChanged { .. } => "creator_changed",
            Self::CreatorTransferred { .. } => "creator_transferred",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_submitted_json_carries_name_only() {
        let event = RoomEvent::VoteSubmitted { name: "Bob".into() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "vote_submitted");
        assert_eq!(json["payload"], serde_json::json!({ "name": "Bob" }));
    }

    #[test]
    fn test_creator_transferred_fields_are_camel_case() {
        let event = RoomEvent::CreatorTransferred {
            previous_creator: "Alice".into(),
            new_creator: "Bob".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "creator_transferred");
        assert_eq!(json["payload"]["previousCreator"], "Alice");
        assert_eq!(json["payload"]["newCreator"], "Bob");
    }

    #[test]
    fn test_kind_matches_serialized_tag() {
        let event = RoomEvent::LinkUpdated { link: String::new() };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
    }
}
