use serde::{Deserialize, Serialize};

use crate::net::{ItemPlacement, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPlacedEvent {
    pub player_id: PlayerId,
    pub placement: ItemPlacement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxPickupEvent {
    pub player_id: PlayerId,
    pub box_index: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    Graceful,
    Timeout,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "left",
            DisconnectReason::Timeout => "timed out",
        }
    }
}

/// Peer table transitions, queued for the caller's UI or logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerEvent {
    Joined {
        player_id: PlayerId,
    },
    ReadyChanged {
        player_id: PlayerId,
        ready: bool,
    },
    Left {
        player_id: PlayerId,
        reason: DisconnectReason,
    },
}
