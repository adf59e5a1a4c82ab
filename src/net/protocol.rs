//! Realtime channel message definitions
//! These are the wire types exchanged with peers over the match channel

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::game::combat::HitZone;
use crate::game::r#match::{FlagAction, Team};
use crate::game::weapons::WeaponKind;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Decode(#[from] serde_json::Error),
}

/// View rotation in radians
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub yaw: f32,
    pub pitch: f32,
}

/// Messages sent from the local client to the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Announce the local player on a match channel
    #[serde(rename_all = "camelCase")]
    JoinMatch {
        match_id: Uuid,
        player_id: Uuid,
        team: Option<Team>,
    },

    /// Local pose, sent at a capped rate
    #[serde(rename_all = "camelCase")]
    PlayerUpdate {
        position: Vec3,
        rotation: Rotation,
        velocity: Vec3,
        is_sprinting: bool,
        is_grounded: bool,
    },

    #[serde(rename_all = "camelCase")]
    PlayerShoot {
        origin: Vec3,
        direction: Vec3,
        weapon_type: WeaponKind,
    },

    /// Damage the local player dealt to a peer
    #[serde(rename_all = "camelCase")]
    PlayerHit {
        target_id: Uuid,
        damage: f32,
        hit_location: HitZone,
    },

    #[serde(rename_all = "camelCase")]
    PlayerDied {
        attacker_id: Option<Uuid>,
        weapon_type: Option<WeaponKind>,
    },

    PlayerRespawn,

    FlagAction {
        action: FlagAction,
        team: Team,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Vec3>,
    },
}

/// Peer summary carried by `match_state`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub player_id: Uuid,
    #[serde(default)]
    pub team: Option<Team>,
    #[serde(default)]
    pub position: Option<Vec3>,
    #[serde(default = "default_alive")]
    pub alive: bool,
}

fn default_alive() -> bool {
    true
}

/// Messages received from the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        player_id: Uuid,
        #[serde(default)]
        team: Option<Team>,
        #[serde(default)]
        position: Option<Vec3>,
    },

    #[serde(rename_all = "camelCase")]
    PlayerUpdate {
        player_id: Uuid,
        position: Vec3,
        #[serde(default)]
        rotation: Rotation,
        #[serde(default)]
        velocity: Vec3,
        #[serde(default)]
        is_sprinting: bool,
        #[serde(default)]
        is_grounded: bool,
    },

    /// A peer reports damaging `target_id`
    #[serde(rename_all = "camelCase")]
    PlayerDamaged {
        target_id: Uuid,
        attacker_id: Uuid,
        damage: f32,
        #[serde(default)]
        hit_location: Option<HitZone>,
    },

    #[serde(rename_all = "camelCase")]
    PlayerKilled {
        victim_id: Uuid,
        #[serde(default)]
        attacker_id: Option<Uuid>,
        #[serde(default)]
        weapon_type: Option<WeaponKind>,
    },

    #[serde(rename_all = "camelCase")]
    PlayerRespawned {
        player_id: Uuid,
        #[serde(default)]
        position: Option<Vec3>,
    },

    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: Uuid },

    /// Full roster and score, sent on join
    #[serde(rename_all = "camelCase")]
    MatchState {
        #[serde(default)]
        players: Vec<PeerInfo>,
        #[serde(default)]
        red_score: u32,
        #[serde(default)]
        blue_score: u32,
    },

    ScoreUpdate { red: u32, blue: u32 },

    MatchEnded {
        #[serde(default)]
        winner: Option<Team>,
    },

    #[serde(rename_all = "camelCase")]
    FlagUpdate {
        action: FlagAction,
        team: Team,
        #[serde(default)]
        carrier_id: Option<Uuid>,
        #[serde(default)]
        position: Option<Vec3>,
    },
}

impl InboundEvent {
    pub fn from_json(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Peer the message is about, when it names one
    pub fn subject(&self) -> Option<Uuid> {
        match self {
            InboundEvent::PlayerJoined { player_id, .. }
            | InboundEvent::PlayerUpdate { player_id, .. }
            | InboundEvent::PlayerRespawned { player_id, .. }
            | InboundEvent::PlayerLeft { player_id } => Some(*player_id),
            InboundEvent::PlayerDamaged { target_id, .. } => Some(*target_id),
            InboundEvent::PlayerKilled { victim_id, .. } => Some(*victim_id),
            _ => None,
        }
    }
}

impl OutboundEvent {
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::JoinMatch { .. } => "join_match",
            OutboundEvent::PlayerUpdate { .. } => "player_update",
            OutboundEvent::PlayerShoot { .. } => "player_shoot",
            OutboundEvent::PlayerHit { .. } => "player_hit",
            OutboundEvent::PlayerDied { .. } => "player_died",
            OutboundEvent::PlayerRespawn => "player_respawn",
            OutboundEvent::FlagAction { .. } => "flag_action",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_uses_event_envelope_and_camel_case() {
        let msg = OutboundEvent::PlayerUpdate {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Rotation { yaw: 0.5, pitch: 0.0 },
            velocity: Vec3::ZERO,
            is_sprinting: true,
            is_grounded: false,
        };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["event"], msg.name());
        assert_eq!(json["data"]["isSprinting"], true);
        assert_eq!(json["data"]["position"], serde_json::json!([1.0, 2.0, 3.0]));
    }

    #[test]
    fn flag_action_omits_missing_position() {
        let msg = OutboundEvent::FlagAction {
            action: FlagAction::Pickup,
            team: Team::Red,
            position: None,
        };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["data"]["action"], "pickup");
        assert!(json["data"].get("position").is_none());
    }

    #[test]
    fn inbound_update_defaults_optional_fields() {
        let id = Uuid::new_v4();
        let line = format!(
            r#"{{"event":"player_update","data":{{"playerId":"{id}","position":[4.0,0.0,-2.0]}}}}"#
        );
        let msg = InboundEvent::from_json(&line).unwrap();
        assert_eq!(msg.subject(), Some(id));
        match msg {
            InboundEvent::PlayerUpdate {
                position,
                is_grounded,
                ..
            } => {
                assert_eq!(position, Vec3::new(4.0, 0.0, -2.0));
                assert!(!is_grounded);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_event_is_a_decode_error() {
        let err = InboundEvent::from_json(r#"{"event":"teleport","data":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn flag_update_decodes_carrier() {
        let carrier = Uuid::new_v4();
        let line = format!(
            r#"{{"event":"flag_update","data":{{"action":"pickup","team":"blue","carrierId":"{carrier}"}}}}"#
        );
        assert_eq!(
            InboundEvent::from_json(&line).unwrap(),
            InboundEvent::FlagUpdate {
                action: FlagAction::Pickup,
                team: Team::Blue,
                carrier_id: Some(carrier),
                position: None,
            }
        );
    }
}
