//! Pickup pads: health, armor, ammo and timed powerups

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::util::time::Countdown;

use super::combat::CombatResolver;
use super::events::{EventQueue, SimEvent};
use super::player::{PlayerState, PowerupKind};

/// Horizontal reach within which a pad is collected
pub const PICKUP_RADIUS: f32 = 1.2;
const PICKUP_VERTICAL_REACH: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupKind {
    Health,
    Armor,
    Ammo,
    RapidFire,
    DamageBoost,
    SpeedBoost,
}

impl PickupKind {
    pub fn respawn_time(self) -> f32 {
        match self {
            PickupKind::Health | PickupKind::Armor => 20.0,
            PickupKind::Ammo => 15.0,
            PickupKind::RapidFire | PickupKind::DamageBoost | PickupKind::SpeedBoost => 45.0,
        }
    }

    pub fn powerup(self) -> Option<PowerupKind> {
        match self {
            PickupKind::RapidFire => Some(PowerupKind::RapidFire),
            PickupKind::DamageBoost => Some(PowerupKind::DamageBoost),
            PickupKind::SpeedBoost => Some(PowerupKind::SpeedBoost),
            _ => None,
        }
    }
}

const HEALTH_AMOUNT: f32 = 50.0;
const ARMOR_AMOUNT: f32 = 50.0;
/// Reserve refill per ammo pickup, in magazines
const AMMO_MAGAZINES: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct PickupPad {
    pub kind: PickupKind,
    pub position: Vec3,
    respawn: Option<Countdown>,
}

impl PickupPad {
    pub fn new(kind: PickupKind, position: Vec3) -> Self {
        Self {
            kind,
            position,
            respawn: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.respawn.is_none()
    }

    fn in_reach(&self, player: &PlayerState) -> bool {
        let dx = player.position.x - self.position.x;
        let dz = player.position.z - self.position.z;
        dx * dx + dz * dz <= PICKUP_RADIUS * PICKUP_RADIUS
            && (player.position.y - self.position.y).abs() <= PICKUP_VERTICAL_REACH
    }
}

/// Pad layout of the built-in arena
pub fn standard_pickups() -> Vec<PickupPad> {
    vec![
        PickupPad::new(PickupKind::Health, Vec3::new(0.0, 0.0, 12.0)),
        PickupPad::new(PickupKind::Health, Vec3::new(0.0, 0.0, -12.0)),
        PickupPad::new(PickupKind::Armor, Vec3::new(18.0, 0.0, 0.0)),
        PickupPad::new(PickupKind::Ammo, Vec3::new(-4.0, 0.0, 0.0)),
        PickupPad::new(PickupKind::Ammo, Vec3::new(15.0, 0.0, 15.0)),
        PickupPad::new(PickupKind::RapidFire, Vec3::new(-17.0, 2.5, 0.0)),
        PickupPad::new(PickupKind::DamageBoost, Vec3::new(20.0, 0.0, -20.0)),
        PickupPad::new(PickupKind::SpeedBoost, Vec3::new(-20.0, 0.0, 20.0)),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct PickupField {
    pads: Vec<PickupPad>,
}

impl PickupField {
    pub fn new(pads: Vec<PickupPad>) -> Self {
        Self { pads }
    }

    pub fn pads(&self) -> &[PickupPad] {
        &self.pads
    }

    /// Tick respawn timers and collect any pad the player stands on.
    /// A pad whose effect would be wasted (full health, full ammo) stays put.
    pub fn update(
        &mut self,
        dt: f32,
        player: &mut PlayerState,
        combat: &mut CombatResolver,
        events: &mut EventQueue,
    ) {
        for pad in &mut self.pads {
            if let Some(timer) = pad.respawn.as_mut() {
                if timer.tick(dt) {
                    pad.respawn = None;
                }
                continue;
            }
            if !player.alive || !pad.in_reach(player) {
                continue;
            }

            let applied = match pad.kind {
                PickupKind::Health => player.heal(HEALTH_AMOUNT),
                PickupKind::Armor => player.add_armor(ARMOR_AMOUNT),
                PickupKind::Ammo => combat.refill_reserves(AMMO_MAGAZINES),
                PickupKind::RapidFire | PickupKind::DamageBoost | PickupKind::SpeedBoost => {
                    match pad.kind.powerup() {
                        Some(kind) => {
                            player.grant_powerup(kind);
                            true
                        }
                        None => false,
                    }
                }
            };
            if !applied {
                continue;
            }

            pad.respawn = Some(Countdown::new(pad.kind.respawn_time()));
            debug!(kind = ?pad.kind, "Pickup collected");
            events.push(SimEvent::PickupCollected {
                kind: pad.kind,
                position: pad.position,
            });
        }
    }
}
