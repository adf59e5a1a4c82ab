//! Local player state, owned by the kinematic controller

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::world::Aabb;

use super::r#match::Team;

pub const PLAYER_MAX_HEALTH: f32 = 100.0;
pub const PLAYER_MAX_ARMOR: f32 = 100.0;
pub const PLAYER_MAX_STAMINA: f32 = 100.0;
pub const PLAYER_RADIUS: f32 = 0.4;
pub const PLAYER_HEIGHT: f32 = 1.8;
pub const PLAYER_EYE_HEIGHT: f32 = 1.6;
pub const PLAYER_CHEST_HEIGHT: f32 = 1.2;
pub const STARTING_GRENADES: u32 = 2;
/// Fraction of incoming damage soaked by armor while any remains
pub const ARMOR_ABSORPTION: f32 = 2.0 / 3.0;

/// Timed powerups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerupKind {
    RapidFire,
    DamageBoost,
    SpeedBoost,
}

impl PowerupKind {
    pub fn duration(self) -> f32 {
        match self {
            PowerupKind::RapidFire => 12.0,
            PowerupKind::DamageBoost => 15.0,
            PowerupKind::SpeedBoost => 10.0,
        }
    }

    pub fn fire_rate_multiplier(self) -> f32 {
        if self == PowerupKind::RapidFire {
            1.5
        } else {
            1.0
        }
    }

    pub fn damage_multiplier(self) -> f32 {
        if self == PowerupKind::DamageBoost {
            1.5
        } else {
            1.0
        }
    }

    pub fn speed_multiplier(self) -> f32 {
        if self == PowerupKind::SpeedBoost {
            1.3
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivePowerup {
    pub kind: PowerupKind,
    pub remaining: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementFlags {
    pub on_ground: bool,
    pub sprinting: bool,
    pub sliding: bool,
    pub jumping: bool,
    pub crouching: bool,
    /// Stamina ran dry; sprint stays locked until it recovers
    pub exhausted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementTimers {
    pub coyote: f32,
    pub jump_buffer: f32,
    /// Elapsed time of the current slide
    pub slide: f32,
    pub slide_cooldown: f32,
}

/// Outcome of applying damage to the player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageOutcome {
    pub health_lost: f32,
    pub armor_lost: f32,
    pub killed: bool,
}

/// Authoritative local player state
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: Uuid,
    pub team: Option<Team>,
    /// Feet position
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub health: f32,
    pub max_health: f32,
    pub armor: f32,
    pub stamina: f32,
    pub max_stamina: f32,
    pub flags: MovementFlags,
    pub timers: MovementTimers,
    pub powerup: Option<ActivePowerup>,
    pub damage_multiplier: f32,
    pub speed_multiplier: f32,
    pub grenades: u32,
    pub alive: bool,
    pub(crate) slide_direction: Vec3,
    pub(crate) jump_cut_used: bool,
}

impl PlayerState {
    pub fn new(id: Uuid, spawn: Vec3) -> Self {
        Self {
            id,
            team: None,
            position: spawn,
            velocity: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            health: PLAYER_MAX_HEALTH,
            max_health: PLAYER_MAX_HEALTH,
            armor: 0.0,
            stamina: PLAYER_MAX_STAMINA,
            max_stamina: PLAYER_MAX_STAMINA,
            flags: MovementFlags {
                on_ground: true,
                ..Default::default()
            },
            timers: MovementTimers::default(),
            powerup: None,
            damage_multiplier: 1.0,
            speed_multiplier: 1.0,
            grenades: STARTING_GRENADES,
            alive: true,
            slide_direction: Vec3::ZERO,
            jump_cut_used: false,
        }
    }

    pub fn eye_position(&self) -> Vec3 {
        self.position + Vec3::Y * PLAYER_EYE_HEIGHT
    }

    pub fn chest_position(&self) -> Vec3 {
        self.position + Vec3::Y * PLAYER_CHEST_HEIGHT
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_feet(self.position, PLAYER_RADIUS, PLAYER_HEIGHT)
    }

    pub fn fire_rate_multiplier(&self) -> f32 {
        self.powerup
            .map(|p| p.kind.fire_rate_multiplier())
            .unwrap_or(1.0)
    }

    /// Apply damage through armor. Health never drops below zero and the
    /// kill is reported exactly once.
    pub fn apply_damage(&mut self, amount: f32) -> DamageOutcome {
        if !self.alive || amount <= 0.0 || !amount.is_finite() {
            return DamageOutcome {
                health_lost: 0.0,
                armor_lost: 0.0,
                killed: false,
            };
        }
        let armor_lost = (amount * ARMOR_ABSORPTION).min(self.armor);
        self.armor -= armor_lost;
        let health_lost = (amount - armor_lost).min(self.health);
        self.health = (self.health - health_lost).max(0.0);

        let killed = self.health <= 0.0;
        if killed {
            self.alive = false;
            self.flags.sprinting = false;
            self.flags.sliding = false;
        }
        DamageOutcome {
            health_lost,
            armor_lost,
            killed,
        }
    }

    /// Authoritative death. Returns false if already dead.
    pub fn kill(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        self.health = 0.0;
        self.alive = false;
        self.flags.sprinting = false;
        self.flags.sliding = false;
        true
    }

    /// Returns false when already at full health
    pub fn heal(&mut self, amount: f32) -> bool {
        if !self.alive || self.health >= self.max_health {
            return false;
        }
        self.health = (self.health + amount).min(self.max_health);
        true
    }

    pub fn add_armor(&mut self, amount: f32) -> bool {
        if !self.alive || self.armor >= PLAYER_MAX_ARMOR {
            return false;
        }
        self.armor = (self.armor + amount).min(PLAYER_MAX_ARMOR);
        true
    }

    /// A new powerup replaces whatever is active
    pub fn grant_powerup(&mut self, kind: PowerupKind) {
        self.powerup = Some(ActivePowerup {
            kind,
            remaining: kind.duration(),
        });
        self.damage_multiplier = kind.damage_multiplier();
        self.speed_multiplier = kind.speed_multiplier();
    }

    /// Count down the active powerup. Returns its kind on the tick it expires.
    pub fn tick_powerup(&mut self, dt: f32) -> Option<PowerupKind> {
        let active = self.powerup.as_mut()?;
        active.remaining -= dt;
        if active.remaining > 0.0 {
            return None;
        }
        let kind = active.kind;
        self.powerup = None;
        self.damage_multiplier = 1.0;
        self.speed_multiplier = 1.0;
        Some(kind)
    }

    pub fn respawn(&mut self, at: Vec3) {
        let id = self.id;
        let team = self.team;
        *self = Self::new(id, at);
        self.team = team;
    }
}
