//! Typed simulation events and the end-of-tick dispatch phase
//!
//! Components never call each other back. Each one appends what happened to
//! the tick's [`EventQueue`]; once every component has run, the queue is
//! delivered in order to the subscribers (combat log, match state, network)
//! and then handed to the host.

use glam::Vec3;
use serde::Serialize;
use uuid::Uuid;

use crate::world::SurfaceMaterial;

use super::combat::{HitZone, TargetId};
use super::enemies::{EnemyId, EnemyKind};
use super::pickups::PickupKind;
use super::player::PowerupKind;
use super::projectile::ProjectileKind;
use super::r#match::{FlagAction, Team};
use super::weapons::WeaponKind;

/// Where a point of damage on the local player came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DamageSource {
    Enemy { id: EnemyId },
    Remote { id: Uuid },
    Explosion,
    Fall,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SimEvent {
    // Local player
    PlayerLanded {
        impact_speed: f32,
        fall_damage: f32,
    },
    PlayerDamaged {
        amount: f32,
        source: DamageSource,
    },
    PlayerDied {
        attacker: Option<Uuid>,
        weapon: Option<WeaponKind>,
    },
    PlayerRespawned {
        position: Vec3,
    },

    // Weapons
    ShotFired {
        weapon: WeaponKind,
        origin: Vec3,
        direction: Vec3,
        pellets: u32,
    },
    TargetHit {
        target: TargetId,
        weapon: WeaponKind,
        zone: HitZone,
        damage: f32,
        distance: f32,
        point: Vec3,
    },
    ShotMissed {
        weapon: WeaponKind,
        impact: Option<SurfaceImpact>,
    },
    FriendlyFireBlocked {
        target: Uuid,
    },
    ReloadStarted {
        weapon: WeaponKind,
    },
    ReloadFinished {
        weapon: WeaponKind,
        magazine: u32,
        reserve: u32,
    },
    WeaponSwitched {
        from: WeaponKind,
        to: WeaponKind,
    },

    // Enemies
    EnemySpawned {
        id: EnemyId,
        kind: EnemyKind,
        position: Vec3,
    },
    EnemyAttack {
        id: EnemyId,
        melee: bool,
        hit: bool,
    },
    EnemyKilled {
        id: EnemyId,
        kind: EnemyKind,
        score: u32,
    },
    WaveStarted {
        wave: u32,
        enemies: usize,
    },
    WaveCleared {
        wave: u32,
    },

    // Projectiles
    ProjectileLaunched {
        id: u32,
        kind: ProjectileKind,
        position: Vec3,
    },
    Explosion {
        position: Vec3,
        radius: f32,
        max_damage: f32,
    },
    SplashDamage {
        target: TargetId,
        damage: f32,
    },

    // Pickups
    PickupCollected {
        kind: PickupKind,
        position: Vec3,
    },
    PowerupExpired {
        kind: PowerupKind,
    },

    // Peers and match
    RemoteJoined {
        id: Uuid,
        team: Option<Team>,
    },
    RemoteLeft {
        id: Uuid,
    },
    RemoteKilled {
        victim: Uuid,
        attacker: Option<Uuid>,
    },
    RemoteRespawned {
        id: Uuid,
    },
    /// Local request to interact with a flag, sent to the authority
    FlagInteraction {
        action: FlagAction,
        team: Team,
        position: Option<Vec3>,
    },
    /// Authoritative flag state change
    FlagUpdated {
        action: FlagAction,
        team: Team,
        carrier: Option<Uuid>,
        position: Option<Vec3>,
    },
    ScoreUpdated {
        red: u32,
        blue: u32,
    },
    MatchEnded {
        winner: Option<Team>,
    },
}

/// World impact of a shot that hit no entity, for decals and sounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurfaceImpact {
    pub point: Vec3,
    pub normal: Vec3,
    pub material: SurfaceMaterial,
}

/// Receives every event of a tick during the dispatch phase
pub trait EventSubscriber {
    fn on_event(&mut self, event: &SimEvent);
}

/// Ordered per-tick event buffer
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<SimEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }

    /// Deliver queued events to each subscriber in push order, then hand them back
    pub fn dispatch(&mut self, subscribers: &mut [&mut dyn EventSubscriber]) -> Vec<SimEvent> {
        let events = std::mem::take(&mut self.events);
        for event in &events {
            for subscriber in subscribers.iter_mut() {
                subscriber.on_event(event);
            }
        }
        events
    }
}
