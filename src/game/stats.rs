//! Per-session combat log and accuracy tracking

use serde::Serialize;
use uuid::Uuid;

use super::combat::HitZone;
use super::events::{EventSubscriber, SimEvent};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombatLog {
    #[serde(skip)]
    local_id: Option<Uuid>,
    pub shots: u32,
    pub hits: u32,
    pub headshots: u32,
    pub kills: u32,
    pub deaths: u32,
    pub damage_dealt: f32,
    pub damage_taken: f32,
    pub explosions: u32,
}

impl CombatLog {
    pub fn new(local_id: Uuid) -> Self {
        Self {
            local_id: Some(local_id),
            ..Self::default()
        }
    }

    /// Fraction of pellets that struck a target; zero before the first shot
    pub fn accuracy(&self) -> f32 {
        if self.shots == 0 {
            0.0
        } else {
            self.hits as f32 / self.shots as f32
        }
    }

    pub fn misses(&self) -> u32 {
        self.shots.saturating_sub(self.hits)
    }
}

impl EventSubscriber for CombatLog {
    fn on_event(&mut self, event: &SimEvent) {
        match event {
            SimEvent::ShotFired { pellets, .. } => self.shots += pellets,
            SimEvent::TargetHit { zone, damage, .. } => {
                self.hits += 1;
                if *zone == HitZone::Head {
                    self.headshots += 1;
                }
                self.damage_dealt += damage;
            }
            SimEvent::SplashDamage { damage, .. } => self.damage_dealt += damage,
            SimEvent::Explosion { .. } => self.explosions += 1,
            SimEvent::EnemyKilled { .. } => self.kills += 1,
            SimEvent::RemoteKilled {
                attacker: Some(attacker),
                ..
            } if Some(*attacker) == self.local_id => self.kills += 1,
            SimEvent::PlayerDamaged { amount, .. } => self.damage_taken += amount,
            SimEvent::PlayerDied { .. } => self.deaths += 1,
            _ => {}
        }
    }
}
