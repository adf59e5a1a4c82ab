//! Combat system - firing, reload and switch state machines, hit resolution

use std::sync::Arc;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::util::math::{exp_decay, view_direction};
use crate::util::time::Countdown;
use crate::world::{Aabb, WorldGeometry, WorldHit};

use super::enemies::EnemyId;
use super::events::{EventQueue, SimEvent};
use super::projectile::ProjectileKind;
use super::weapons::{MovementState, WeaponKind, WeaponState, WeaponStats, WeaponTable};

pub const HEADSHOT_MULTIPLIER: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitZone {
    Head,
    Body,
}

/// Anything a shot can damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetId {
    Enemy(EnemyId),
    Remote(Uuid),
}

/// World-space hit volumes of one target. Head and body never overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetVolumes {
    pub id: TargetId,
    pub head: Aabb,
    pub body: Aabb,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetHit {
    pub target: TargetId,
    pub zone: HitZone,
    pub distance: f32,
    pub point: Vec3,
    /// Falloff and damage multiplier applied, before the zone multiplier
    pub base_damage: f32,
    /// Final damage including the zone multiplier
    pub damage: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotResolution {
    pub hit: Option<TargetHit>,
    /// World impact, only reported when no target was hit
    pub world_hit: Option<WorldHit>,
}

/// Weapon switch state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwitchPhase {
    Idle,
    SwitchingOut { target: usize, timer: Countdown },
    SwitchingIn { timer: Countdown },
}

/// Shooter pose for one trigger pull
#[derive(Debug, Clone, Copy)]
pub struct FireContext {
    pub origin: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub movement: MovementState,
    pub fire_rate_multiplier: f32,
    /// Trigger went down this tick; semi-automatic weapons need it
    pub trigger_pressed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FireOutcome {
    pub fired: bool,
    pub weapon: WeaponKind,
    pub origin: Vec3,
    /// One direction per pellet
    pub directions: Vec<Vec3>,
    pub projectile: Option<ProjectileKind>,
}

impl FireOutcome {
    fn rejected(weapon: WeaponKind, origin: Vec3) -> Self {
        Self {
            fired: false,
            weapon,
            origin,
            directions: Vec::new(),
            projectile: None,
        }
    }
}

/// Linear falloff between the weapon's start and end distance, floored at its minimum
pub fn falloff_damage(stats: &WeaponStats, distance: f32) -> f32 {
    if distance <= stats.falloff_start {
        return stats.damage;
    }
    if distance >= stats.falloff_end {
        return stats.min_damage;
    }
    let t = (distance - stats.falloff_start) / (stats.falloff_end - stats.falloff_start);
    (stats.damage + (stats.min_damage - stats.damage) * t).max(stats.min_damage)
}

pub fn zone_damage(base: f32, zone: HitZone) -> f32 {
    match zone {
        HitZone::Head => base * HEADSHOT_MULTIPLIER,
        HitZone::Body => base,
    }
}

/// Owns every weapon slot of the local player
pub struct CombatResolver {
    table: Arc<WeaponTable>,
    slots: Vec<WeaponState>,
    active: usize,
    previous: Option<usize>,
    switch: SwitchPhase,
    clock_ms: f64,
    rng: ChaCha8Rng,
}

impl CombatResolver {
    pub fn new(table: Arc<WeaponTable>, loadout: &[WeaponKind], seed: u64) -> Self {
        let mut kinds: Vec<WeaponKind> = Vec::with_capacity(loadout.len());
        for kind in loadout {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        if kinds.is_empty() {
            warn!("Empty loadout, falling back to pistol");
            kinds.push(WeaponKind::Pistol);
        }
        let slots = kinds
            .into_iter()
            .map(|kind| WeaponState::new(kind, table.get(kind)))
            .collect();

        Self {
            table,
            slots,
            active: 0,
            previous: None,
            switch: SwitchPhase::Idle,
            clock_ms: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn slots(&self) -> &[WeaponState] {
        &self.slots
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_weapon(&self) -> &WeaponState {
        &self.slots[self.active]
    }

    pub fn active_kind(&self) -> WeaponKind {
        self.slots[self.active].kind
    }

    pub fn active_stats(&self) -> &WeaponStats {
        self.table.get(self.active_kind())
    }

    pub fn stats(&self, kind: WeaponKind) -> &WeaponStats {
        self.table.get(kind)
    }

    pub fn previous_index(&self) -> Option<usize> {
        self.previous
    }

    pub fn switch_phase(&self) -> SwitchPhase {
        self.switch
    }

    pub fn is_switching(&self) -> bool {
        self.switch != SwitchPhase::Idle
    }

    /// Top up reserve ammo of every slot by a fraction of its magazine
    pub fn refill_reserves(&mut self, magazines: f32) -> bool {
        let mut any = false;
        for slot in &mut self.slots {
            let stats = self.table.get(slot.kind);
            let amount = (stats.magazine_size as f32 * magazines).ceil() as u32;
            any |= slot.add_reserve(amount, stats);
        }
        any
    }

    /// Restore every slot to its starting ammo
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = WeaponState::new(slot.kind, self.table.get(slot.kind));
        }
        self.switch = SwitchPhase::Idle;
    }

    /// Pull the trigger
    pub fn fire(&mut self, ctx: &FireContext) -> FireOutcome {
        let kind = self.active_kind();
        let stats = *self.table.get(kind);

        if self.is_switching() {
            return FireOutcome::rejected(kind, ctx.origin);
        }
        let weapon = &mut self.slots[self.active];
        if weapon.is_reloading() || weapon.magazine == 0 {
            return FireOutcome::rejected(kind, ctx.origin);
        }
        if !stats.automatic && !ctx.trigger_pressed {
            return FireOutcome::rejected(kind, ctx.origin);
        }
        if let Some(last) = weapon.last_shot_ms {
            if self.clock_ms - last < stats.shot_interval_ms(ctx.fire_rate_multiplier) {
                return FireOutcome::rejected(kind, ctx.origin);
            }
        }

        weapon.magazine -= 1;
        weapon.last_shot_ms = Some(self.clock_ms);
        if weapon.idle_time > stats.pattern_reset {
            weapon.shots_in_burst = 0;
        }
        weapon.idle_time = 0.0;

        // Spread cone and spray pattern
        let spread = stats.base_spread * ctx.movement.spread_multiplier() + weapon.bloom;
        let index = (weapon.shots_in_burst as usize).min(stats.pattern.len() - 1);
        let (pattern_pitch, pattern_yaw) = stats.pattern[index];
        let aim_pitch = ctx.pitch + weapon.recoil_pitch + pattern_pitch;
        let aim_yaw = ctx.yaw + weapon.recoil_yaw + pattern_yaw;

        let directions = (0..stats.pellets.max(1))
            .map(|_| {
                let dp = self.rng.gen_range(-1.0_f32..=1.0) * spread;
                let dy = self.rng.gen_range(-1.0_f32..=1.0) * spread;
                view_direction(aim_yaw + dy, aim_pitch + dp)
            })
            .collect();

        // Recoil kick with bounded jitter
        let jitter_pitch = self.rng.gen_range(-1.0_f32..=1.0) * stats.recoil_jitter;
        let jitter_yaw = self.rng.gen_range(-1.0_f32..=1.0) * stats.recoil_jitter;
        let weapon = &mut self.slots[self.active];
        weapon.recoil_pitch =
            (weapon.recoil_pitch + stats.recoil_pitch + jitter_pitch).clamp(0.0, stats.max_recoil_pitch);
        weapon.recoil_yaw = (weapon.recoil_yaw + stats.recoil_yaw + jitter_yaw)
            .clamp(-stats.max_recoil_yaw, stats.max_recoil_yaw);
        weapon.bloom = (weapon.bloom + stats.bloom_per_shot).min(stats.max_bloom);
        weapon.shots_in_burst += 1;

        debug!(weapon = ?kind, magazine = weapon.magazine, "Shot fired");

        FireOutcome {
            fired: true,
            weapon: kind,
            origin: ctx.origin,
            directions,
            projectile: stats.projectile,
        }
    }

    /// Start reloading the active weapon
    pub fn reload(&mut self, events: &mut EventQueue) -> bool {
        if self.is_switching() {
            return false;
        }
        let stats = self.table.get(self.active_kind());
        let weapon = &mut self.slots[self.active];
        if weapon.is_reloading() || weapon.magazine >= stats.magazine_size || weapon.reserve == 0 {
            return false;
        }
        weapon.reload = Some(Countdown::new(stats.reload_time));
        events.push(SimEvent::ReloadStarted { weapon: weapon.kind });
        true
    }

    /// Begin switching to the weapon in `index`. Cancels any reload in flight.
    pub fn switch_weapon(&mut self, index: usize) -> bool {
        if index >= self.slots.len() || index == self.active || self.is_switching() {
            return false;
        }
        let current = &mut self.slots[self.active];
        if current.reload.take().is_some() {
            debug!(weapon = ?current.kind, "Reload cancelled by switch");
        }
        let out_time = self.table.get(current.kind).switch_out_time;
        self.switch = SwitchPhase::SwitchingOut {
            target: index,
            timer: Countdown::new(out_time),
        };
        true
    }

    pub fn toggle_last_weapon(&mut self) -> bool {
        match self.previous {
            Some(index) => self.switch_weapon(index),
            None => false,
        }
    }

    /// Advance timers: recoil/bloom recovery, reload completion, switch phases
    pub fn update(&mut self, dt: f32, events: &mut EventQueue) {
        self.clock_ms += dt as f64 * 1000.0;

        for slot in &mut self.slots {
            let stats = self.table.get(slot.kind);
            slot.bloom *= exp_decay(stats.bloom_decay, dt);
            slot.recoil_pitch *= exp_decay(stats.recoil_recovery, dt);
            slot.recoil_yaw *= exp_decay(stats.recoil_recovery, dt);
            slot.idle_time += dt;
            if slot.idle_time > stats.pattern_reset {
                slot.shots_in_burst = 0;
            }
        }

        // Reload completion
        let stats = self.table.get(self.active_kind());
        let weapon = &mut self.slots[self.active];
        let finished = weapon.reload.as_mut().map_or(false, |timer| timer.tick(dt));
        if finished {
            let needed = stats.magazine_size.saturating_sub(weapon.magazine);
            let moved = needed.min(weapon.reserve);
            weapon.magazine += moved;
            weapon.reserve -= moved;
            weapon.reload = None;
            events.push(SimEvent::ReloadFinished {
                weapon: weapon.kind,
                magazine: weapon.magazine,
                reserve: weapon.reserve,
            });
        }

        // Switch state machine
        match &mut self.switch {
            SwitchPhase::Idle => {}
            SwitchPhase::SwitchingOut { target, timer } => {
                if timer.tick(dt) {
                    let target = *target;
                    let from = self.active_kind();
                    self.previous = Some(self.active);
                    self.active = target;
                    let to = self.active_kind();
                    let in_time = self.table.get(to).switch_in_time;
                    self.switch = SwitchPhase::SwitchingIn {
                        timer: Countdown::new(in_time),
                    };
                    events.push(SimEvent::WeaponSwitched { from, to });
                }
            }
            SwitchPhase::SwitchingIn { timer } => {
                if timer.tick(dt) {
                    self.switch = SwitchPhase::Idle;
                }
            }
        }
    }

    /// Resolve one shot direction against target volumes, then the world
    pub fn resolve_shot(
        &self,
        origin: Vec3,
        direction: Vec3,
        weapon: WeaponKind,
        damage_multiplier: f32,
        targets: &[TargetVolumes],
        world: &WorldGeometry,
    ) -> ShotResolution {
        let stats = self.table.get(weapon);
        let direction = direction.normalize_or_zero();
        let world_hit = world.raycast(origin, direction, stats.range);
        let max_dist = world_hit.map_or(stats.range, |h| h.distance);

        let mut best: Option<(TargetId, HitZone, f32)> = None;
        for target in targets {
            let head = target.head.ray_intersect(origin, direction, max_dist);
            let body = target.body.ray_intersect(origin, direction, max_dist);
            // Head takes priority whenever the ray passes through it
            let (zone, distance) = match (head, body) {
                (Some((d, _)), _) => (HitZone::Head, d),
                (None, Some((d, _))) => (HitZone::Body, d),
                (None, None) => continue,
            };
            if best.map_or(true, |(_, _, d)| distance < d) {
                best = Some((target.id, zone, distance));
            }
        }

        match best {
            Some((target, zone, distance)) => {
                let base_damage = falloff_damage(stats, distance) * damage_multiplier;
                ShotResolution {
                    hit: Some(TargetHit {
                        target,
                        zone,
                        distance,
                        point: origin + direction * distance,
                        base_damage,
                        damage: zone_damage(base_damage, zone),
                    }),
                    world_hit: None,
                }
            }
            None => ShotResolution {
                hit: None,
                world_hit,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{SurfaceMaterial, WorldVolume};

    const DT: f32 = 1.0 / 60.0;

    fn resolver(loadout: &[WeaponKind]) -> CombatResolver {
        CombatResolver::new(Arc::new(WeaponTable::new()), loadout, 7)
    }

    fn ctx() -> FireContext {
        FireContext {
            origin: Vec3::new(0.0, 1.6, 0.0),
            yaw: 0.0,
            pitch: 0.0,
            movement: MovementState::Stationary,
            fire_rate_multiplier: 1.0,
            trigger_pressed: true,
        }
    }

    fn run(r: &mut CombatResolver, seconds: f32, events: &mut EventQueue) {
        let ticks = (seconds / DT).ceil() as usize;
        for _ in 0..ticks {
            r.update(DT, events);
        }
    }

    #[test]
    fn empty_loadout_falls_back_to_pistol() {
        let r = resolver(&[]);
        assert_eq!(r.active_kind(), WeaponKind::Pistol);
    }

    #[test]
    fn fire_rate_gates_shots() {
        let mut r = resolver(&[WeaponKind::AssaultRifle]);
        assert!(r.fire(&ctx()).fired);
        assert!(!r.fire(&ctx()).fired);
        run(&mut r, 0.1, &mut EventQueue::new());
        assert!(r.fire(&ctx()).fired);
    }

    #[test]
    fn rapid_fire_shortens_interval() {
        let mut r = resolver(&[WeaponKind::AssaultRifle]);
        let boosted = FireContext {
            fire_rate_multiplier: 1.5,
            ..ctx()
        };
        assert!(r.fire(&boosted).fired);
        // 100ms at base rate, ~67ms boosted
        run(&mut r, 0.07, &mut EventQueue::new());
        assert!(r.fire(&boosted).fired);
    }

    #[test]
    fn semi_auto_needs_fresh_press() {
        let mut r = resolver(&[WeaponKind::Pistol]);
        assert!(r.fire(&ctx()).fired);
        run(&mut r, 1.0, &mut EventQueue::new());
        let held = FireContext {
            trigger_pressed: false,
            ..ctx()
        };
        assert!(!r.fire(&held).fired);
        assert!(r.fire(&ctx()).fired);
    }

    #[test]
    fn shotgun_fires_all_pellets() {
        let mut r = resolver(&[WeaponKind::Shotgun]);
        let out = r.fire(&ctx());
        assert!(out.fired);
        assert_eq!(out.directions.len(), 9);
        assert_eq!(r.active_weapon().magazine, 7);
    }

    #[test]
    fn reload_conserves_ammo_and_caps_magazine() {
        let mut events = EventQueue::new();
        for kind in WeaponKind::ALL {
            let mut r = resolver(&[kind]);
            let stats = *r.active_stats();
            for _ in 0..3 {
                let _ = r.fire(&ctx());
                run(&mut r, 2.0, &mut events);
            }
            let before = r.active_weapon().total_ammo();
            if r.reload(&mut events) {
                run(&mut r, stats.reload_time + 0.1, &mut events);
            }
            let w = r.active_weapon();
            assert!(w.magazine <= stats.magazine_size);
            assert_eq!(w.total_ammo(), before, "{kind:?}");
            assert!(!w.is_reloading());
        }
    }

    #[test]
    fn reload_rejections() {
        let mut events = EventQueue::new();
        let mut r = resolver(&[WeaponKind::AssaultRifle]);
        // Full magazine
        assert!(!r.reload(&mut events));
        let _ = r.fire(&ctx());
        assert!(r.reload(&mut events));
        // Already reloading
        assert!(!r.reload(&mut events));
        assert!(!r.fire(&ctx()).fired);
    }

    #[test]
    fn switch_runs_out_then_in_and_cancels_reload() {
        let mut events = EventQueue::new();
        let mut r = resolver(&[WeaponKind::AssaultRifle, WeaponKind::Pistol]);
        let _ = r.fire(&ctx());
        assert!(r.reload(&mut events));
        let mag = r.active_weapon().magazine;

        assert!(r.switch_weapon(1));
        assert!(!r.active_weapon().is_reloading());
        assert!(!r.switch_weapon(1));
        assert!(matches!(r.switch_phase(), SwitchPhase::SwitchingOut { .. }));
        assert!(!r.fire(&ctx()).fired);

        run(&mut r, 0.26, &mut events);
        assert_eq!(r.active_kind(), WeaponKind::Pistol);
        assert!(matches!(r.switch_phase(), SwitchPhase::SwitchingIn { .. }));

        run(&mut r, 0.25, &mut events);
        assert_eq!(r.switch_phase(), SwitchPhase::Idle);
        assert_eq!(r.slots()[0].magazine, mag);

        let switched = events
            .dispatch(&mut [])
            .into_iter()
            .filter(|e| matches!(e, SimEvent::WeaponSwitched { .. }))
            .count();
        assert_eq!(switched, 1);

        assert!(r.toggle_last_weapon());
        run(&mut r, 1.0, &mut events);
        assert_eq!(r.active_kind(), WeaponKind::AssaultRifle);
    }

    #[test]
    fn falloff_is_monotone_and_floored() {
        let table = WeaponTable::new();
        for kind in WeaponKind::ALL {
            let stats = table.get(kind);
            let mut last = f32::MAX;
            for step in 0..400 {
                let d = step as f32;
                let dmg = falloff_damage(stats, d);
                assert!(dmg <= last + 1e-5);
                assert!(dmg >= stats.min_damage);
                last = dmg;
            }
        }
    }

    fn dummy(id: EnemyId, at: Vec3) -> TargetVolumes {
        TargetVolumes {
            id: TargetId::Enemy(id),
            head: Aabb::from_feet(at + Vec3::Y * 1.5, 0.4, 0.3),
            body: Aabb::from_feet(at, 0.4, 1.5),
        }
    }

    #[test]
    fn headshot_is_exactly_double() {
        let r = resolver(&[WeaponKind::AssaultRifle]);
        let world = WorldGeometry::default();
        let target = dummy(1, Vec3::new(0.0, 0.0, -30.0));
        let head = r.resolve_shot(
            Vec3::new(0.0, 1.65, 0.0),
            Vec3::NEG_Z,
            WeaponKind::AssaultRifle,
            1.0,
            &[target],
            &world,
        );
        let body = r.resolve_shot(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::NEG_Z,
            WeaponKind::AssaultRifle,
            1.0,
            &[target],
            &world,
        );
        let head = head.hit.expect("head hit");
        let body = body.hit.expect("body hit");
        assert_eq!(head.zone, HitZone::Head);
        assert_eq!(body.zone, HitZone::Body);
        assert!((head.distance - body.distance).abs() < 1e-4);
        assert!((head.damage - 2.0 * body.damage).abs() < 1e-4);
    }

    #[test]
    fn nearest_target_wins_and_walls_occlude() {
        let r = resolver(&[WeaponKind::AssaultRifle]);
        let near = dummy(1, Vec3::new(0.0, 0.0, -10.0));
        let far = dummy(2, Vec3::new(0.0, 0.0, -20.0));
        let open = WorldGeometry::default();
        let res = r.resolve_shot(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::NEG_Z,
            WeaponKind::AssaultRifle,
            1.0,
            &[far, near],
            &open,
        );
        assert_eq!(res.hit.map(|h| h.target), Some(TargetId::Enemy(1)));

        let wall = WorldGeometry::new(vec![WorldVolume::solid(
            Aabb::new(Vec3::new(-2.0, 0.0, -6.0), Vec3::new(2.0, 3.0, -5.0)),
            SurfaceMaterial::Metal,
        )]);
        let res = r.resolve_shot(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::NEG_Z,
            WeaponKind::AssaultRifle,
            1.0,
            &[far, near],
            &wall,
        );
        assert!(res.hit.is_none());
        assert_eq!(res.world_hit.map(|h| h.material), Some(SurfaceMaterial::Metal));
    }
}
