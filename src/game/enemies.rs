//! Enemy director - wave spawning, per-enemy behavior and damage

use glam::Vec3;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::util::math::{exp_decay, horizontal, yaw_towards};
use crate::world::{Aabb, WorldGeometry};

use super::combat::{zone_damage, HitZone, TargetId, TargetVolumes};
use super::events::{EventQueue, SimEvent};
use super::player::PlayerState;
use super::waves::WavePlan;

pub type EnemyId = u32;

/// Keep-out margin used by obstacle avoidance
const AVOIDANCE_MARGIN: f32 = 0.6;
const AVOIDANCE_STRENGTH: f32 = 4.0;
/// Knockback velocity decay rate (per second)
const KNOCKBACK_DAMPING: f32 = 6.0;
/// Surfaces lower than this above the feet do not block enemies
const ENEMY_STEP_HEIGHT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyKind {
    Grunt,
    Sharpshooter,
    Bulwark,
    Rusher,
    Brute,
}

/// Behavior tag; ranged enemies strafe and shoot, rush and melee enemies close in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    Ranged,
    Rush,
    Melee,
}

/// Immutable stats per enemy type
#[derive(Debug, Clone, Copy)]
pub struct EnemyStats {
    pub behavior: Behavior,
    pub max_health: f32,
    pub speed: f32,
    /// Damage per shot or per melee hit
    pub damage: f32,
    /// Probability that a ranged shot connects
    pub accuracy: f32,
    /// Shots per second
    pub fire_rate: f32,
    pub range: f32,
    /// Ranged enemies try to stay between these distances
    pub preferred_min: f32,
    pub preferred_max: f32,
    pub strafe_interval: f32,
    pub melee_range: f32,
    pub melee_cooldown: f32,
    /// Multiplier on incoming ballistic and melee damage
    pub damage_taken: f32,
    pub score: u32,
    pub radius: f32,
    pub height: f32,
}

impl EnemyStats {
    pub fn for_kind(kind: EnemyKind) -> Self {
        match kind {
            EnemyKind::Grunt => Self {
                behavior: Behavior::Ranged,
                max_health: 100.0,
                speed: 3.5,
                damage: 8.0,
                accuracy: 0.35,
                fire_rate: 1.2,
                range: 35.0,
                preferred_min: 10.0,
                preferred_max: 20.0,
                strafe_interval: 1.5,
                melee_range: 0.0,
                melee_cooldown: 0.0,
                damage_taken: 1.0,
                score: 100,
                radius: 0.45,
                height: 1.8,
            },
            EnemyKind::Sharpshooter => Self {
                behavior: Behavior::Ranged,
                max_health: 70.0,
                speed: 3.0,
                damage: 20.0,
                accuracy: 0.6,
                fire_rate: 0.4,
                range: 60.0,
                preferred_min: 25.0,
                preferred_max: 40.0,
                strafe_interval: 2.5,
                melee_range: 0.0,
                melee_cooldown: 0.0,
                damage_taken: 1.0,
                score: 150,
                radius: 0.4,
                height: 1.8,
            },
            EnemyKind::Bulwark => Self {
                behavior: Behavior::Ranged,
                max_health: 250.0,
                speed: 2.0,
                damage: 12.0,
                accuracy: 0.3,
                fire_rate: 1.0,
                range: 30.0,
                preferred_min: 8.0,
                preferred_max: 15.0,
                strafe_interval: 2.0,
                melee_range: 0.0,
                melee_cooldown: 0.0,
                damage_taken: 0.5,
                score: 250,
                radius: 0.6,
                height: 2.1,
            },
            EnemyKind::Rusher => Self {
                behavior: Behavior::Rush,
                max_health: 60.0,
                speed: 7.5,
                damage: 12.0,
                accuracy: 1.0,
                fire_rate: 0.0,
                range: 0.0,
                preferred_min: 0.0,
                preferred_max: 0.0,
                strafe_interval: 0.0,
                melee_range: 1.6,
                melee_cooldown: 0.8,
                damage_taken: 1.0,
                score: 120,
                radius: 0.4,
                height: 1.7,
            },
            EnemyKind::Brute => Self {
                behavior: Behavior::Melee,
                max_health: 300.0,
                speed: 4.0,
                damage: 35.0,
                accuracy: 1.0,
                fire_rate: 0.0,
                range: 0.0,
                preferred_min: 0.0,
                preferred_max: 0.0,
                strafe_interval: 0.0,
                melee_range: 2.2,
                melee_cooldown: 1.5,
                damage_taken: 1.0,
                score: 300,
                radius: 0.7,
                height: 2.4,
            },
        }
    }

    pub fn eye_height(&self) -> f32 {
        self.height * 0.9
    }
}

/// Head and body boxes relative to the enemy's feet, fixed at spawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitVolumes {
    pub head: Aabb,
    pub body: Aabb,
}

impl HitVolumes {
    pub fn for_stats(stats: &EnemyStats) -> Self {
        let neck = stats.height * 0.8;
        Self {
            body: Aabb::from_feet(Vec3::ZERO, stats.radius, neck),
            head: Aabb::from_feet(Vec3::Y * neck, stats.radius * 0.6, stats.height - neck),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnemyState {
    pub id: EnemyId,
    pub kind: EnemyKind,
    pub stats: EnemyStats,
    pub position: Vec3,
    pub yaw: f32,
    pub health: f32,
    pub max_health: f32,
    pub volumes: HitVolumes,
    pub alive: bool,
    knockback: Vec3,
    strafe_dir: f32,
    strafe_timer: f32,
    shot_cooldown: f32,
    melee_cooldown: f32,
}

impl EnemyState {
    fn new(id: EnemyId, kind: EnemyKind, position: Vec3) -> Self {
        let stats = EnemyStats::for_kind(kind);
        Self {
            id,
            kind,
            stats,
            position,
            yaw: 0.0,
            health: stats.max_health,
            max_health: stats.max_health,
            volumes: HitVolumes::for_stats(&stats),
            alive: true,
            knockback: Vec3::ZERO,
            strafe_dir: 1.0,
            strafe_timer: stats.strafe_interval,
            shot_cooldown: if stats.fire_rate > 0.0 { 1.0 / stats.fire_rate } else { 0.0 },
            melee_cooldown: 0.0,
        }
    }

    pub fn target_volumes(&self) -> TargetVolumes {
        TargetVolumes {
            id: TargetId::Enemy(self.id),
            head: self.volumes.head.translated(self.position),
            body: self.volumes.body.translated(self.position),
        }
    }

    pub fn center(&self) -> Vec3 {
        self.position + Vec3::Y * self.stats.height * 0.5
    }

    fn is_finite(&self) -> bool {
        self.position.is_finite() && self.knockback.is_finite() && self.health.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageKind {
    Ballistic,
    Splash,
    Melee,
}

/// Knockback impulse away from a source point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Knockback {
    pub source: Vec3,
    pub force: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageInfo {
    /// Damage before armor and zone multipliers
    pub amount: f32,
    pub zone: HitZone,
    pub kind: DamageKind,
    pub knockback: Option<Knockback>,
}

/// Health actually removed by one damage call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyDamage {
    pub dealt: f32,
    /// True only on the call that kills the enemy
    pub killed: bool,
}

impl EnemyDamage {
    pub const NONE: Self = Self {
        dealt: 0.0,
        killed: false,
    };
}

/// What an enemy did this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnemyAction {
    Shoot {
        id: EnemyId,
        origin: Vec3,
        direction: Vec3,
        hit: bool,
        damage: f32,
    },
    Melee {
        id: EnemyId,
        damage: f32,
    },
}

pub struct EnemyDirector {
    enemies: Vec<EnemyState>,
    spawn_points: Vec<Vec3>,
    next_id: EnemyId,
    rng: ChaCha8Rng,
}

impl EnemyDirector {
    pub fn new(spawn_points: &[Vec3], seed: u64) -> Self {
        Self {
            enemies: Vec::new(),
            spawn_points: spawn_points.to_vec(),
            next_id: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn enemies(&self) -> &[EnemyState] {
        &self.enemies
    }

    pub fn get(&self, id: EnemyId) -> Option<&EnemyState> {
        self.enemies.iter().find(|e| e.id == id)
    }

    pub fn active_count(&self) -> usize {
        self.enemies.iter().filter(|e| e.alive).count()
    }

    /// Hit volumes of every live enemy
    pub fn targets(&self) -> Vec<TargetVolumes> {
        self.enemies
            .iter()
            .filter(|e| e.alive)
            .map(EnemyState::target_volumes)
            .collect()
    }

    /// Spawn a single enemy, mainly for scripted setups
    pub fn spawn(&mut self, kind: EnemyKind, position: Vec3, events: &mut EventQueue) -> EnemyId {
        let id = self.next_id;
        self.next_id += 1;
        self.enemies.push(EnemyState::new(id, kind, position));
        events.push(SimEvent::EnemySpawned { id, kind, position });
        id
    }

    /// Spawn every enemy of `wave` on a freshly shuffled spawn ring
    pub fn spawn_wave(&mut self, wave: u32, events: &mut EventQueue) -> usize {
        let plan = WavePlan::for_wave(wave);
        let mut points = self.spawn_points.clone();
        if points.is_empty() {
            warn!(wave, "No spawn points, spawning at origin");
            points.push(Vec3::ZERO);
        }
        points.shuffle(&mut self.rng);

        let mut spawned = 0;
        for (i, kind) in plan.kinds().enumerate() {
            // Later laps around the ring are spread out so enemies don't stack
            let lap = (i / points.len()) as f32;
            let angle = i as f32 * 2.399;
            let offset = Vec3::new(angle.cos(), 0.0, angle.sin()) * lap * 1.5;
            self.spawn(kind, points[i % points.len()] + offset, events);
            spawned += 1;
        }

        info!(wave, enemies = spawned, "Wave spawned");
        events.push(SimEvent::WaveStarted {
            wave,
            enemies: spawned,
        });
        spawned
    }

    /// Run every live enemy's behavior against the player
    pub fn update(&mut self, dt: f32, player: &PlayerState, world: &WorldGeometry) -> Vec<EnemyAction> {
        let mut actions = Vec::new();

        // Drop broken entities before they can poison the tick
        self.enemies.retain(|e| {
            let ok = e.is_finite();
            if !ok {
                warn!(enemy_id = e.id, "Removing enemy with non-finite state");
            }
            ok
        });

        for enemy in self.enemies.iter_mut().filter(|e| e.alive) {
            let to_player = horizontal(player.position - enemy.position);
            let distance = to_player.length();
            let dir = to_player.normalize_or_zero();

            let wish = match enemy.stats.behavior {
                Behavior::Ranged => {
                    Self::ranged(enemy, &mut self.rng, dir, distance, player, world, dt, &mut actions)
                }
                Behavior::Rush | Behavior::Melee => {
                    Self::close_in(enemy, dir, distance, player, dt, &mut actions)
                }
            };

            let avoid = avoidance(enemy, world);
            let velocity = (wish + avoid).clamp_length_max(enemy.stats.speed) + enemy.knockback;
            enemy.knockback *= exp_decay(KNOCKBACK_DAMPING, dt);

            let mut next = enemy.position + velocity * dt;
            push_out_of_solids(&mut next, enemy.stats.radius, world);
            if let Some(ground) = world.ground_probe(next, ENEMY_STEP_HEIGHT, 3.0) {
                next.y = ground.height;
            }
            enemy.position = next;
            if dir != Vec3::ZERO {
                enemy.yaw = yaw_towards(dir);
            }

            if !enemy.is_finite() {
                warn!(enemy_id = enemy.id, "Enemy state went non-finite, dropping");
                enemy.alive = false;
            }
        }

        actions
    }

    #[allow(clippy::too_many_arguments)]
    fn ranged(
        enemy: &mut EnemyState,
        rng: &mut ChaCha8Rng,
        dir: Vec3,
        distance: f32,
        player: &PlayerState,
        world: &WorldGeometry,
        dt: f32,
        actions: &mut Vec<EnemyAction>,
    ) -> Vec3 {
        let stats = enemy.stats;

        // Flip strafe direction on a timer
        enemy.strafe_timer -= dt;
        if enemy.strafe_timer <= 0.0 {
            enemy.strafe_dir = -enemy.strafe_dir;
            enemy.strafe_timer = stats.strafe_interval * rng.gen_range(0.75_f32..1.25);
        }
        let strafe = Vec3::new(-dir.z, 0.0, dir.x) * enemy.strafe_dir;

        // Hold the preferred distance band
        let radial = if distance > stats.preferred_max {
            dir
        } else if distance < stats.preferred_min {
            -dir
        } else {
            Vec3::ZERO
        };

        enemy.shot_cooldown = (enemy.shot_cooldown - dt).max(0.0);
        if player.alive && distance <= stats.range && enemy.shot_cooldown <= 0.0 {
            let eye = enemy.position + Vec3::Y * stats.eye_height();
            let chest = player.chest_position();
            if world.line_of_sight(eye, chest) {
                let hit = rng.gen::<f32>() < stats.accuracy;
                actions.push(EnemyAction::Shoot {
                    id: enemy.id,
                    origin: eye,
                    direction: (chest - eye).normalize_or_zero(),
                    hit,
                    damage: stats.damage,
                });
                enemy.shot_cooldown = 1.0 / stats.fire_rate.max(f32::EPSILON);
                debug!(enemy_id = enemy.id, hit, "Enemy fired");
            }
        }

        (strafe + radial).normalize_or_zero() * stats.speed
    }

    fn close_in(
        enemy: &mut EnemyState,
        dir: Vec3,
        distance: f32,
        player: &PlayerState,
        dt: f32,
        actions: &mut Vec<EnemyAction>,
    ) -> Vec3 {
        let stats = enemy.stats;
        enemy.melee_cooldown = (enemy.melee_cooldown - dt).max(0.0);
        if player.alive && distance <= stats.melee_range && enemy.melee_cooldown <= 0.0 {
            actions.push(EnemyAction::Melee {
                id: enemy.id,
                damage: stats.damage,
            });
            enemy.melee_cooldown = stats.melee_cooldown;
        }
        // Stop at contact range instead of pushing into the player
        if distance <= stats.melee_range * 0.6 {
            Vec3::ZERO
        } else {
            dir * stats.speed
        }
    }

    /// Apply damage. The kill is reported only on the call that kills the enemy.
    pub fn damage(&mut self, id: EnemyId, info: &DamageInfo, events: &mut EventQueue) -> EnemyDamage {
        let Some(enemy) = self.enemies.iter_mut().find(|e| e.id == id) else {
            return EnemyDamage::NONE;
        };
        if !enemy.alive || !info.amount.is_finite() || info.amount <= 0.0 {
            return EnemyDamage::NONE;
        }

        // Flat reduction first, then the headshot multiplier. Splash ignores both.
        let amount = match info.kind {
            DamageKind::Splash => info.amount,
            DamageKind::Ballistic | DamageKind::Melee => {
                zone_damage(info.amount * enemy.stats.damage_taken, info.zone)
            }
        };

        if let Some(kb) = info.knockback {
            let away = horizontal(enemy.position - kb.source).normalize_or_zero();
            enemy.knockback += away * kb.force;
        }

        let dealt = amount.min(enemy.health);
        enemy.health = (enemy.health - amount).max(0.0);
        if enemy.health > 0.0 {
            return EnemyDamage {
                dealt,
                killed: false,
            };
        }

        enemy.alive = false;
        debug!(enemy_id = id, kind = ?enemy.kind, "Enemy killed");
        events.push(SimEvent::EnemyKilled {
            id,
            kind: enemy.kind,
            score: enemy.stats.score,
        });
        EnemyDamage {
            dealt,
            killed: true,
        }
    }

    /// Remove dead enemies from the active set
    pub fn reap_dead(&mut self) -> usize {
        let before = self.enemies.len();
        self.enemies.retain(|e| e.alive);
        before - self.enemies.len()
    }

    /// Mode reset
    pub fn clear(&mut self) {
        self.enemies.clear();
    }
}

/// Push away from nearby blocking volumes in proportion to penetration of the keep-out margin
fn avoidance(enemy: &EnemyState, world: &WorldGeometry) -> Vec3 {
    let reach = enemy.stats.radius + AVOIDANCE_MARGIN;
    let probe = Aabb::from_feet(enemy.position, reach, enemy.stats.height);
    let mut push = Vec3::ZERO;
    for volume in world.solids_overlapping(&probe) {
        if volume.bounds.max.y <= enemy.position.y + ENEMY_STEP_HEIGHT {
            continue;
        }
        let closest = volume.bounds.closest_point(enemy.position);
        let away = horizontal(enemy.position - closest);
        let dist = away.length();
        let penetration = reach - dist;
        if penetration > 0.0 && dist > 1e-4 {
            push += away / dist * penetration * AVOIDANCE_STRENGTH;
        }
    }
    push
}

/// Horizontal push-out from blocking volumes
fn push_out_of_solids(feet: &mut Vec3, radius: f32, world: &WorldGeometry) {
    let body = Aabb::from_feet(*feet, radius, 1.0);
    let mut correction = Vec3::ZERO;
    for volume in world.solids_overlapping(&body) {
        let b = &volume.bounds;
        if b.max.y <= feet.y + ENEMY_STEP_HEIGHT {
            continue;
        }
        let push_x_pos = b.max.x - body.min.x;
        let push_x_neg = body.max.x - b.min.x;
        let push_z_pos = b.max.z - body.min.z;
        let push_z_neg = body.max.z - b.min.z;
        let x = if push_x_pos < push_x_neg { push_x_pos } else { -push_x_neg };
        let z = if push_z_pos < push_z_neg { push_z_pos } else { -push_z_neg };
        if x.abs() < z.abs() {
            correction.x += x;
        } else {
            correction.z += z;
        }
    }
    *feet += correction;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{SurfaceMaterial, WorldVolume};
    use uuid::Uuid;

    const DT: f32 = 1.0 / 60.0;

    fn floor() -> WorldVolume {
        WorldVolume::solid(
            Aabb::new(Vec3::new(-60.0, -1.0, -60.0), Vec3::new(60.0, 0.0, 60.0)),
            SurfaceMaterial::Concrete,
        )
    }

    fn player_at(pos: Vec3) -> PlayerState {
        PlayerState::new(Uuid::new_v4(), pos)
    }

    fn ballistic(amount: f32, zone: HitZone) -> DamageInfo {
        DamageInfo {
            amount,
            zone,
            kind: DamageKind::Ballistic,
            knockback: None,
        }
    }

    #[test]
    fn death_is_signalled_exactly_once() {
        let mut events = EventQueue::new();
        let mut director = EnemyDirector::new(&[Vec3::ZERO], 1);
        let id = director.spawn(EnemyKind::Grunt, Vec3::ZERO, &mut events);

        let first = director.damage(id, &ballistic(500.0, HitZone::Body), &mut events);
        assert!(first.killed);
        assert_eq!(first.dealt, 100.0);
        for _ in 0..5 {
            let again = director.damage(id, &ballistic(500.0, HitZone::Head), &mut events);
            assert_eq!(again, EnemyDamage::NONE);
        }
        let kills = events
            .iter()
            .filter(|e| matches!(e, SimEvent::EnemyKilled { .. }))
            .count();
        assert_eq!(kills, 1);
        assert_eq!(director.get(id).map(|e| e.health), Some(0.0));
        assert_eq!(director.active_count(), 0);
        assert_eq!(director.reap_dead(), 1);
        assert_eq!(director.reap_dead(), 0);
    }

    #[test]
    fn bulwark_reduction_applies_before_headshot() {
        let mut events = EventQueue::new();
        let mut director = EnemyDirector::new(&[Vec3::ZERO], 1);
        let id = director.spawn(EnemyKind::Bulwark, Vec3::ZERO, &mut events);
        let hit = director.damage(id, &ballistic(40.0, HitZone::Head), &mut events);
        // 40 * 0.5 * 2
        assert_eq!(hit.dealt, 40.0);
        assert_eq!(director.get(id).map(|e| e.health), Some(210.0));
    }

    #[test]
    fn splash_ignores_armor_and_zone() {
        let mut events = EventQueue::new();
        let mut director = EnemyDirector::new(&[Vec3::ZERO], 1);
        let id = director.spawn(EnemyKind::Bulwark, Vec3::ZERO, &mut events);
        let splash = DamageInfo {
            amount: 25.0,
            zone: HitZone::Head,
            kind: DamageKind::Splash,
            knockback: Some(Knockback {
                source: Vec3::new(-1.0, 0.0, 0.0),
                force: 5.0,
            }),
        };
        director.damage(id, &splash, &mut events);
        assert_eq!(director.get(id).map(|e| e.health), Some(225.0));
    }

    #[test]
    fn wave_spawn_matches_plan() {
        let mut events = EventQueue::new();
        let points = [Vec3::new(10.0, 0.0, 0.0), Vec3::new(-10.0, 0.0, 0.0)];
        let mut director = EnemyDirector::new(&points, 3);
        let count = director.spawn_wave(2, &mut events);
        assert_eq!(count, WavePlan::for_wave(2).total());
        assert_eq!(director.active_count(), count);
        let spawned = events
            .iter()
            .filter(|e| matches!(e, SimEvent::EnemySpawned { .. }))
            .count();
        assert_eq!(spawned, count);
        // Distinct ids
        let mut ids: Vec<_> = director.enemies().iter().map(|e| e.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), count);
    }

    #[test]
    fn rusher_melees_on_cooldown() {
        let world = WorldGeometry::new(vec![floor()]);
        let mut events = EventQueue::new();
        let mut director = EnemyDirector::new(&[], 1);
        director.spawn(EnemyKind::Rusher, Vec3::new(0.0, 0.0, -1.0), &mut events);
        let player = player_at(Vec3::ZERO);

        let first = director.update(DT, &player, &world);
        assert!(matches!(first.as_slice(), [EnemyAction::Melee { .. }]));
        let second = director.update(DT, &player, &world);
        assert!(second.is_empty());

        let cooldown = EnemyStats::for_kind(EnemyKind::Rusher).melee_cooldown;
        let mut melee = 0;
        for _ in 0..((cooldown / DT) as usize + 2) {
            melee += director.update(DT, &player, &world).len();
        }
        assert_eq!(melee, 1);
    }

    #[test]
    fn rusher_closes_distance() {
        let world = WorldGeometry::new(vec![floor()]);
        let mut events = EventQueue::new();
        let mut director = EnemyDirector::new(&[], 1);
        let id = director.spawn(EnemyKind::Rusher, Vec3::new(0.0, 0.0, -20.0), &mut events);
        let player = player_at(Vec3::ZERO);
        for _ in 0..60 {
            director.update(DT, &player, &world);
        }
        let z = director.get(id).map(|e| e.position.z).unwrap_or_default();
        assert!(z > -14.0);
    }

    #[test]
    fn ranged_shots_need_line_of_sight() {
        let wall = WorldVolume::solid(
            Aabb::new(Vec3::new(-10.0, 0.0, -6.0), Vec3::new(10.0, 5.0, -5.0)),
            SurfaceMaterial::Concrete,
        );
        let blocked_world = WorldGeometry::new(vec![floor(), wall]);
        let open_world = WorldGeometry::new(vec![floor()]);
        let player = player_at(Vec3::ZERO);

        let mut events = EventQueue::new();
        let mut blocked = EnemyDirector::new(&[], 9);
        blocked.spawn(EnemyKind::Grunt, Vec3::new(0.0, 0.0, -15.0), &mut events);
        let mut open = EnemyDirector::new(&[], 9);
        open.spawn(EnemyKind::Grunt, Vec3::new(0.0, 0.0, -15.0), &mut events);

        let mut blocked_shots = 0;
        let mut open_shots = 0;
        for _ in 0..180 {
            blocked_shots += blocked.update(DT, &player, &blocked_world).len();
            open_shots += open.update(DT, &player, &open_world).len();
        }
        assert_eq!(blocked_shots, 0);
        assert!(open_shots >= 2);
    }

    #[test]
    fn non_finite_enemy_is_dropped() {
        let world = WorldGeometry::new(vec![floor()]);
        let mut events = EventQueue::new();
        let mut director = EnemyDirector::new(&[], 1);
        director.spawn(EnemyKind::Grunt, Vec3::new(f32::NAN, 0.0, 0.0), &mut events);
        director.spawn(EnemyKind::Grunt, Vec3::new(5.0, 0.0, 0.0), &mut events);
        director.update(DT, &player_at(Vec3::ZERO), &world);
        assert_eq!(director.enemies().len(), 1);
    }

    #[test]
    fn hit_volumes_are_disjoint() {
        for kind in [
            EnemyKind::Grunt,
            EnemyKind::Sharpshooter,
            EnemyKind::Bulwark,
            EnemyKind::Rusher,
            EnemyKind::Brute,
        ] {
            let v = HitVolumes::for_stats(&EnemyStats::for_kind(kind));
            assert!(!v.head.intersects(&v.body), "{kind:?}");
        }
    }
}
