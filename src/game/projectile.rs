//! Projectiles (grenades, rockets) and explosion damage

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::world::WorldGeometry;

use super::combat::{HitZone, TargetId};
use super::enemies::{DamageInfo, DamageKind, EnemyDirector, EnemyId, Knockback};
use super::events::{DamageSource, EventQueue, SimEvent};
use super::player::PlayerState;

/// Upward share of explosion knockback
const KNOCKBACK_UP_BIAS: f32 = 0.35;
/// Surfaces with a normal this close to vertical count as floors
const FLOOR_NORMAL_Y: f32 = 0.7;
/// Offset from a surface after a bounce so the next sweep starts outside it
const SURFACE_SKIN: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileKind {
    Grenade,
    Rocket,
}

/// Physical and explosive parameters per projectile type
#[derive(Debug, Clone, Copy)]
pub struct ProjectileParams {
    pub speed: f32,
    pub gravity: f32,
    /// Fraction of velocity kept after a bounce
    pub bounciness: f32,
    /// Horizontal speed lost per bounce on near-horizontal surfaces
    pub friction: f32,
    /// Fuse or maximum flight time
    pub lifetime: f32,
    /// Detonate on first contact instead of bouncing
    pub impact_detonate: bool,
    /// Below this speed a bouncing projectile comes to rest
    pub settle_speed: f32,
    pub blast_radius: f32,
    pub max_damage: f32,
    pub knockback: f32,
}

impl ProjectileParams {
    pub fn for_kind(kind: ProjectileKind) -> Self {
        match kind {
            ProjectileKind::Grenade => Self {
                speed: 18.0,
                gravity: 20.0,
                bounciness: 0.45,
                friction: 0.35,
                lifetime: 2.5,
                impact_detonate: false,
                settle_speed: 1.0,
                blast_radius: 5.0,
                max_damage: 100.0,
                knockback: 12.0,
            },
            ProjectileKind::Rocket => Self {
                speed: 30.0,
                gravity: 0.0,
                bounciness: 0.0,
                friction: 0.0,
                lifetime: 6.0,
                impact_detonate: true,
                settle_speed: 2.0,
                blast_radius: 4.0,
                max_damage: 110.0,
                knockback: 15.0,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectileState {
    pub id: u32,
    pub kind: ProjectileKind,
    pub owner: Uuid,
    pub position: Vec3,
    pub velocity: Vec3,
    pub remaining: f32,
    pub params: ProjectileParams,
    resting: bool,
}

/// A detonation waiting to be applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blast {
    pub position: Vec3,
    pub radius: f32,
    pub max_damage: f32,
    pub knockback: f32,
    pub owner: Option<Uuid>,
}

impl Blast {
    pub fn new(position: Vec3, radius: f32, max_damage: f32) -> Self {
        Self {
            position,
            radius,
            max_damage,
            knockback: 0.0,
            owner: None,
        }
    }

    /// Linear falloff: full damage at the center, zero at the radius
    pub fn damage_at(&self, distance: f32) -> f32 {
        if self.radius <= 0.0 || distance >= self.radius {
            return 0.0;
        }
        self.max_damage * (1.0 - distance.max(0.0) / self.radius)
    }

    fn knockback_at(&self, target: Vec3, distance: f32) -> Vec3 {
        if self.radius <= 0.0 || distance >= self.radius {
            return Vec3::ZERO;
        }
        let strength = self.knockback * (1.0 - distance / self.radius);
        let away = (target - self.position).normalize_or_zero();
        (away + Vec3::Y * KNOCKBACK_UP_BIAS).normalize_or_zero() * strength
    }
}

/// Damage dealt by one round of explosions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExplosionReport {
    pub player_damage: f32,
    pub player_killed: bool,
    pub enemies_killed: Vec<EnemyId>,
    pub remote_hits: Vec<(Uuid, f32)>,
}

#[derive(Default)]
pub struct ProjectileResolver {
    projectiles: Vec<ProjectileState>,
    next_id: u32,
}

impl ProjectileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projectiles(&self) -> &[ProjectileState] {
        &self.projectiles
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.projectiles.clear();
    }

    /// Launch a projectile along `direction`
    pub fn spawn(&mut self, kind: ProjectileKind, origin: Vec3, direction: Vec3, owner: Uuid) -> u32 {
        let params = ProjectileParams::for_kind(kind);
        self.next_id = self.next_id.wrapping_add(1);
        let id = self.next_id;
        self.projectiles.push(ProjectileState {
            id,
            kind,
            owner,
            position: origin,
            velocity: direction.normalize_or_zero() * params.speed,
            remaining: params.lifetime,
            params,
            resting: false,
        });
        debug!(projectile_id = id, ?kind, "Projectile launched");
        id
    }

    /// Integrate every projectile and collect the ones that detonate
    pub fn update(&mut self, dt: f32, world: &WorldGeometry) -> Vec<Blast> {
        let mut blasts = Vec::new();

        self.projectiles.retain_mut(|p| {
            if !p.position.is_finite() || !p.velocity.is_finite() {
                warn!(projectile_id = p.id, "Removing projectile with non-finite state");
                return false;
            }

            let detonated = step_projectile(p, dt, world);
            p.remaining -= dt;
            if detonated || p.remaining <= 0.0 {
                blasts.push(Blast {
                    position: p.position,
                    radius: p.params.blast_radius,
                    max_damage: p.params.max_damage,
                    knockback: p.params.knockback,
                    owner: Some(p.owner),
                });
                return false;
            }
            true
        });

        blasts
    }

    /// Apply one explosion
    pub fn explode(
        &self,
        blast: Blast,
        player: &mut PlayerState,
        director: &mut EnemyDirector,
        remotes: &[(Uuid, Vec3)],
        events: &mut EventQueue,
    ) -> ExplosionReport {
        self.explode_all(&[blast], player, director, remotes, events)
    }

    /// Apply a set of simultaneous explosions. Each entity takes damage once,
    /// from the strongest blast that reaches it.
    pub fn explode_all(
        &self,
        blasts: &[Blast],
        player: &mut PlayerState,
        director: &mut EnemyDirector,
        remotes: &[(Uuid, Vec3)],
        events: &mut EventQueue,
    ) -> ExplosionReport {
        let mut report = ExplosionReport::default();
        if blasts.is_empty() {
            return report;
        }
        for blast in blasts {
            events.push(SimEvent::Explosion {
                position: blast.position,
                radius: blast.radius,
                max_damage: blast.max_damage,
            });
        }

        // Local player
        if player.alive {
            if let Some((blast, damage, distance)) = strongest(blasts, player.position) {
                player.velocity += blast.knockback_at(player.position, distance);
                let outcome = player.apply_damage(damage);
                let dealt = outcome.health_lost + outcome.armor_lost;
                report.player_damage = dealt;
                report.player_killed = outcome.killed;
                if dealt > 0.0 {
                    events.push(SimEvent::PlayerDamaged {
                        amount: dealt,
                        source: DamageSource::Explosion,
                    });
                }
            }
        }

        // Enemies
        let hits: Vec<(EnemyId, Blast, f32, f32)> = director
            .enemies()
            .iter()
            .filter(|e| e.alive)
            .filter_map(|e| {
                strongest(blasts, e.position).map(|(b, dmg, dist)| (e.id, b, dmg, dist))
            })
            .collect();
        for (id, blast, damage, distance) in hits {
            let info = DamageInfo {
                amount: damage,
                zone: HitZone::Body,
                kind: DamageKind::Splash,
                knockback: Some(Knockback {
                    source: blast.position,
                    force: blast.knockback * (1.0 - distance / blast.radius),
                }),
            };
            let result = director.damage(id, &info, events);
            if result.dealt > 0.0 {
                events.push(SimEvent::SplashDamage {
                    target: TargetId::Enemy(id),
                    damage: result.dealt,
                });
            }
            if result.killed {
                report.enemies_killed.push(id);
            }
        }

        // Remote peers
        for (id, position) in remotes {
            if let Some((_, damage, _)) = strongest(blasts, *position) {
                report.remote_hits.push((*id, damage));
            }
        }

        report
    }
}

/// Strongest blast reaching `target`, with its damage and distance
fn strongest(blasts: &[Blast], target: Vec3) -> Option<(Blast, f32, f32)> {
    blasts
        .iter()
        .filter_map(|b| {
            let distance = b.position.distance(target);
            let damage = b.damage_at(distance);
            (damage > 0.0).then_some((*b, damage, distance))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Semi-implicit Euler with a ray sweep. Returns true when the projectile detonates.
fn step_projectile(p: &mut ProjectileState, dt: f32, world: &WorldGeometry) -> bool {
    if p.resting {
        return false;
    }

    p.velocity.y -= p.params.gravity * dt;
    let displacement = p.velocity * dt;
    let distance = displacement.length();
    if distance <= f32::EPSILON {
        return false;
    }

    let Some(hit) = world.raycast(p.position, displacement, distance) else {
        p.position += displacement;
        return false;
    };

    if p.params.impact_detonate {
        p.position = hit.point;
        return true;
    }

    // Bounce
    let n = hit.normal;
    p.position = hit.point + n * SURFACE_SKIN;
    p.velocity = (p.velocity - 2.0 * p.velocity.dot(n) * n) * p.params.bounciness;
    if n.y > FLOOR_NORMAL_Y {
        let keep = 1.0 - p.params.friction;
        p.velocity.x *= keep;
        p.velocity.z *= keep;
        if p.velocity.length() < p.params.settle_speed {
            p.velocity = Vec3::ZERO;
            p.resting = true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::enemies::EnemyKind;
    use crate::world::{Aabb, SurfaceMaterial, WorldVolume};

    const DT: f32 = 1.0 / 60.0;

    fn floor() -> WorldVolume {
        WorldVolume::solid(
            Aabb::new(Vec3::new(-50.0, -1.0, -50.0), Vec3::new(50.0, 0.0, 50.0)),
            SurfaceMaterial::Concrete,
        )
    }

    #[test]
    fn splash_damage_is_linear_in_distance() {
        let mut events = EventQueue::new();
        let mut director = EnemyDirector::new(&[], 1);
        let id = director.spawn(EnemyKind::Grunt, Vec3::ZERO, &mut events);
        let mut player = PlayerState::new(Uuid::new_v4(), Vec3::new(40.0, 0.0, 0.0));
        let resolver = ProjectileResolver::new();

        let blast = Blast::new(Vec3::new(2.5, 0.0, 0.0), 5.0, 50.0);
        let report = resolver.explode(blast, &mut player, &mut director, &[], &mut events);

        assert!(report.enemies_killed.is_empty());
        assert_eq!(director.get(id).map(|e| e.health), Some(75.0));
        assert_eq!(player.health, 100.0);
    }

    #[test]
    fn overlapping_blasts_do_not_double_count() {
        let mut events = EventQueue::new();
        let mut director = EnemyDirector::new(&[], 1);
        let id = director.spawn(EnemyKind::Brute, Vec3::ZERO, &mut events);
        let mut player = PlayerState::new(Uuid::new_v4(), Vec3::new(1.0, 0.0, 0.0));
        let resolver = ProjectileResolver::new();

        let blasts = [
            Blast::new(Vec3::new(1.0, 0.0, 0.0), 5.0, 50.0),
            Blast::new(Vec3::new(-2.0, 0.0, 0.0), 5.0, 50.0),
        ];
        let report = resolver.explode_all(&blasts, &mut player, &mut director, &[], &mut events);

        // Strongest blast only: 50 * (1 - 1/5)
        assert_eq!(director.get(id).map(|e| e.health), Some(260.0));
        assert_eq!(report.player_damage, 50.0);
        let splash = events
            .iter()
            .filter(|e| matches!(e, SimEvent::SplashDamage { .. }))
            .count();
        assert_eq!(splash, 1);
    }

    #[test]
    fn grenade_bounces_and_detonates_on_fuse() {
        let world = WorldGeometry::new(vec![floor()]);
        let mut resolver = ProjectileResolver::new();
        resolver.spawn(
            ProjectileKind::Grenade,
            Vec3::new(0.0, 1.5, 0.0),
            Vec3::new(0.0, 0.3, -1.0),
            Uuid::new_v4(),
        );

        let fuse = ProjectileParams::for_kind(ProjectileKind::Grenade).lifetime;
        let mut blasts = Vec::new();
        let mut ticks = 0;
        while blasts.is_empty() && ticks < 1000 {
            for p in resolver.projectiles() {
                assert!(p.position.y >= -1e-3);
            }
            blasts = resolver.update(DT, &world);
            ticks += 1;
        }
        assert_eq!(blasts.len(), 1);
        assert!((ticks as f32 * DT - fuse).abs() < 2.0 * DT);
        assert!(blasts[0].position.y >= 0.0 && blasts[0].position.y < 0.5);
        assert!(resolver.is_empty());
    }

    #[test]
    fn rocket_detonates_on_impact() {
        let wall = WorldVolume::solid(
            Aabb::new(Vec3::new(-5.0, 0.0, -11.0), Vec3::new(5.0, 5.0, -10.0)),
            SurfaceMaterial::Concrete,
        );
        let world = WorldGeometry::new(vec![floor(), wall]);
        let mut resolver = ProjectileResolver::new();
        resolver.spawn(
            ProjectileKind::Rocket,
            Vec3::new(0.0, 1.5, 0.0),
            Vec3::NEG_Z,
            Uuid::new_v4(),
        );
        let mut blasts = Vec::new();
        for _ in 0..60 {
            blasts = resolver.update(DT, &world);
            if !blasts.is_empty() {
                break;
            }
        }
        assert_eq!(blasts.len(), 1);
        assert!((blasts[0].position.z + 10.0).abs() < 1e-3);
    }

    #[test]
    fn non_finite_projectile_is_removed() {
        let world = WorldGeometry::new(vec![floor()]);
        let mut resolver = ProjectileResolver::new();
        resolver.spawn(
            ProjectileKind::Grenade,
            Vec3::new(f32::NAN, 1.0, 0.0),
            Vec3::X,
            Uuid::new_v4(),
        );
        let blasts = resolver.update(DT, &world);
        assert!(blasts.is_empty());
        assert!(resolver.is_empty());
    }

    #[test]
    fn splash_reports_health_actually_removed() {
        let mut events = EventQueue::new();
        let mut director = EnemyDirector::new(&[], 1);
        let id = director.spawn(EnemyKind::Rusher, Vec3::ZERO, &mut events);
        let mut player = PlayerState::new(Uuid::new_v4(), Vec3::new(40.0, 0.0, 0.0));
        let resolver = ProjectileResolver::new();
        let blast = Blast::new(Vec3::new(2.5, 0.0, 0.0), 5.0, 50.0);

        // 60 health: 25, 25, then only 10 left to take
        for _ in 0..3 {
            resolver.explode(blast, &mut player, &mut director, &[], &mut events);
        }
        let splash: Vec<f32> = events
            .iter()
            .filter_map(|e| match e {
                SimEvent::SplashDamage { damage, .. } => Some(*damage),
                _ => None,
            })
            .collect();
        assert_eq!(splash.len(), 3);
        assert!((splash[2] - 10.0).abs() < 1e-4);
        assert!((splash.iter().sum::<f32>() - 60.0).abs() < 1e-4);
        assert!(!events
            .iter()
            .any(|e| matches!(e, SimEvent::PlayerDamaged { .. })));
        assert_eq!(director.get(id).map(|e| e.alive), Some(false));
    }
}
