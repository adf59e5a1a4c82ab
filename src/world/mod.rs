//! Static arena geometry supplied by the level collaborator
//!
//! The core only needs bounding-volume queries and surface tags. Tags are
//! carried through to hit results for presentation and never affect damage.

mod arena;

pub use arena::{standard_arena, ARENA_SPAWN_POINTS};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Upright box standing on `feet` with the given horizontal radius and height
    pub fn from_feet(feet: Vec3, radius: f32, height: f32) -> Self {
        Self {
            min: Vec3::new(feet.x - radius, feet.y, feet.z - radius),
            max: Vec3::new(feet.x + radius, feet.y + height, feet.z + radius),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    pub fn union(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min.cmple(self.max).all()
    }

    /// Strict overlap; touching faces do not count
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    pub fn contains_xz(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.z >= self.min.z && p.z <= self.max.z
    }

    pub fn closest_point(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }

    /// Slab test. Returns the entry distance along `dir` and the face normal.
    /// A ray starting inside the box reports distance 0 and the face opposing `dir`.
    pub fn ray_intersect(&self, origin: Vec3, dir: Vec3, max_dist: f32) -> Option<(f32, Vec3)> {
        let mut t_min = 0.0_f32;
        let mut t_max = max_dist;
        let mut normal = -dir.normalize_or_zero();

        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if d.abs() < 1e-8 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (lo - o) * inv;
            let mut t1 = (hi - o) * inv;
            let mut face = -1.0;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
                face = 1.0;
            }
            if t0 > t_min {
                t_min = t0;
                normal = Vec3::ZERO;
                normal[axis] = face;
            }
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some((t_min, normal))
    }
}

/// Surface tag used by presentation (impact decals, footsteps)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceMaterial {
    #[default]
    Concrete,
    Metal,
    Wood,
    Dirt,
    Glass,
}

/// Direction a ramp climbs toward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampRise {
    PosX,
    NegX,
    PosZ,
    NegZ,
}

/// One piece of static geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldVolume {
    pub bounds: Aabb,
    pub material: SurfaceMaterial,
    /// Sloped top surface rising across the box; `None` for solid boxes
    #[serde(default)]
    pub ramp: Option<RampRise>,
}

impl WorldVolume {
    pub fn solid(bounds: Aabb, material: SurfaceMaterial) -> Self {
        Self {
            bounds,
            material,
            ramp: None,
        }
    }

    pub fn ramp(bounds: Aabb, material: SurfaceMaterial, rise: RampRise) -> Self {
        Self {
            bounds,
            material,
            ramp: Some(rise),
        }
    }

    /// Height of the walkable surface at `p` (x/z), if `p` is over this volume
    pub fn surface_height(&self, p: Vec3) -> Option<f32> {
        if !self.bounds.contains_xz(p) {
            return None;
        }
        let b = &self.bounds;
        let t = match self.ramp {
            None => return Some(b.max.y),
            Some(RampRise::PosX) => (p.x - b.min.x) / (b.max.x - b.min.x),
            Some(RampRise::NegX) => (b.max.x - p.x) / (b.max.x - b.min.x),
            Some(RampRise::PosZ) => (p.z - b.min.z) / (b.max.z - b.min.z),
            Some(RampRise::NegZ) => (b.max.z - p.z) / (b.max.z - b.min.z),
        };
        Some(b.min.y + (b.max.y - b.min.y) * t.clamp(0.0, 1.0))
    }

    /// Normal of the walkable surface
    pub fn surface_normal(&self) -> Vec3 {
        let b = &self.bounds;
        let rise = b.max.y - b.min.y;
        let (run, uphill) = match self.ramp {
            None => return Vec3::Y,
            Some(RampRise::PosX) => (b.max.x - b.min.x, Vec3::X),
            Some(RampRise::NegX) => (b.max.x - b.min.x, Vec3::NEG_X),
            Some(RampRise::PosZ) => (b.max.z - b.min.z, Vec3::Z),
            Some(RampRise::NegZ) => (b.max.z - b.min.z, Vec3::NEG_Z),
        };
        (Vec3::Y * run - uphill * rise).normalize_or(Vec3::Y)
    }
}

/// Result of a ray query against the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
    pub material: SurfaceMaterial,
}

/// Result of a downward ground probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundProbe {
    pub height: f32,
    pub normal: Vec3,
    pub distance: f32,
    pub material: SurfaceMaterial,
}

/// Immutable set of world volumes for one arena
#[derive(Debug, Clone, Default)]
pub struct WorldGeometry {
    volumes: Vec<WorldVolume>,
}

impl WorldGeometry {
    /// Build from collaborator-supplied volumes. Degenerate or non-finite
    /// volumes are skipped so collision continues against the rest.
    pub fn new(volumes: Vec<WorldVolume>) -> Self {
        let total = volumes.len();
        let volumes: Vec<WorldVolume> = volumes
            .into_iter()
            .filter(|v| v.bounds.is_valid())
            .collect();
        if volumes.len() != total {
            warn!(
                skipped = total - volumes.len(),
                "Skipping malformed world volumes"
            );
        }
        Self { volumes }
    }

    pub fn volumes(&self) -> &[WorldVolume] {
        &self.volumes
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Solid (non-ramp) volumes overlapping `bounds`
    pub fn solids_overlapping<'a>(&'a self, bounds: &'a Aabb) -> impl Iterator<Item = &'a WorldVolume> + 'a {
        self.volumes
            .iter()
            .filter(move |v| v.ramp.is_none() && v.bounds.intersects(bounds))
    }

    /// First surface hit along a ray. Ramps are treated by their bounding box.
    pub fn raycast(&self, origin: Vec3, dir: Vec3, max_dist: f32) -> Option<WorldHit> {
        let dir = dir.normalize_or_zero();
        if dir == Vec3::ZERO || max_dist <= 0.0 {
            return None;
        }
        self.volumes
            .iter()
            .filter_map(|v| {
                v.bounds
                    .ray_intersect(origin, dir, max_dist)
                    .map(|(distance, normal)| {
                        let normal = if normal.y > 0.5 { v.surface_normal() } else { normal };
                        WorldHit {
                            point: origin + dir * distance,
                            normal,
                            distance,
                            material: v.material,
                        }
                    })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// True when nothing blocks the segment between `from` and `to`
    pub fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool {
        let delta = to - from;
        let dist = delta.length();
        match self.raycast(from, delta, dist) {
            Some(hit) => hit.distance >= dist - 1e-3,
            None => true,
        }
    }

    /// Highest walkable surface under `feet` within `max_drop` below (and
    /// `reach_up` above, to catch ramps the feet have sunk into).
    pub fn ground_probe(&self, feet: Vec3, reach_up: f32, max_drop: f32) -> Option<GroundProbe> {
        self.volumes
            .iter()
            .filter_map(|v| {
                let height = v.surface_height(feet)?;
                let distance = feet.y - height;
                if distance > max_drop || distance < -reach_up {
                    return None;
                }
                Some(GroundProbe {
                    height,
                    normal: v.surface_normal(),
                    distance,
                    material: v.material,
                })
            })
            .max_by(|a, b| a.height.total_cmp(&b.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> WorldVolume {
        WorldVolume::solid(
            Aabb::new(Vec3::new(-50.0, -1.0, -50.0), Vec3::new(50.0, 0.0, 50.0)),
            SurfaceMaterial::Concrete,
        )
    }

    #[test]
    fn raycast_hits_nearest_face() {
        let wall = WorldVolume::solid(
            Aabb::new(Vec3::new(5.0, 0.0, -1.0), Vec3::new(6.0, 3.0, 1.0)),
            SurfaceMaterial::Metal,
        );
        let world = WorldGeometry::new(vec![floor(), wall]);
        let hit = world
            .raycast(Vec3::new(0.0, 1.0, 0.0), Vec3::X, 100.0)
            .expect("wall hit");
        assert!((hit.distance - 5.0).abs() < 1e-4);
        assert_eq!(hit.normal, Vec3::NEG_X);
        assert_eq!(hit.material, SurfaceMaterial::Metal);
    }

    #[test]
    fn malformed_volumes_are_skipped() {
        let bad = WorldVolume::solid(
            Aabb {
                min: Vec3::splat(f32::NAN),
                max: Vec3::ONE,
            },
            SurfaceMaterial::Wood,
        );
        let world = WorldGeometry::new(vec![floor(), bad]);
        assert_eq!(world.volumes().len(), 1);
    }

    #[test]
    fn ramp_surface_rises_along_axis() {
        let ramp = WorldVolume::ramp(
            Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, 2.0, 2.0)),
            SurfaceMaterial::Wood,
            RampRise::PosX,
        );
        assert_eq!(ramp.surface_height(Vec3::new(2.0, 0.0, 1.0)), Some(1.0));
        let n = ramp.surface_normal();
        assert!(n.y > 0.0 && n.x < 0.0);
        let angle = n.y.acos().to_degrees();
        assert!((angle - 26.565).abs() < 0.1);
    }

    #[test]
    fn ground_probe_prefers_highest_surface() {
        let crate_box = WorldVolume::solid(
            Aabb::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(1.0, 1.0, 1.0)),
            SurfaceMaterial::Wood,
        );
        let world = WorldGeometry::new(vec![floor(), crate_box]);
        let probe = world
            .ground_probe(Vec3::new(0.0, 1.2, 0.0), 0.1, 2.0)
            .expect("ground");
        assert!((probe.height - 1.0).abs() < 1e-6);
        assert_eq!(probe.material, SurfaceMaterial::Wood);
    }

    #[test]
    fn line_of_sight_blocked_by_wall() {
        let wall = WorldVolume::solid(
            Aabb::new(Vec3::new(-1.0, 0.0, 4.0), Vec3::new(1.0, 3.0, 5.0)),
            SurfaceMaterial::Concrete,
        );
        let world = WorldGeometry::new(vec![floor(), wall]);
        assert!(!world.line_of_sight(Vec3::new(0.0, 1.5, 0.0), Vec3::new(0.0, 1.5, 10.0)));
        assert!(world.line_of_sight(Vec3::new(5.0, 1.5, 0.0), Vec3::new(5.0, 1.5, 10.0)));
    }
}
