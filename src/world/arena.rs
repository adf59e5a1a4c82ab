//! Built-in arena layout used by the headless host and tests

use glam::Vec3;

use super::{Aabb, RampRise, SurfaceMaterial, WorldGeometry, WorldVolume};

const HALF_SIZE: f32 = 30.0;
const WALL_HEIGHT: f32 = 6.0;

/// Fixed enemy spawn ring, shuffled per wave by the director
pub const ARENA_SPAWN_POINTS: [Vec3; 12] = [
    Vec3::new(-25.0, 0.0, -25.0),
    Vec3::new(0.0, 0.0, -26.0),
    Vec3::new(25.0, 0.0, -25.0),
    Vec3::new(26.0, 0.0, 0.0),
    Vec3::new(25.0, 0.0, 25.0),
    Vec3::new(0.0, 0.0, 26.0),
    Vec3::new(-25.0, 0.0, 25.0),
    Vec3::new(-26.0, 0.0, 0.0),
    Vec3::new(-14.0, 0.0, -20.0),
    Vec3::new(14.0, 0.0, -20.0),
    Vec3::new(14.0, 0.0, 20.0),
    Vec3::new(-14.0, 0.0, 20.0),
];

fn solid(min: [f32; 3], max: [f32; 3], material: SurfaceMaterial) -> WorldVolume {
    WorldVolume::solid(Aabb::new(Vec3::from(min), Vec3::from(max)), material)
}

/// Square walled arena with cover crates and a ramp up to a sniper deck
pub fn standard_arena() -> WorldGeometry {
    let h = HALF_SIZE;
    let mut volumes = vec![
        // Floor
        solid([-h, -1.0, -h], [h, 0.0, h], SurfaceMaterial::Concrete),
        // Perimeter walls
        solid([-h - 1.0, 0.0, -h - 1.0], [h + 1.0, WALL_HEIGHT, -h], SurfaceMaterial::Concrete),
        solid([-h - 1.0, 0.0, h], [h + 1.0, WALL_HEIGHT, h + 1.0], SurfaceMaterial::Concrete),
        solid([-h - 1.0, 0.0, -h], [-h, WALL_HEIGHT, h], SurfaceMaterial::Concrete),
        solid([h, 0.0, -h], [h + 1.0, WALL_HEIGHT, h], SurfaceMaterial::Concrete),
        // Cover
        solid([-8.0, 0.0, -8.0], [-6.0, 1.2, -6.0], SurfaceMaterial::Wood),
        solid([6.0, 0.0, 6.0], [8.0, 1.2, 8.0], SurfaceMaterial::Wood),
        solid([-8.0, 0.0, 6.0], [-6.0, 0.3, 8.0], SurfaceMaterial::Metal),
        solid([10.0, 0.0, -12.0], [11.0, 3.0, -4.0], SurfaceMaterial::Concrete),
        // Sniper deck and its ramp
        solid([-20.0, 0.0, -4.0], [-14.0, 2.5, 4.0], SurfaceMaterial::Metal),
    ];
    volumes.push(WorldVolume::ramp(
        Aabb::new(Vec3::new(-14.0, 0.0, -2.0), Vec3::new(-8.0, 2.5, 2.0)),
        SurfaceMaterial::Metal,
        RampRise::NegX,
    ));
    WorldGeometry::new(volumes)
}
