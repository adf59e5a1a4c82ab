//! Weapon stats table and per-slot weapon state

use serde::{Deserialize, Serialize};

use crate::util::time::Countdown;

use super::projectile::ProjectileKind;

/// Weapon types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    AssaultRifle,
    Smg,
    Shotgun,
    Sniper,
    Pistol,
    RocketLauncher,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 6] = [
        WeaponKind::AssaultRifle,
        WeaponKind::Smg,
        WeaponKind::Shotgun,
        WeaponKind::Sniper,
        WeaponKind::Pistol,
        WeaponKind::RocketLauncher,
    ];
    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    /// Map a backend inventory item id to a weapon
    pub fn from_item_id(item: &str) -> Option<Self> {
        match item.trim().to_ascii_lowercase().as_str() {
            "assault_rifle" | "assaultrifle" | "rifle" | "ar" => Some(WeaponKind::AssaultRifle),
            "smg" => Some(WeaponKind::Smg),
            "shotgun" => Some(WeaponKind::Shotgun),
            "sniper" | "sniper_rifle" => Some(WeaponKind::Sniper),
            "pistol" => Some(WeaponKind::Pistol),
            "rocket_launcher" | "rocketlauncher" | "rocket" => Some(WeaponKind::RocketLauncher),
            _ => None,
        }
    }
}

const RIFLE_PATTERN: &[(f32, f32)] = &[
    (0.000, 0.000),
    (0.004, 0.001),
    (0.008, -0.001),
    (0.012, 0.002),
    (0.015, 0.004),
    (0.017, 0.002),
    (0.018, -0.003),
    (0.019, -0.006),
    (0.020, -0.004),
    (0.020, 0.001),
    (0.021, 0.005),
    (0.021, 0.007),
];

const SMG_PATTERN: &[(f32, f32)] = &[
    (0.000, 0.000),
    (0.003, -0.002),
    (0.006, 0.002),
    (0.008, -0.003),
    (0.010, 0.003),
    (0.011, -0.004),
    (0.012, 0.004),
];

const SINGLE_SHOT: &[(f32, f32)] = &[(0.0, 0.0)];

/// Immutable stats per weapon type
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Damage per bullet (per pellet for multi-pellet weapons)
    pub damage: f32,
    /// Shots per second
    pub fire_rate: f32,
    pub magazine_size: u32,
    pub starting_reserve: u32,
    pub max_reserve: u32,
    /// Seconds
    pub reload_time: f32,
    pub pellets: u32,
    /// Radians
    pub base_spread: f32,
    pub bloom_per_shot: f32,
    pub max_bloom: f32,
    /// Exponential decay rate of bloom (per second)
    pub bloom_decay: f32,
    pub recoil_pitch: f32,
    pub recoil_yaw: f32,
    /// Bounded random jitter added to each kick
    pub recoil_jitter: f32,
    pub max_recoil_pitch: f32,
    pub max_recoil_yaw: f32,
    /// Exponential decay rate of accumulated recoil (per second)
    pub recoil_recovery: f32,
    pub falloff_start: f32,
    pub falloff_end: f32,
    pub min_damage: f32,
    pub range: f32,
    pub knockback: f32,
    pub switch_out_time: f32,
    pub switch_in_time: f32,
    pub automatic: bool,
    /// Per-shot (pitch, yaw) offsets indexed by shots in the current burst
    pub pattern: &'static [(f32, f32)],
    /// Idle time after which the burst pattern restarts
    pub pattern_reset: f32,
    /// Launches a projectile instead of resolving a hitscan ray
    pub projectile: Option<ProjectileKind>,
}

impl WeaponStats {
    pub fn for_kind(kind: WeaponKind) -> Self {
        match kind {
            WeaponKind::AssaultRifle => Self {
                damage: 25.0,
                fire_rate: 10.0,
                magazine_size: 30,
                starting_reserve: 90,
                max_reserve: 210,
                reload_time: 2.2,
                pellets: 1,
                base_spread: 0.012,
                bloom_per_shot: 0.006,
                max_bloom: 0.05,
                bloom_decay: 4.0,
                recoil_pitch: 0.012,
                recoil_yaw: 0.004,
                recoil_jitter: 0.003,
                max_recoil_pitch: 0.12,
                max_recoil_yaw: 0.05,
                recoil_recovery: 8.0,
                falloff_start: 20.0,
                falloff_end: 50.0,
                min_damage: 15.0,
                range: 200.0,
                knockback: 1.0,
                switch_out_time: 0.25,
                switch_in_time: 0.35,
                automatic: true,
                pattern: RIFLE_PATTERN,
                pattern_reset: 0.35,
                projectile: None,
            },
            WeaponKind::Smg => Self {
                damage: 18.0,
                fire_rate: 15.0,
                magazine_size: 35,
                starting_reserve: 105,
                max_reserve: 245,
                reload_time: 1.8,
                pellets: 1,
                base_spread: 0.018,
                bloom_per_shot: 0.005,
                max_bloom: 0.06,
                bloom_decay: 5.0,
                recoil_pitch: 0.008,
                recoil_yaw: 0.005,
                recoil_jitter: 0.004,
                max_recoil_pitch: 0.09,
                max_recoil_yaw: 0.06,
                recoil_recovery: 10.0,
                falloff_start: 10.0,
                falloff_end: 30.0,
                min_damage: 9.0,
                range: 120.0,
                knockback: 0.6,
                switch_out_time: 0.2,
                switch_in_time: 0.3,
                automatic: true,
                pattern: SMG_PATTERN,
                pattern_reset: 0.3,
                projectile: None,
            },
            WeaponKind::Shotgun => Self {
                damage: 12.0,
                fire_rate: 1.2,
                magazine_size: 8,
                starting_reserve: 24,
                max_reserve: 48,
                reload_time: 2.6,
                pellets: 9,
                base_spread: 0.08,
                bloom_per_shot: 0.02,
                max_bloom: 0.12,
                bloom_decay: 3.0,
                recoil_pitch: 0.06,
                recoil_yaw: 0.01,
                recoil_jitter: 0.01,
                max_recoil_pitch: 0.15,
                max_recoil_yaw: 0.04,
                recoil_recovery: 6.0,
                falloff_start: 5.0,
                falloff_end: 20.0,
                min_damage: 4.0,
                range: 50.0,
                knockback: 4.0,
                switch_out_time: 0.3,
                switch_in_time: 0.45,
                automatic: false,
                pattern: SINGLE_SHOT,
                pattern_reset: 0.5,
                projectile: None,
            },
            WeaponKind::Sniper => Self {
                damage: 90.0,
                fire_rate: 0.8,
                magazine_size: 5,
                starting_reserve: 15,
                max_reserve: 30,
                reload_time: 3.0,
                pellets: 1,
                base_spread: 0.001,
                bloom_per_shot: 0.03,
                max_bloom: 0.06,
                bloom_decay: 2.5,
                recoil_pitch: 0.08,
                recoil_yaw: 0.006,
                recoil_jitter: 0.004,
                max_recoil_pitch: 0.16,
                max_recoil_yaw: 0.03,
                recoil_recovery: 4.0,
                falloff_start: 60.0,
                falloff_end: 150.0,
                min_damage: 70.0,
                range: 400.0,
                knockback: 2.5,
                switch_out_time: 0.35,
                switch_in_time: 0.6,
                automatic: false,
                pattern: SINGLE_SHOT,
                pattern_reset: 1.0,
                projectile: None,
            },
            WeaponKind::Pistol => Self {
                damage: 22.0,
                fire_rate: 5.0,
                magazine_size: 12,
                starting_reserve: 48,
                max_reserve: 96,
                reload_time: 1.4,
                pellets: 1,
                base_spread: 0.01,
                bloom_per_shot: 0.008,
                max_bloom: 0.04,
                bloom_decay: 5.0,
                recoil_pitch: 0.015,
                recoil_yaw: 0.003,
                recoil_jitter: 0.004,
                max_recoil_pitch: 0.08,
                max_recoil_yaw: 0.03,
                recoil_recovery: 9.0,
                falloff_start: 15.0,
                falloff_end: 40.0,
                min_damage: 12.0,
                range: 120.0,
                knockback: 0.8,
                switch_out_time: 0.15,
                switch_in_time: 0.2,
                automatic: false,
                pattern: SINGLE_SHOT,
                pattern_reset: 0.4,
                projectile: None,
            },
            WeaponKind::RocketLauncher => Self {
                damage: 0.0,
                fire_rate: 0.8,
                magazine_size: 1,
                starting_reserve: 4,
                max_reserve: 8,
                reload_time: 2.8,
                pellets: 1,
                base_spread: 0.004,
                bloom_per_shot: 0.0,
                max_bloom: 0.0,
                bloom_decay: 1.0,
                recoil_pitch: 0.05,
                recoil_yaw: 0.0,
                recoil_jitter: 0.01,
                max_recoil_pitch: 0.08,
                max_recoil_yaw: 0.02,
                recoil_recovery: 5.0,
                falloff_start: 0.0,
                falloff_end: 0.0,
                min_damage: 0.0,
                range: 0.0,
                knockback: 0.0,
                switch_out_time: 0.35,
                switch_in_time: 0.6,
                automatic: false,
                pattern: SINGLE_SHOT,
                pattern_reset: 1.0,
                projectile: Some(ProjectileKind::Rocket),
            },
        }
    }

    /// Minimum time between shots in milliseconds for a fire-rate multiplier
    pub fn shot_interval_ms(&self, fire_rate_multiplier: f32) -> f64 {
        let rate = (self.fire_rate * fire_rate_multiplier.max(f32::EPSILON)) as f64;
        1000.0 / rate
    }
}

/// Stats for every weapon, built once and shared read-only
#[derive(Debug, Clone)]
pub struct WeaponTable {
    stats: [WeaponStats; WeaponKind::COUNT],
}

impl WeaponTable {
    pub fn new() -> Self {
        Self {
            stats: WeaponKind::ALL.map(WeaponStats::for_kind),
        }
    }

    pub fn get(&self, kind: WeaponKind) -> &WeaponStats {
        &self.stats[kind.index()]
    }
}

impl Default for WeaponTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Shooter movement used to scale spread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovementState {
    #[default]
    Stationary,
    Moving,
    Sprinting,
    Airborne,
}

impl MovementState {
    pub fn spread_multiplier(self) -> f32 {
        match self {
            MovementState::Stationary => 1.0,
            MovementState::Moving => 1.5,
            MovementState::Sprinting => 2.5,
            MovementState::Airborne => 3.0,
        }
    }
}

/// Mutable state of one weapon slot
#[derive(Debug, Clone, PartialEq)]
pub struct WeaponState {
    pub kind: WeaponKind,
    pub magazine: u32,
    pub reserve: u32,
    /// In-flight reload, if any
    pub reload: Option<Countdown>,
    pub bloom: f32,
    pub recoil_pitch: f32,
    pub recoil_yaw: f32,
    pub shots_in_burst: u32,
    /// Simulation clock of the last shot
    pub last_shot_ms: Option<f64>,
    /// Seconds since the last shot
    pub idle_time: f32,
}

impl WeaponState {
    pub fn new(kind: WeaponKind, stats: &WeaponStats) -> Self {
        Self {
            kind,
            magazine: stats.magazine_size,
            reserve: stats.starting_reserve,
            reload: None,
            bloom: 0.0,
            recoil_pitch: 0.0,
            recoil_yaw: 0.0,
            shots_in_burst: 0,
            last_shot_ms: None,
            idle_time: 0.0,
        }
    }

    pub fn is_reloading(&self) -> bool {
        self.reload.is_some()
    }

    pub fn total_ammo(&self) -> u32 {
        self.magazine + self.reserve
    }

    /// Add reserve ammo up to the weapon's cap. Returns false if already full.
    pub fn add_reserve(&mut self, amount: u32, stats: &WeaponStats) -> bool {
        if self.reserve >= stats.max_reserve {
            return false;
        }
        self.reserve = (self.reserve + amount).min(stats.max_reserve);
        true
    }
}
