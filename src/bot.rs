//! Autopilot that drives the local player in the headless host

use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::game::{GameSession, TickInput};
use crate::util::math::yaw_towards;
use crate::util::time::Countdown;

/// Keep at least this far from the target
const MIN_RANGE: f32 = 6.0;
/// Close in beyond this distance
const MAX_RANGE: f32 = 15.0;
/// Enemies this close together make a grenade worthwhile
const GRENADE_CLUSTER_RADIUS: f32 = 4.0;
const GRENADE_MIN_CLUSTER: usize = 3;
const GRENADE_COOLDOWN: f32 = 6.0;

pub struct Autopilot {
    rng: ChaCha8Rng,
    strafe_dir: f32,
    strafe_timer: Countdown,
    grenade_timer: Countdown,
    last_fire: bool,
}

impl Autopilot {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            strafe_dir: 1.0,
            strafe_timer: Countdown::new(1.0),
            grenade_timer: Countdown::new(GRENADE_COOLDOWN),
            last_fire: false,
        }
    }

    /// Aim at the nearest visible hostile, shoot, reload when dry and strafe
    pub fn next_input(&mut self, session: &GameSession, dt: f32) -> TickInput {
        let player = session.player();
        let mut input = TickInput {
            yaw: player.yaw,
            pitch: player.pitch,
            ..TickInput::default()
        };
        if !player.alive {
            self.last_fire = false;
            return input;
        }

        // Strafe direction flips on a jittered timer
        if self.strafe_timer.tick(dt) {
            self.strafe_dir = -self.strafe_dir;
            self.strafe_timer = Countdown::new(self.rng.gen_range(0.6_f32..1.6));
        }
        self.grenade_timer.tick(dt);

        let eye = player.eye_position();
        let Some(target) = self.pick_target(session, eye) else {
            input.movement.direction = Vec2::new(self.strafe_dir * 0.5, 0.0);
            self.last_fire = false;
            return input;
        };

        let to_target = target - eye;
        let distance = to_target.length();
        let dir = to_target / distance.max(f32::EPSILON);
        input.yaw = yaw_towards(dir);
        input.pitch = dir.y.clamp(-1.0, 1.0).asin();

        let forward = if distance > MAX_RANGE {
            1.0
        } else if distance < MIN_RANGE {
            -1.0
        } else {
            0.0
        };
        input.movement.direction = Vec2::new(self.strafe_dir, forward);

        // Ammo management
        let combat = session.combat();
        let weapon = combat.active_weapon();
        if weapon.magazine == 0 && !weapon.is_reloading() {
            if weapon.reserve > 0 {
                input.reload = true;
            } else if let Some(index) = combat
                .slots()
                .iter()
                .position(|slot| slot.total_ammo() > 0)
            {
                input.switch_to = Some(index);
            }
        }

        // Semi-automatic weapons need a fresh press per shot
        let in_range = distance <= combat.active_stats().range;
        let want_fire = in_range && weapon.magazine > 0 && !combat.is_switching();
        input.fire = if combat.active_stats().automatic {
            want_fire
        } else {
            want_fire && !self.last_fire
        };
        self.last_fire = input.fire;

        if self.grenade_timer.is_done() && player.grenades > 0 {
            let cluster = session
                .director()
                .enemies()
                .iter()
                .filter(|e| e.alive && e.center().distance(target) <= GRENADE_CLUSTER_RADIUS)
                .count();
            if cluster >= GRENADE_MIN_CLUSTER && distance > MIN_RANGE {
                input.throw_grenade = true;
                self.grenade_timer = Countdown::new(GRENADE_COOLDOWN);
            }
        }

        input
    }

    /// Nearest live enemy or hostile peer in line of sight
    fn pick_target(&self, session: &GameSession, eye: Vec3) -> Option<Vec3> {
        let world = session.world();
        let sync = session.sync();
        let enemies = session
            .director()
            .enemies()
            .iter()
            .filter(|e| e.alive)
            .map(|e| e.center());
        let peers = sync
            .remotes()
            .filter(|r| r.is_active() && !sync.is_friendly(r.id))
            .map(|r| r.position + Vec3::Y);

        enemies
            .chain(peers)
            .filter(|p| world.line_of_sight(eye, *p))
            .min_by(|a, b| a.distance_squared(eye).total_cmp(&b.distance_squared(eye)))
    }
}
