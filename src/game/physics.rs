//! Player kinematics and collision against static world volumes

use glam::{Vec2, Vec3};
use tracing::warn;

use crate::util::math::{exp_blend, exp_decay, horizontal, yaw_basis};
use crate::world::{Aabb, WorldGeometry, WorldVolume};

use super::player::{PlayerState, PLAYER_HEIGHT, PLAYER_RADIUS};

/// Collision substep bounds
const MIN_SUBSTEP: f32 = 0.05;
const MAX_SUBSTEPS: usize = 32;

/// Movement tuning. Values are the literal constants the game was tuned
/// with; change them here rather than in the integration code.
#[derive(Debug, Clone, Copy)]
pub struct MovementConfig {
    pub walk_speed: f32,
    pub sprint_speed: f32,
    pub crouch_speed: f32,
    /// Exponential approach rates (per second)
    pub ground_accel: f32,
    pub ground_decel: f32,
    pub air_accel: f32,
    pub air_decel: f32,
    pub gravity: f32,
    pub jump_velocity: f32,
    /// Vertical velocity multiplier applied once when jump is released early
    pub jump_cut_factor: f32,
    pub coyote_time: f32,
    pub jump_buffer_time: f32,
    pub slide_start_speed: f32,
    pub slide_end_speed: f32,
    pub slide_duration: f32,
    /// Slide ends early below this horizontal speed
    pub slide_min_speed: f32,
    pub slide_cooldown: f32,
    pub slide_blend_rate: f32,
    /// Steepest walkable slope, in degrees
    pub max_slope_degrees: f32,
    pub step_height: f32,
    pub ground_snap_distance: f32,
    pub ground_epsilon: f32,
    /// Landing speed above which fall damage applies
    pub fall_damage_threshold: f32,
    /// Damage per m/s of impact speed above the threshold
    pub fall_damage_per_speed: f32,
    pub stamina_drain: f32,
    pub stamina_regen: f32,
    /// Stamina required before sprinting is allowed again after exhaustion
    pub stamina_recover_threshold: f32,
    pub radius: f32,
    pub height: f32,
    pub max_collision_iterations: usize,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            walk_speed: 6.0,
            sprint_speed: 9.5,
            crouch_speed: 3.0,
            ground_accel: 12.0,
            ground_decel: 10.0,
            air_accel: 2.5,
            air_decel: 0.4,
            gravity: 24.0,
            jump_velocity: 8.5,
            jump_cut_factor: 0.5,
            coyote_time: 0.12,
            jump_buffer_time: 0.15,
            slide_start_speed: 13.0,
            slide_end_speed: 5.0,
            slide_duration: 0.9,
            slide_min_speed: 3.5,
            slide_cooldown: 0.6,
            slide_blend_rate: 8.0,
            max_slope_degrees: 45.0,
            step_height: 0.45,
            ground_snap_distance: 0.25,
            ground_epsilon: 0.05,
            fall_damage_threshold: 16.0,
            fall_damage_per_speed: 5.0,
            stamina_drain: 25.0,
            stamina_regen: 15.0,
            stamina_recover_threshold: 25.0,
            radius: PLAYER_RADIUS,
            height: PLAYER_HEIGHT,
            max_collision_iterations: 4,
        }
    }
}

/// Movement intent for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveIntent {
    /// x = strafe right, y = forward; clamped to unit length
    pub direction: Vec2,
    pub sprint: bool,
    /// Jump pressed this tick
    pub jump: bool,
    /// Crouch held
    pub crouch: bool,
    /// Jump released this tick
    pub jump_cut: bool,
}

/// Vertical impact with a surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landing {
    pub impact_speed: f32,
    pub fall_damage: f32,
    pub killed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveResult {
    pub grounded: bool,
    pub jumped: bool,
    pub landing: Option<Landing>,
}

/// Contact gathered while resolving overlaps
#[derive(Debug, Default)]
struct Contacts {
    floor: bool,
    ceiling: bool,
    /// Axes pushed back against the direction of travel
    blocked: [bool; 3],
}

pub struct KinematicController {
    config: MovementConfig,
    min_ground_normal_y: f32,
}

impl KinematicController {
    pub fn new(config: MovementConfig) -> Self {
        Self {
            min_ground_normal_y: config.max_slope_degrees.to_radians().cos(),
            config,
        }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    /// Advance the player by one tick
    pub fn step(
        &self,
        player: &mut PlayerState,
        intent: &MoveIntent,
        world: &WorldGeometry,
        dt: f32,
    ) -> MoveResult {
        if !player.alive || dt <= 0.0 {
            return MoveResult {
                grounded: player.flags.on_ground,
                jumped: false,
                landing: None,
            };
        }

        let c = &self.config;
        let prev_position = player.position;
        let was_grounded = player.flags.on_ground;

        // Timers
        if was_grounded {
            player.timers.coyote = c.coyote_time;
        } else {
            player.timers.coyote = (player.timers.coyote - dt).max(0.0);
        }
        if intent.jump {
            player.timers.jump_buffer = c.jump_buffer_time;
        } else {
            player.timers.jump_buffer = (player.timers.jump_buffer - dt).max(0.0);
        }
        player.timers.slide_cooldown = (player.timers.slide_cooldown - dt).max(0.0);

        // Wish direction in world space
        let input = intent.direction.clamp_length_max(1.0);
        let (forward, right) = yaw_basis(player.yaw);
        let wish = forward * input.y + right * input.x;
        let has_input = wish.length_squared() > 1e-6;

        self.update_stamina(player, intent.sprint && has_input, dt);

        // Slide start on the crouch press edge
        let crouch_pressed = intent.crouch && !player.flags.crouching;
        player.flags.crouching = intent.crouch;
        if crouch_pressed
            && player.flags.sprinting
            && was_grounded
            && !player.flags.sliding
            && player.timers.slide_cooldown <= 0.0
        {
            let moving = horizontal(player.velocity);
            player.slide_direction = if moving.length_squared() > 1e-4 {
                moving.normalize()
            } else {
                wish.normalize_or(forward)
            };
            player.timers.slide = 0.0;
            player.flags.sliding = true;
            player.flags.sprinting = false;
        }

        // Jump (grounded or coyote, consumed from the buffer)
        let mut jumped = false;
        if player.timers.jump_buffer > 0.0 && (was_grounded || player.timers.coyote > 0.0) {
            player.velocity.y = c.jump_velocity;
            player.timers.coyote = 0.0;
            player.timers.jump_buffer = 0.0;
            player.flags.jumping = true;
            player.flags.on_ground = false;
            player.jump_cut_used = false;
            jumped = true;
            if player.flags.sliding {
                // Momentum is kept, only the lock is released
                player.flags.sliding = false;
                player.timers.slide_cooldown = c.slide_cooldown;
            }
        }

        // Variable jump height, once per jump
        if intent.jump_cut
            && player.flags.jumping
            && !player.jump_cut_used
            && player.velocity.y > 0.0
        {
            player.velocity.y *= c.jump_cut_factor;
            player.jump_cut_used = true;
        }

        // Ground normal under the feet
        let ground = if was_grounded && !jumped {
            world.ground_probe(player.position, c.ground_epsilon, c.ground_snap_distance)
        } else {
            None
        };
        let steep = ground.map_or(false, |g| g.normal.y < self.min_ground_normal_y);
        let grounded = was_grounded && !jumped && !steep;

        // Horizontal velocity
        let mut horiz = horizontal(player.velocity);
        if player.flags.sliding {
            player.timers.slide += dt;
            let t = (player.timers.slide / c.slide_duration).clamp(0.0, 1.0);
            let profile =
                c.slide_end_speed + (c.slide_start_speed - c.slide_end_speed) * (1.0 - t).powi(2);
            let dir = player.slide_direction;
            let target = dir * profile * player.speed_multiplier;
            horiz = horiz.lerp(target, exp_blend(c.slide_blend_rate, dt));
            // Locked to the captured direction
            horiz = dir * horiz.dot(dir).max(0.0);

            if player.timers.slide >= c.slide_duration || horiz.length() < c.slide_min_speed {
                player.flags.sliding = false;
                player.timers.slide_cooldown = c.slide_cooldown;
            }
        } else {
            let base_speed = if player.flags.crouching {
                c.crouch_speed
            } else if player.flags.sprinting {
                c.sprint_speed
            } else {
                c.walk_speed
            };
            let speed = base_speed * player.speed_multiplier;
            let (accel, decel) = if grounded {
                (c.ground_accel, c.ground_decel)
            } else {
                (c.air_accel, c.air_decel)
            };

            if has_input {
                let mut target = wish.normalize() * speed * input.length();
                if let Some(g) = ground.filter(|_| grounded) {
                    // Follow the slope plane, keep the requested speed
                    let along = target - g.normal * target.dot(g.normal);
                    target = horizontal(along).normalize_or_zero() * target.length();
                }
                horiz = horiz.lerp(target, exp_blend(accel, dt));
            } else {
                horiz *= exp_decay(decel, dt);
            }
        }

        // Vertical velocity
        let mut vy = player.velocity.y;
        if grounded {
            vy = 0.0;
        } else {
            vy -= c.gravity * dt;
        }
        player.velocity = Vec3::new(horiz.x, vy, horiz.z);
        if let Some(g) = ground.filter(|_| steep) {
            // Too steep to stand on: slide down it
            let down = Vec3::NEG_Y - g.normal * g.normal.dot(Vec3::NEG_Y);
            player.velocity += down.normalize_or_zero() * c.gravity * dt;
        }

        // Integrate and collide
        let falling_speed = -player.velocity.y;
        let contacts = self.move_and_collide(player, player.velocity * dt, world);
        if contacts.ceiling {
            player.velocity.y = player.velocity.y.min(0.0);
        }

        // Ground state
        let mut on_ground = false;
        if player.velocity.y <= 0.0 {
            let snap = if grounded { c.ground_snap_distance } else { c.ground_epsilon };
            if let Some(g) = world.ground_probe(player.position, c.ground_epsilon, snap) {
                if g.normal.y >= self.min_ground_normal_y || contacts.floor {
                    player.position.y = g.height;
                    player.velocity.y = 0.0;
                    on_ground = true;
                }
            } else if contacts.floor {
                on_ground = true;
            }
        }
        player.flags.on_ground = on_ground;

        let mut landing = None;
        if on_ground && !was_grounded {
            player.flags.jumping = false;
            landing = Some(self.land(player, falling_speed));
        }

        if !player.position.is_finite() || !player.velocity.is_finite() {
            warn!(player_id = %player.id, "Non-finite player state, reverting step");
            player.position = prev_position;
            player.velocity = Vec3::ZERO;
        }

        MoveResult {
            grounded: player.flags.on_ground,
            jumped,
            landing,
        }
    }

    fn update_stamina(&self, player: &mut PlayerState, wants_sprint: bool, dt: f32) {
        let c = &self.config;
        if player.stamina <= 0.0 {
            player.flags.exhausted = true;
        }
        player.flags.sprinting = wants_sprint && !player.flags.exhausted && !player.flags.sliding;

        if player.flags.sprinting {
            player.stamina = (player.stamina - c.stamina_drain * dt).max(0.0);
            if player.stamina < 0.01 {
                player.stamina = 0.0;
            }
        } else {
            player.stamina = (player.stamina + c.stamina_regen * dt).min(player.max_stamina);
            if player.flags.exhausted && player.stamina >= c.stamina_recover_threshold {
                player.flags.exhausted = false;
            }
        }
    }

    fn land(&self, player: &mut PlayerState, impact_speed: f32) -> Landing {
        let c = &self.config;
        let impact_speed = impact_speed.max(0.0);
        let fall_damage = if impact_speed > c.fall_damage_threshold {
            (impact_speed - c.fall_damage_threshold) * c.fall_damage_per_speed
        } else {
            0.0
        };
        let killed = fall_damage > 0.0 && player.apply_damage(fall_damage).killed;
        Landing {
            impact_speed,
            fall_damage,
            killed,
        }
    }

    /// Move by `displacement` in substeps no longer than the body's radius,
    /// resolving overlaps after each one so fast frames cannot tunnel.
    fn move_and_collide(
        &self,
        player: &mut PlayerState,
        displacement: Vec3,
        world: &WorldGeometry,
    ) -> Contacts {
        let c = &self.config;
        let max_step = c.radius.min(c.height * 0.5).max(MIN_SUBSTEP);
        let steps = ((displacement.length() / max_step).ceil() as usize).clamp(1, MAX_SUBSTEPS);
        let mut step = displacement / steps as f32;

        let mut contacts = Contacts::default();
        for _ in 0..steps {
            if step == Vec3::ZERO {
                break;
            }
            let hit = self.collide_step(player, step, world);
            contacts.floor |= hit.floor;
            contacts.ceiling |= hit.ceiling;
            // Stop pushing into whatever blocked us
            for axis in 0..3 {
                if hit.blocked[axis] {
                    step[axis] = 0.0;
                }
            }
        }
        contacts
    }

    /// Move by one substep and push the body out of any volume it ends up in
    fn collide_step(
        &self,
        player: &mut PlayerState,
        displacement: Vec3,
        world: &WorldGeometry,
    ) -> Contacts {
        let c = &self.config;
        let mut contacts = Contacts::default();

        // Broadphase over the swept bounds
        let start = player.bounds();
        let swept = start.union(&start.translated(displacement));
        let candidates: Vec<&WorldVolume> = world
            .volumes()
            .iter()
            .filter(|v| v.bounds.intersects(&swept))
            .collect();

        player.position += displacement;
        if candidates.is_empty() {
            return contacts;
        }

        for _ in 0..c.max_collision_iterations {
            let body = player.bounds();
            let Some(solid) = candidates
                .iter()
                .map(|v| effective_bounds(v, player.position))
                .find(|b| b.intersects(&body))
            else {
                break;
            };

            // Step up onto low obstacles when not ascending
            let gap = solid.max.y - player.position.y;
            if gap > 0.0 && gap <= c.step_height && player.velocity.y <= 0.0 {
                let raised = Vec3::new(player.position.x, solid.max.y, player.position.z);
                let raised_body = Aabb::from_feet(raised, c.radius, c.height);
                let blocked = candidates
                    .iter()
                    .map(|v| effective_bounds(v, raised))
                    .any(|b| b.intersects(&raised_body));
                if !blocked {
                    player.position = raised;
                    player.velocity.y = 0.0;
                    contacts.floor = true;
                    contacts.blocked[1] |= displacement.y < 0.0;
                    continue;
                }
            }

            // Minimum translation along the axis of least overlap
            let push_pos = solid.max - body.min;
            let push_neg = body.max - solid.min;
            let mut axis = 0;
            let mut best = f32::MAX;
            let mut sign = 1.0;
            for i in 0..3 {
                let (amount, s) = if push_pos[i] < push_neg[i] {
                    (push_pos[i], 1.0)
                } else {
                    (push_neg[i], -1.0)
                };
                if amount < best {
                    best = amount;
                    axis = i;
                    sign = s;
                }
            }
            player.position[axis] += best * sign;
            player.velocity[axis] = 0.0;
            if displacement[axis] * sign < 0.0 {
                contacts.blocked[axis] = true;
            }
            if axis == 1 {
                if sign > 0.0 {
                    contacts.floor = true;
                } else {
                    contacts.ceiling = true;
                }
            }
        }

        contacts
    }
}

impl Default for KinematicController {
    fn default() -> Self {
        Self::new(MovementConfig::default())
    }
}

/// Collision box of a volume as seen from `feet`. Ramps are cut down to
/// their surface height at that point so they can be walked up.
fn effective_bounds(volume: &WorldVolume, feet: Vec3) -> Aabb {
    match volume.ramp {
        None => volume.bounds,
        Some(_) => {
            let clamped = volume.bounds.closest_point(feet);
            let top = volume.surface_height(clamped).unwrap_or(volume.bounds.max.y);
            Aabb {
                min: volume.bounds.min,
                max: Vec3::new(volume.bounds.max.x, top, volume.bounds.max.z),
            }
        }
    }
}
