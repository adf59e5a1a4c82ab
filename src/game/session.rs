//! Game session: owns every simulation component for one match and runs
//! them in a fixed order each tick.
//!
//! Order per tick: lifecycle, kinematics, weapons, enemy director,
//! projectiles and explosions, wave cycle, network sync, event dispatch.

use std::sync::Arc;

use glam::Vec3;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::net::{LocalEffect, NetworkSynchronizer, RealtimeLink, SyncConfig};
use crate::util::math::{horizontal, view_direction, wrap_angle};
use crate::util::time::Countdown;
use crate::world::{standard_arena, WorldGeometry, ARENA_SPAWN_POINTS};

use super::combat::{CombatResolver, FireContext, TargetHit, TargetId};
use super::enemies::{DamageInfo, DamageKind, EnemyAction, EnemyDirector, Knockback};
use super::events::{DamageSource, EventQueue, SimEvent, SurfaceImpact};
use super::physics::{KinematicController, MovementConfig};
use super::pickups::{standard_pickups, PickupField, PickupPad};
use super::player::PlayerState;
use super::projectile::{ProjectileKind, ProjectileResolver};
use super::r#match::{
    FlagAction, FlagStatus, GameMode, MatchResult, MatchState, Team, BLUE_FLAG_HOME, RED_FLAG_HOME,
};
use super::stats::CombatLog;
use super::waves::{WaveCycle, FIRST_WAVE_DELAY};
use super::weapons::{MovementState, WeaponKind, WeaponTable};
use super::{FlagRequest, TickInput};

/// Delay before the local player respawns in team modes
pub const RESPAWN_DELAY: f32 = 3.0;
/// Frame spikes longer than this are clamped
pub const MAX_TICK_DT: f32 = 0.1;
const MAX_PITCH: f32 = 89.0 * std::f32::consts::PI / 180.0;
/// Horizontal reach for flag pickup and capture
pub const FLAG_REACH: f32 = 2.5;
/// Extra upward angle for grenade throws
const GRENADE_LOFT: f32 = 0.15;
/// Distance in front of the flag home where a team respawns
const TEAM_SPAWN_OFFSET: f32 = 4.0;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Arena geometry is missing")]
    MissingArena,

    #[error("Loadout has no weapons")]
    EmptyLoadout,
}

/// Spawn point of `team` in the built-in arena
pub fn team_spawn(team: Team) -> Vec3 {
    match team {
        Team::Red => RED_FLAG_HOME - Vec3::Z * TEAM_SPAWN_OFFSET,
        Team::Blue => BLUE_FLAG_HOME + Vec3::Z * TEAM_SPAWN_OFFSET,
    }
}

pub struct SessionBuilder {
    local_id: Uuid,
    mode: GameMode,
    team: Option<Team>,
    seed: u64,
    world: Option<WorldGeometry>,
    loadout: Vec<WeaponKind>,
    enemy_spawns: Vec<Vec3>,
    player_spawn: Vec3,
    pickups: Vec<PickupPad>,
    movement: MovementConfig,
    sync: SyncConfig,
    link: Option<RealtimeLink>,
    match_id: Option<Uuid>,
    first_wave_delay: f32,
}

impl SessionBuilder {
    pub fn new(local_id: Uuid) -> Self {
        Self {
            local_id,
            mode: GameMode::Waves,
            team: None,
            seed: 0,
            world: None,
            loadout: vec![WeaponKind::AssaultRifle, WeaponKind::Pistol],
            enemy_spawns: ARENA_SPAWN_POINTS.to_vec(),
            player_spawn: Vec3::ZERO,
            pickups: Vec::new(),
            movement: MovementConfig::default(),
            sync: SyncConfig::default(),
            link: None,
            match_id: None,
            first_wave_delay: FIRST_WAVE_DELAY,
        }
    }

    /// Built-in arena, its enemy spawn ring and pickup pads
    pub fn standard(local_id: Uuid) -> Self {
        Self::new(local_id)
            .world(standard_arena())
            .pickups(standard_pickups())
    }

    pub fn mode(mut self, mode: GameMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn team(mut self, team: Option<Team>) -> Self {
        self.team = team;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn world(mut self, world: WorldGeometry) -> Self {
        self.world = Some(world);
        self
    }

    pub fn loadout(mut self, loadout: Vec<WeaponKind>) -> Self {
        self.loadout = loadout;
        self
    }

    pub fn enemy_spawns(mut self, points: Vec<Vec3>) -> Self {
        self.enemy_spawns = points;
        self
    }

    pub fn player_spawn(mut self, at: Vec3) -> Self {
        self.player_spawn = at;
        self
    }

    pub fn pickups(mut self, pads: Vec<PickupPad>) -> Self {
        self.pickups = pads;
        self
    }

    pub fn movement(mut self, config: MovementConfig) -> Self {
        self.movement = config;
        self
    }

    pub fn sync_config(mut self, config: SyncConfig) -> Self {
        self.sync = config;
        self
    }

    pub fn first_wave_delay(mut self, seconds: f32) -> Self {
        self.first_wave_delay = seconds;
        self
    }

    /// Attach a realtime link and the match to join on it
    pub fn realtime(mut self, link: RealtimeLink, match_id: Uuid) -> Self {
        self.link = Some(link);
        self.match_id = Some(match_id);
        self
    }

    pub fn build(self) -> Result<GameSession, SessionError> {
        let world = match self.world {
            Some(world) if !world.is_empty() => world,
            _ => return Err(SessionError::MissingArena),
        };
        if self.loadout.is_empty() {
            return Err(SessionError::EmptyLoadout);
        }

        let team = match (self.mode.is_team_mode(), self.team) {
            (false, _) => None,
            (true, Some(team)) => Some(team),
            (true, None) => {
                warn!(mode = %self.mode, "No team assigned, defaulting to red");
                Some(Team::Red)
            }
        };

        let spawn = team.map_or(self.player_spawn, team_spawn);
        let mut player = PlayerState::new(self.local_id, spawn);
        player.team = team;

        let combat = CombatResolver::new(
            Arc::new(WeaponTable::new()),
            &self.loadout,
            self.seed ^ 0x9e37_79b9_7f4a_7c15,
        );

        let mut sync = NetworkSynchronizer::new(self.local_id, team, self.sync);
        if let Some(link) = self.link {
            sync.connect(link);
        }
        if let Some(match_id) = self.match_id {
            sync.join(match_id);
        }

        let waves = match self.mode {
            GameMode::Waves => Some(WaveCycle::new(self.first_wave_delay)),
            _ => None,
        };

        info!(
            player = %self.local_id,
            mode = %self.mode,
            ?team,
            seed = self.seed,
            volumes = world.volumes().len(),
            "Game session created"
        );

        Ok(GameSession {
            mode: self.mode,
            controller: KinematicController::new(self.movement),
            world,
            player,
            combat,
            director: EnemyDirector::new(&self.enemy_spawns, self.seed),
            waves,
            projectiles: ProjectileResolver::new(),
            pickups: PickupField::new(self.pickups),
            sync,
            match_state: MatchState::new(self.mode, self.local_id, team),
            log: CombatLog::new(self.local_id),
            events: EventQueue::new(),
            respawn: None,
            player_spawn: self.player_spawn,
            prev_fire: false,
            ticks: 0,
        })
    }
}

pub struct GameSession {
    mode: GameMode,
    controller: KinematicController,
    world: WorldGeometry,
    player: PlayerState,
    combat: CombatResolver,
    director: EnemyDirector,
    waves: Option<WaveCycle>,
    projectiles: ProjectileResolver,
    pickups: PickupField,
    sync: NetworkSynchronizer,
    match_state: MatchState,
    log: CombatLog,
    events: EventQueue,
    respawn: Option<Countdown>,
    player_spawn: Vec3,
    prev_fire: bool,
    ticks: u64,
}

impl GameSession {
    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn world(&self) -> &WorldGeometry {
        &self.world
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut PlayerState {
        &mut self.player
    }

    pub fn combat(&self) -> &CombatResolver {
        &self.combat
    }

    pub fn director(&self) -> &EnemyDirector {
        &self.director
    }

    /// Scripted setups and tests place enemies directly
    pub fn director_mut(&mut self) -> &mut EnemyDirector {
        &mut self.director
    }

    pub fn projectiles(&self) -> &ProjectileResolver {
        &self.projectiles
    }

    pub fn pickups(&self) -> &PickupField {
        &self.pickups
    }

    pub fn sync(&self) -> &NetworkSynchronizer {
        &self.sync
    }

    pub fn match_state(&self) -> &MatchState {
        &self.match_state
    }

    pub fn combat_log(&self) -> &CombatLog {
        &self.log
    }

    pub fn waves(&self) -> Option<&WaveCycle> {
        self.waves.as_ref()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_over(&self) -> bool {
        self.match_state.is_ended()
    }

    /// Push an event from outside the tick (scripted spawns); delivered at the next dispatch
    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    /// Run one simulation tick and return the events it produced
    pub fn tick(&mut self, dt: f32, input: &TickInput) -> Vec<SimEvent> {
        if self.is_over() {
            return Vec::new();
        }
        let dt = if dt.is_finite() {
            dt.clamp(0.0, MAX_TICK_DT)
        } else {
            0.0
        };
        self.ticks += 1;
        self.match_state.advance(dt);

        // Lifecycle
        self.tick_respawn(dt);
        if let Some(kind) = self.player.tick_powerup(dt) {
            self.events.push(SimEvent::PowerupExpired { kind });
        }

        // Kinematics
        if self.player.alive {
            self.player.yaw = wrap_angle(input.yaw);
            self.player.pitch = input.pitch.clamp(-MAX_PITCH, MAX_PITCH);
        }
        let moved = self
            .controller
            .step(&mut self.player, &input.movement, &self.world, dt);
        if let Some(landing) = moved.landing {
            self.events.push(SimEvent::PlayerLanded {
                impact_speed: landing.impact_speed,
                fall_damage: landing.fall_damage,
            });
            if landing.fall_damage > 0.0 {
                self.events.push(SimEvent::PlayerDamaged {
                    amount: landing.fall_damage,
                    source: DamageSource::Fall,
                });
            }
            if landing.killed {
                self.on_local_death(None, None);
            }
        }
        self.pickups
            .update(dt, &mut self.player, &mut self.combat, &mut self.events);

        // Weapons
        self.combat.update(dt, &mut self.events);
        if self.player.alive {
            self.handle_weapon_input(input);
        }
        self.prev_fire = input.fire;

        // Enemy director
        let actions = self.director.update(dt, &self.player, &self.world);
        for action in actions {
            self.apply_enemy_action(action);
        }

        // Projectiles and explosions
        self.update_projectiles(dt);

        // Wave cycle
        self.director.reap_dead();
        if let Some(cycle) = self.waves.as_mut() {
            if let Some(wave) = cycle.tick(dt) {
                self.director.spawn_wave(wave, &mut self.events);
            }
            if let Some(wave) = cycle.on_remaining(self.director.active_count()) {
                self.events.push(SimEvent::WaveCleared { wave });
            }
        }

        // Network sync
        let effects = self.sync.update(dt, &self.player, &mut self.events);
        for effect in effects {
            self.apply_local_effect(effect);
        }

        // Dispatch
        self.events
            .dispatch(&mut [&mut self.log, &mut self.match_state, &mut self.sync])
    }

    /// End the session: cancel pending waves, drop live entities and
    /// produce the result for submission.
    pub fn teardown(&mut self) -> MatchResult {
        if let Some(cycle) = self.waves.as_mut() {
            cycle.cancel();
        }
        self.director.clear();
        self.projectiles.clear();
        self.respawn = None;
        self.match_state.end(self.player.alive);
        let result = self.match_state.result();
        info!(
            kills = result.kills,
            score = result.score,
            time_played = result.time_played,
            won = result.won,
            accuracy = self.log.accuracy(),
            "Session torn down"
        );
        result
    }

    fn tick_respawn(&mut self, dt: f32) {
        let Some(timer) = self.respawn.as_mut() else {
            return;
        };
        if !timer.tick(dt) {
            return;
        }
        self.respawn = None;
        let at = self.player.team.map_or(self.player_spawn, team_spawn);
        self.player.respawn(at);
        self.combat.reset();
        self.prev_fire = false;
        info!(position = ?at, "Local player respawned");
        self.events.push(SimEvent::PlayerRespawned { position: at });
    }

    fn handle_weapon_input(&mut self, input: &TickInput) {
        if let Some(index) = input.switch_to {
            self.combat.switch_weapon(index);
        } else if input.toggle_weapon {
            self.combat.toggle_last_weapon();
        }
        if input.reload {
            self.combat.reload(&mut self.events);
        }
        if input.fire {
            let trigger_pressed = !self.prev_fire;
            self.fire(trigger_pressed);
        }
        if input.throw_grenade {
            self.throw_grenade();
        }
        if let Some(request) = input.flag {
            self.request_flag(request);
        }
    }

    fn movement_state(&self) -> MovementState {
        let flags = &self.player.flags;
        if !flags.on_ground {
            MovementState::Airborne
        } else if flags.sprinting || flags.sliding {
            MovementState::Sprinting
        } else if horizontal(self.player.velocity).length_squared() > 0.25 {
            MovementState::Moving
        } else {
            MovementState::Stationary
        }
    }

    fn fire(&mut self, trigger_pressed: bool) {
        let ctx = FireContext {
            origin: self.player.eye_position(),
            yaw: self.player.yaw,
            pitch: self.player.pitch,
            movement: self.movement_state(),
            fire_rate_multiplier: self.player.fire_rate_multiplier(),
            trigger_pressed,
        };
        let outcome = self.combat.fire(&ctx);
        if !outcome.fired {
            return;
        }

        let aim = view_direction(ctx.yaw, ctx.pitch);
        self.events.push(SimEvent::ShotFired {
            weapon: outcome.weapon,
            origin: outcome.origin,
            direction: outcome.directions.first().copied().unwrap_or(aim),
            pellets: outcome.directions.len() as u32,
        });

        // Projectile weapons resolve on detonation instead of by ray
        if let Some(kind) = outcome.projectile {
            for direction in &outcome.directions {
                self.launch(kind, outcome.origin, *direction);
            }
            return;
        }

        let mut targets = self.director.targets();
        targets.extend(self.sync.remote_targets());
        for direction in &outcome.directions {
            let resolution = self.combat.resolve_shot(
                outcome.origin,
                *direction,
                outcome.weapon,
                self.player.damage_multiplier,
                &targets,
                &self.world,
            );
            match resolution.hit {
                Some(hit) => self.apply_hit(outcome.weapon, outcome.origin, hit),
                None => self.events.push(SimEvent::ShotMissed {
                    weapon: outcome.weapon,
                    impact: resolution.world_hit.map(|h| SurfaceImpact {
                        point: h.point,
                        normal: h.normal,
                        material: h.material,
                    }),
                }),
            }
        }
    }

    fn apply_hit(&mut self, weapon: WeaponKind, origin: Vec3, hit: TargetHit) {
        let damage = match hit.target {
            TargetId::Enemy(id) => {
                let info = DamageInfo {
                    amount: hit.base_damage,
                    zone: hit.zone,
                    kind: DamageKind::Ballistic,
                    knockback: Some(Knockback {
                        source: origin,
                        force: self.combat.stats(weapon).knockback,
                    }),
                };
                self.director.damage(id, &info, &mut self.events).dealt
            }
            TargetId::Remote(id) => {
                if self.sync.is_friendly(id) {
                    debug!(peer = %id, "Friendly fire blocked");
                    self.events.push(SimEvent::FriendlyFireBlocked { target: id });
                    return;
                }
                // The authority applies the peer's armor
                hit.damage
            }
        };
        self.events.push(SimEvent::TargetHit {
            target: hit.target,
            weapon,
            zone: hit.zone,
            damage,
            distance: hit.distance,
            point: hit.point,
        });
    }

    fn launch(&mut self, kind: ProjectileKind, origin: Vec3, direction: Vec3) {
        let id = self
            .projectiles
            .spawn(kind, origin, direction, self.player.id);
        self.events.push(SimEvent::ProjectileLaunched {
            id,
            kind,
            position: origin,
        });
    }

    fn throw_grenade(&mut self) {
        if self.player.grenades == 0 {
            return;
        }
        self.player.grenades -= 1;
        let direction = view_direction(self.player.yaw, self.player.pitch + GRENADE_LOFT);
        self.launch(ProjectileKind::Grenade, self.player.eye_position(), direction);
    }

    fn request_flag(&mut self, request: FlagRequest) {
        if self.mode != GameMode::CaptureTheFlag {
            return;
        }
        let FlagRequest { action, team } = request;
        let flag = *self.match_state.flag(team);
        let here = self.player.position;
        let near = |p: Vec3| horizontal(p - here).length() <= FLAG_REACH;

        let allowed = match action {
            FlagAction::Pickup => {
                Some(team) != self.player.team && flag.position().map_or(false, near)
            }
            FlagAction::Drop => flag.carrier() == Some(self.player.id),
            FlagAction::Capture => {
                let home = self.player.team.map(|t| self.match_state.flag(t).home);
                flag.carrier() == Some(self.player.id) && home.map_or(false, near)
            }
            FlagAction::Return => {
                Some(team) == self.player.team
                    && matches!(flag.status, FlagStatus::Dropped { position } if near(position))
            }
        };
        if !allowed {
            debug!(?team, ?action, "Flag request rejected");
            return;
        }

        let position = (action == FlagAction::Drop).then_some(here);
        self.events.push(SimEvent::FlagInteraction {
            action,
            team,
            position,
        });

        // Without a channel the local client is the authority
        if !self.sync.is_online() {
            let carrier = (action == FlagAction::Pickup).then_some(self.player.id);
            self.events.push(SimEvent::FlagUpdated {
                action,
                team,
                carrier,
                position,
            });
        }
    }

    fn apply_enemy_action(&mut self, action: EnemyAction) {
        match action {
            EnemyAction::Shoot { id, hit, damage, .. } => {
                self.events.push(SimEvent::EnemyAttack {
                    id,
                    melee: false,
                    hit,
                });
                if hit {
                    self.damage_local(damage, DamageSource::Enemy { id }, None);
                }
            }
            EnemyAction::Melee { id, damage } => {
                self.events.push(SimEvent::EnemyAttack {
                    id,
                    melee: true,
                    hit: true,
                });
                self.damage_local(damage, DamageSource::Enemy { id }, None);
            }
        }
    }

    fn update_projectiles(&mut self, dt: f32) {
        let blasts = self.projectiles.update(dt, &self.world);
        if blasts.is_empty() {
            return;
        }
        let remotes: Vec<(Uuid, Vec3)> = self
            .sync
            .remote_positions()
            .into_iter()
            .filter(|(id, _)| !self.sync.is_friendly(*id))
            .collect();
        let report = self.projectiles.explode_all(
            &blasts,
            &mut self.player,
            &mut self.director,
            &remotes,
            &mut self.events,
        );
        for (id, damage) in report.remote_hits {
            self.events.push(SimEvent::SplashDamage {
                target: TargetId::Remote(id),
                damage,
            });
        }
        if report.player_killed {
            self.on_local_death(None, None);
        }
    }

    fn apply_local_effect(&mut self, effect: LocalEffect) {
        match effect {
            LocalEffect::Damaged { attacker, amount } => {
                self.damage_local(amount, DamageSource::Remote { id: attacker }, Some(attacker));
            }
            LocalEffect::Killed { attacker, weapon } => {
                if self.player.kill() {
                    self.on_local_death(attacker, weapon);
                }
            }
        }
    }

    fn damage_local(&mut self, amount: f32, source: DamageSource, attacker: Option<Uuid>) {
        let outcome = self.player.apply_damage(amount);
        let dealt = outcome.health_lost + outcome.armor_lost;
        if dealt <= 0.0 {
            return;
        }
        self.events.push(SimEvent::PlayerDamaged {
            amount: dealt,
            source,
        });
        if outcome.killed {
            self.on_local_death(attacker, None);
        }
    }

    fn on_local_death(&mut self, attacker: Option<Uuid>, weapon: Option<WeaponKind>) {
        info!(attacker = ?attacker, mode = %self.mode, "Local player died");
        self.events.push(SimEvent::PlayerDied { attacker, weapon });

        // Carried flag falls where the player died
        if self.mode == GameMode::CaptureTheFlag {
            for team in [Team::Red, Team::Blue] {
                if self.match_state.flag(team).carrier() == Some(self.player.id) {
                    let position = Some(self.player.position);
                    self.events.push(SimEvent::FlagInteraction {
                        action: FlagAction::Drop,
                        team,
                        position,
                    });
                    if !self.sync.is_online() {
                        self.events.push(SimEvent::FlagUpdated {
                            action: FlagAction::Drop,
                            team,
                            carrier: None,
                            position,
                        });
                    }
                }
            }
        }

        if self.mode.is_team_mode() {
            self.respawn = Some(Countdown::new(RESPAWN_DELAY));
        } else {
            self.match_state.end(false);
        }
    }
}
