//! Network synchronizer: remote peers, authoritative match events, and
//! outbound broadcast of local actions.
//!
//! Per remote peer the lifecycle is
//! `absent -> joined -> active -> dead -> (respawned -> active | absent on leave)`.
//! Remote poses are eased toward the latest snapshot at a bounded rate and
//! are never snapped once the peer is active.

use std::collections::{HashMap, HashSet};

use glam::Vec3;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::combat::{HitZone, TargetId, TargetVolumes};
use crate::game::events::{EventQueue, EventSubscriber, SimEvent};
use crate::game::player::{PlayerState, PLAYER_HEIGHT, PLAYER_RADIUS};
use crate::game::r#match::Team;
use crate::game::weapons::WeaponKind;
use crate::util::math::{move_towards, shortest_angle};
use crate::world::Aabb;

use super::link::RealtimeLink;
use super::protocol::{InboundEvent, OutboundEvent, PeerInfo, Rotation};
use super::snapshot::PoseBroadcaster;

/// Top of a remote player's body volume; the head sits above it
const REMOTE_BODY_HEIGHT: f32 = 1.4;
const REMOTE_HEAD_RADIUS: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Max metres per second a remote pose moves toward its target
    pub convergence_rate: f32,
    /// Max radians per second a remote view turns toward its target
    pub angular_rate: f32,
    pub pose_send_hz: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            convergence_rate: 15.0,
            angular_rate: 12.0,
            pose_send_hz: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemotePhase {
    /// Announced, no pose received yet
    Joined,
    Active,
    Dead,
    /// Respawn confirmed, waiting for the first pose
    Respawned,
}

#[derive(Debug, Clone)]
pub struct RemotePlayer {
    pub id: Uuid,
    pub team: Option<Team>,
    pub phase: RemotePhase,
    pub position: Vec3,
    pub rotation: Rotation,
    pub velocity: Vec3,
    pub sprinting: bool,
    pub grounded: bool,
    target_position: Vec3,
    target_rotation: Rotation,
}

impl RemotePlayer {
    fn new(id: Uuid, team: Option<Team>, position: Vec3) -> Self {
        Self {
            id,
            team,
            phase: RemotePhase::Joined,
            position,
            rotation: Rotation::default(),
            velocity: Vec3::ZERO,
            sprinting: false,
            grounded: true,
            target_position: position,
            target_rotation: Rotation::default(),
        }
    }

    pub fn target_position(&self) -> Vec3 {
        self.target_position
    }

    pub fn is_active(&self) -> bool {
        self.phase == RemotePhase::Active
    }

    /// Head and body volumes for local hit resolution
    pub fn target_volumes(&self) -> TargetVolumes {
        let body = Aabb::from_feet(self.position, PLAYER_RADIUS, REMOTE_BODY_HEIGHT);
        let head_center = self.position
            + Vec3::Y * (REMOTE_BODY_HEIGHT + (PLAYER_HEIGHT - REMOTE_BODY_HEIGHT) * 0.5);
        let head = Aabb::from_center(
            head_center,
            Vec3::new(
                REMOTE_HEAD_RADIUS,
                (PLAYER_HEIGHT - REMOTE_BODY_HEIGHT) * 0.5,
                REMOTE_HEAD_RADIUS,
            ),
        );
        TargetVolumes {
            id: TargetId::Remote(self.id),
            head,
            body,
        }
    }

    fn interpolate(&mut self, dt: f32, config: &SyncConfig) {
        self.position = move_towards(
            self.position,
            self.target_position,
            config.convergence_rate * dt,
        );
        let max_turn = config.angular_rate * dt;
        let yaw_delta = shortest_angle(self.rotation.yaw, self.target_rotation.yaw);
        self.rotation.yaw += yaw_delta.clamp(-max_turn, max_turn);
        let pitch_delta = self.target_rotation.pitch - self.rotation.pitch;
        self.rotation.pitch += pitch_delta.clamp(-max_turn, max_turn);
    }

    /// First pose after join or respawn places the peer directly
    fn place(&mut self, position: Vec3, rotation: Rotation) {
        self.position = position;
        self.target_position = position;
        self.rotation = rotation;
        self.target_rotation = rotation;
        self.phase = RemotePhase::Active;
    }
}

/// Effect of an authoritative message on the local player, applied by the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalEffect {
    Damaged {
        attacker: Uuid,
        amount: f32,
    },
    Killed {
        attacker: Option<Uuid>,
        weapon: Option<WeaponKind>,
    },
}

pub struct NetworkSynchronizer {
    local_id: Uuid,
    local_team: Option<Team>,
    config: SyncConfig,
    link: Option<RealtimeLink>,
    match_id: Option<Uuid>,
    broadcaster: PoseBroadcaster,
    remotes: HashMap<Uuid, RemotePlayer>,
    /// Peers whose death was confirmed; their poses and damage are ignored until respawn
    dead: HashSet<Uuid>,
    /// Cached team assignments, kept across respawns
    teams: HashMap<Uuid, Team>,
}

impl NetworkSynchronizer {
    pub fn new(local_id: Uuid, local_team: Option<Team>, config: SyncConfig) -> Self {
        Self {
            local_id,
            local_team,
            broadcaster: PoseBroadcaster::new(config.pose_send_hz),
            config,
            link: None,
            match_id: None,
            remotes: HashMap::new(),
            dead: HashSet::new(),
            teams: HashMap::new(),
        }
    }

    pub fn connect(&mut self, link: RealtimeLink) {
        self.link = Some(link);
    }

    pub fn is_online(&self) -> bool {
        self.link.is_some() && self.match_id.is_some()
    }

    pub fn match_id(&self) -> Option<Uuid> {
        self.match_id
    }

    /// Announce the local player on `match_id`
    pub fn join(&mut self, match_id: Uuid) {
        self.match_id = Some(match_id);
        info!(%match_id, player = %self.local_id, "Joining match channel");
        self.send(OutboundEvent::JoinMatch {
            match_id,
            player_id: self.local_id,
            team: self.local_team,
        });
        self.broadcaster.force_next();
    }

    pub fn remotes(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.remotes.values()
    }

    pub fn remote(&self, id: Uuid) -> Option<&RemotePlayer> {
        self.remotes.get(&id)
    }

    pub fn is_dead(&self, id: Uuid) -> bool {
        self.dead.contains(&id)
    }

    pub fn team_of(&self, id: Uuid) -> Option<Team> {
        self.teams.get(&id).copied()
    }

    /// Same team as the local player. Always false outside team modes.
    pub fn is_friendly(&self, id: Uuid) -> bool {
        match (self.local_team, self.team_of(id)) {
            (Some(local), Some(other)) => local == other,
            _ => false,
        }
    }

    /// Hit volumes of every active peer
    pub fn remote_targets(&self) -> Vec<TargetVolumes> {
        self.remotes
            .values()
            .filter(|r| r.is_active())
            .map(RemotePlayer::target_volumes)
            .collect()
    }

    /// Feet positions of every active peer, for splash damage
    pub fn remote_positions(&self) -> Vec<(Uuid, Vec3)> {
        self.remotes
            .values()
            .filter(|r| r.is_active())
            .map(|r| (r.id, r.position))
            .collect()
    }

    pub fn force_pose_broadcast(&mut self) {
        self.broadcaster.force_next();
    }

    /// Apply buffered inbound messages, ease remote poses and broadcast the
    /// local pose when due.
    pub fn update(
        &mut self,
        dt: f32,
        local: &PlayerState,
        events: &mut EventQueue,
    ) -> Vec<LocalEffect> {
        // Drain inbound queue
        let inbound = match self.link.as_mut() {
            Some(link) => link.drain(),
            None => Vec::new(),
        };
        let mut effects = Vec::new();
        for msg in inbound {
            self.handle_inbound(msg, events, &mut effects);
        }

        // Ease remotes toward their latest snapshot
        for remote in self.remotes.values_mut() {
            if remote.is_active() {
                remote.interpolate(dt, &self.config);
            }
        }

        // Broadcast local pose
        if self.broadcaster.should_send(dt) && local.alive && self.is_online() {
            self.send(PoseBroadcaster::build(local));
        }

        effects
    }

    /// Apply one authoritative message. Stale, duplicate and self-echo
    /// messages are filtered here.
    pub fn handle_inbound(
        &mut self,
        msg: InboundEvent,
        events: &mut EventQueue,
        effects: &mut Vec<LocalEffect>,
    ) {
        match msg {
            InboundEvent::PlayerJoined {
                player_id,
                team,
                position,
            } => self.add_remote(player_id, team, position, events),

            InboundEvent::PlayerUpdate {
                player_id,
                position,
                rotation,
                velocity,
                is_sprinting,
                is_grounded,
            } => {
                if player_id == self.local_id || self.dead.contains(&player_id) {
                    return;
                }
                if !position.is_finite() {
                    warn!(peer = %player_id, "Dropping non-finite pose");
                    return;
                }
                let Some(remote) = self.remotes.get_mut(&player_id) else {
                    debug!(peer = %player_id, "Pose for unknown peer ignored");
                    return;
                };
                remote.velocity = velocity;
                remote.sprinting = is_sprinting;
                remote.grounded = is_grounded;
                match remote.phase {
                    RemotePhase::Joined | RemotePhase::Respawned => {
                        remote.place(position, rotation)
                    }
                    RemotePhase::Active => {
                        remote.target_position = position;
                        remote.target_rotation = rotation;
                    }
                    RemotePhase::Dead => {}
                }
            }

            InboundEvent::PlayerDamaged {
                target_id,
                attacker_id,
                damage,
                ..
            } => {
                if target_id != self.local_id || attacker_id == self.local_id {
                    return;
                }
                if self.dead.contains(&attacker_id) {
                    warn!(attacker = %attacker_id, "Damage from dead peer ignored");
                    return;
                }
                if self.is_friendly(attacker_id) {
                    debug!(attacker = %attacker_id, "Friendly damage ignored");
                    return;
                }
                if !damage.is_finite() || damage <= 0.0 {
                    return;
                }
                effects.push(LocalEffect::Damaged {
                    attacker: attacker_id,
                    amount: damage,
                });
            }

            InboundEvent::PlayerKilled {
                victim_id,
                attacker_id,
                weapon_type,
            } => {
                if victim_id == self.local_id {
                    effects.push(LocalEffect::Killed {
                        attacker: attacker_id,
                        weapon: weapon_type,
                    });
                    return;
                }
                if !self.dead.insert(victim_id) {
                    warn!(peer = %victim_id, "Duplicate kill confirmation ignored");
                    return;
                }
                if let Some(remote) = self.remotes.get_mut(&victim_id) {
                    remote.phase = RemotePhase::Dead;
                }
                info!(peer = %victim_id, attacker = ?attacker_id, "Peer killed");
                events.push(SimEvent::RemoteKilled {
                    victim: victim_id,
                    attacker: attacker_id,
                });
            }

            InboundEvent::PlayerRespawned {
                player_id,
                position,
            } => {
                if player_id == self.local_id {
                    return;
                }
                if !self.dead.remove(&player_id) {
                    debug!(peer = %player_id, "Respawn for living peer ignored");
                    return;
                }
                if let Some(remote) = self.remotes.get_mut(&player_id) {
                    match position {
                        Some(position) => {
                            let rotation = remote.rotation;
                            remote.place(position, rotation);
                        }
                        None => remote.phase = RemotePhase::Respawned,
                    }
                }
                events.push(SimEvent::RemoteRespawned { id: player_id });
            }

            InboundEvent::PlayerLeft { player_id } => {
                self.dead.remove(&player_id);
                self.teams.remove(&player_id);
                if self.remotes.remove(&player_id).is_some() {
                    info!(peer = %player_id, "Peer left");
                    events.push(SimEvent::RemoteLeft { id: player_id });
                }
            }

            InboundEvent::MatchState {
                players,
                red_score,
                blue_score,
            } => {
                for PeerInfo {
                    player_id,
                    team,
                    position,
                    alive,
                } in players
                {
                    self.add_remote(player_id, team, position, events);
                    if !alive && player_id != self.local_id {
                        self.dead.insert(player_id);
                        if let Some(remote) = self.remotes.get_mut(&player_id) {
                            remote.phase = RemotePhase::Dead;
                        }
                    }
                }
                events.push(SimEvent::ScoreUpdated {
                    red: red_score,
                    blue: blue_score,
                });
            }

            InboundEvent::ScoreUpdate { red, blue } => {
                events.push(SimEvent::ScoreUpdated { red, blue });
            }

            InboundEvent::MatchEnded { winner } => {
                info!(?winner, "Match ended by authority");
                events.push(SimEvent::MatchEnded { winner });
            }

            InboundEvent::FlagUpdate {
                action,
                team,
                carrier_id,
                position,
            } => {
                events.push(SimEvent::FlagUpdated {
                    action,
                    team,
                    carrier: carrier_id,
                    position,
                });
            }
        }
    }

    fn add_remote(
        &mut self,
        id: Uuid,
        team: Option<Team>,
        position: Option<Vec3>,
        events: &mut EventQueue,
    ) {
        if id == self.local_id || self.remotes.contains_key(&id) {
            return;
        }
        if let Some(team) = team {
            self.teams.insert(id, team);
        }
        let team = team.or_else(|| self.teams.get(&id).copied());
        let mut remote = RemotePlayer::new(id, team, position.unwrap_or(Vec3::ZERO));
        if let Some(position) = position {
            remote.place(position, Rotation::default());
        }
        self.remotes.insert(id, remote);
        info!(peer = %id, ?team, "Peer joined");
        events.push(SimEvent::RemoteJoined { id, team });
    }

    fn send(&self, event: OutboundEvent) {
        if let Some(link) = &self.link {
            link.send(event);
        }
    }

    fn send_in_match(&self, event: OutboundEvent) {
        if self.is_online() {
            self.send(event);
        }
    }
}

/// Outbound half: local actions become channel messages during dispatch
impl EventSubscriber for NetworkSynchronizer {
    fn on_event(&mut self, event: &SimEvent) {
        match *event {
            SimEvent::ShotFired {
                weapon,
                origin,
                direction,
                ..
            } => self.send_in_match(OutboundEvent::PlayerShoot {
                origin,
                direction,
                weapon_type: weapon,
            }),
            SimEvent::TargetHit {
                target: TargetId::Remote(target_id),
                zone,
                damage,
                ..
            } => {
                if self.is_friendly(target_id) || self.dead.contains(&target_id) {
                    return;
                }
                self.send_in_match(OutboundEvent::PlayerHit {
                    target_id,
                    damage,
                    hit_location: zone,
                });
            }
            SimEvent::SplashDamage {
                target: TargetId::Remote(target_id),
                damage,
            } => {
                if self.is_friendly(target_id) || self.dead.contains(&target_id) {
                    return;
                }
                self.send_in_match(OutboundEvent::PlayerHit {
                    target_id,
                    damage,
                    hit_location: HitZone::Body,
                });
            }
            SimEvent::PlayerDied { attacker, weapon } => {
                self.send_in_match(OutboundEvent::PlayerDied {
                    attacker_id: attacker,
                    weapon_type: weapon,
                })
            }
            SimEvent::PlayerRespawned { .. } => {
                self.send_in_match(OutboundEvent::PlayerRespawn);
                self.broadcaster.force_next();
            }
            SimEvent::FlagInteraction {
                action,
                team,
                position,
            } => self.send_in_match(OutboundEvent::FlagAction {
                action,
                team,
                position,
            }),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::link::LinkEndpoint;

    const DT: f32 = 1.0 / 60.0;

    struct Harness {
        sync: NetworkSynchronizer,
        endpoint: LinkEndpoint,
        local: PlayerState,
        events: EventQueue,
    }

    impl Harness {
        fn new(team: Option<Team>) -> Self {
            let local = PlayerState::new(Uuid::new_v4(), Vec3::ZERO);
            let mut sync = NetworkSynchronizer::new(local.id, team, SyncConfig::default());
            let (link, endpoint) = RealtimeLink::pair();
            sync.connect(link);
            sync.join(Uuid::new_v4());
            Self {
                sync,
                endpoint,
                local,
                events: EventQueue::new(),
            }
        }

        fn deliver(&mut self, msg: InboundEvent) -> Vec<LocalEffect> {
            self.endpoint.inbound_tx.try_send(msg).unwrap();
            self.sync.update(DT, &self.local, &mut self.events)
        }

        fn sent(&mut self) -> Vec<OutboundEvent> {
            let mut out = Vec::new();
            while let Ok(msg) = self.endpoint.outbound_rx.try_recv() {
                out.push(msg);
            }
            out
        }

        fn joined_peer(&mut self, team: Option<Team>, at: Vec3) -> Uuid {
            let id = Uuid::new_v4();
            self.deliver(InboundEvent::PlayerJoined {
                player_id: id,
                team,
                position: Some(at),
            });
            id
        }
    }

    fn pose(id: Uuid, position: Vec3, yaw: f32) -> InboundEvent {
        InboundEvent::PlayerUpdate {
            player_id: id,
            position,
            rotation: Rotation { yaw, pitch: 0.0 },
            velocity: Vec3::ZERO,
            is_sprinting: false,
            is_grounded: true,
        }
    }

    #[test]
    fn join_announces_local_player() {
        let mut h = Harness::new(Some(Team::Red));
        let sent = h.sent();
        assert!(matches!(
            sent.first(),
            Some(OutboundEvent::JoinMatch { team: Some(Team::Red), .. })
        ));
    }

    #[test]
    fn interpolation_never_teleports() {
        let mut h = Harness::new(None);
        let id = h.joined_peer(None, Vec3::ZERO);
        h.deliver(pose(id, Vec3::new(50.0, 0.0, 0.0), 0.0));

        let max_step = h.sync.config.convergence_rate * DT + 1e-4;
        let mut last = h.sync.remote(id).unwrap().position;
        for _ in 0..30 {
            h.sync.update(DT, &h.local, &mut h.events);
            let now = h.sync.remote(id).unwrap().position;
            assert!(now.distance(last) <= max_step);
            last = now;
        }
        assert!(last.x > 0.0 && last.x < 50.0);
    }

    #[test]
    fn yaw_takes_the_short_way_round() {
        let mut h = Harness::new(None);
        let id = Uuid::new_v4();
        h.deliver(InboundEvent::PlayerJoined {
            player_id: id,
            team: None,
            position: None,
        });
        // First pose places the peer facing yaw 3.0
        h.deliver(pose(id, Vec3::ZERO, 3.0));
        assert_eq!(h.sync.remote(id).unwrap().rotation.yaw, 3.0);
        // Next target wraps past PI
        h.deliver(pose(id, Vec3::ZERO, -3.0));
        let yaw = h.sync.remote(id).unwrap().rotation.yaw;
        assert!(yaw > 3.0, "turned the long way: {yaw}");
    }

    #[test]
    fn dead_peer_poses_are_ignored_until_respawn() {
        let mut h = Harness::new(None);
        let id = h.joined_peer(None, Vec3::ZERO);
        let attacker = Uuid::new_v4();
        h.deliver(InboundEvent::PlayerKilled {
            victim_id: id,
            attacker_id: Some(attacker),
            weapon_type: None,
        });
        assert!(h.sync.is_dead(id));

        h.deliver(pose(id, Vec3::new(5.0, 0.0, 0.0), 0.0));
        assert_eq!(h.sync.remote(id).unwrap().position, Vec3::ZERO);
        assert!(h.sync.remote_targets().is_empty());

        // Duplicate kill produces no second event
        h.deliver(InboundEvent::PlayerKilled {
            victim_id: id,
            attacker_id: Some(attacker),
            weapon_type: None,
        });
        let kills = h
            .events
            .iter()
            .filter(|e| matches!(e, SimEvent::RemoteKilled { .. }))
            .count();
        assert_eq!(kills, 1);

        h.deliver(InboundEvent::PlayerRespawned {
            player_id: id,
            position: None,
        });
        h.deliver(pose(id, Vec3::new(5.0, 0.0, 0.0), 0.0));
        let remote = h.sync.remote(id).unwrap();
        assert!(remote.is_active());
        assert_eq!(remote.position, Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn friendly_hits_are_not_sent() {
        let mut h = Harness::new(Some(Team::Blue));
        let friend = h.joined_peer(Some(Team::Blue), Vec3::ZERO);
        let foe = h.joined_peer(Some(Team::Red), Vec3::X);
        h.sent();

        for target in [friend, foe] {
            h.sync.on_event(&SimEvent::TargetHit {
                target: TargetId::Remote(target),
                weapon: WeaponKind::Pistol,
                zone: HitZone::Body,
                damage: 20.0,
                distance: 3.0,
                point: Vec3::ZERO,
            });
        }
        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], OutboundEvent::PlayerHit { target_id, .. } if target_id == foe));
    }

    #[test]
    fn damage_to_local_player_is_filtered() {
        let mut h = Harness::new(Some(Team::Blue));
        let friend = h.joined_peer(Some(Team::Blue), Vec3::ZERO);
        let foe = h.joined_peer(Some(Team::Red), Vec3::X);
        let local = h.local.id;

        let friendly = h.deliver(InboundEvent::PlayerDamaged {
            target_id: local,
            attacker_id: friend,
            damage: 30.0,
            hit_location: None,
        });
        assert!(friendly.is_empty());

        let hostile = h.deliver(InboundEvent::PlayerDamaged {
            target_id: local,
            attacker_id: foe,
            damage: 30.0,
            hit_location: None,
        });
        assert_eq!(
            hostile,
            vec![LocalEffect::Damaged {
                attacker: foe,
                amount: 30.0
            }]
        );
    }

    #[test]
    fn self_echo_and_unknown_peers_are_ignored() {
        let mut h = Harness::new(None);
        let local = h.local.id;
        h.deliver(InboundEvent::PlayerJoined {
            player_id: local,
            team: None,
            position: None,
        });
        h.deliver(pose(Uuid::new_v4(), Vec3::ONE, 0.0));
        assert_eq!(h.sync.remotes().count(), 0);
    }

    #[test]
    fn leave_removes_peer() {
        let mut h = Harness::new(None);
        let id = h.joined_peer(None, Vec3::ZERO);
        h.deliver(InboundEvent::PlayerLeft { player_id: id });
        assert!(h.sync.remote(id).is_none());
        assert!(h
            .events
            .iter()
            .any(|e| matches!(e, SimEvent::RemoteLeft { id: left } if *left == id)));
    }

    #[test]
    fn pose_broadcast_is_rate_limited() {
        let mut h = Harness::new(None);
        h.sent();
        for _ in 0..60 {
            h.sync.update(DT, &h.local, &mut h.events);
        }
        let poses = h
            .sent()
            .into_iter()
            .filter(|m| matches!(m, OutboundEvent::PlayerUpdate { .. }))
            .count();
        assert!((19..=21).contains(&poses), "sent {poses} poses");
    }
}
