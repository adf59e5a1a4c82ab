//! End-to-end scenarios against the public simulation API

use std::sync::Arc;

use glam::{Vec2, Vec3};
use uuid::Uuid;

use arena_core::game::combat::{
    falloff_damage, zone_damage, CombatResolver, FireContext, HitZone, TargetId, TargetVolumes,
};
use arena_core::game::enemies::{DamageInfo, DamageKind, EnemyDirector, EnemyKind};
use arena_core::game::physics::MoveIntent;
use arena_core::game::player::PlayerState;
use arena_core::game::projectile::{Blast, ProjectileResolver};
use arena_core::game::r#match::{FlagAction, FlagStatus};
use arena_core::game::weapons::{MovementState, WeaponKind, WeaponStats, WeaponTable};
use arena_core::game::{
    EventQueue, GameMode, GameSession, SessionBuilder, SimEvent, Team, TickInput,
};
use arena_core::net::protocol::Rotation;
use arena_core::net::{InboundEvent, LinkEndpoint, RealtimeLink, SyncConfig};
use arena_core::world::{Aabb, SurfaceMaterial, WorldGeometry, WorldVolume};

const DT: f32 = 1.0 / 60.0;

fn floor() -> WorldGeometry {
    WorldGeometry::new(vec![WorldVolume::solid(
        Aabb::new(Vec3::new(-80.0, -1.0, -80.0), Vec3::new(80.0, 0.0, 80.0)),
        SurfaceMaterial::Concrete,
    )])
}

fn offline(mode: GameMode) -> GameSession {
    SessionBuilder::new(Uuid::new_v4())
        .world(floor())
        .mode(mode)
        .player_spawn(Vec3::ZERO)
        .first_wave_delay(1000.0)
        .seed(11)
        .build()
        .unwrap()
}

fn online(mode: GameMode, team: Option<Team>) -> (GameSession, LinkEndpoint) {
    let (link, endpoint) = RealtimeLink::pair();
    let session = SessionBuilder::new(Uuid::new_v4())
        .world(floor())
        .mode(mode)
        .team(team)
        .player_spawn(Vec3::ZERO)
        .first_wave_delay(1000.0)
        .seed(11)
        .realtime(link, Uuid::new_v4())
        .build()
        .unwrap();
    (session, endpoint)
}

fn idle() -> TickInput {
    TickInput::default()
}

fn fire_ctx() -> FireContext {
    FireContext {
        origin: Vec3::new(0.0, 1.6, 0.0),
        yaw: 0.0,
        pitch: 0.0,
        movement: MovementState::Stationary,
        fire_rate_multiplier: 1.0,
        trigger_pressed: true,
    }
}

#[test]
fn rifle_empties_magazine_then_reloads_from_reserve() {
    let mut combat = CombatResolver::new(Arc::new(WeaponTable::new()), &[WeaponKind::AssaultRifle], 5);
    let mut events = EventQueue::new();
    assert_eq!(combat.active_weapon().magazine, 30);
    assert_eq!(combat.active_weapon().reserve, 90);

    for shot in 0..30 {
        assert!(combat.fire(&fire_ctx()).fired, "shot {shot} rejected");
        combat.update(0.11, &mut events);
    }
    assert_eq!(combat.active_weapon().magazine, 0);
    assert_eq!(combat.active_weapon().reserve, 90);
    assert!(!combat.fire(&fire_ctx()).fired);

    assert!(combat.reload(&mut events));
    // A reload in progress blocks the trigger
    assert!(!combat.fire(&fire_ctx()).fired);
    for _ in 0..25 {
        combat.update(0.1, &mut events);
    }
    assert_eq!(combat.active_weapon().magazine, 30);
    assert_eq!(combat.active_weapon().reserve, 60);
    assert!(events
        .iter()
        .any(|e| matches!(e, SimEvent::ReloadFinished { magazine: 30, reserve: 60, .. })));
}

#[test]
fn reload_conserves_ammo_for_every_weapon() {
    let table = Arc::new(WeaponTable::new());
    for kind in WeaponKind::ALL {
        let stats = *table.get(kind);
        let mut combat = CombatResolver::new(table.clone(), &[kind], 9);
        let mut events = EventQueue::new();

        // Spend a few rounds, then reload
        for _ in 0..stats.magazine_size.min(3) {
            combat.fire(&fire_ctx());
            combat.update(2.0, &mut events);
        }
        let before = combat.active_weapon().total_ammo();
        if combat.reload(&mut events) {
            for _ in 0..((stats.reload_time / 0.1) as usize + 2) {
                combat.update(0.1, &mut events);
            }
        }
        let weapon = combat.active_weapon();
        assert_eq!(weapon.total_ammo(), before, "{kind:?}");
        assert!(weapon.magazine <= stats.magazine_size, "{kind:?}");
    }
}

#[test]
fn explosion_damage_falls_off_linearly() {
    let mut director = EnemyDirector::new(&[], 1);
    let mut events = EventQueue::new();
    let id = director.spawn(EnemyKind::Bulwark, Vec3::ZERO, &mut events);
    let before = director.get(id).unwrap().health;

    // Local player well outside the blast
    let mut player = PlayerState::new(Uuid::new_v4(), Vec3::new(60.0, 0.0, 60.0));
    let resolver = ProjectileResolver::new();
    let report = resolver.explode(
        Blast::new(Vec3::new(2.5, 0.0, 0.0), 5.0, 50.0),
        &mut player,
        &mut director,
        &[],
        &mut events,
    );

    let after = director.get(id).unwrap().health;
    assert!((before - after - 25.0).abs() < 1e-3);
    assert_eq!(report.player_damage, 0.0);
    assert_eq!(player.health, player.max_health);
}

#[test]
fn headshot_doubles_damage_at_equal_distance() {
    let combat = CombatResolver::new(Arc::new(WeaponTable::new()), &[WeaponKind::AssaultRifle], 1);
    let empty = WorldGeometry::new(Vec::new());
    let target = TargetVolumes {
        id: TargetId::Enemy(1),
        head: Aabb::new(Vec3::new(-0.5, 1.5, -30.5), Vec3::new(0.5, 2.0, -29.5)),
        body: Aabb::new(Vec3::new(-0.5, 0.0, -30.5), Vec3::new(0.5, 1.5, -29.5)),
    };

    let head = combat.resolve_shot(
        Vec3::new(0.0, 1.75, 0.0),
        Vec3::NEG_Z,
        WeaponKind::AssaultRifle,
        1.0,
        &[target],
        &empty,
    );
    let body = combat.resolve_shot(
        Vec3::new(0.0, 1.0, 0.0),
        Vec3::NEG_Z,
        WeaponKind::AssaultRifle,
        1.0,
        &[target],
        &empty,
    );
    let head = head.hit.unwrap();
    let body = body.hit.unwrap();
    assert_eq!(head.zone, HitZone::Head);
    assert_eq!(body.zone, HitZone::Body);
    assert!((head.distance - body.distance).abs() < 1e-4);
    assert!((head.damage - 2.0 * body.damage).abs() < 1e-3);

    for kind in WeaponKind::ALL {
        let stats = WeaponStats::for_kind(kind);
        for step in 0..100 {
            let base = falloff_damage(&stats, step as f32);
            assert_eq!(zone_damage(base, HitZone::Head), 2.0 * zone_damage(base, HitZone::Body));
        }
    }
}

#[test]
fn falloff_never_increases_and_floors_at_minimum() {
    for kind in WeaponKind::ALL {
        let stats = WeaponStats::for_kind(kind);
        let mut last = f32::INFINITY;
        for step in 0..=600 {
            let damage = falloff_damage(&stats, step as f32 * 0.5);
            assert!(damage <= last + 1e-4, "{kind:?} rose at {}", step as f32 * 0.5);
            assert!(damage >= stats.min_damage - 1e-4, "{kind:?} below floor");
            last = damage;
        }
        assert!((falloff_damage(&stats, 10_000.0) - stats.min_damage).abs() < 1e-4);
    }
}

#[test]
fn enemy_dies_exactly_once() {
    let mut director = EnemyDirector::new(&[], 1);
    let mut events = EventQueue::new();
    let id = director.spawn(EnemyKind::Grunt, Vec3::ZERO, &mut events);
    let lethal = DamageInfo {
        amount: 500.0,
        zone: HitZone::Body,
        kind: DamageKind::Ballistic,
        knockback: None,
    };

    let kills: Vec<bool> = (0..4)
        .map(|_| director.damage(id, &lethal, &mut events).killed)
        .collect();
    assert_eq!(kills, vec![true, false, false, false]);
    let deaths = events
        .iter()
        .filter(|e| matches!(e, SimEvent::EnemyKilled { .. }))
        .count();
    assert_eq!(deaths, 1);
    assert_eq!(director.reap_dead(), 1);
    assert_eq!(director.active_count(), 0);
}

#[test]
fn sprinting_until_exhausted_drops_sprint_next_tick() {
    let mut session = offline(GameMode::Waves);
    let sprint = TickInput {
        movement: MoveIntent {
            direction: Vec2::new(0.0, 1.0),
            sprint: true,
            ..Default::default()
        },
        ..idle()
    };

    let drain = arena_core::game::physics::MovementConfig::default().stamina_drain;
    let ticks = ((session.player().max_stamina / drain) / DT).round() as usize;
    for _ in 0..ticks {
        session.tick(DT, &sprint);
        assert!(session.player().flags.sprinting);
    }
    assert_eq!(session.player().stamina, 0.0);

    session.tick(DT, &sprint);
    assert!(!session.player().flags.sprinting);
}

#[test]
fn jump_cut_applies_once_per_jump() {
    let mut session = offline(GameMode::Waves);
    for _ in 0..5 {
        session.tick(DT, &idle());
    }
    assert!(session.player().flags.on_ground);

    let jump = TickInput {
        movement: MoveIntent {
            jump: true,
            ..Default::default()
        },
        ..idle()
    };
    let release = TickInput {
        movement: MoveIntent {
            jump_cut: true,
            ..Default::default()
        },
        ..idle()
    };
    session.tick(DT, &jump);
    let rising = session.player().velocity.y;
    assert!(rising > 0.0);

    let gravity = arena_core::game::physics::MovementConfig::default().gravity;
    let factor = arena_core::game::physics::MovementConfig::default().jump_cut_factor;
    session.tick(DT, &release);
    let cut = session.player().velocity.y;
    assert!((cut - (rising * factor - gravity * DT)).abs() < 1e-3);

    session.tick(DT, &release);
    let second = session.player().velocity.y;
    assert!((second - (cut - gravity * DT)).abs() < 1e-3);
}

#[test]
fn remote_interpolation_is_rate_bounded() {
    let (mut session, endpoint) = online(GameMode::Waves, None);
    let peer = Uuid::new_v4();
    endpoint
        .inbound_tx
        .try_send(InboundEvent::PlayerJoined {
            player_id: peer,
            team: None,
            position: Some(Vec3::new(0.0, 0.0, -5.0)),
        })
        .unwrap();
    session.tick(DT, &idle());

    endpoint
        .inbound_tx
        .try_send(InboundEvent::PlayerUpdate {
            player_id: peer,
            position: Vec3::new(40.0, 0.0, -5.0),
            rotation: Rotation { yaw: 0.0, pitch: 0.0 },
            velocity: Vec3::ZERO,
            is_sprinting: false,
            is_grounded: true,
        })
        .unwrap();

    let max_step = SyncConfig::default().convergence_rate * DT + 1e-4;
    let mut last = session.sync().remote(peer).unwrap().position;
    for _ in 0..60 {
        session.tick(DT, &idle());
        let now = session.sync().remote(peer).unwrap().position;
        assert!(now.distance(last) <= max_step);
        last = now;
    }
    assert!(last.x > 0.0 && last.x < 40.0);
}

#[test]
fn authoritative_flag_pickup_and_capture() {
    let (mut session, endpoint) = online(GameMode::CaptureTheFlag, Some(Team::Red));
    let carrier = Uuid::new_v4();

    endpoint
        .inbound_tx
        .try_send(InboundEvent::FlagUpdate {
            action: FlagAction::Pickup,
            team: Team::Blue,
            carrier_id: Some(carrier),
            position: None,
        })
        .unwrap();
    session.tick(DT, &idle());
    let flag = session.match_state().flag(Team::Blue);
    assert_eq!(flag.status, FlagStatus::Carried { carrier });
    assert_eq!(flag.carrier(), Some(carrier));

    endpoint
        .inbound_tx
        .try_send(InboundEvent::FlagUpdate {
            action: FlagAction::Capture,
            team: Team::Blue,
            carrier_id: Some(carrier),
            position: None,
        })
        .unwrap();
    session.tick(DT, &idle());
    let state = session.match_state();
    assert_eq!(state.scores.red, 1);
    assert_eq!(state.scores.blue, 0);
    assert_eq!(state.flag(Team::Blue).status, FlagStatus::Home);
}

#[test]
fn teardown_reports_result_and_stops_ticking() {
    let mut session = offline(GameMode::TeamDeathmatch);
    for _ in 0..30 {
        session.tick(DT, &idle());
    }
    let result = session.teardown();
    assert_eq!(result.kills, 0);
    assert!(session.is_over());
    assert!(session.tick(DT, &idle()).is_empty());
}
