//! Arena headless host
//!
//! Runs a single session of the simulation without a renderer:
//! - Fetches the equipped loadout from the account backend
//! - Bridges the realtime channel over stdin/stdout when a match id is set
//! - Drives the local player with the autopilot at the simulation tick rate
//! - Submits the match result on exit

use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_core::app::AppState;
use arena_core::backend::{fetch_loadout, submit_result};
use arena_core::bot::Autopilot;
use arena_core::config::{Config, LogFormat};
use arena_core::game::{GameSession, MatchResult, SimEvent};
use arena_core::net::bridge::{spawn_stdio_bridge, InboundRateLimiter};
use arena_core::net::RealtimeLink;
use arena_core::util::time::{unix_millis, Timer, SIMULATION_TPS, TICK_DURATION_MICROS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    info!("Starting arena headless host");
    info!(
        player_id = %config.player_id,
        mode = %config.game_mode,
        match_id = ?config.match_id,
        "Session configuration"
    );

    let state = AppState::new(config);
    let loadout = fetch_loadout(state.backend.as_ref()).await;

    // Realtime channel only when joining a shared match
    let link = if state.config.match_id.is_some() {
        let (link, endpoint) = RealtimeLink::pair();
        spawn_stdio_bridge(endpoint, InboundRateLimiter::default());
        Some(link)
    } else {
        None
    };

    let mut session = state.build_session(&loadout, link)?;
    let started_at = unix_millis();

    let result = run(&mut session, &state.config).await;

    info!(
        kills = result.kills,
        score = result.score,
        time_played = result.time_played,
        won = result.won,
        wall_ms = unix_millis().saturating_sub(started_at),
        "Session finished"
    );

    if let Some(level) = submit_result(state.backend.as_ref(), &result).await {
        info!(level, "New level reached");
    }

    info!("Host shutdown complete");
    Ok(())
}

/// Drive the session at the simulation tick rate until it ends
async fn run(session: &mut GameSession, config: &Config) -> MatchResult {
    let tick_duration = Duration::from_micros(TICK_DURATION_MICROS);
    let mut tick_interval = interval(tick_duration);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut autopilot = Autopilot::new(config.sim_seed.wrapping_add(1));
    let limit = Duration::from_secs(config.session_secs);
    let started = Instant::now();
    let mut last = Instant::now();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!(tps = SIMULATION_TPS, "Simulation started");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tick_interval.tick() => {}
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;

        let timer = Timer::new();
        let input = autopilot.next_input(session, dt);
        let events = session.tick(dt, &input);
        log_events(&events);

        let cost = timer.elapsed_micros();
        if cost > TICK_DURATION_MICROS {
            warn!(tick = session.ticks(), cost_us = cost, "Tick over budget");
        }

        if session.is_over() {
            info!("Match over");
            break;
        }
        if limit > Duration::ZERO && started.elapsed() >= limit {
            info!(secs = config.session_secs, "Session time limit reached");
            break;
        }
    }

    session.teardown()
}

/// Host-side logging for events no component reports itself
fn log_events(events: &[SimEvent]) {
    for event in events {
        if let SimEvent::ScoreUpdated { red, blue } = event {
            info!(red, blue, "Score updated");
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    // stdout carries the realtime channel, so logs go to stderr
    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping session");
        }
        _ = terminate => {
            info!("Received terminate signal, stopping session");
        }
    }
}
