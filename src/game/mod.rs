//! Game simulation modules

pub mod combat;
pub mod enemies;
pub mod events;
pub mod r#match;
pub mod physics;
pub mod pickups;
pub mod player;
pub mod projectile;
pub mod session;
pub mod stats;
pub mod waves;
pub mod weapons;

pub use events::{EventQueue, EventSubscriber, SimEvent};
pub use r#match::{GameMode, MatchResult, MatchState, Team};
pub use player::PlayerState;
pub use session::{GameSession, SessionBuilder, SessionError};

use physics::MoveIntent;
use r#match::FlagAction;

/// A flag interaction requested by the local player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagRequest {
    pub action: FlagAction,
    /// Team that owns the flag
    pub team: Team,
}

/// Input state for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub movement: MoveIntent,
    /// Absolute view angles in radians
    pub yaw: f32,
    pub pitch: f32,
    /// Trigger held this tick
    pub fire: bool,
    pub reload: bool,
    /// Weapon slot to switch to
    pub switch_to: Option<usize>,
    pub toggle_weapon: bool,
    pub throw_grenade: bool,
    pub flag: Option<FlagRequest>,
}
