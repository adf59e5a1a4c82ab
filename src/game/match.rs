//! Match state: mode, teams, flags and scoring
//!
//! Mutated only through explicit scoring and flag events delivered in the
//! dispatch phase, never by physics.

use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::events::{EventSubscriber, SimEvent};

/// Score awarded for killing a remote player
pub const PLAYER_KILL_SCORE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn opponent(self) -> Self {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Waves,
    TeamDeathmatch,
    CaptureTheFlag,
}

impl GameMode {
    pub fn is_team_mode(self) -> bool {
        !matches!(self, GameMode::Waves)
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameMode::Waves => "waves",
            GameMode::TeamDeathmatch => "team_deathmatch",
            GameMode::CaptureTheFlag => "capture_the_flag",
        };
        f.write_str(name)
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "waves" | "wave" => Ok(GameMode::Waves),
            "team_deathmatch" | "tdm" => Ok(GameMode::TeamDeathmatch),
            "capture_the_flag" | "ctf" => Ok(GameMode::CaptureTheFlag),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagAction {
    Pickup,
    Drop,
    Capture,
    Return,
}

/// Where a flag is. The carrier exists only while carried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlagStatus {
    Home,
    Carried { carrier: Uuid },
    Dropped { position: Vec3 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flag {
    pub team: Team,
    pub home: Vec3,
    pub status: FlagStatus,
}

impl Flag {
    pub fn new(team: Team, home: Vec3) -> Self {
        Self {
            team,
            home,
            status: FlagStatus::Home,
        }
    }

    pub fn carrier(&self) -> Option<Uuid> {
        match self.status {
            FlagStatus::Carried { carrier } => Some(carrier),
            _ => None,
        }
    }

    /// Resting position; `None` while carried
    pub fn position(&self) -> Option<Vec3> {
        match self.status {
            FlagStatus::Home => Some(self.home),
            FlagStatus::Dropped { position } => Some(position),
            FlagStatus::Carried { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamScores {
    pub red: u32,
    pub blue: u32,
}

impl TeamScores {
    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::Red => self.red,
            Team::Blue => self.blue,
        }
    }

    fn add(&mut self, team: Team, amount: u32) {
        match team {
            Team::Red => self.red += amount,
            Team::Blue => self.blue += amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    InProgress,
    Ended,
}

/// Payload submitted to the stats backend at session end
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub kills: u32,
    pub score: u32,
    /// Seconds
    pub time_played: u64,
    pub won: bool,
}

/// Flag home positions in the built-in arena
pub const RED_FLAG_HOME: Vec3 = Vec3::new(0.0, 0.0, 26.0);
pub const BLUE_FLAG_HOME: Vec3 = Vec3::new(0.0, 0.0, -26.0);

#[derive(Debug, Clone)]
pub struct MatchState {
    pub mode: GameMode,
    pub local_id: Uuid,
    pub local_team: Option<Team>,
    pub phase: MatchPhase,
    pub scores: TeamScores,
    pub flags: [Flag; 2],
    pub wave: u32,
    pub kills: u32,
    pub deaths: u32,
    pub score: u32,
    pub time_played: f32,
    pub winner: Option<Team>,
    survived: bool,
}

impl MatchState {
    pub fn new(mode: GameMode, local_id: Uuid, local_team: Option<Team>) -> Self {
        Self {
            mode,
            local_id,
            local_team,
            phase: MatchPhase::InProgress,
            scores: TeamScores::default(),
            flags: [
                Flag::new(Team::Red, RED_FLAG_HOME),
                Flag::new(Team::Blue, BLUE_FLAG_HOME),
            ],
            wave: 0,
            kills: 0,
            deaths: 0,
            score: 0,
            time_played: 0.0,
            winner: None,
            survived: true,
        }
    }

    pub fn flag(&self, team: Team) -> &Flag {
        &self.flags[team as usize]
    }

    pub fn is_ended(&self) -> bool {
        self.phase == MatchPhase::Ended
    }

    pub fn advance(&mut self, dt: f32) {
        if self.phase == MatchPhase::InProgress {
            self.time_played += dt;
        }
    }

    /// Apply a flag transition for `team`'s flag. Invalid transitions are
    /// rejected and leave the flag untouched.
    pub fn apply_flag_event(
        &mut self,
        team: Team,
        action: FlagAction,
        carrier: Option<Uuid>,
        position: Option<Vec3>,
    ) -> bool {
        let flag = &mut self.flags[team as usize];
        let next = match (action, flag.status) {
            (FlagAction::Pickup, FlagStatus::Home | FlagStatus::Dropped { .. }) => match carrier {
                Some(carrier) => FlagStatus::Carried { carrier },
                None => return false,
            },
            (FlagAction::Drop, FlagStatus::Carried { .. }) => FlagStatus::Dropped {
                position: position.unwrap_or(flag.home),
            },
            (FlagAction::Capture, FlagStatus::Carried { .. }) => {
                self.scores.add(team.opponent(), 1);
                FlagStatus::Home
            }
            (FlagAction::Return, FlagStatus::Dropped { .. } | FlagStatus::Carried { .. }) => {
                FlagStatus::Home
            }
            (action, status) => {
                warn!(?team, ?action, ?status, "Rejected flag transition");
                return false;
            }
        };
        flag.status = next;
        debug!(?team, ?action, "Flag updated");
        true
    }

    /// Close the match; `survived` decides a wave-mode win
    pub fn end(&mut self, survived: bool) {
        if self.phase == MatchPhase::Ended {
            return;
        }
        self.phase = MatchPhase::Ended;
        self.survived = survived;
        info!(
            mode = %self.mode,
            kills = self.kills,
            score = self.score,
            wave = self.wave,
            "Match ended"
        );
    }

    pub fn result(&self) -> MatchResult {
        let won = match (self.mode, self.local_team) {
            (GameMode::Waves, _) => self.survived && self.wave > 0,
            (_, Some(team)) => match self.winner {
                Some(winner) => winner == team,
                None => self.scores.get(team) > self.scores.get(team.opponent()),
            },
            (_, None) => false,
        };
        MatchResult {
            kills: self.kills,
            score: self.score,
            time_played: self.time_played.max(0.0) as u64,
            won,
        }
    }
}

impl EventSubscriber for MatchState {
    fn on_event(&mut self, event: &SimEvent) {
        match event {
            SimEvent::EnemyKilled { score, .. } => {
                self.kills += 1;
                self.score += score;
            }
            SimEvent::RemoteKilled {
                attacker: Some(attacker),
                ..
            } if *attacker == self.local_id => {
                self.kills += 1;
                self.score += PLAYER_KILL_SCORE;
            }
            SimEvent::PlayerDied { .. } => self.deaths += 1,
            SimEvent::WaveStarted { wave, .. } => self.wave = *wave,
            SimEvent::FlagUpdated {
                action,
                team,
                carrier,
                position,
            } => {
                self.apply_flag_event(*team, *action, *carrier, *position);
            }
            SimEvent::ScoreUpdated { red, blue } => {
                self.scores = TeamScores {
                    red: *red,
                    blue: *blue,
                };
            }
            SimEvent::MatchEnded { winner } => {
                self.winner = *winner;
                self.end(true);
            }
            _ => {}
        }
    }
}
