//! Application state shared by the headless host

use std::sync::Arc;

use crate::backend::{BackendClient, Loadout};
use crate::config::Config;
use crate::game::{GameSession, SessionBuilder, SessionError, Team};
use crate::net::{RealtimeLink, SyncConfig};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Option<BackendClient>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Backend is optional; without it loadout and stats fall back locally
        let backend = BackendClient::from_config(&config);

        Self { config, backend }
    }

    /// Team for team modes, derived from the player id so peers split evenly
    pub fn local_team(&self) -> Option<Team> {
        if !self.config.game_mode.is_team_mode() {
            return None;
        }
        if self.config.player_id.as_bytes()[15] % 2 == 0 {
            Some(Team::Red)
        } else {
            Some(Team::Blue)
        }
    }

    /// Build the session over the built-in arena
    pub fn build_session(
        &self,
        loadout: &Loadout,
        link: Option<RealtimeLink>,
    ) -> Result<GameSession, SessionError> {
        let config = &self.config;
        let mut builder = SessionBuilder::standard(config.player_id)
            .mode(config.game_mode)
            .team(self.local_team())
            .seed(config.sim_seed)
            .loadout(loadout.weapons())
            .sync_config(SyncConfig {
                pose_send_hz: config.pose_send_hz,
                ..SyncConfig::default()
            });
        if let (Some(link), Some(match_id)) = (link, config.match_id) {
            builder = builder.realtime(link, match_id);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameMode;

    fn config(mode: GameMode) -> Config {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.game_mode = mode;
        config
    }

    #[test]
    fn wave_mode_has_no_team() {
        let state = AppState::new(config(GameMode::Waves));
        assert_eq!(state.local_team(), None);
        assert!(state.backend.is_none());
    }

    #[test]
    fn session_uses_loadout() {
        let state = AppState::new(config(GameMode::TeamDeathmatch));
        let loadout = Loadout::default();
        let session = state.build_session(&loadout, None).unwrap();
        assert_eq!(session.combat().slots().len(), 2);
        assert!(session.player().team.is_some());
        assert!(!session.sync().is_online());
    }
}
