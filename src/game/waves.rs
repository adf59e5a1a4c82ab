//! Wave composition and the intermission cycle between waves

use tracing::{debug, info};

use crate::util::time::Countdown;

use super::enemies::EnemyKind;

/// Delay before the first wave of a session
pub const FIRST_WAVE_DELAY: f32 = 3.0;
/// Pause between clearing a wave and spawning the next
pub const WAVE_INTERMISSION: f32 = 5.0;

/// Scripted opening waves; later waves use [`WavePlan::procedural`]
const SCRIPTED: &[&[(EnemyKind, u32)]] = &[
    &[(EnemyKind::Grunt, 3)],
    &[(EnemyKind::Grunt, 4), (EnemyKind::Rusher, 2)],
    &[
        (EnemyKind::Grunt, 4),
        (EnemyKind::Rusher, 2),
        (EnemyKind::Sharpshooter, 1),
    ],
    &[
        (EnemyKind::Grunt, 5),
        (EnemyKind::Rusher, 3),
        (EnemyKind::Sharpshooter, 2),
        (EnemyKind::Bulwark, 1),
    ],
    &[
        (EnemyKind::Grunt, 5),
        (EnemyKind::Rusher, 3),
        (EnemyKind::Sharpshooter, 2),
        (EnemyKind::Bulwark, 1),
        (EnemyKind::Brute, 1),
    ],
];

/// Enemy counts for one wave
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavePlan {
    pub wave: u32,
    pub entries: Vec<(EnemyKind, u32)>,
}

impl WavePlan {
    pub fn for_wave(wave: u32) -> Self {
        let wave = wave.max(1);
        match SCRIPTED.get(wave as usize - 1) {
            Some(entries) => Self {
                wave,
                entries: entries.to_vec(),
            },
            None => Self::procedural(wave),
        }
    }

    /// Counts scale roughly linearly with the wave number
    pub fn procedural(wave: u32) -> Self {
        let entries = [
            (EnemyKind::Grunt, 2 + wave),
            (EnemyKind::Rusher, 1 + wave / 2),
            (EnemyKind::Sharpshooter, wave / 3),
            (EnemyKind::Bulwark, wave / 4),
            (EnemyKind::Brute, wave / 5),
        ]
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .collect();
        Self { wave, entries }
    }

    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, n)| *n as usize).sum()
    }

    /// Every enemy of the wave, in spawn order
    pub fn kinds(&self) -> impl Iterator<Item = EnemyKind> + '_ {
        self.entries
            .iter()
            .flat_map(|(kind, n)| std::iter::repeat(*kind).take(*n as usize))
    }
}

/// Drives the wave-start delay and the intermission between waves
#[derive(Debug, Clone)]
pub struct WaveCycle {
    wave: u32,
    intermission: Option<Countdown>,
    in_progress: bool,
    cancelled: bool,
}

impl WaveCycle {
    pub fn new(start_delay: f32) -> Self {
        Self {
            wave: 0,
            intermission: Some(Countdown::new(start_delay)),
            in_progress: false,
            cancelled: false,
        }
    }

    pub fn wave(&self) -> u32 {
        self.wave
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn is_pending(&self) -> bool {
        self.intermission.is_some()
    }

    pub fn time_until_next(&self) -> Option<f32> {
        self.intermission.map(|c| c.remaining())
    }

    /// Advance the intermission. Returns the wave number to spawn when it elapses.
    pub fn tick(&mut self, dt: f32) -> Option<u32> {
        let timer = self.intermission.as_mut()?;
        if !timer.tick(dt) {
            return None;
        }
        self.intermission = None;
        self.wave += 1;
        self.in_progress = true;
        Some(self.wave)
    }

    /// Report how many enemies remain. Returns the cleared wave number once,
    /// and schedules the next wave.
    pub fn on_remaining(&mut self, remaining: usize) -> Option<u32> {
        if !self.in_progress || remaining > 0 || self.cancelled {
            return None;
        }
        self.in_progress = false;
        self.intermission = Some(Countdown::new(WAVE_INTERMISSION));
        info!(wave = self.wave, next_in = WAVE_INTERMISSION, "Wave cleared");
        Some(self.wave)
    }

    /// Drop any pending wave start; used on teardown
    pub fn cancel(&mut self) {
        if self.intermission.take().is_some() {
            debug!(wave = self.wave, "Pending wave start cancelled");
        }
        self.in_progress = false;
        self.cancelled = true;
    }
}
