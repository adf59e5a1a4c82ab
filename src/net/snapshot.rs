//! Local pose broadcast pacing

use crate::game::player::PlayerState;

use super::protocol::{OutboundEvent, Rotation};

/// Limits local pose broadcasts to a fixed maximum rate
#[derive(Debug, Clone)]
pub struct PoseBroadcaster {
    /// Seconds since the last broadcast
    since_last: f32,
    /// Minimum seconds between broadcasts
    interval: f32,
    sent: u64,
}

impl PoseBroadcaster {
    pub fn new(max_hz: u32) -> Self {
        let interval = 1.0 / max_hz.max(1) as f32;
        Self {
            // First pose goes out on the first tick
            since_last: interval,
            interval,
            sent: 0,
        }
    }

    /// Check if it's time to send a pose
    pub fn should_send(&mut self, dt: f32) -> bool {
        self.since_last += dt;
        if self.since_last >= self.interval {
            // Keep the remainder so the rate holds, but never bank more than one send
            self.since_last = (self.since_last - self.interval).min(self.interval);
            self.sent += 1;
            true
        } else {
            false
        }
    }

    /// Force a broadcast on the next check (respawn, teleport)
    pub fn force_next(&mut self) {
        self.since_last = self.interval;
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn build(player: &PlayerState) -> OutboundEvent {
        OutboundEvent::PlayerUpdate {
            position: player.position,
            rotation: Rotation {
                yaw: player.yaw,
                pitch: player.pitch,
            },
            velocity: player.velocity,
            is_sprinting: player.flags.sprinting,
            is_grounded: player.flags.on_ground,
        }
    }
}
