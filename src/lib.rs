//! Arena Core - real-time simulation core for a first-person arena shooter
//!
//! The crate owns everything that happens inside a match:
//! - Movement and collision against static arena geometry
//! - Weapons, hitscan and projectile combat
//! - Enemy waves and the AI director
//! - Team modes, flags and scoring
//! - Synchronisation with remote peers over a realtime channel
//!
//! Rendering, audio and input capture live in the host; it feeds a
//! [`game::TickInput`] per frame and consumes the returned events.

pub mod app;
pub mod backend;
pub mod bot;
pub mod config;
pub mod game;
pub mod net;
pub mod util;
pub mod world;
