//! Account backend collaborator: loadout fetch and stats submission

pub mod client;
pub mod loadout;
pub mod stats;

pub use client::{BackendClient, BackendError};
pub use loadout::{fetch_loadout, Loadout};
pub use stats::submit_result;
