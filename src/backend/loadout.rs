//! Loadout fetch: the equipped weapons for the local player

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::game::weapons::WeaponKind;

use super::client::BackendClient;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquippedSlots {
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub secondary: Option<String>,
}

/// Response of the loadout endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadoutResponse {
    #[serde(default)]
    pub currency: u64,
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub equipped: EquippedSlots,
}

/// Weapons the session starts with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loadout {
    pub primary: WeaponKind,
    pub secondary: WeaponKind,
}

impl Default for Loadout {
    fn default() -> Self {
        Self {
            primary: WeaponKind::AssaultRifle,
            secondary: WeaponKind::Pistol,
        }
    }
}

impl Loadout {
    /// Map equipped item ids to weapons. Unknown or missing slots keep their default.
    pub fn from_response(response: &LoadoutResponse) -> Self {
        let defaults = Self::default();
        let resolve = |slot: &Option<String>, fallback: WeaponKind| {
            match slot.as_deref() {
                Some(item) => WeaponKind::from_item_id(item).unwrap_or_else(|| {
                    warn!(item, "Unknown equipped item, using default");
                    fallback
                }),
                None => fallback,
            }
        };
        Self {
            primary: resolve(&response.equipped.primary, defaults.primary),
            secondary: resolve(&response.equipped.secondary, defaults.secondary),
        }
    }

    /// Weapon slots in switch order
    pub fn weapons(&self) -> Vec<WeaponKind> {
        let mut weapons = vec![self.primary];
        if self.secondary != self.primary {
            weapons.push(self.secondary);
        }
        weapons
    }
}

/// Fetch the loadout. Any failure is logged and the default loadout is used.
pub async fn fetch_loadout(client: Option<&BackendClient>) -> Loadout {
    let Some(client) = client else {
        info!("No backend configured, using default loadout");
        return Loadout::default();
    };
    match client.get::<LoadoutResponse>("loadout").await {
        Ok(response) => {
            let loadout = Loadout::from_response(&response);
            info!(
                primary = ?loadout.primary,
                secondary = ?loadout.secondary,
                currency = response.currency,
                "Loadout fetched"
            );
            loadout
        }
        Err(e) => {
            warn!(error = %e, "Loadout fetch failed, using default loadout");
            Loadout::default()
        }
    }
}
