//! Match-result submission

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::game::MatchResult;

use super::client::BackendClient;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(default)]
    pub new_level: Option<u32>,
}

/// Submit the result. Failures are non-fatal and only logged at debug.
/// Returns the new level when the backend reports one.
pub async fn submit_result(client: Option<&BackendClient>, result: &MatchResult) -> Option<u32> {
    let client = client?;
    match client.post::<_, StatsResponse>("stats", result).await {
        Ok(response) => {
            if let Some(level) = response.new_level {
                info!(level, "Level up");
            }
            response.new_level
        }
        Err(e) => {
            debug!(error = %e, "Stats submission dropped");
            None
        }
    }
}
