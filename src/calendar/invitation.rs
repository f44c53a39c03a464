use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::InvitationId;

/// A pending invitation to a shared calendar.
///
/// Only the id is interpreted; sender, recipient and calendar details are kept
/// as the server sent them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub invitation_id: InvitationId,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Invitation {
    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }
}
