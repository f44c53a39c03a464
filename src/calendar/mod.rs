pub mod calendar_type;
pub mod event;
pub mod ids;
pub mod invitation;

pub use calendar_type::{Calendar, NewCalendar};
pub use event::{Event, EventCategory, EventDraft, ServerEvent, Timestamp};
pub use ids::{CalendarId, EventId, IdError, InvitationId};
pub use invitation::Invitation;

use serde::{Deserialize, Deserializer};

/// Reads a JSON `null` as an empty string.
pub(crate) fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
