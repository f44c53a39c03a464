//! REST paths, relative to the configured base URL.

use crate::calendar::{CalendarId, EventId};

pub const USER_CALENDARS: &str = "/calendars/user";
pub const CALENDARS: &str = "/calendars";
pub const EVENTS: &str = "/events";
pub const INVITATION: &str = "/invitation";
pub const INCOMING_INVITATIONS: &str = "/invitation/user-ingoing";
pub const ACCEPT_INVITATION: &str = "/invitation/accept";
pub const DECLINE_INVITATION: &str = "/invitation/decline";

pub fn calendar(id: CalendarId) -> String {
    format!("{}/{}", CALENDARS, id)
}

pub fn leave_calendar(id: CalendarId) -> String {
    format!("{}/leave/{}", CALENDARS, id)
}

pub fn calendar_events(id: CalendarId) -> String {
    format!("{}/{}", EVENTS, id)
}

pub fn event(id: EventId) -> String {
    format!("{}/{}", EVENTS, id)
}
