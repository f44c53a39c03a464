use serde::{Deserialize, Serialize};

use super::ids::CalendarId;
use super::null_as_empty;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: CalendarId,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub color: String,
}

/// Body of `POST /calendars`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCalendar {
    pub name: String,
    pub description: String,
    pub color: String,
}

impl NewCalendar {
    pub fn new(name: impl Into<String>, description: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            color: color.into(),
        }
    }
}
