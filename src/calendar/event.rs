use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ids::{CalendarId, EventId};
use super::null_as_empty;

/// A point in time kept as the server wrote it.
///
/// The cache stores the text verbatim; parsing only happens when an event is
/// placed on a calendar view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

impl Timestamp {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wall-clock time in the local zone, if the text is a recognizable date.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        let raw = self.0.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Local).naive_local());
        }

        for format in NAIVE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(dt);
            }
        }

        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }
}

impl From<&str> for Timestamp {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of event. The server stores the category as free text, so values this
/// client does not know are carried through as `Other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum EventCategory {
    #[default]
    Reminder,
    Task,
    Arrangement,
    Other(String),
}

impl EventCategory {
    pub fn as_str(&self) -> &str {
        match self {
            EventCategory::Reminder => "reminder",
            EventCategory::Task => "task",
            EventCategory::Arrangement => "arrangement",
            EventCategory::Other(raw) => raw.as_str(),
        }
    }

    /// Spelling used on the wire. The create-event form has always sent
    /// `arrangment`, so that is what the server stores.
    pub fn wire_name(&self) -> &str {
        match self {
            EventCategory::Arrangement => "arrangment",
            other => other.as_str(),
        }
    }

    /// Lenient parse for server data: known names in any case, anything else
    /// kept verbatim.
    pub fn from_server(raw: &str) -> Self {
        raw.parse().unwrap_or_else(|_| EventCategory::Other(raw.to_string()))
    }
}

impl FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reminder" => Ok(EventCategory::Reminder),
            "task" => Ok(EventCategory::Task),
            "arrangement" | "arrangment" => Ok(EventCategory::Arrangement),
            other => Err(format!("Unknown category '{}'", other)),
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_name())
    }
}

impl<'de> Deserialize<'de> for EventCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|raw| EventCategory::from_server(&raw)).unwrap_or_default())
    }
}

/// An event as the calendar grid consumes it. This is the only shape that
/// enters the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub background_color: String,
    pub start: Timestamp,
    pub end: Timestamp,
    pub all_day: bool,
}

impl Event {
    pub fn duration_minutes(&self) -> Option<i64> {
        let start = self.start.to_naive()?;
        let end = self.end.to_naive()?;
        Some((end - start).num_minutes())
    }

    /// Half-open overlap with `[from, to)`. Events whose times cannot be
    /// parsed never overlap anything.
    pub fn overlaps(&self, from: NaiveDateTime, to: NaiveDateTime) -> bool {
        match (self.start.to_naive(), self.end.to_naive()) {
            (Some(start), Some(end)) => {
                let end = if end > start { end } else { start + chrono::Duration::seconds(1) };
                start < to && from < end
            }
            _ => false,
        }
    }
}

/// An event as the API returns it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEvent {
    pub id: EventId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default)]
    pub category: EventCategory,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub color: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

impl From<ServerEvent> for Event {
    fn from(raw: ServerEvent) -> Self {
        Event {
            id: raw.id,
            title: raw.name,
            description: raw.description,
            category: raw.category,
            background_color: raw.color,
            start: raw.start_time,
            end: raw.end_time,
            // The grid always lays events out on the time axis.
            all_day: false,
        }
    }
}

/// Body of `POST /events`, shaped like the create-event form fills it in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub background_color: String,
    pub start: Timestamp,
    pub end: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<CalendarId>,
    pub all_day: bool,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, start: impl Into<Timestamp>, end: impl Into<Timestamp>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            category: EventCategory::default(),
            background_color: String::new(),
            start: start.into(),
            end: end.into(),
            calendar_id: None,
            all_day: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: EventCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.background_color = color.into();
        self
    }

    pub fn with_all_day(mut self, all_day: bool) -> Self {
        self.all_day = all_day;
        self
    }

    pub fn for_calendar(mut self, calendar_id: CalendarId) -> Self {
        self.calendar_id = Some(calendar_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn server_event_json(all_day: bool) -> serde_json::Value {
        json!({
            "id": 1,
            "name": "Gym",
            "description": "",
            "category": "task",
            "color": "#ff0000",
            "startTime": "2024-01-01T08:00",
            "endTime": "2024-01-01T09:00",
            "allDay": all_day,
            "calendarId": 5
        })
    }

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{}T{}", date, time), "%Y-%m-%dT%H:%M").unwrap()
    }

    #[test]
    fn normalization_renames_server_fields() {
        let raw: ServerEvent = serde_json::from_value(server_event_json(false)).unwrap();

        let event = Event::from(raw);

        assert_eq!(
            event,
            Event {
                id: EventId(1),
                title: "Gym".to_string(),
                description: String::new(),
                category: EventCategory::Task,
                background_color: "#ff0000".to_string(),
                start: Timestamp::new("2024-01-01T08:00"),
                end: Timestamp::new("2024-01-01T09:00"),
                all_day: false,
            }
        );
    }

    #[test]
    fn normalization_ignores_server_all_day() {
        let raw: ServerEvent = serde_json::from_value(server_event_json(true)).unwrap();

        assert!(!Event::from(raw).all_day);
    }

    #[test]
    fn cached_event_serializes_in_grid_shape() {
        let raw: ServerEvent = serde_json::from_value(server_event_json(false)).unwrap();

        let value = serde_json::to_value(Event::from(raw)).unwrap();

        assert_eq!(
            value,
            json!({
                "id": 1,
                "title": "Gym",
                "description": "",
                "category": "task",
                "backgroundColor": "#ff0000",
                "start": "2024-01-01T08:00",
                "end": "2024-01-01T09:00",
                "allDay": false
            })
        );
    }

    #[test]
    fn null_description_normalizes_to_empty() {
        let mut payload = server_event_json(false);
        payload["description"] = serde_json::Value::Null;

        let raw: ServerEvent = serde_json::from_value(payload).unwrap();

        assert_eq!(raw.description, "");
    }

    #[test]
    fn legacy_arrangement_spelling_is_accepted() {
        let category: EventCategory = serde_json::from_str("\"arrangment\"").unwrap();
        assert_eq!(category, EventCategory::Arrangement);
        assert_eq!("Arrangment".parse::<EventCategory>(), Ok(EventCategory::Arrangement));
    }

    #[test]
    fn unknown_category_is_rejected_from_user_input() {
        assert!("meeting".parse::<EventCategory>().is_err());
    }

    #[test]
    fn server_category_decoding_is_lenient() {
        let decode = |raw: serde_json::Value| serde_json::from_value::<EventCategory>(raw).unwrap();

        assert_eq!(decode(json!("Task")), EventCategory::Task);
        assert_eq!(decode(json!("ARRANGEMENT")), EventCategory::Arrangement);
        assert_eq!(decode(json!("meeting")), EventCategory::Other("meeting".to_string()));
        assert_eq!(decode(json!(null)), EventCategory::Reminder);
    }

    #[test]
    fn unknown_category_round_trips_verbatim() {
        let mut payload = server_event_json(false);
        payload["category"] = json!("Meeting");

        let event = Event::from(serde_json::from_value::<ServerEvent>(payload).unwrap());

        assert_eq!(event.category, EventCategory::Other("Meeting".to_string()));
        assert_eq!(serde_json::to_value(&event).unwrap()["category"], json!("Meeting"));
    }

    #[test]
    fn missing_category_defaults_to_reminder() {
        let mut payload = server_event_json(false);
        payload.as_object_mut().unwrap().remove("category");

        let raw: ServerEvent = serde_json::from_value(payload).unwrap();

        assert_eq!(raw.category, EventCategory::Reminder);
    }

    #[test]
    fn draft_sends_arrangement_in_form_spelling() {
        let draft = EventDraft::new("Dinner", "2024-01-01T19:00", "2024-01-01T21:00")
            .with_category(EventCategory::Arrangement);

        let value = serde_json::to_value(&draft).unwrap();

        assert_eq!(value["category"], json!("arrangment"));
    }

    #[test]
    fn draft_serializes_like_the_form() {
        let draft = EventDraft::new("Gym", "2024-01-01T08:00", "2024-01-01T09:00")
            .with_category(EventCategory::Task)
            .with_color("#ff0000")
            .for_calendar(CalendarId(5));

        assert_eq!(
            serde_json::to_value(&draft).unwrap(),
            json!({
                "title": "Gym",
                "description": "",
                "category": "task",
                "backgroundColor": "#ff0000",
                "start": "2024-01-01T08:00",
                "end": "2024-01-01T09:00",
                "calendarId": 5,
                "allDay": false
            })
        );
    }

    #[test]
    fn draft_without_calendar_omits_the_field() {
        let draft = EventDraft::new("Gym", "2024-01-01T08:00", "2024-01-01T09:00");

        let value = serde_json::to_value(&draft).unwrap();

        assert!(value.get("calendarId").is_none());
    }

    #[test]
    fn timestamp_parses_minute_precision() {
        let ts = Timestamp::new("2024-01-01T08:00");
        assert_eq!(ts.to_naive(), Some(at("2024-01-01", "08:00")));
    }

    #[test]
    fn timestamp_parses_bare_date_as_midnight() {
        let ts = Timestamp::new("2024-03-10");
        assert_eq!(ts.to_naive(), Some(at("2024-03-10", "00:00")));
    }

    #[test]
    fn timestamp_rejects_garbage() {
        assert_eq!(Timestamp::new("tomorrow").to_naive(), None);
    }

    #[test]
    fn event_duration_calculated_correctly() {
        let raw: ServerEvent = serde_json::from_value(server_event_json(false)).unwrap();
        assert_eq!(Event::from(raw).duration_minutes(), Some(60));
    }

    #[test]
    fn event_overlaps_range_containing_it() {
        let raw: ServerEvent = serde_json::from_value(server_event_json(false)).unwrap();
        let event = Event::from(raw);

        assert!(event.overlaps(at("2024-01-01", "00:00"), at("2024-01-02", "00:00")));
    }

    #[test]
    fn event_does_not_overlap_when_adjacent() {
        let raw: ServerEvent = serde_json::from_value(server_event_json(false)).unwrap();
        let event = Event::from(raw);

        assert!(!event.overlaps(at("2024-01-01", "09:00"), at("2024-01-01", "10:00")));
    }

    proptest! {
        #[test]
        fn normalization_preserves_identity_fields(
            id in any::<i64>(),
            name in ".*",
            color in "#[0-9a-f]{6}",
            all_day in any::<bool>(),
        ) {
            let raw: ServerEvent = serde_json::from_value(json!({
                "id": id,
                "name": name.clone(),
                "description": "d",
                "category": "reminder",
                "color": color.clone(),
                "startTime": "2024-01-01T08:00",
                "endTime": "2024-01-01T09:00",
                "allDay": all_day
            })).unwrap();

            let event = Event::from(raw);

            prop_assert_eq!(event.id, EventId(id));
            prop_assert_eq!(event.title, name);
            prop_assert_eq!(event.background_color, color);
            prop_assert!(!event.all_day);
        }
    }
}
