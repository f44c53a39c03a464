use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::calendar::{
    Calendar, CalendarId, Event, EventCategory, EventDraft, EventId, InvitationId, Timestamp,
};
use crate::sync::remote::RemoteAccessor;
use crate::sync::store::{CalendarStore, StoreError};

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("No calendar selected")]
    NoCalendarSelected,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewType {
    Month,
    Week,
    Day,
}

impl FromStr for ViewType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(ViewType::Month),
            "week" => Ok(ViewType::Week),
            "day" => Ok(ViewType::Day),
            other => Err(format!("Unknown view '{}'. Use month, week or day.", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    Idle,
    Synced,
    Error(String),
}

/// Inclusive range of days.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    fn bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let from = self.start.and_hms_opt(0, 0, 0)?;
        let to = self.end.succ_opt()?.and_hms_opt(0, 0, 0)?;
        Some((from, to))
    }
}

/// The span a user dragged across on the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DateSelection {
    pub start: Timestamp,
    pub end: Timestamp,
    pub all_day: bool,
}

/// Fields of the create-event dialog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventForm {
    pub title: String,
    pub description: String,
    pub category: EventCategory,
    pub color: String,
}

impl EventForm {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn to_draft(&self, selection: &DateSelection, calendar_id: CalendarId) -> EventDraft {
        EventDraft::new(self.title.clone(), selection.start.clone(), selection.end.clone())
            .with_description(self.description.clone())
            .with_category(self.category.clone())
            .with_color(self.color.clone())
            .with_all_day(selection.all_day)
            .for_calendar(calendar_id)
    }
}

/// One user's session on the calendar page.
///
/// It never caches anything itself: every read goes through the store, and
/// switching calendars is the only place that triggers a fetch.
pub struct CalendarView<'a, A> {
    store: &'a CalendarStore<A>,
    active_calendar: Option<CalendarId>,
    pub view: ViewType,
    pub selected_date: NaiveDate,
    pub sync_status: SyncStatus,
}

impl<'a, A: RemoteAccessor> CalendarView<'a, A> {
    pub fn new(store: &'a CalendarStore<A>, view: ViewType, selected_date: NaiveDate) -> Self {
        Self {
            store,
            active_calendar: None,
            view,
            selected_date,
            sync_status: SyncStatus::Idle,
        }
    }

    pub fn active_calendar(&self) -> Option<CalendarId> {
        self.active_calendar
    }

    pub async fn switch_calendar(&mut self, calendar_id: CalendarId) -> Result<Vec<Event>, ViewError> {
        self.active_calendar = Some(calendar_id);
        let result = self.store.fetch_calendar_events(calendar_id).await;
        self.track(result)
    }

    pub fn visible_range(&self) -> DateRange {
        let date = self.selected_date;
        match self.view {
            ViewType::Day => DateRange::new(date, date),
            ViewType::Week => DateRange::new(week_start(date), week_end(date)),
            ViewType::Month => {
                let first = date.with_day(1).unwrap_or(date);
                let last = first
                    .checked_add_months(Months::new(1))
                    .and_then(|d| d.pred_opt())
                    .unwrap_or(date);
                DateRange::new(week_start(first), week_end(last))
            }
        }
    }

    /// Events of the active calendar that fall in the visible range, earliest
    /// first.
    pub fn visible_events(&self) -> Vec<Event> {
        let Some(calendar_id) = self.active_calendar else {
            return Vec::new();
        };
        let Some((from, to)) = self.visible_range().bounds() else {
            return Vec::new();
        };

        let mut events: Vec<Event> = self
            .store
            .get_events_by_calendar_id(calendar_id)
            .into_iter()
            .filter(|e| e.overlaps(from, to))
            .collect();
        events.sort_by_key(|e| e.start.to_naive());
        events
    }

    pub fn events_on(&self, date: NaiveDate) -> Vec<Event> {
        let range = DateRange::new(date, date);
        let Some((from, to)) = range.bounds() else {
            return Vec::new();
        };
        self.visible_events()
            .into_iter()
            .filter(|e| e.overlaps(from, to))
            .collect()
    }

    pub fn next_period(&mut self) {
        self.selected_date = self.shift(true).unwrap_or(self.selected_date);
    }

    pub fn previous_period(&mut self) {
        self.selected_date = self.shift(false).unwrap_or(self.selected_date);
    }

    fn shift(&self, forward: bool) -> Option<NaiveDate> {
        let date = self.selected_date;
        match (self.view, forward) {
            (ViewType::Day, true) => date.checked_add_days(Days::new(1)),
            (ViewType::Day, false) => date.checked_sub_days(Days::new(1)),
            (ViewType::Week, true) => date.checked_add_days(Days::new(7)),
            (ViewType::Week, false) => date.checked_sub_days(Days::new(7)),
            (ViewType::Month, true) => date.checked_add_months(Months::new(1)),
            (ViewType::Month, false) => date.checked_sub_months(Months::new(1)),
        }
    }

    pub async fn create_from_selection(
        &mut self,
        selection: &DateSelection,
        form: &EventForm,
    ) -> Result<Event, ViewError> {
        let calendar_id = self.require_calendar()?;
        let draft = form.to_draft(selection, calendar_id);
        let result = self.store.create_event(&draft, calendar_id).await;
        self.track(result)
    }

    pub async fn delete_event(&mut self, event_id: EventId) -> Result<(), ViewError> {
        let calendar_id = self.require_calendar()?;
        let result = self.store.delete_event(event_id, calendar_id).await;
        self.track(result)
    }

    /// Accepting does not bring the shared calendar into the cache, so this
    /// follows up with a calendar refresh. The two calls are not atomic: if
    /// the refresh fails the invitation is already gone.
    pub async fn accept_and_refresh(&mut self, invitation_id: InvitationId) -> Result<Vec<Calendar>, ViewError> {
        let accepted = self.store.accept_invitation(invitation_id).await;
        self.track(accepted)?;
        let refreshed = self.store.fetch_calendars().await;
        self.track(refreshed)
    }

    fn require_calendar(&mut self) -> Result<CalendarId, ViewError> {
        match self.active_calendar {
            Some(id) => Ok(id),
            None => {
                let error = ViewError::NoCalendarSelected;
                self.sync_status = SyncStatus::Error(error.to_string());
                Err(error)
            }
        }
    }

    fn track<T>(&mut self, result: Result<T, StoreError>) -> Result<T, ViewError> {
        self.sync_status = match &result {
            Ok(_) => SyncStatus::Synced,
            Err(e) => SyncStatus::Error(e.to_string()),
        };
        result.map_err(ViewError::from)
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

fn week_end(date: NaiveDate) -> NaiveDate {
    let offset = 6 - date.weekday().num_days_from_monday() as u64;
    date.checked_add_days(Days::new(offset)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::remote::{ApiError, ApiResponse, MockRemoteAccessor};
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn server_event(id: i64, start: &str, end: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": format!("Event {}", id),
            "description": "",
            "category": "reminder",
            "color": "#33b679",
            "startTime": start,
            "endTime": end
        })
    }

    fn january_events() -> MockRemoteAccessor {
        let mut remote = MockRemoteAccessor::new();
        remote
            .expect_get()
            .with(eq("/events/5"))
            .returning(|_| {
                Ok(ApiResponse::ok(json!([
                    server_event(1, "2025-01-16T14:00", "2025-01-16T15:00"),
                    server_event(2, "2025-01-15T09:00", "2025-01-15T10:00"),
                    server_event(3, "2025-02-20T09:00", "2025-02-20T10:00"),
                    server_event(4, "not a date", "not a date")
                ])))
            });
        remote
    }

    #[test]
    fn date_range_calculates_days() {
        let range = DateRange::new(date(2025, 1, 1), date(2025, 1, 8));

        assert_eq!(range.days(), 7);
    }

    #[test]
    fn view_type_parses_case_insensitively() {
        assert_eq!("Week".parse::<ViewType>(), Ok(ViewType::Week));
        assert!("year".parse::<ViewType>().is_err());
    }

    #[test]
    fn week_range_runs_monday_to_sunday() {
        let store = CalendarStore::new(MockRemoteAccessor::new());
        let view = CalendarView::new(&store, ViewType::Week, date(2025, 1, 15));

        assert_eq!(view.visible_range(), DateRange::new(date(2025, 1, 13), date(2025, 1, 19)));
    }

    #[test]
    fn month_range_covers_whole_weeks() {
        let store = CalendarStore::new(MockRemoteAccessor::new());
        let view = CalendarView::new(&store, ViewType::Month, date(2025, 1, 15));

        let range = view.visible_range();

        assert_eq!(range, DateRange::new(date(2024, 12, 30), date(2025, 2, 2)));
        assert!(range.contains(date(2025, 1, 31)));
    }

    #[test]
    fn day_range_is_single_day() {
        let store = CalendarStore::new(MockRemoteAccessor::new());
        let view = CalendarView::new(&store, ViewType::Day, date(2025, 1, 15));

        assert_eq!(view.visible_range().days(), 0);
    }

    #[test]
    fn month_navigation_moves_by_month() {
        let store = CalendarStore::new(MockRemoteAccessor::new());
        let mut view = CalendarView::new(&store, ViewType::Month, date(2025, 1, 31));

        view.next_period();
        assert_eq!(view.selected_date, date(2025, 2, 28));

        view.previous_period();
        assert_eq!(view.selected_date, date(2025, 1, 28));
    }

    #[test]
    fn no_active_calendar_shows_nothing() {
        let store = CalendarStore::new(MockRemoteAccessor::new());
        let view = CalendarView::new(&store, ViewType::Month, date(2025, 1, 15));

        assert!(view.visible_events().is_empty());
    }

    #[tokio::test]
    async fn switching_calendar_fetches_its_events() {
        let store = CalendarStore::new(january_events());
        let mut view = CalendarView::new(&store, ViewType::Month, date(2025, 1, 15));

        let fetched = view.switch_calendar(CalendarId(5)).await.unwrap();

        assert_eq!(fetched.len(), 4);
        assert_eq!(view.active_calendar(), Some(CalendarId(5)));
        assert_eq!(view.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn visible_events_are_in_range_and_sorted() {
        let store = CalendarStore::new(january_events());
        let mut view = CalendarView::new(&store, ViewType::Month, date(2025, 1, 15));
        view.switch_calendar(CalendarId(5)).await.unwrap();

        let ids: Vec<_> = view.visible_events().iter().map(|e| e.id).collect();

        assert_eq!(ids, vec![EventId(2), EventId(1)]);
    }

    #[tokio::test]
    async fn events_on_filters_to_one_day() {
        let store = CalendarStore::new(january_events());
        let mut view = CalendarView::new(&store, ViewType::Week, date(2025, 1, 15));
        view.switch_calendar(CalendarId(5)).await.unwrap();

        let ids: Vec<_> = view.events_on(date(2025, 1, 16)).iter().map(|e| e.id).collect();

        assert_eq!(ids, vec![EventId(1)]);
    }

    #[tokio::test]
    async fn failed_switch_records_error_status() {
        let mut remote = MockRemoteAccessor::new();
        remote
            .expect_get()
            .returning(|_| Err(ApiError::AuthenticationFailed));
        let store = CalendarStore::new(remote);
        let mut view = CalendarView::new(&store, ViewType::Month, date(2025, 1, 15));

        let result = view.switch_calendar(CalendarId(5)).await;

        assert!(result.is_err());
        assert!(matches!(view.sync_status, SyncStatus::Error(_)));
    }

    #[test]
    fn form_and_selection_build_draft() {
        let selection = DateSelection {
            start: Timestamp::new("2025-01-15"),
            end: Timestamp::new("2025-01-16"),
            all_day: true,
        };
        let form = EventForm {
            title: "Offsite".to_string(),
            description: "Whole team".to_string(),
            category: EventCategory::Arrangement,
            color: "#e67c73".to_string(),
        };

        let draft = form.to_draft(&selection, CalendarId(5));

        assert_eq!(
            serde_json::to_value(&draft).unwrap(),
            json!({
                "title": "Offsite",
                "description": "Whole team",
                "category": "arrangment",
                "backgroundColor": "#e67c73",
                "start": "2025-01-15",
                "end": "2025-01-16",
                "calendarId": 5,
                "allDay": true
            })
        );
    }

    #[test]
    fn new_form_defaults_to_reminder() {
        assert_eq!(EventForm::new("Call mom").category, EventCategory::Reminder);
    }

    #[tokio::test]
    async fn create_without_calendar_is_rejected_locally() {
        let store = CalendarStore::new(MockRemoteAccessor::new());
        let mut view = CalendarView::new(&store, ViewType::Month, date(2025, 1, 15));
        let selection = DateSelection {
            start: Timestamp::new("2025-01-15T09:00"),
            end: Timestamp::new("2025-01-15T10:00"),
            all_day: false,
        };

        let result = view.create_from_selection(&selection, &EventForm::new("Gym")).await;

        assert!(matches!(result, Err(ViewError::NoCalendarSelected)));
        assert_eq!(view.sync_status, SyncStatus::Error("No calendar selected".to_string()));
    }

    #[tokio::test]
    async fn deleting_removes_event_from_the_view() {
        let mut remote = january_events();
        remote
            .expect_delete()
            .with(eq("/events/2"), eq(Some(json!({"calendarId": 5}))))
            .times(1)
            .returning(|_, _| Ok(ApiResponse::ok(json!({"deleted": true}))));
        let store = CalendarStore::new(remote);
        let mut view = CalendarView::new(&store, ViewType::Day, date(2025, 1, 15));
        view.switch_calendar(CalendarId(5)).await.unwrap();
        assert_eq!(view.visible_events().len(), 1);

        view.delete_event(EventId(2)).await.unwrap();

        assert!(view.visible_events().is_empty());
        assert_eq!(view.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn reported_delete_keeps_event_and_records_error() {
        let mut remote = january_events();
        remote
            .expect_delete()
            .returning(|_, _| Ok(ApiResponse::new(204, serde_json::Value::Null)));
        let store = CalendarStore::new(remote);
        let mut view = CalendarView::new(&store, ViewType::Day, date(2025, 1, 15));
        view.switch_calendar(CalendarId(5)).await.unwrap();

        let result = view.delete_event(EventId(2)).await;

        assert!(matches!(result, Err(ViewError::Store(StoreError::Reported { status: 204, .. }))));
        assert_eq!(view.visible_events().len(), 1);
        assert!(matches!(view.sync_status, SyncStatus::Error(_)));
    }

    #[tokio::test]
    async fn delete_without_calendar_is_rejected_locally() {
        let store = CalendarStore::new(MockRemoteAccessor::new());
        let mut view = CalendarView::new(&store, ViewType::Day, date(2025, 1, 15));

        let result = view.delete_event(EventId(2)).await;

        assert!(matches!(result, Err(ViewError::NoCalendarSelected)));
    }

    #[tokio::test]
    async fn accept_and_refresh_reloads_calendars() {
        let mut remote = MockRemoteAccessor::new();
        remote
            .expect_post()
            .with(eq("/invitation/accept"), eq(Some(json!({"invitationId": 10}))))
            .times(1)
            .returning(|_, _| Ok(ApiResponse::ok(serde_json::Value::Null)));
        remote
            .expect_get()
            .with(eq("/calendars/user"))
            .times(1)
            .returning(|_| {
                Ok(ApiResponse::ok(json!([
                    {"id": 3, "name": "Team", "description": "", "color": "#1a73e8"}
                ])))
            });
        let store = CalendarStore::new(remote);
        let mut view = CalendarView::new(&store, ViewType::Month, date(2025, 1, 15));

        let calendars = view.accept_and_refresh(InvitationId(10)).await.unwrap();

        assert_eq!(calendars.len(), 1);
        assert!(store.get_calendar_by_id(CalendarId(3)).is_some());
    }
}
