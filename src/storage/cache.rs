//! In-memory, normalized view of the server's calendar state.
//!
//! `CacheState` only knows how to patch itself. It never talks to the network;
//! the store decides when a patch is allowed to happen.

use std::collections::HashMap;

use crate::calendar::{Calendar, CalendarId, Event, EventId, Invitation, InvitationId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheState {
    calendars: Vec<Calendar>,
    events: HashMap<CalendarId, Vec<Event>>,
    invites: Vec<Invitation>,
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calendars(&self) -> &[Calendar] {
        &self.calendars
    }

    pub fn invites(&self) -> &[Invitation] {
        &self.invites
    }

    pub fn calendar(&self, id: CalendarId) -> Option<&Calendar> {
        self.calendars.iter().find(|c| c.id == id)
    }

    /// `None` means the bucket was never filled, which callers can only tell
    /// apart from an empty calendar by fetching.
    pub fn bucket(&self, calendar_id: CalendarId) -> Option<&[Event]> {
        self.events.get(&calendar_id).map(Vec::as_slice)
    }

    pub fn events_for(&self, calendar_id: CalendarId) -> Vec<Event> {
        self.bucket(calendar_id).map(<[Event]>::to_vec).unwrap_or_default()
    }

    pub fn bucket_count(&self) -> usize {
        self.events.len()
    }

    pub fn replace_calendars(&mut self, calendars: Vec<Calendar>) {
        self.calendars = calendars;
    }

    pub fn push_calendar(&mut self, calendar: Calendar) {
        self.calendars.push(calendar);
    }

    pub fn remove_calendar(&mut self, id: CalendarId) -> usize {
        let before = self.calendars.len();
        self.calendars.retain(|c| c.id != id);
        before - self.calendars.len()
    }

    pub fn evict_bucket(&mut self, calendar_id: CalendarId) -> Option<Vec<Event>> {
        self.events.remove(&calendar_id)
    }

    /// Later duplicates of an id are dropped so a bucket never holds the same
    /// event twice.
    pub fn replace_bucket(&mut self, calendar_id: CalendarId, events: Vec<Event>) {
        let mut unique: Vec<Event> = Vec::with_capacity(events.len());
        for event in events {
            if !unique.iter().any(|e| e.id == event.id) {
                unique.push(event);
            }
        }
        self.events.insert(calendar_id, unique);
    }

    /// Appends to the bucket, creating it if absent. An event whose id is
    /// already cached replaces the old entry in place.
    pub fn push_event(&mut self, calendar_id: CalendarId, event: Event) {
        let bucket = self.events.entry(calendar_id).or_default();
        match bucket.iter_mut().find(|e| e.id == event.id) {
            Some(existing) => *existing = event,
            None => bucket.push(event),
        }
    }

    pub fn remove_event(&mut self, calendar_id: CalendarId, event_id: EventId) -> usize {
        match self.events.get_mut(&calendar_id) {
            Some(bucket) => {
                let before = bucket.len();
                bucket.retain(|e| e.id != event_id);
                before - bucket.len()
            }
            None => 0,
        }
    }

    pub fn replace_invites(&mut self, invites: Vec<Invitation>) {
        self.invites = invites;
    }

    pub fn remove_invite(&mut self, id: InvitationId) -> usize {
        let before = self.invites.len();
        self.invites.retain(|i| i.invitation_id != id);
        before - self.invites.len()
    }
}
