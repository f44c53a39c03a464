//! The synchronization store.
//!
//! Every mutation makes exactly one remote call and patches the cache only
//! after that call succeeded, using what the server sent back. A failed call
//! leaves the cache exactly as it was.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::watch;

use crate::calendar::{
    Calendar, CalendarId, Event, EventDraft, EventId, Invitation, InvitationId, NewCalendar,
    ServerEvent,
};
use crate::storage::cache::CacheState;
use crate::storage::config::StoreConfig;
use crate::sync::endpoints;
use crate::sync::remote::{ApiError, RemoteAccessor};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: ApiError,
    },
    #[error("{operation} was not applied, server answered with status {status}")]
    Reported { operation: &'static str, status: u16 },
    #[error("{operation} returned an unexpected payload: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{operation} could not encode its request: {source}")]
    Encode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn operation(&self) -> &'static str {
        match self {
            StoreError::Transport { operation, .. }
            | StoreError::Reported { operation, .. }
            | StoreError::Decode { operation, .. }
            | StoreError::Encode { operation, .. } => operation,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StoreOptions {
    /// When set, deleting or leaving a calendar also drops its cached events.
    /// Otherwise the bucket stays until the session ends.
    pub evict_events_on_calendar_removal: bool,
}

impl From<&StoreConfig> for StoreOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            evict_events_on_calendar_removal: config.evict_events_on_calendar_removal,
        }
    }
}

pub struct CalendarStore<A> {
    remote: A,
    options: StoreOptions,
    state: watch::Sender<CacheState>,
}

impl<A: RemoteAccessor> CalendarStore<A> {
    pub fn new(remote: A) -> Self {
        Self::with_options(remote, StoreOptions::default())
    }

    pub fn with_options(remote: A, options: StoreOptions) -> Self {
        let (state, _) = watch::channel(CacheState::new());
        Self {
            remote,
            options,
            state,
        }
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// A receiver that wakes after every applied patch.
    pub fn subscribe(&self) -> watch::Receiver<CacheState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> CacheState {
        self.state.borrow().clone()
    }

    pub fn calendars(&self) -> Vec<Calendar> {
        self.state.borrow().calendars().to_vec()
    }

    pub fn invites(&self) -> Vec<Invitation> {
        self.state.borrow().invites().to_vec()
    }

    pub fn get_calendar_by_id(&self, calendar_id: CalendarId) -> Option<Calendar> {
        self.state.borrow().calendar(calendar_id).cloned()
    }

    /// Cached bucket for `calendar_id`, or empty. Never fetches.
    pub fn get_events_by_calendar_id(&self, calendar_id: CalendarId) -> Vec<Event> {
        self.state.borrow().events_for(calendar_id)
    }

    pub async fn fetch_calendars(&self) -> Result<Vec<Calendar>, StoreError> {
        const OP: &str = "fetch_calendars";
        let response = self
            .remote
            .get(endpoints::USER_CALENDARS)
            .await
            .map_err(transport(OP))?;
        let calendars: Vec<Calendar> = decode(OP, response.data)?;

        let fresh = calendars.clone();
        self.state.send_modify(move |cache| cache.replace_calendars(fresh));

        tracing::info!("Fetched {} calendars", calendars.len());
        Ok(calendars)
    }

    pub async fn create_calendar(&self, calendar: NewCalendar) -> Result<Calendar, StoreError> {
        const OP: &str = "create_calendar";
        let body = encode(OP, &calendar)?;
        let response = self
            .remote
            .post(endpoints::CALENDARS, Some(body))
            .await
            .map_err(transport(OP))?;
        let created: Calendar = decode(OP, response.data)?;

        let cached = created.clone();
        self.state.send_modify(move |cache| cache.push_calendar(cached));

        tracing::info!("Calendar created with ID: {}", created.id);
        Ok(created)
    }

    pub async fn delete_calendar(&self, calendar_id: CalendarId) -> Result<(), StoreError> {
        const OP: &str = "delete_calendar";
        self.remote
            .delete(&endpoints::calendar(calendar_id), None)
            .await
            .map_err(transport(OP))?;

        self.forget_calendar(calendar_id);
        tracing::info!("Calendar {} deleted", calendar_id);
        Ok(())
    }

    /// Drops membership rather than ownership; the cache effect is the same as
    /// [`CalendarStore::delete_calendar`].
    pub async fn leave_calendar(&self, calendar_id: CalendarId) -> Result<(), StoreError> {
        const OP: &str = "leave_calendar";
        self.remote
            .post(&endpoints::leave_calendar(calendar_id), None)
            .await
            .map_err(transport(OP))?;

        self.forget_calendar(calendar_id);
        tracing::info!("Left calendar {}", calendar_id);
        Ok(())
    }

    pub async fn fetch_calendar_events(&self, calendar_id: CalendarId) -> Result<Vec<Event>, StoreError> {
        const OP: &str = "fetch_calendar_events";
        let response = self
            .remote
            .get(&endpoints::calendar_events(calendar_id))
            .await
            .map_err(transport(OP))?;
        let raw: Vec<ServerEvent> = decode(OP, response.data)?;
        let events: Vec<Event> = raw.into_iter().map(Event::from).collect();

        let mut stored = Vec::new();
        self.state.send_modify(|cache| {
            cache.replace_bucket(calendar_id, events);
            stored = cache.events_for(calendar_id);
        });

        tracing::info!("Fetched {} events for calendar {}", stored.len(), calendar_id);
        Ok(stored)
    }

    pub async fn create_event(&self, draft: &EventDraft, calendar_id: CalendarId) -> Result<Event, StoreError> {
        const OP: &str = "create_event";
        let body = encode(OP, draft)?;
        tracing::info!("Creating event: {} on {}", draft.title, draft.start);

        let response = self
            .remote
            .post(endpoints::EVENTS, Some(body))
            .await
            .map_err(transport(OP))?;
        let raw: ServerEvent = decode(OP, response.data)?;
        let event = Event::from(raw);

        let cached = event.clone();
        self.state.send_modify(move |cache| cache.push_event(calendar_id, cached));

        tracing::info!("Event created with ID: {}", event.id);
        Ok(event)
    }

    /// Removes the event only on a `200` answer. Any other status the accessor
    /// let through is a [`StoreError::Reported`] and the cache is untouched.
    pub async fn delete_event(&self, event_id: EventId, calendar_id: CalendarId) -> Result<(), StoreError> {
        const OP: &str = "delete_event";
        let response = self
            .remote
            .delete(&endpoints::event(event_id), Some(json!({ "calendarId": calendar_id })))
            .await
            .map_err(transport(OP))?;

        if response.status != 200 {
            return Err(failed(StoreError::Reported {
                operation: OP,
                status: response.status,
            }));
        }

        let removed = self
            .state
            .send_if_modified(|cache| cache.remove_event(calendar_id, event_id) > 0);
        if !removed {
            tracing::warn!("Event {} was not cached for calendar {}", event_id, calendar_id);
        }

        tracing::info!("Event {} deleted", event_id);
        Ok(())
    }

    /// Invitations only show up for the recipient, so sending one leaves the
    /// cache alone.
    pub async fn send_invite<T>(&self, invite: &T) -> Result<(), StoreError>
    where
        T: Serialize + ?Sized,
    {
        const OP: &str = "send_invite";
        let body = encode(OP, invite)?;
        self.remote
            .post(endpoints::INVITATION, Some(body))
            .await
            .map_err(transport(OP))?;

        tracing::info!("Invite sent");
        Ok(())
    }

    pub async fn fetch_incoming_invites(&self) -> Result<Vec<Invitation>, StoreError> {
        const OP: &str = "fetch_incoming_invites";
        let response = self
            .remote
            .get(endpoints::INCOMING_INVITATIONS)
            .await
            .map_err(transport(OP))?;
        let invites: Vec<Invitation> = decode(OP, response.data)?;

        let fresh = invites.clone();
        self.state.send_modify(move |cache| cache.replace_invites(fresh));

        tracing::info!("Fetched {} incoming invites", invites.len());
        Ok(invites)
    }

    /// Removes the invitation. The shared calendar is not added to the cache;
    /// call [`CalendarStore::fetch_calendars`] to see it.
    pub async fn accept_invitation(&self, invitation_id: InvitationId) -> Result<(), StoreError> {
        self.decide_invitation("accept_invitation", endpoints::ACCEPT_INVITATION, invitation_id)
            .await
    }

    pub async fn decline_invitation(&self, invitation_id: InvitationId) -> Result<(), StoreError> {
        self.decide_invitation("decline_invitation", endpoints::DECLINE_INVITATION, invitation_id)
            .await
    }

    async fn decide_invitation(
        &self,
        operation: &'static str,
        path: &str,
        invitation_id: InvitationId,
    ) -> Result<(), StoreError> {
        self.remote
            .post(path, Some(json!({ "invitationId": invitation_id })))
            .await
            .map_err(transport(operation))?;

        self.state
            .send_if_modified(|cache| cache.remove_invite(invitation_id) > 0);

        tracing::info!("Invitation {} handled by {}", invitation_id, operation);
        Ok(())
    }

    fn forget_calendar(&self, calendar_id: CalendarId) {
        let evict = self.options.evict_events_on_calendar_removal;
        self.state.send_if_modified(|cache| {
            let removed = cache.remove_calendar(calendar_id) > 0;
            let evicted = evict && cache.evict_bucket(calendar_id).is_some();
            removed || evicted
        });
    }
}

/// Every failure passes through here exactly once, so each one is logged at
/// the operation boundary.
fn failed(error: StoreError) -> StoreError {
    tracing::error!("{}", error);
    error
}

fn transport(operation: &'static str) -> impl FnOnce(ApiError) -> StoreError {
    move |source| failed(StoreError::Transport { operation, source })
}

fn decode<T: DeserializeOwned>(operation: &'static str, data: Value) -> Result<T, StoreError> {
    serde_json::from_value(data).map_err(|source| failed(StoreError::Decode { operation, source }))
}

fn encode<T: Serialize + ?Sized>(operation: &'static str, body: &T) -> Result<Value, StoreError> {
    serde_json::to_value(body).map_err(|source| failed(StoreError::Encode { operation, source }))
}
