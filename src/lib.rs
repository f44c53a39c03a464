pub mod app;
pub mod calendar;
pub mod storage;
pub mod sync;

pub use app::{CalendarView, ViewType};
pub use calendar::{Calendar, CalendarId, Event, EventDraft, EventId, Invitation, InvitationId};
pub use storage::cache::CacheState;
pub use sync::{CalendarStore, HttpAccessor, RemoteAccessor, StoreError, StoreOptions};
