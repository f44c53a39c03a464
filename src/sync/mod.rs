pub mod endpoints;
pub mod remote;
pub mod store;

pub use remote::{ApiError, ApiResponse, HttpAccessor, RemoteAccessor};
pub use store::{CalendarStore, StoreError, StoreOptions};
