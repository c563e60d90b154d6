//! Ring buffer, event store, and analytics engines for runtimescope.

pub mod discovery;
pub mod error;
pub mod filters;
pub mod issues;
pub mod persistence;
pub mod query_monitor;
pub mod ring;
pub mod session;
pub mod stats;
pub mod store;

pub use error::{DiscoveryError, QueryError, StoreError};
pub use filters::{EventFilter, EventLogFilter};
pub use persistence::{PersistError, PersistentLog};
pub use ring::Ring;
pub use store::{EventListener, EventStore};
