//! Lifecycle notifications for dashboards and logs.
//!
//! The queue and the dispatch workers publish a [`JobEvent`] on every
//! transition; anyone holding the [`EventBus`] may subscribe. Delivery is
//! fire-and-forget: slow receivers see `RecvError::Lagged` and skip ahead.

mod bus;
pub use bus::EventBus;

mod event;
pub use event::{JobEvent, JobEventKind};
