mod view;
pub use view::{log_event, message_for};

mod event_log;
pub use event_log::EventLog;
