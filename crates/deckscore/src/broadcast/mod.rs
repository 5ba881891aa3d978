//! Live progress notification for running jobs.

pub mod event;
pub mod notifier;

pub use event::{EventKind, EventStatus, ProgressEvent, Stage};
pub use notifier::{ConnectionId, ProgressNotifier, Subscription};
