//! Job lifecycle: the status state machine and its durable store.

pub mod model;
pub mod store;

pub use model::{Job, JobStatus, Transition};
pub use store::{JobStore, JobStoreError};
