use crate::broadcast::{ProgressEvent, ProgressNotifier};

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Publishes pipeline events to the job's live subscribers.
pub struct NotifierProgress {
    notifier: ProgressNotifier,
}

impl NotifierProgress {
    pub fn new(notifier: ProgressNotifier) -> Self {
        Self { notifier }
    }
}

impl ProgressReporter for NotifierProgress {
    fn report(&self, event: ProgressEvent) {
        let delivered = self.notifier.publish(&event.job_id, &event);
        tracing::trace!(job_id = %event.job_id, kind = ?event.kind, delivered, "Published progress");
        if event.is_terminal() {
            self.notifier.close(&event.job_id);
        }
    }
}
