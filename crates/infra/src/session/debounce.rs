use chrono::{DateTime, Duration, Utc};

/// Holds the latest pending value and releases it once `delay` has passed
/// without a newer one. Clock-driven: the caller supplies `now`.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, DateTime<Utc>)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Replace any pending value and restart the window.
    pub fn schedule(&mut self, value: T, now: DateTime<Utc>) {
        self.pending = Some((value, now));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending value if its window has elapsed.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<T> {
        match &self.pending {
            Some((_, scheduled_at)) if now.signed_duration_since(*scheduled_at) >= self.delay => {
                self.pending.take().map(|(value, _)| value)
            }
            _ => None,
        }
    }

    /// Take the pending value regardless of the window.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(value, _)| value)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
