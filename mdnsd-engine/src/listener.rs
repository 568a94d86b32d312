use std::sync::Arc;

use crate::service_info::ServiceInfo;

/// A discovery transition surfaced by a browser.
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    /// A service instance announced itself, or its record set changed (e.g.
    /// a new address or TXT record was learned for an already-seen name).
    Added(Arc<ServiceInfo>),
    /// A service instance sent a goodbye (TTL-0 PTR) or its records expired
    /// from the cache without being refreshed.
    Removed { instance_name: String },
}

/// Receives discovery events for a browsed service type. Implemented by
/// whatever the caller wants notified; the browser holds a `Arc<dyn
/// ServiceListener>` and calls back synchronously from the reactor thread, so
/// implementations must not block for long.
pub trait ServiceListener: Send + Sync {
    fn service_event(&self, event: ServiceEvent);
}

/// A listener that records every event it receives, for tests that need to
/// assert on discovery behavior without standing up a real callback target.
#[cfg(test)]
pub struct RecordingListener {
    events: std::sync::Mutex<Vec<ServiceEvent>>,
}

#[cfg(test)]
impl Default for RecordingListener {
    fn default() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
impl RecordingListener {
    pub fn events(&self) -> Vec<ServiceEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ServiceListener for RecordingListener {
    fn service_event(&self, event: ServiceEvent) {
        self.events.lock().unwrap().push(event);
    }
}
