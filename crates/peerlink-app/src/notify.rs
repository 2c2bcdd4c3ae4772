//! Change notifications for UI observers.
//!
//! Observers are plain callbacks invoked synchronously, in registration
//! order, for every [`OrchestratorEvent`]. Subscribing returns a
//! [`SubscriptionId`]; passing it to `unsubscribe` removes the observer.

use std::fmt;

use peerlink_core::{
    SessionError,
    media::{MediaKind, StreamId},
    message::Message,
    session::{Connectivity, SessionState},
};

/// Direction of a file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// File sent by the peer.
    Incoming,
    /// File we are sending.
    Outgoing,
}

/// Observable change in the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    /// Session state changed.
    StateChanged {
        /// Previous state.
        from: SessionState,
        /// New state.
        to: SessionState,
    },

    /// The engine reported a new connectivity level.
    ConnectivityChanged(Connectivity),

    /// A message was appended to the log.
    MessageAppended(Message),

    /// Local secure code to show to the user.
    SecureCode(String),

    /// Transfer progress.
    TransferProgress {
        /// File name.
        file_name: String,
        /// Completion, 0 to 100.
        percentage: u8,
        /// Incoming or outgoing.
        direction: TransferDirection,
    },

    /// A non-image file completed; it is not added to the log.
    FileReceived {
        /// File name.
        file_name: String,
        /// Content type.
        mime_type: String,
    },

    /// A completed file was reported complete again and produced nothing.
    DuplicateFile {
        /// File name.
        file_name: String,
    },

    /// The remote stream appeared or went away.
    RemoteStreamChanged(Option<StreamId>),

    /// The engine echoed our own stream.
    HostStream(StreamId),

    /// A local track was enabled or disabled.
    TrackToggled {
        /// Track kind.
        kind: MediaKind,
        /// New flag.
        enabled: bool,
    },

    /// Counter values changed.
    CounterChanged {
        /// Last value we sent.
        local: u64,
        /// Last value the peer sent.
        remote: u64,
    },

    /// An operation or event failed.
    Error(SessionError),
}

/// Handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Observer callback.
pub type Observer = Box<dyn FnMut(&OrchestratorEvent) + Send>;

/// Registered observers.
#[derive(Default)]
pub struct Subscribers {
    next_id: u64,
    observers: Vec<(SubscriptionId, Observer)>,
}

impl Subscribers {
    /// Register an observer.
    pub fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(registered, _)| *registered != id);
        self.observers.len() != before
    }

    /// Deliver `event` to every observer.
    pub fn publish(&mut self, event: &OrchestratorEvent) {
        for (_, observer) in &mut self.observers {
            observer(event);
        }
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// No observer is registered.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers").field("observers", &self.observers.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn unsubscribed_observer_stops_receiving() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut subscribers = Subscribers::default();

        let sink = Arc::clone(&seen);
        let id = subscribers.subscribe(Box::new(move |event| {
            sink.lock().unwrap().push(event.clone());
        }));

        let event = OrchestratorEvent::SecureCode("ABC234".into());
        subscribers.publish(&event);
        assert!(subscribers.unsubscribe(id));
        subscribers.publish(&event);

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(!subscribers.unsubscribe(id));
        assert!(subscribers.is_empty());
    }
}
