//! One-way event channel from background workers to the consumer.
//!
//! Workers never touch consumer state directly. They send [`Event`]s, and the
//! consumer applies them in the order they arrive.

use crate::record::ExtensionRecord;
use tokio::sync::mpsc;
use tracing::debug;
use trackhound_core::{ExtensionId, ResultItem};

/// How a scrape run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every enabled extension was attempted
    Completed,
    /// The run stopped early on request
    Cancelled,
}

/// Messages sent from workers to the consumer.
#[derive(Debug, Clone)]
pub enum Event {
    /// A human-readable log line
    Log(String),
    /// An extension passed validation during discovery
    ExtensionDiscovered(ExtensionRecord),
    /// Discovery is over; no more `ExtensionDiscovered` will follow
    DiscoveryFinished,
    /// An extension produced a result
    ResultFound {
        /// The result
        item: ResultItem,
        /// Extension that produced it
        source: ExtensionId,
    },
    /// The scrape run is over
    RunFinished {
        /// How it ended
        outcome: RunOutcome,
    },
}

/// Sending half of the event channel. Cheap to clone.
///
/// Each subscriber gets its own copy of every event. Subscribe before handing
/// clones to workers; clones made earlier do not see later subscribers.
#[derive(Debug, Clone, Default)]
pub struct EventSender {
    subscribers: Vec<mpsc::UnboundedSender<Event>>,
}

/// Receiving half of the event channel.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
}

/// Create a channel with a single subscriber.
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    let mut sender = EventSender::default();
    let receiver = sender.subscribe();
    (sender, receiver)
}

impl EventSender {
    /// Add a subscriber.
    pub fn subscribe(&mut self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        EventReceiver { rx }
    }

    /// Number of subscribers still listening.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().filter(|tx| !tx.is_closed()).count()
    }

    /// Deliver an event to every subscriber. Closed subscribers are skipped.
    pub fn send(&self, event: Event) {
        if let Some((last, rest)) = self.subscribers.split_last() {
            for tx in rest {
                let _ = tx.send(event.clone());
            }
            let _ = last.send(event);
        }
    }

    /// Send a log line.
    pub fn log(&self, line: impl Into<String>) {
        let line = line.into();
        debug!(target: "trackhound::events", "{line}");
        self.send(Event::Log(line));
    }
}

impl EventReceiver {
    /// Wait for the next event. Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take the next event if one is queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Take every queued event.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
