//! Subscription types for live view updates.

use crate::error::SearchError;
use crate::types::FilteredView;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events per subscriber. When full, the oldest pending
    /// event is discarded to make room.
    /// Default: 64
    pub buffer_size: usize,

    /// Whether the latest published value is replayed on subscribe.
    pub replay_latest: bool,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64,
            replay_latest: true,
        }
    }
}

/// An event type that can be carried by a [`SubscriptionManager`](super::SubscriptionManager).
pub trait StreamEvent: Clone + Send + 'static {
    /// Final event sent to a subscriber that is being removed.
    fn dropped(reason: DropReason) -> Option<Self>;
}

/// Settled query strings carry no lifecycle events; removed subscribers
/// just see their channel disconnect.
impl StreamEvent for String {
    fn dropped(_reason: DropReason) -> Option<Self> {
        None
    }
}

/// Events emitted to observers of the filtered view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    /// A freshly computed (or replayed) filtered view.
    View { view: FilteredView },

    /// The pipeline failed. No further events follow.
    Failed {
        #[serde(with = "error_message")]
        error: SearchError,
    },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

impl ViewEvent {
    pub fn view(&self) -> Option<&FilteredView> {
        match self {
            ViewEvent::View { view } => Some(view),
            _ => None,
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ViewEvent::View { .. })
    }
}

impl StreamEvent for ViewEvent {
    fn dropped(reason: DropReason) -> Option<Self> {
        Some(ViewEvent::Dropped { reason })
    }
}

/// Errors travel as their display string.
mod error_message {
    use crate::error::SearchError;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(error: &SearchError, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&error.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SearchError, D::Error> {
        let message = String::deserialize(deserializer)?;
        Ok(SearchError::SourceUnavailable(message))
    }
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// Contact permission was revoked.
    PermissionRevoked,
    /// The owning search session shut down.
    Shutdown,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to receive events from a subscription.
pub struct SubscriptionHandle<T> {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<T>,
    /// Keeps the subscription alive in the manager until the handle drops.
    pub(super) _alive: Arc<()>,
}

impl<T> SubscriptionHandle<T> {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<T, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<T, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
