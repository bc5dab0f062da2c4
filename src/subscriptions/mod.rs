//! Subscription system for live view updates.
//!
//! A [`SubscriptionManager`] is a replay-1 multicast: it keeps the latest
//! published value and a set of bounded per-subscriber channels.
//!
//! Subscriptions support:
//! - Immediate replay of the latest value (never full history)
//! - Bounded buffers that conflate to the newest events for slow subscribers
//! - Final lifecycle events (`Failed`, `Dropped`) for view observers
//!
//! # Example
//!
//! ```ignore
//! let manager: SubscriptionManager<ViewEvent> = SubscriptionManager::new();
//! let handle = manager.subscribe();
//!
//! loop {
//!     match handle.recv() {
//!         Ok(ViewEvent::View { view }) => println!("{} contacts", view.len()),
//!         Ok(ViewEvent::Failed { error }) => break,
//!         Ok(ViewEvent::Dropped { reason }) => break,
//!         Err(_) => break,
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    DropReason, StreamEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId, ViewEvent,
};
