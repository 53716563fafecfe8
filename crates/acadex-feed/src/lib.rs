//! Push propagation for Acadex dashboards.
//!
//! Teacher rosters and student screens never poll. They hold a
//! [`Subscription`] to a [`Topic`](acadex_protocol::Topic) and receive ordered
//! added / modified / removed events as the store commits changes.
//!
//! The hub runs as a single Tokio task (actor model). It consumes the
//! store's change log, maps each change to topic events, and fans them out
//! to subscribers. Subscribing takes a snapshot first; a subscriber then
//! sees only events newer than that snapshot, so nothing is missed or
//! delivered twice.
//!
//! # Key types
//!
//! - [`FeedHub`]: handle to the running hub
//! - [`Subscription`]: one topic's event stream; dropping it unsubscribes
//! - [`FeedConfig`]: channel sizing and per-topic limits

#![allow(async_fn_in_trait)]

mod config;
mod error;
mod hub;
mod subscription;

pub use config::FeedConfig;
pub use error::FeedError;
pub use hub::{FeedHub, HubStats, topic_events};
pub use subscription::Subscription;
