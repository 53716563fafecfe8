//! Session lifecycle and the authoritative store for Acadex.
//!
//! This crate owns the one piece of shared mutable state in the system: the
//! "active session slot" of each institute.
//!
//! 1. **Store** ([`AttendanceStore`], [`MemoryStore`]): transactional
//!    writes, unique indexes, and an ordered change log.
//! 2. **Registry** ([`SessionRegistry`]): start, end, and look up
//!    broadcast sessions.
//! 3. **Authentication** ([`Authenticator`]): maps a bearer token to an
//!    [`Identity`]. The identity provider itself is external.
//!
//! # How it fits in the stack
//!
//! ```text
//! HTTP / Feed (above)     ← start/end sessions, subscribe to changes
//!     ↕
//! Attendance (beside)     ← reads sessions, inserts records
//!     ↕
//! Session (this crate)    ← single-writer transactions, change log
//!     ↕
//! Protocol (below)        ← Session, AttendanceRecord, Topic
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod registry;
mod store;

pub use auth::{Authenticator, Identity, StaticAuthenticator};
pub use error::{SessionError, StoreError};
pub use registry::{NewSessionRequest, SessionRegistry};
pub use store::{
    AttendanceStore, ChangeKind, EndOutcome, MemoryStore, NewSession, SessionStart, Snapshot,
    StoreChange,
};
