//! # en50221-session — EN 50221 Common Interface session layer
//!
//! The session layer of an EN 50221 Common Interface stack: the multiplex
//! that sits between a reliable transport to a Conditional-Access Module
//! (CAM) and the higher-level application resources (AI, CA, DVB, MMI, RM).
//! It demultiplexes SPDUs from one or more transport connections onto
//! logical sessions, each bound to a resource id, and offers application
//! resources a narrow send/receive contract without exposing slot,
//! connection, or framing details.
//!
//! ## Protocol references
//!
//! | Spec | Topic | How this crate uses it |
//! |------|-------|-------------------------|
//! | EN 50221 §8.3/§8.8 | Session layer | SPDU tags, session state machine, resource registry |
//! | EN 50221 §A.4.1.13 | SPDU wire format | [`spdu`] codec |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Host program (resources, CLI, ...)       │
//! ├──────────────────────────────────────────┤
//! │  layer      — public API, state machine  │
//! │  session    — fixed-capacity table       │
//! ├──────────────────────────────────────────┤
//! │  observer   — resource/lifecycle contract│
//! │  spdu       — codec                      │
//! │  resource   — MKRID helper               │
//! ├──────────────────────────────────────────┤
//! │  transport  — consumed trait (external)  │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use en50221_session::{SessionLayer, TransportLayer};
//!
//! struct MyTransport; // backed by a real CI slot device
//! impl TransportLayer for MyTransport {
//!     fn send_data(&self, _slot: u8, _conn: u8, _data: &[u8]) -> Result<(), i32> {
//!         Ok(())
//!     }
//! }
//!
//! let layer = SessionLayer::new(Arc::new(MyTransport), 16);
//! // layer.register_lookup(my_resource_registry);
//! // transport poll thread: layer.on_transport_event(reason, slot, conn, &buf);
//! ```
//!
//! ## Crate layout
//!
//! - [`layer`] — [`SessionLayer`], the mutex-guarded orchestrator: public API,
//!   state machine, transport dispatch, teardown fan-out.
//! - [`session`] — [`session::SessionTable`] and [`session::SessionState`].
//! - [`observer`] — [`LookupCallback`], [`SessionCallback`], [`ResourceCallback`].
//! - [`transport`] — [`TransportLayer`], the consumed transport contract.
//! - [`spdu`] — the six-tag SPDU codec.
//! - [`resource`] — `MKRID` packing/unpacking.
//! - [`error`] — [`SessionError`] and [`Result`] alias.

pub mod error;
pub mod layer;
pub mod observer;
pub mod resource;
pub mod session;
pub mod spdu;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod transport;

pub use error::{Result, SessionError};
pub use layer::SessionLayer;
pub use observer::{LifecycleReason, LookupCallback, LookupDecision, LookupOutcome, ResourceCallback, SessionCallback};
pub use resource::{mkrid, unmkrid};
pub use transport::{CallbackReason, TransportLayer};
