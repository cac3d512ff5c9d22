//! Resource contract (exposed) — §4.3, §6.
//!
//! The session layer never interprets resource payloads itself; it hands
//! decisions off to a caller-supplied [`LookupCallback`], lifecycle events
//! to a [`SessionCallback`], and data off, per session, to a
//! [`ResourceCallback`] that delivers payloads for that session's resource.
//!
//! These are three separate registrations — not one combined trait —
//! because the public API (§4.6) registers lookup and lifecycle
//! independently (`register_lookup`, `register_session_callback`), exactly
//! as the original C keeps two separate `(fn, arg)` pairs
//! (`lookup`/`lookup_arg`, `session`/`session_arg`) rather than one.

use std::sync::Arc;

/// Outcome of a module-initiated `OpenSessionReq` lookup (§4.3).
///
/// Maps directly onto the status byte sent back in `OpenSessionRes`/
/// `CreateSessionRes` (§4.1):
///
/// | Decision | SPDU status |
/// |----------|-------------|
/// | `Open` | `0x00` |
/// | `NoResource` | `0xF0` |
/// | `LowVersion` | `0xF2` |
/// | `Unavailable` | `0xF1` |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupDecision {
    Open,
    NoResource,
    LowVersion,
    Unavailable,
}

impl LookupDecision {
    pub fn status_byte(self) -> u8 {
        match self {
            Self::Open => 0x00,
            Self::NoResource => 0xF0,
            Self::LowVersion => 0xF2,
            Self::Unavailable => 0xF1,
        }
    }
}

/// Result of [`LookupCallback::lookup`]: the decision, and — only when
/// `decision` is [`LookupDecision::Open`] — the per-session data callback
/// to attach to the newly active session.
pub struct LookupOutcome {
    pub decision: LookupDecision,
    pub callback: Option<Arc<dyn ResourceCallback>>,
}

impl LookupOutcome {
    pub fn open(callback: Arc<dyn ResourceCallback>) -> Self {
        Self {
            decision: LookupDecision::Open,
            callback: Some(callback),
        }
    }

    pub fn reject(decision: LookupDecision) -> Self {
        debug_assert_ne!(decision, LookupDecision::Open, "use `open` for the Open case");
        Self {
            decision,
            callback: None,
        }
    }
}

/// Session-lifecycle notification reason (§4.3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleReason {
    /// A module-initiated open is about to be accepted; the observer may
    /// veto it (the only backpressure hook at this layer).
    Connecting,
    /// A session became `Active`.
    Connected,
    /// A remote-initiated open failed (the single user-visible signal for
    /// that failure mode, §7).
    ConnectFail,
    /// A session returned to `Idle`, host- or module-initiated.
    Close,
}

/// The caller-supplied resource registry (§4.3 "Resource Registry").
pub trait LookupCallback: Send + Sync {
    /// Decide whether to accept a module's `OpenSessionReq` for
    /// `resource_id` on `slot_id`, and which callback to attach if so.
    fn lookup(&self, slot_id: u8, resource_id: u32) -> LookupOutcome;
}

/// The caller-supplied session-lifecycle sink (§4.3, §6).
pub trait SessionCallback: Send + Sync {
    /// Notify of a connect/disconnect lifecycle event.
    ///
    /// Return `true` only in response to [`LifecycleReason::Connecting`] to
    /// veto the open (answered with `CloseResourceBusy`); the return value
    /// is ignored for every other reason.
    fn on_lifecycle(
        &self,
        reason: LifecycleReason,
        slot_id: u8,
        session_nb: u16,
        resource_id: u32,
    ) -> bool;
}

/// Per-session data delivery (§4.3, §6 "Per-session data callback").
pub trait ResourceCallback: Send + Sync {
    /// Deliver a payload framed under `ST_SESSION_NUMBER` for this session.
    fn on_data(&self, slot_id: u8, session_nb: u16, resource_id: u32, payload: &[u8]);
}
