//! Test-only fixtures: an in-memory transport and a scripted observer.
//!
//! Real transport I/O and real resource implementations are out of scope
//! for this crate (spec §1), so scenario tests exercise the state machine
//! against hand-rolled fixtures instead of a mocking crate — the pack
//! carries none and this layer doesn't need one.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::observer::{LifecycleReason, LookupCallback, LookupDecision, LookupOutcome, ResourceCallback, SessionCallback};
use crate::transport::TransportLayer;

/// Records every outbound frame a [`crate::layer::SessionLayer`] sends.
pub struct RecordingTransport {
    sent: Mutex<Vec<Vec<u8>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self { sent: Mutex::new(Vec::new()) }
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportLayer for RecordingTransport {
    fn send_data(&self, _slot_id: u8, _connection_id: u8, data: &[u8]) -> Result<(), i32> {
        self.sent.lock().push(data.to_vec());
        Ok(())
    }
}

struct RecordingResourceCallback {
    log: Arc<Mutex<Vec<(u8, u16, u32, Vec<u8>)>>>,
}

impl ResourceCallback for RecordingResourceCallback {
    fn on_data(&self, slot_id: u8, session_nb: u16, resource_id: u32, payload: &[u8]) {
        self.log.lock().push((slot_id, session_nb, resource_id, payload.to_vec()));
    }
}

/// A lookup/session/resource callback with a fixed scripted decision,
/// logging every lifecycle and data call it receives.
pub struct ScriptedObserver {
    decision: LookupDecision,
    veto_connecting: bool,
    lifecycle_log: Mutex<Vec<(LifecycleReason, u8, u16, u32)>>,
    data_log: Arc<Mutex<Vec<(u8, u16, u32, Vec<u8>)>>>,
}

impl ScriptedObserver {
    /// Always accepts, attaches a recording resource callback, never vetoes.
    pub fn accepting() -> Self {
        Self {
            decision: LookupDecision::Open,
            veto_connecting: false,
            lifecycle_log: Mutex::new(Vec::new()),
            data_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Rejects every open with the given non-`Open` decision.
    pub fn rejecting(decision: LookupDecision) -> Self {
        debug_assert_ne!(decision, LookupDecision::Open);
        Self {
            decision,
            veto_connecting: false,
            lifecycle_log: Mutex::new(Vec::new()),
            data_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Accepts the lookup but vetoes every `Connecting` hook (busy resource).
    pub fn busy() -> Self {
        Self {
            decision: LookupDecision::Open,
            veto_connecting: true,
            lifecycle_log: Mutex::new(Vec::new()),
            data_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn lifecycle_log(&self) -> Vec<(LifecycleReason, u8, u16, u32)> {
        self.lifecycle_log.lock().clone()
    }

    pub fn clear_lifecycle_log(&self) {
        self.lifecycle_log.lock().clear();
    }

    pub fn data_log(&self) -> Vec<(u8, u16, u32, Vec<u8>)> {
        self.data_log.lock().clone()
    }
}

impl LookupCallback for ScriptedObserver {
    fn lookup(&self, _slot_id: u8, _resource_id: u32) -> LookupOutcome {
        if self.decision != LookupDecision::Open {
            return LookupOutcome::reject(self.decision);
        }
        LookupOutcome::open(Arc::new(RecordingResourceCallback { log: self.data_log.clone() }))
    }
}

impl SessionCallback for ScriptedObserver {
    fn on_lifecycle(&self, reason: LifecycleReason, slot_id: u8, session_nb: u16, resource_id: u32) -> bool {
        self.lifecycle_log.lock().push((reason, slot_id, session_nb, resource_id));
        reason == LifecycleReason::Connecting && self.veto_connecting
    }
}
