//! Session layer orchestrator (C4 state machine, C5 transport dispatch, C6
//! public API, C7 teardown fan-out — §4.4–§4.7).
//!
//! Everything mutable lives behind one [`parking_lot::Mutex`] (§5): the
//! session table plus the registered lookup/lifecycle callbacks. The lock is
//! taken only to snapshot or mutate fields; it is always released before a
//! user callback runs or a transport `send_data`/`send_datav` call is made.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, SessionError};
use crate::observer::{LifecycleReason, LookupCallback, LookupDecision, SessionCallback};
use crate::session::{SessionState, SessionTable};
use crate::spdu::{self, Spdu, Status};
use crate::transport::{CallbackReason, TransportLayer};

const MAX_IOV_SEGMENTS: usize = 9;

struct Inner {
    table: SessionTable,
    lookup: Option<Arc<dyn LookupCallback>>,
    session_cb: Option<Arc<dyn SessionCallback>>,
    last_error: Option<SessionError>,
}

/// The session layer (§2 C4+C5+C6+C7).
///
/// Constructed with a [`TransportLayer`] implementation and a fixed session
/// capacity (§4.2). Cheap to clone: all state lives behind `Arc`, so a
/// `SessionLayer` can be handed to the transport's poll thread and to
/// however many resource threads call the public API (§5 "parallel
/// threads").
#[derive(Clone)]
pub struct SessionLayer {
    transport: Arc<dyn TransportLayer>,
    inner: Arc<Mutex<Inner>>,
}

impl SessionLayer {
    /// Create a session layer over `transport` with `max_sessions` slots
    /// (§4.6 `create`).
    pub fn new(transport: Arc<dyn TransportLayer>, max_sessions: usize) -> Self {
        tracing::info!(max_sessions, "session layer created");
        Self {
            transport,
            inner: Arc::new(Mutex::new(Inner {
                table: SessionTable::new(max_sessions),
                lookup: None,
                session_cb: None,
                last_error: None,
            })),
        }
    }

    /// Register the resource-lookup callback (§4.3, §4.6
    /// `register_lookup`). Replaces any previously registered callback.
    pub fn register_lookup(&self, cb: Arc<dyn LookupCallback>) {
        self.inner.lock().lookup = Some(cb);
    }

    /// Register the session-lifecycle callback (§4.3, §4.6
    /// `register_session_callback`).
    pub fn register_session_callback(&self, cb: Arc<dyn SessionCallback>) {
        self.inner.lock().session_cb = Some(cb);
    }

    /// The last error recorded by a public-API call or an inbound-event
    /// handler, for callers that prefer a `get_error`-style accessor over
    /// the `Result` return value (§7).
    pub fn get_error(&self) -> Option<SessionError> {
        self.inner.lock().last_error
    }

    fn record_error(inner: &mut Inner, err: SessionError) -> SessionError {
        inner.last_error = Some(err);
        err
    }

    // ---- C6 public API: host-initiated session management -------------

    /// Host-initiated create (§4.4 "host `create_session`"). Allocates a
    /// slot, sends `CreateSession`, and leaves the session `InCreation`
    /// pending `CreateSessionRes`.
    pub fn create_session(&self, slot_id: u8, connection_id: u8, resource_id: u32) -> Result<u16> {
        let session_nb = {
            let mut inner = self.inner.lock();
            let session_nb = inner.table.allocate().ok_or_else(|| {
                let cap = inner.table.capacity();
                Self::record_error(&mut inner, SessionError::NoFreeSession(cap))
            })?;
            let Some(rec) = inner.table.get_mut(session_nb) else {
                return Err(Self::record_error(&mut inner, SessionError::BadSessionNumber(session_nb)));
            };
            rec.slot_id = slot_id;
            rec.connection_id = connection_id;
            rec.resource_id = resource_id;
            session_nb
        };

        let wire = spdu::encode_create_session(resource_id, session_nb);
        if let Err(code) = self.transport.send_data(slot_id, connection_id, &wire) {
            let mut inner = self.inner.lock();
            inner.table.reset_to_idle(session_nb);
            return Err(Self::record_error(&mut inner, SessionError::TransportError(code)));
        }

        tracing::debug!(session_nb, slot_id, connection_id, resource_id, "create_session: InCreation");
        Ok(session_nb)
    }

    /// Host-initiated destroy (§4.4 "host `destroy_session`"). Legal from
    /// `Active` or already-`InDeletion` (idempotent re-request); moves to
    /// `InDeletion` and (re-)sends `CloseSessionReq`.
    pub fn destroy_session(&self, session_nb: u16) -> Result<()> {
        let (slot_id, connection_id) = {
            let mut inner = self.inner.lock();
            let endpoint = match inner.table.get_mut(session_nb) {
                Some(rec) if matches!(rec.state(), SessionState::Active | SessionState::InDeletion) => {
                    rec.state = Some(SessionState::InDeletion);
                    Some((rec.slot_id, rec.connection_id))
                }
                _ => None,
            };
            match endpoint {
                Some(ep) => ep,
                None => return Err(Self::record_error(&mut inner, SessionError::BadSessionNumber(session_nb))),
            }
        };

        let wire = spdu::encode_close_session_req(session_nb);
        if let Err(code) = self.transport.send_data(slot_id, connection_id, &wire) {
            return Err(Self::record_error(&mut self.inner.lock(), SessionError::TransportError(code)));
        }

        tracing::debug!(session_nb, "destroy_session: InDeletion");
        Ok(())
    }

    /// Send `bytes` under `ST_SESSION_NUMBER` on an `Active` session (§4.6
    /// `send_data`).
    pub fn send_data(&self, session_nb: u16, bytes: &[u8]) -> Result<()> {
        let (slot_id, connection_id) = self.active_endpoint(session_nb)?;
        let mut wire = spdu::encode_session_number_header(session_nb, bytes.len());
        wire.extend_from_slice(bytes);
        self.transport
            .send_data(slot_id, connection_id, &wire)
            .map_err(|code| Self::record_error(&mut self.inner.lock(), SessionError::TransportError(code)))
    }

    /// Send up to 9 user segments under one `ST_SESSION_NUMBER` header via
    /// scatter/gather (§4.6 `send_datav`).
    pub fn send_datav(&self, session_nb: u16, segments: &[&[u8]]) -> Result<()> {
        if segments.len() > MAX_IOV_SEGMENTS {
            return Err(Self::record_error(
                &mut self.inner.lock(),
                SessionError::IovLimit(segments.len()),
            ));
        }
        let (slot_id, connection_id) = self.active_endpoint(session_nb)?;

        let payload_len: usize = segments.iter().map(|s| s.len()).sum();
        let header = spdu::encode_session_number_header(session_nb, payload_len);
        let mut all: Vec<&[u8]> = Vec::with_capacity(segments.len() + 1);
        all.push(&header);
        all.extend_from_slice(segments);

        self.transport
            .send_datav(slot_id, connection_id, &all)
            .map_err(|code| Self::record_error(&mut self.inner.lock(), SessionError::TransportError(code)))
    }

    /// Send `bytes` to every `Active` session bound to `resource_id`,
    /// optionally restricted to one slot (§4.6 `broadcast_data`). Sessions
    /// are snapshotted under the lock; writes happen outside it.
    pub fn broadcast_data(&self, slot_id: Option<u8>, resource_id: u32, bytes: &[u8]) -> Result<()> {
        let targets: Vec<(u16, u8, u8)> = {
            let inner = self.inner.lock();
            inner
                .table
                .iter_active()
                .filter(|(_, rec)| {
                    rec.state() == SessionState::Active
                        && rec.resource_id == resource_id
                        && slot_id.is_none_or(|s| rec.slot_id == s)
                })
                .map(|(sn, rec)| (sn, rec.slot_id, rec.connection_id))
                .collect()
        };

        let mut first_err = None;
        for (session_nb, slot, conn) in targets {
            let mut wire = spdu::encode_session_number_header(session_nb, bytes.len());
            wire.extend_from_slice(bytes);
            if let Err(code) = self.transport.send_data(slot, conn, &wire) {
                first_err.get_or_insert(SessionError::TransportError(code));
            }
        }

        match first_err {
            Some(err) => Err(Self::record_error(&mut self.inner.lock(), err)),
            None => Ok(()),
        }
    }

    fn active_endpoint(&self, session_nb: u16) -> Result<(u8, u8)> {
        let mut inner = self.inner.lock();
        match inner.table.get(session_nb) {
            Some(rec) if rec.state() == SessionState::Active => Ok((rec.slot_id, rec.connection_id)),
            _ => Err(Self::record_error(&mut inner, SessionError::BadSessionNumber(session_nb))),
        }
    }

    // ---- C5 transport dispatch -----------------------------------------

    /// Entry point the transport invokes for its single registered
    /// callback (§4.5). `data` is only meaningful when `reason ==
    /// CallbackReason::Data`.
    pub fn on_transport_event(
        &self,
        reason: CallbackReason,
        slot_id: u8,
        connection_id: u8,
        data: &[u8],
    ) {
        match reason {
            CallbackReason::Data => self.on_data(slot_id, connection_id, data),
            CallbackReason::ConnectionClose => self.teardown(|rec| rec.connection_id == connection_id),
            CallbackReason::SlotClose => self.teardown(|rec| rec.slot_id == slot_id),
        }
    }

    fn on_data(&self, slot_id: u8, connection_id: u8, data: &[u8]) {
        let (spdu, _consumed) = match spdu::decode(data) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(slot_id, connection_id, %err, "dropping malformed SPDU");
                self.inner.lock().last_error = Some(err);
                return;
            }
        };

        match spdu {
            Spdu::OpenSessionReq { resource_id } => self.handle_open_session_req(slot_id, connection_id, resource_id),
            Spdu::CreateSessionRes { status, session_nb, .. } => {
                self.handle_create_session_res(slot_id, connection_id, session_nb, status)
            }
            Spdu::CloseSessionReq { session_nb } => self.handle_close_session_req(slot_id, connection_id, session_nb),
            Spdu::CloseSessionRes { session_nb, .. } => self.handle_close_session_res(slot_id, connection_id, session_nb),
            Spdu::SessionNumber { session_nb, payload_len } => {
                self.handle_session_number(slot_id, connection_id, session_nb, &data[4..4 + payload_len]);
            }
            Spdu::OpenSessionRes { .. } | Spdu::CreateSession { .. } => {
                // These are host→module directions; receiving them inbound
                // is not a valid protocol state for this side.
                tracing::warn!(slot_id, connection_id, "dropping unexpected host-direction SPDU");
            }
        }
    }

    /// §4.4 "Idle | recv OpenSessionReq" — module-initiated open.
    fn handle_open_session_req(&self, slot_id: u8, connection_id: u8, resource_id: u32) {
        let (lookup, session_cb) = {
            let inner = self.inner.lock();
            (inner.lookup.clone(), inner.session_cb.clone())
        };

        let outcome = match &lookup {
            Some(cb) => cb.lookup(slot_id, resource_id),
            None => crate::observer::LookupOutcome::reject(LookupDecision::NoResource),
        };

        if outcome.decision != LookupDecision::Open {
            self.reply_open_session_res(slot_id, connection_id, outcome.decision.status_byte(), resource_id, 0xFFFF);
            tracing::info!(slot_id, connection_id, resource_id, decision = ?outcome.decision, "open rejected by lookup");
            return;
        }

        let allocated = {
            let mut inner = self.inner.lock();
            inner.table.allocate()
        };
        let session_nb = match allocated {
            Some(sn) => sn,
            None => {
                // §4.4 edge case: Open decision but no free slot — no
                // lifecycle call, CloseNoResource with sentinel 0xFFFF.
                self.reply_open_session_res(slot_id, connection_id, Status::CloseNoResource.as_byte(), resource_id, 0xFFFF);
                tracing::warn!(slot_id, connection_id, resource_id, "open accepted by lookup but no free slot");
                return;
            }
        };
        {
            let mut inner = self.inner.lock();
            let Some(rec) = inner.table.get_mut(session_nb) else {
                tracing::error!(session_nb, "allocated slot vanished before assignment");
                return;
            };
            rec.slot_id = slot_id;
            rec.connection_id = connection_id;
            rec.resource_id = resource_id;
            rec.callback = outcome.callback.clone();
        }

        let vetoed = session_cb
            .as_ref()
            .is_some_and(|cb| cb.on_lifecycle(LifecycleReason::Connecting, slot_id, session_nb, resource_id));

        if vetoed {
            self.inner.lock().table.reset_to_idle(session_nb);
            self.reply_open_session_res(slot_id, connection_id, Status::CloseResourceBusy.as_byte(), resource_id, session_nb);
            if let Some(cb) = &session_cb {
                cb.on_lifecycle(LifecycleReason::ConnectFail, slot_id, session_nb, resource_id);
            }
            tracing::info!(slot_id, session_nb, resource_id, "open vetoed by Connecting hook");
            return;
        }

        let wire = spdu::encode_open_session_res(Status::Open.as_byte(), resource_id, session_nb);
        if let Err(code) = self.transport.send_data(slot_id, connection_id, &wire) {
            // §4.4: transport write failure after OpenSessionRes rolls back
            // to Idle and fires ConnectFail.
            self.inner.lock().table.reset_to_idle(session_nb);
            self.inner.lock().last_error = Some(SessionError::TransportError(code));
            if let Some(cb) = &session_cb {
                cb.on_lifecycle(LifecycleReason::ConnectFail, slot_id, session_nb, resource_id);
            }
            tracing::warn!(slot_id, session_nb, code, "OpenSessionRes write failed, rolled back");
            return;
        }

        {
            let mut inner = self.inner.lock();
            let Some(rec) = inner.table.get_mut(session_nb) else {
                tracing::error!(session_nb, "session vanished before activation");
                return;
            };
            rec.state = Some(SessionState::Active);
        }
        if let Some(cb) = &session_cb {
            cb.on_lifecycle(LifecycleReason::Connected, slot_id, session_nb, resource_id);
        }
        tracing::info!(slot_id, session_nb, resource_id, "session opened");
    }

    fn reply_open_session_res(&self, slot_id: u8, connection_id: u8, status: u8, resource_id: u32, session_nb: u16) {
        let wire = spdu::encode_open_session_res(status, resource_id, session_nb);
        if let Err(code) = self.transport.send_data(slot_id, connection_id, &wire) {
            self.inner.lock().last_error = Some(SessionError::TransportError(code));
        }
    }

    /// §4.4 "InCreation | recv CreateSessionRes".
    fn handle_create_session_res(&self, slot_id: u8, connection_id: u8, session_nb: u16, status: u8) {
        let mut inner = self.inner.lock();
        if !inner.table.matches(session_nb, slot_id, connection_id) {
            tracing::warn!(session_nb, slot_id, connection_id, "CreateSessionRes for unknown/mismatched session");
            return;
        }
        if status == Status::Open.as_byte() {
            match inner.table.get_mut(session_nb) {
                Some(rec) => {
                    rec.state = Some(SessionState::Active);
                    tracing::info!(session_nb, "session created: Active");
                }
                None => tracing::error!(session_nb, "matched session vanished before activation"),
            }
        } else {
            inner.table.reset_to_idle(session_nb);
            tracing::warn!(session_nb, status, "CreateSessionRes non-zero status, back to Idle");
        }
    }

    /// §4.4 "Active | recv CloseSessionReq" — module-initiated close.
    fn handle_close_session_req(&self, slot_id: u8, connection_id: u8, session_nb: u16) {
        let matched = self.inner.lock().table.matches(session_nb, slot_id, connection_id);
        if !matched {
            let wire = spdu::encode_close_session_res(Status::CloseNoResource.as_byte(), session_nb);
            let _ = self.transport.send_data(slot_id, connection_id, &wire);
            tracing::warn!(session_nb, slot_id, connection_id, "CloseSessionReq for unknown/mismatched session");
            return;
        }

        let Some(resource_id) = ({
            let mut inner = self.inner.lock();
            let resource_id = inner.table.get_mut(session_nb).map(|rec| rec.resource_id);
            inner.table.reset_to_idle(session_nb);
            resource_id
        }) else {
            tracing::error!(session_nb, "matched session vanished before close");
            return;
        };

        let wire = spdu::encode_close_session_res(Status::Open.as_byte(), session_nb);
        if let Err(code) = self.transport.send_data(slot_id, connection_id, &wire) {
            self.inner.lock().last_error = Some(SessionError::TransportError(code));
        }

        let session_cb = self.inner.lock().session_cb.clone();
        if let Some(cb) = session_cb {
            cb.on_lifecycle(LifecycleReason::Close, slot_id, session_nb, resource_id);
        }
        tracing::info!(session_nb, "session closed by module");
    }

    /// §4.4 "InDeletion | recv CloseSessionRes".
    fn handle_close_session_res(&self, slot_id: u8, connection_id: u8, session_nb: u16) {
        let mut inner = self.inner.lock();
        if inner.table.matches(session_nb, slot_id, connection_id) {
            inner.table.reset_to_idle(session_nb);
            tracing::info!(session_nb, "destroy confirmed: Idle");
        } else {
            tracing::warn!(session_nb, slot_id, connection_id, "CloseSessionRes for unknown/mismatched session");
        }
    }

    fn handle_session_number(&self, slot_id: u8, connection_id: u8, session_nb: u16, payload: &[u8]) {
        let (matched, resource_id, callback) = {
            let inner = self.inner.lock();
            match inner.table.get(session_nb) {
                Some(rec) if inner.table.matches(session_nb, slot_id, connection_id) && rec.state() == SessionState::Active => {
                    (true, rec.resource_id, rec.callback.clone())
                }
                _ => (false, 0, None),
            }
        };

        if !matched {
            tracing::warn!(session_nb, slot_id, connection_id, "payload for unknown/inactive session dropped");
            return;
        }

        if let Some(cb) = callback {
            cb.on_data(slot_id, session_nb, resource_id, payload);
        }
    }

    // ---- C7 teardown fan-out -------------------------------------------

    fn teardown(&self, matches: impl Fn(&crate::session::SessionRecord) -> bool) {
        let affected: Vec<(u16, u8, u32)> = {
            let inner = self.inner.lock();
            inner
                .table
                .iter_active()
                .filter(|(_, rec)| matches(rec))
                .map(|(sn, rec)| (sn, rec.slot_id, rec.resource_id))
                .collect()
        };

        let session_cb = self.inner.lock().session_cb.clone();

        for (session_nb, slot_id, resource_id) in affected {
            if let Some(cb) = &session_cb {
                cb.on_lifecycle(LifecycleReason::Close, slot_id, session_nb, resource_id);
            }
            self.inner.lock().table.reset_to_idle(session_nb);
        }
        tracing::debug!("teardown fan-out complete");
    }
}
