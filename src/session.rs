//! Session table (C2, §3, §4.2).
//!
//! A fixed-capacity array of session records, indexed by session number.
//! Locking lives one level up, in [`crate::layer::SessionLayer`] — §5
//! requires a single mutex across the whole table *and* the registered
//! observer, so the table itself stays a plain, lock-free structure.

use std::sync::Arc;

use crate::observer::ResourceCallback;

/// Session state machine (§3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Slot is unused.
    Idle,
    /// Awaiting the peer's half of a create handshake.
    InCreation,
    /// Session is open; `send_data` is legal.
    Active,
    /// Awaiting the peer's half of a close handshake.
    InDeletion,
}

/// One session table slot (§3 "Session Record").
///
/// `resource_id`, `slot_id`, and `connection_id` are only meaningful when
/// `state != Idle` (Invariant 1).
#[derive(Default)]
pub struct SessionRecord {
    pub state: Option<SessionState>,
    pub resource_id: u32,
    pub slot_id: u8,
    pub connection_id: u8,
    pub callback: Option<Arc<dyn ResourceCallback>>,
}

impl SessionRecord {
    fn idle() -> Self {
        Self {
            state: None,
            ..Default::default()
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.unwrap_or(SessionState::Idle)
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_none()
    }

    fn reset_to_idle(&mut self) {
        self.state = None;
        self.callback = None;
    }
}

/// Fixed-capacity session table. The session number *is* the table index
/// (§4.2): there is no separate identity allocator.
pub struct SessionTable {
    slots: Vec<SessionRecord>,
}

impl SessionTable {
    pub fn new(max_sessions: usize) -> Self {
        let mut slots = Vec::with_capacity(max_sessions);
        slots.resize_with(max_sessions, SessionRecord::idle);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, session_nb: u16) -> Option<&SessionRecord> {
        self.slots.get(session_nb as usize)
    }

    pub fn get_mut(&mut self, session_nb: u16) -> Option<&mut SessionRecord> {
        self.slots.get_mut(session_nb as usize)
    }

    /// Lowest-index `Idle` slot wins (§4.2 allocation policy). Returns
    /// `None` if the table is full.
    pub fn allocate(&mut self) -> Option<u16> {
        let index = self.slots.iter().position(SessionRecord::is_idle)?;
        self.slots[index].state = Some(SessionState::InCreation);
        Some(index as u16)
    }

    /// Validate that `session_nb` both exists and belongs to the given
    /// `(slot_id, connection_id)` — the check every inbound SPDU other
    /// than `OpenSessionReq` must pass (§4.4 "session_number validation").
    pub fn matches(&self, session_nb: u16, slot_id: u8, connection_id: u8) -> bool {
        match self.get(session_nb) {
            Some(rec) if !rec.is_idle() => rec.slot_id == slot_id && rec.connection_id == connection_id,
            _ => false,
        }
    }

    pub fn reset_to_idle(&mut self, session_nb: u16) {
        if let Some(rec) = self.get_mut(session_nb) {
            rec.reset_to_idle();
        }
    }

    /// Iterate `(index, &SessionRecord)` for every non-Idle slot, in index
    /// order (§4.7: "natural index order", not a cross-caller guarantee).
    pub fn iter_active(&self) -> impl Iterator<Item = (u16, &SessionRecord)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, rec)| !rec.is_idle())
            .map(|(i, rec)| (i as u16, rec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_picks_lowest_idle_index() {
        let mut table = SessionTable::new(4);
        assert_eq!(table.allocate(), Some(0));
        assert_eq!(table.allocate(), Some(1));
        table.reset_to_idle(0);
        assert_eq!(table.allocate(), Some(0));
    }

    #[test]
    fn allocate_fails_when_full() {
        let mut table = SessionTable::new(2);
        table.allocate().unwrap();
        table.allocate().unwrap();
        assert_eq!(table.allocate(), None);
    }

    #[test]
    fn matches_rejects_idle_and_wrong_owner() {
        let mut table = SessionTable::new(2);
        let sn = table.allocate().unwrap();
        assert!(!table.matches(sn, 3, 0)); // still InCreation but owner unset (0,0)
        {
            let rec = table.get_mut(sn).unwrap();
            rec.slot_id = 3;
            rec.connection_id = 0;
        }
        assert!(table.matches(sn, 3, 0));
        assert!(!table.matches(sn, 4, 0));
        assert!(!table.matches(99, 3, 0));

        table.reset_to_idle(sn);
        assert!(!table.matches(sn, 3, 0));
    }
}
