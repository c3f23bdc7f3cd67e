use std::cell::RefCell;
use std::rc::Rc;

use crate::handler::{RowAction, RowProcessor};
use crate::policy::{RowPolicy, Verdict};
use crate::protocol::RowRef;
use crate::result::ResultHeader;

/// Where the capture processor left things after the last parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    /// Waiting for a row
    Armed,
    /// A row was accepted and is held by the connection
    Captured,
    /// The policy aborted the stream
    Signaled(String),
}

/// Capture slot shared between a row stream and its capture processor
pub struct RowBuffer {
    state: CaptureState,
    policy: Box<dyn RowPolicy>,
    accepted: u64,
}

impl RowBuffer {
    pub fn new(policy: Box<dyn RowPolicy>) -> Self {
        Self {
            state: CaptureState::Armed,
            policy,
            accepted: 0,
        }
    }

    pub fn arm(&mut self) {
        self.state = CaptureState::Armed;
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Rows accepted by the policy so far
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    fn on_row(&mut self, row: Option<RowRef<'_>>) -> RowAction {
        // end of resultset
        let Some(row) = row else {
            return RowAction::Continue;
        };
        match self.policy.on_row(self.accepted, &row) {
            Verdict::Accept => {
                self.accepted += 1;
                self.state = CaptureState::Captured;
                RowAction::Stop
            }
            Verdict::Abort(msg) => {
                self.state = CaptureState::Signaled(msg.clone());
                RowAction::Error(msg)
            }
        }
    }
}

impl std::fmt::Debug for RowBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowBuffer")
            .field("state", &self.state)
            .field("accepted", &self.accepted)
            .finish_non_exhaustive()
    }
}

/// Row processor installed by a row stream for the duration of one `next_row`
pub struct CaptureProcessor {
    slot: Rc<RefCell<RowBuffer>>,
}

impl CaptureProcessor {
    pub fn new(slot: Rc<RefCell<RowBuffer>>) -> Self {
        Self { slot }
    }
}

impl RowProcessor for CaptureProcessor {
    fn process_row(&mut self, _: &ResultHeader, row: Option<RowRef<'_>>) -> RowAction {
        match self.slot.try_borrow_mut() {
            Ok(mut slot) => slot.on_row(row),
            Err(_) => RowAction::Error("capture slot is in use".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AbortAfter, AcceptAll};

    fn slot<P: RowPolicy + 'static>(policy: P) -> Rc<RefCell<RowBuffer>> {
        Rc::new(RefCell::new(RowBuffer::new(Box::new(policy))))
    }

    #[test]
    fn accepted_row_stops_parsing() {
        let slot = slot(AcceptAll);
        let mut processor = CaptureProcessor::new(Rc::clone(&slot));
        let header = ResultHeader::default();
        let payload: [u8; 0] = [];

        let action = processor.process_row(&header, Some(RowRef::new(&payload, 0).unwrap()));
        assert_eq!(action, RowAction::Stop);
        assert_eq!(slot.borrow().state(), &CaptureState::Captured);
        assert_eq!(slot.borrow().accepted(), 1);

        slot.borrow_mut().arm();
        assert_eq!(slot.borrow().state(), &CaptureState::Armed);
    }

    #[test]
    fn end_notification_keeps_slot_armed() {
        let slot = slot(AcceptAll);
        let mut processor = CaptureProcessor::new(Rc::clone(&slot));
        let action = processor.process_row(&ResultHeader::default(), None);
        assert_eq!(action, RowAction::Continue);
        assert_eq!(slot.borrow().state(), &CaptureState::Armed);
    }

    #[test]
    fn abort_signals() {
        let slot = slot(AbortAfter::new(0));
        let mut processor = CaptureProcessor::new(Rc::clone(&slot));
        let payload: [u8; 0] = [];
        let action =
            processor.process_row(&ResultHeader::default(), Some(RowRef::new(&payload, 0).unwrap()));
        assert_eq!(action, RowAction::Error("row limit of 0 reached".to_string()));
        assert!(matches!(slot.borrow().state(), CaptureState::Signaled(_)));
    }

    #[test]
    fn borrowed_slot_fails_without_panicking() {
        let slot = slot(AcceptAll);
        let mut processor = CaptureProcessor::new(Rc::clone(&slot));
        let _held = slot.borrow_mut();
        let action = processor.process_row(&ResultHeader::default(), None);
        assert!(matches!(action, RowAction::Error(_)));
    }
}
