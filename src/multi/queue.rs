//! Completion message queue.

use std::collections::VecDeque;

use crate::base::transferstate::TransferOutcome;
use crate::transfer::TransferId;

/// Record of one finished transfer, awaiting retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionMessage {
    pub id: TransferId,
    pub outcome: TransferOutcome,
}

/// FIFO of completion messages.
///
/// Cumulative across driving calls: messages stay queued until drained, and
/// a drained message is gone for good.
#[derive(Debug, Default)]
pub struct CompletionQueue {
    messages: VecDeque<CompletionMessage>,
}

impl CompletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: CompletionMessage) {
        self.messages.push_back(message);
    }

    pub fn pop(&mut self) -> Option<CompletionMessage> {
        self.messages.pop_front()
    }

    /// Drop any queued message for a removed transfer.
    pub fn purge(&mut self, id: TransferId) {
        self.messages.retain(|m| m.id != id);
    }

    /// Remove and return the message for one specific transfer, leaving the
    /// rest in order.
    pub fn take(&mut self, id: TransferId) -> Option<CompletionMessage> {
        let pos = self.messages.iter().position(|m| m.id == id)?;
        self.messages.remove(pos)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::transfererror::TransferError;
    use crate::transfer::Transfer;

    fn message(id: TransferId, outcome: TransferOutcome) -> CompletionMessage {
        CompletionMessage { id, outcome }
    }

    #[test]
    fn test_fifo_order() {
        let (a, b) = (Transfer::new().id(), Transfer::new().id());
        let mut queue = CompletionQueue::new();
        queue.push(message(a, TransferOutcome::Success));
        queue.push(message(
            b,
            TransferOutcome::Failure(TransferError::RecvError),
        ));

        assert_eq!(queue.pop().map(|m| m.id), Some(a));
        assert_eq!(queue.pop().map(|m| m.id), Some(b));
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_take_preserves_sibling_order() {
        let (a, b, c) = (
            Transfer::new().id(),
            Transfer::new().id(),
            Transfer::new().id(),
        );
        let mut queue = CompletionQueue::new();
        queue.push(message(a, TransferOutcome::Success));
        queue.push(message(b, TransferOutcome::Success));
        queue.push(message(c, TransferOutcome::Success));

        assert_eq!(queue.take(b).map(|m| m.id), Some(b));
        assert_eq!(queue.take(b), None);
        assert_eq!(queue.pop().map(|m| m.id), Some(a));
        assert_eq!(queue.pop().map(|m| m.id), Some(c));
    }

    #[test]
    fn test_purge_removes_only_target() {
        let (a, b) = (Transfer::new().id(), Transfer::new().id());
        let mut queue = CompletionQueue::new();
        queue.push(message(a, TransferOutcome::Success));
        queue.push(message(b, TransferOutcome::Success));
        queue.purge(a);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().map(|m| m.id), Some(b));
    }
}
