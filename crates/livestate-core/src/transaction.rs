#![forbid(unsafe_code)]

//! Transaction context for batched change notification.
//!
//! While a [`Transaction`] is open on a model, non-aggregate triggers are
//! queued instead of dispatched, and the aggregate `change` event is reduced
//! to a single pending flag. When the outermost transactional call returns,
//! the model drains the queue to a fixed point (handlers run during the drain
//! may queue more triggers) and then fires `change` at most once.
//!
//! # Invariants
//!
//! 1. Queued triggers run in FIFO order.
//! 2. A nested transactional call reuses the open transaction.
//! 3. The pending flag is cleared when the transaction closes.

use std::collections::VecDeque;

use crate::value::Value;

/// A trigger deferred until the transaction drains.
#[derive(Debug, Clone)]
pub(crate) struct Pending {
    pub(crate) event: String,
    pub(crate) args: Vec<Value>,
}

/// Queue and aggregate-change flag for one open transaction.
#[derive(Debug, Default)]
pub(crate) struct Transaction {
    queue: VecDeque<Pending>,
    change_pending: bool,
    rounds: usize,
}

impl Transaction {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enqueue(&mut self, event: &str, args: Vec<Value>) {
        self.queue.push_back(Pending {
            event: event.to_owned(),
            args,
        });
    }

    pub(crate) fn mark_changed(&mut self) {
        self.change_pending = true;
    }

    pub(crate) fn change_pending(&self) -> bool {
        self.change_pending
    }

    /// Take everything queued so far and count the drain round.
    pub(crate) fn take_round(&mut self) -> Vec<Pending> {
        self.rounds += 1;
        self.queue.drain(..).collect()
    }

    pub(crate) fn rounds(&self) -> usize {
        self.rounds
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn discard_queue(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_take_in_fifo_order() {
        let mut txn = Transaction::new();
        txn.enqueue("a_change", vec![Value::from(1)]);
        txn.enqueue("b_change", vec![Value::from(2)]);
        let round = txn.take_round();
        let names: Vec<_> = round.iter().map(|p| p.event.as_str()).collect();
        assert_eq!(names, vec!["a_change", "b_change"]);
        assert!(txn.is_idle());
        assert_eq!(txn.rounds(), 1);
    }

    #[test]
    fn change_flag_starts_clear() {
        let mut txn = Transaction::new();
        assert!(!txn.change_pending());
        txn.mark_changed();
        assert!(txn.change_pending());
    }

    #[test]
    fn discard_reports_dropped_count() {
        let mut txn = Transaction::new();
        txn.enqueue("a_change", Vec::new());
        txn.enqueue("b_change", Vec::new());
        assert_eq!(txn.discard_queue(), 2);
        assert!(txn.is_idle());
    }
}
