//! The permit ledger: the queue's state machine, free of any I/O.
//!
//! Invariant: `0 <= outstanding <= permits`, and over the ledger's lifetime
//! `dispatched - acknowledged <= permits`.

use super::backlog::Backlog;
use super::QueueStats;
use std::marker::PhantomData;

/// Raised when an acknowledgment arrives with nothing outstanding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unbalanced acknowledgment: {acknowledged} acks received for {dispatched} dispatched messages")]
pub struct UnbalancedAcknowledgment {
    pub dispatched: u64,
    pub acknowledged: u64,
}

/// Result of offering a message to the ledger.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission<T> {
    Queued,
    Overflow(T),
}

pub struct FlowLedger<T, B> {
    backlog: B,
    capacity: Option<usize>,
    permits: usize,
    outstanding: usize,
    accepted: u64,
    dispatched: u64,
    acknowledged: u64,
    overflowed: u64,
    _message: PhantomData<fn(T) -> T>,
}

impl<T, B: Backlog<T>> FlowLedger<T, B> {
    pub fn new(backlog: B, capacity: Option<usize>, permits: usize) -> Self {
        Self {
            backlog,
            capacity,
            permits,
            outstanding: 0,
            accepted: 0,
            dispatched: 0,
            acknowledged: 0,
            overflowed: 0,
            _message: PhantomData,
        }
    }

    /// Queues `msg`, or hands it back when the backlog is full.
    ///
    /// A message that could be dispatched straight away is never counted
    /// against the backlog, so a zero-capacity queue still passes traffic
    /// while permits are free.
    pub fn admit(&mut self, msg: T) -> Admission<T> {
        let full = self
            .capacity
            .is_some_and(|capacity| self.backlog.len() >= capacity);
        if full && !(self.backlog.is_empty() && self.has_permit()) {
            self.overflowed += 1;
            return Admission::Overflow(msg);
        }
        self.accepted += 1;
        self.backlog.push(msg);
        Admission::Queued
    }

    /// Returns one permit to the pool.
    pub fn acknowledge(&mut self) -> Result<(), UnbalancedAcknowledgment> {
        if self.outstanding == 0 {
            return Err(UnbalancedAcknowledgment {
                dispatched: self.dispatched,
                acknowledged: self.acknowledged + 1,
            });
        }
        self.outstanding -= 1;
        self.acknowledged += 1;
        Ok(())
    }

    /// Takes the next message to emit, if a permit is free and one is waiting.
    pub fn next_dispatch(&mut self) -> Option<T> {
        if !self.has_permit() {
            return None;
        }
        let msg = self.backlog.pop()?;
        self.outstanding += 1;
        self.dispatched += 1;
        Some(msg)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            outstanding: self.outstanding,
            permits: self.permits,
            backlog_len: self.backlog.len(),
            backlog_capacity: self.capacity,
            accepted: self.accepted,
            dispatched: self.dispatched,
            acknowledged: self.acknowledged,
            overflowed: self.overflowed,
        }
    }

    fn has_permit(&self) -> bool {
        self.outstanding < self.permits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    fn ledger(capacity: Option<usize>, permits: usize) -> FlowLedger<u32, VecDeque<u32>> {
        FlowLedger::new(VecDeque::new(), capacity, permits)
    }

    fn drain(ledger: &mut FlowLedger<u32, VecDeque<u32>>) -> Vec<u32> {
        std::iter::from_fn(|| ledger.next_dispatch()).collect()
    }

    #[test]
    fn ack_without_dispatch_is_rejected() {
        let mut ledger = ledger(None, 1);
        assert_eq!(
            ledger.acknowledge(),
            Err(UnbalancedAcknowledgment {
                dispatched: 0,
                acknowledged: 1
            })
        );
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn zero_capacity_passes_traffic_while_permits_are_free() {
        let mut ledger = ledger(Some(0), 1);
        assert_eq!(ledger.admit(1), Admission::Queued);
        assert_eq!(drain(&mut ledger), vec![1]);
        assert_eq!(ledger.admit(2), Admission::Overflow(2));
    }

    #[test]
    fn zero_permits_never_dispatch() {
        let mut ledger = ledger(Some(2), 0);
        ledger.admit(1);
        ledger.admit(2);
        assert_eq!(ledger.admit(3), Admission::Overflow(3));
        assert!(drain(&mut ledger).is_empty());
    }

    #[derive(Debug, Clone)]
    enum Step {
        Send,
        Ack,
    }

    proptest! {
        #[test]
        fn in_flight_never_exceeds_permits(
            permits in 0usize..6,
            capacity in proptest::option::of(0usize..8),
            steps in proptest::collection::vec(
                prop_oneof![Just(Step::Send), Just(Step::Ack)],
                0..200,
            ),
        ) {
            let mut ledger = ledger(capacity, permits);
            let mut in_flight = 0usize;
            let mut next = 0u32;
            for step in steps {
                match step {
                    Step::Send => {
                        next += 1;
                        ledger.admit(next);
                    }
                    // Only acknowledge what has actually been emitted.
                    Step::Ack if in_flight > 0 => {
                        ledger.acknowledge().unwrap();
                        in_flight -= 1;
                    }
                    Step::Ack => continue,
                }
                in_flight += drain(&mut ledger).len();
                prop_assert!(in_flight <= permits);
                prop_assert_eq!(in_flight, ledger.outstanding());
                if let Some(capacity) = capacity {
                    prop_assert!(ledger.stats().backlog_len <= capacity);
                }
            }
        }

        #[test]
        fn saturation_splits_into_dispatched_buffered_and_overflow(
            capacity in 1usize..10,
            permits in 0usize..10,
            extra in 0usize..10,
        ) {
            let mut ledger = ledger(Some(capacity), permits);
            let mut dispatched = 0;
            let mut overflow = 0;
            for n in 0..(capacity + permits + extra) as u32 {
                if let Admission::Overflow(_) = ledger.admit(n) {
                    overflow += 1;
                }
                dispatched += drain(&mut ledger).len();
            }
            prop_assert_eq!(dispatched, permits);
            prop_assert_eq!(ledger.stats().backlog_len, capacity);
            prop_assert_eq!(overflow, extra);
        }
    }
}
