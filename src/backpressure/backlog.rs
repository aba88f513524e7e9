//! Pluggable backing stores for the backpressure queue.

use std::collections::{BinaryHeap, VecDeque};

/// Pending-message store. The queue decides *when* to push and pop; the
/// store decides *which* message comes out next.
pub trait Backlog<T>: Send + 'static {
    fn push(&mut self, msg: T);
    fn pop(&mut self) -> Option<T>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// FIFO, the default.
impl<T: Send + 'static> Backlog<T> for VecDeque<T> {
    fn push(&mut self, msg: T) {
        self.push_back(msg);
    }

    fn pop(&mut self) -> Option<T> {
        self.pop_front()
    }

    fn len(&self) -> usize {
        VecDeque::len(self)
    }
}

/// Greatest-first ordering by `Ord`; ties come out in unspecified order.
#[derive(Debug, Clone)]
pub struct PriorityBacklog<T: Ord> {
    heap: BinaryHeap<T>,
}

impl<T: Ord> PriorityBacklog<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }
}

impl<T: Ord> Default for PriorityBacklog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Send + 'static> Backlog<T> for PriorityBacklog<T> {
    fn push(&mut self, msg: T) {
        self.heap.push(msg);
    }

    fn pop(&mut self) -> Option<T> {
        self.heap.pop()
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_and_priority_order() {
        let mut fifo: VecDeque<u8> = VecDeque::new();
        let mut prio = PriorityBacklog::new();
        for n in [2, 9, 4] {
            Backlog::push(&mut fifo, n);
            prio.push(n);
        }
        assert_eq!(Backlog::pop(&mut fifo), Some(2));
        assert_eq!(prio.pop(), Some(9));
        assert_eq!(prio.pop(), Some(4));
        assert_eq!(Backlog::len(&fifo), 2);
    }
}
