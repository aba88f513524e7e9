use super::{check_arity, SelectionStrategy};
use crate::error::FlowError;

/// Content-independent rotation over destinations `0..arity`.
#[derive(Debug, Clone)]
pub struct RoundRobin {
    arity: usize,
    cursor: usize,
}

impl RoundRobin {
    pub fn new(arity: usize) -> Result<Self, FlowError> {
        check_arity(arity)?;
        Ok(Self { arity, cursor: 0 })
    }
}

impl<T> SelectionStrategy<T> for RoundRobin {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn select(&mut self, _msg: &T) -> Option<usize> {
        let chosen = self.cursor;
        self.cursor = (self.cursor + 1) % self.arity;
        Some(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_in_order() {
        let mut rr = RoundRobin::new(3).unwrap();
        let picks: Vec<_> = (0..7)
            .map(|n| SelectionStrategy::<i32>::select(&mut rr, &n))
            .collect();
        assert_eq!(
            picks,
            [0, 1, 2, 0, 1, 2, 0].map(Some).to_vec()
        );
    }

    #[test]
    fn zero_arity_is_rejected() {
        assert!(matches!(RoundRobin::new(0), Err(FlowError::InvalidConfig(_))));
    }
}
