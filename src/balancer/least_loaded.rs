use super::{check_arity, SelectionStrategy};
use crate::error::FlowError;
use std::fmt;

type Scale<T> = Box<dyn Fn(&T) -> u64 + Send + Sync>;

/// Greedy least-loaded selection ("WeightBalancer").
///
/// Each destination keeps a cumulative cost. A message goes to the destination
/// with the lowest current cost (lowest index on ties), whose cost then grows by
/// `scale(msg)`. This equalizes cumulative load, not message count: at any
/// point two destinations differ by at most the largest single cost seen.
pub struct WeightBalancer<T> {
    costs: Vec<u64>,
    scale: Scale<T>,
}

impl<T> WeightBalancer<T> {
    pub fn new<F>(arity: usize, scale: F) -> Result<Self, FlowError>
    where
        F: Fn(&T) -> u64 + Send + Sync + 'static,
    {
        check_arity(arity)?;
        Ok(Self {
            costs: vec![0; arity],
            scale: Box::new(scale),
        })
    }
}

impl<T> fmt::Debug for WeightBalancer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeightBalancer")
            .field("costs", &self.costs)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> SelectionStrategy<T> for WeightBalancer<T> {
    fn name(&self) -> &'static str {
        "least-loaded"
    }

    fn arity(&self) -> usize {
        self.costs.len()
    }

    fn select(&mut self, msg: &T) -> Option<usize> {
        // min_by_key keeps the first of equal minima.
        let (chosen, _) = self.costs.iter().enumerate().min_by_key(|&(_, cost)| *cost)?;
        let cost = (self.scale)(msg);
        self.costs[chosen] = self.costs[chosen].saturating_add(cost);
        Some(chosen)
    }

    fn costs(&self) -> Vec<u64> {
        self.costs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ties_go_to_lowest_index_and_heavy_messages_shift_load() {
        let mut balancer = WeightBalancer::new(3, |cost: &u64| *cost).unwrap();
        assert_eq!(balancer.select(&10), Some(0));
        assert_eq!(balancer.select(&1), Some(1));
        assert_eq!(balancer.select(&1), Some(2));
        assert_eq!(balancer.select(&1), Some(1));
        assert_eq!(balancer.select(&1), Some(2));
        assert_eq!(SelectionStrategy::<u64>::costs(&balancer), vec![10, 2, 2]);
    }

    proptest! {
        #[test]
        fn cumulative_costs_stay_within_one_max_message(
            arity in 1usize..8,
            messages in proptest::collection::vec(0u64..1_000, 0..300),
        ) {
            let mut balancer = WeightBalancer::new(arity, |cost: &u64| *cost).unwrap();
            let mut max_seen = 0u64;
            for msg in messages {
                max_seen = max_seen.max(msg);
                prop_assert!(balancer.select(&msg).is_some());
                let costs = SelectionStrategy::<u64>::costs(&balancer);
                let high = *costs.iter().max().unwrap();
                let low = *costs.iter().min().unwrap();
                prop_assert!(high - low <= max_seen);
            }
        }
    }
}
