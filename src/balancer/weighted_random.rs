use super::SelectionStrategy;
use crate::error::FlowError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Weighted random selection ("MarkovBalancer").
///
/// Weights are cumulative thresholds sorted ascending in `[0, 1]`. Each message
/// takes one uniform draw in `[0, 1)`; the first destination whose weight is
/// strictly greater than the draw receives it. When no weight exceeds the draw
/// the message is left unrouted and is not forwarded anywhere.
#[derive(Debug, Clone)]
pub struct MarkovBalancer {
    weights: Vec<f64>,
    rng: ChaCha8Rng,
}

impl MarkovBalancer {
    pub fn new(seed: &[u8], weights: Vec<f64>) -> Result<Self, FlowError> {
        if weights.is_empty() {
            return Err(FlowError::InvalidConfig(
                "at least one weight is required".into(),
            ));
        }
        if let Some(bad) = weights
            .iter()
            .find(|w| !w.is_finite() || !(0.0..=1.0).contains(*w))
        {
            return Err(FlowError::InvalidConfig(format!(
                "weight {bad} is outside [0, 1]"
            )));
        }
        if weights.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(FlowError::InvalidConfig(
                "weights must be sorted ascending".into(),
            ));
        }

        Ok(Self {
            weights,
            rng: ChaCha8Rng::from_seed(fold_seed(seed)),
        })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

/// Folds arbitrary seed bytes into the 32 bytes ChaCha wants.
fn fold_seed(seed: &[u8]) -> [u8; 32] {
    let mut folded = [0u8; 32];
    for (i, byte) in seed.iter().enumerate() {
        folded[i % 32] ^= byte.rotate_left((i / 32) as u32 % 8);
    }
    folded
}

impl<T> SelectionStrategy<T> for MarkovBalancer {
    fn name(&self) -> &'static str {
        "weighted-random"
    }

    fn arity(&self) -> usize {
        self.weights.len()
    }

    fn select(&mut self, _msg: &T) -> Option<usize> {
        let draw: f64 = self.rng.gen();
        self.weights.iter().position(|weight| *weight > draw)
    }
}
