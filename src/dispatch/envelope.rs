use serde::{Deserialize, Serialize};

/// A message tagged with the key of the input it came from.
///
/// Equality is structural over `(key, message)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Envelope<K, T> {
    pub key: K,
    pub message: T,
}

impl<K, T> Envelope<K, T> {
    pub fn new(key: K, message: T) -> Self {
        Self { key, message }
    }

    pub fn into_parts(self) -> (K, T) {
        (self.key, self.message)
    }
}

impl<K, T> From<(K, T)> for Envelope<K, T> {
    fn from((key, message): (K, T)) -> Self {
        Self { key, message }
    }
}
