//! Subscription and publication tables.
//!
//! Pure bookkeeping; the router task owns the only instance, so nothing here
//! needs locking.

use flow_framework::{Connector, Input, Output, PortId};
use std::collections::HashMap;
use std::hash::Hash;

/// How a publisher's output reaches the router.
pub(crate) enum Link<T> {
    /// Source output connected straight to the keyed router input.
    Direct { sink: Input<T> },
    /// Source output connected to a private forwarding unit.
    Mediated { mediator: Connector<T, T> },
}

pub(crate) struct Publication<T> {
    pub source: Output<T>,
    pub link: Link<T>,
}

impl<T> Publication<T> {
    /// Removes the edge from the source. Messages already inside a mediator
    /// still reach the router.
    pub fn detach(&self) {
        match &self.link {
            Link::Direct { sink } => self.source.disconnect(sink),
            Link::Mediated { mediator } => self.source.disconnect(mediator.input()),
        };
    }
}

pub(crate) struct Registry<K, T> {
    subscriptions: HashMap<K, Vec<Input<T>>>,
    publications: HashMap<(K, PortId), Publication<T>>,
}

impl<K: Eq + Hash + Clone, T> Registry<K, T> {
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
            publications: HashMap::new(),
        }
    }

    /// Returns `false` if `input` was already subscribed to `key`.
    pub fn subscribe(&mut self, key: K, input: Input<T>) -> bool {
        let inputs = self.subscriptions.entry(key).or_default();
        if inputs.contains(&input) {
            return false;
        }
        inputs.push(input);
        true
    }

    /// Returns `false` if `input` was not subscribed to `key`.
    pub fn unsubscribe(&mut self, key: &K, input: &Input<T>) -> bool {
        let Some(inputs) = self.subscriptions.get_mut(key) else {
            return false;
        };
        let before = inputs.len();
        inputs.retain(|existing| existing != input);
        let removed = inputs.len() != before;
        if inputs.is_empty() {
            self.subscriptions.remove(key);
        }
        removed
    }

    pub fn subscribers(&self, key: &K) -> &[Input<T>] {
        self.subscriptions.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_published(&self, key: &K, source: PortId) -> bool {
        self.publications.contains_key(&(key.clone(), source))
    }

    pub fn insert_publication(&mut self, key: K, publication: Publication<T>) {
        let source = publication.source.id();
        self.publications.insert((key, source), publication);
    }

    pub fn remove_publication(&mut self, key: &K, source: PortId) -> Option<Publication<T>> {
        self.publications.remove(&(key.clone(), source))
    }

    pub fn key_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.values().map(Vec::len).sum()
    }

    pub fn publication_count(&self) -> usize {
        self.publications.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn input() -> Input<u8> {
        let (sender, _receiver) = mpsc::unbounded_channel();
        Input::from_sender(sender)
    }

    #[test]
    fn subscriptions_are_deduplicated_by_identity() {
        let mut registry = Registry::new();
        let a = input();
        let b = input();

        assert!(registry.subscribe("k", a.clone()));
        assert!(!registry.subscribe("k", a.clone()));
        assert!(registry.subscribe("k", b.clone()));
        assert_eq!(registry.subscribers(&"k").len(), 2);

        assert!(registry.unsubscribe(&"k", &a));
        assert!(!registry.unsubscribe(&"k", &a));
        assert!(registry.unsubscribe(&"k", &b));
        assert!(registry.subscribers(&"k").is_empty());
        assert_eq!(registry.key_count(), 0);
    }
}
