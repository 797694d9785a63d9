//! Keyed finalizer storage for a local scope.
//!
//! Finalizers are stored under an increasing order number. Removing one by
//! key (when a child fiber finishes before its parent scope closes) is
//! O(log n); draining yields them most-recent first so resources are
//! released in reverse acquisition order.

use std::collections::BTreeMap;
use std::fmt;

use crate::effect::Effect;

/// A finalizer receives the scope's close value and returns the effect that
/// releases the resource.
pub type Finalizer<A> = Box<dyn FnOnce(A) -> Effect<()> + Send>;

/// Ordered finalizers with LIFO draining.
pub(crate) struct FinalizerSet<A> {
    entries: BTreeMap<u64, Finalizer<A>>,
    next_order: u64,
}

impl<A> FinalizerSet<A> {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_order: 0,
        }
    }

    /// Stores `finalizer` and returns its order number.
    pub(crate) fn push(&mut self, finalizer: Finalizer<A>) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        self.entries.insert(order, finalizer);
        order
    }

    /// Removes the finalizer stored under `order`.
    pub(crate) fn remove(&mut self, order: u64) -> bool {
        self.entries.remove(&order).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Takes every finalizer, most recently registered first.
    pub(crate) fn drain_lifo(&mut self) -> Vec<Finalizer<A>> {
        let entries = std::mem::take(&mut self.entries);
        entries.into_values().rev().collect()
    }
}

impl<A> fmt::Debug for FinalizerSet<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizerSet")
            .field("pending", &self.entries.len())
            .field("next_order", &self.next_order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording(log: &Arc<Mutex<Vec<u32>>>, tag: u32) -> Finalizer<u32> {
        let log = Arc::clone(log);
        Box::new(move |_| {
            log.lock().unwrap().push(tag);
            Effect::unit()
        })
    }

    #[test]
    fn drains_most_recent_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set = FinalizerSet::new();
        set.push(recording(&log, 1));
        set.push(recording(&log, 2));
        set.push(recording(&log, 3));
        assert_eq!(set.len(), 3);

        for f in set.drain_lifo() {
            let _ = f(0);
        }
        assert_eq!(*log.lock().unwrap(), vec![3, 2, 1]);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn remove_by_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set = FinalizerSet::new();
        let first = set.push(recording(&log, 1));
        let _second = set.push(recording(&log, 2));
        assert!(set.remove(first));
        assert!(!set.remove(first));
        for f in set.drain_lifo() {
            let _ = f(0);
        }
        assert_eq!(*log.lock().unwrap(), vec![2]);
    }
}
