// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

/// How worth keeping a candidate node is. Greater exclusive duration ranks
/// higher; among equal durations the earlier candidate ranks higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeRank {
    pub exclusive: Duration,
    pub seq: u64,
}

impl Ord for NodeRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.exclusive
            .cmp(&other.exclusive)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for NodeRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
struct Entry<T> {
    rank: NodeRank,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rank == other.rank
    }
}

impl<T> Eq for Entry<T> {}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank.cmp(&other.rank)
    }
}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Offer<T> {
    Accepted,
    /// Accepted by pushing out the carried item.
    Replaced(T),
    Rejected,
}

/// Bounded min-heap keeping the `cap` highest ranked items seen so far.
#[derive(Debug)]
pub(crate) struct NodeHeap<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    cap: usize,
}

impl<T> NodeHeap<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            cap,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether a candidate with this exclusive duration would be kept.
    pub fn would_accept(&self, exclusive: Duration) -> bool {
        if self.heap.len() < self.cap {
            return true;
        }
        self.heap
            .peek()
            .is_some_and(|Reverse(min)| exclusive > min.rank.exclusive)
    }

    pub fn offer(&mut self, rank: NodeRank, item: T) -> Offer<T> {
        if !self.would_accept(rank.exclusive) {
            return Offer::Rejected;
        }
        let evicted = if self.heap.len() < self.cap {
            None
        } else {
            self.heap.pop().map(|Reverse(entry)| entry.item)
        };
        self.heap.push(Reverse(Entry { rank, item }));
        evicted.map_or(Offer::Accepted, Offer::Replaced)
    }

    /// The retained items, in no particular order.
    pub fn into_items(self) -> Vec<T> {
        self.heap
            .into_vec()
            .into_iter()
            .map(|Reverse(entry)| entry.item)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rank(ms: u64, seq: u64) -> NodeRank {
        NodeRank {
            exclusive: Duration::from_millis(ms),
            seq,
        }
    }

    #[test]
    fn test_keeps_longest() {
        let mut heap = NodeHeap::new(5);
        for (seq, ms) in [5, 4, 6, 3, 7, 2, 8, 1, 9].into_iter().enumerate() {
            heap.offer(rank(ms, seq as u64), ms);
        }
        let mut kept = heap.into_items();
        kept.sort_unstable();
        assert_eq!(kept, vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_equal_duration_does_not_replace() {
        let mut heap = NodeHeap::new(1);
        assert_eq!(heap.offer(rank(3, 0), "first"), Offer::Accepted);
        assert_eq!(heap.offer(rank(3, 1), "second"), Offer::Rejected);
        assert_eq!(heap.offer(rank(4, 2), "third"), Offer::Replaced("first"));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_zero_capacity() {
        let mut heap = NodeHeap::new(0);
        assert!(!heap.would_accept(Duration::from_secs(100)));
        assert_eq!(heap.offer(rank(1, 0), ()), Offer::Rejected);
    }

    proptest! {
        #[test]
        fn kept_items_are_the_longest(
            durations in proptest::collection::vec(0u64..50, 0..64),
            cap in 0usize..10,
        ) {
            let mut heap = NodeHeap::new(cap);
            for (seq, ms) in durations.iter().enumerate() {
                heap.offer(rank(*ms, seq as u64), *ms);
            }
            let mut kept = heap.into_items();
            kept.sort_unstable();

            let mut expected = durations.clone();
            expected.sort_unstable_by(|a, b| b.cmp(a));
            expected.truncate(cap);
            expected.sort_unstable();

            prop_assert_eq!(kept, expected);
        }
    }
}
