//! Bounded top-k collection of search candidates.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::vector::search::SearchResult;
use crate::vector::store::VectorId;

/// A scored vector for use in the heap.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: VectorId,
    distance: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on (distance, id): the root is the worst kept candidate.
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Keeps the `k` candidates with the smallest `(distance, id)`.
///
/// Because the order is total and includes the id, the kept set does not
/// depend on the order in which candidates arrive. Partial collectors built
/// on different threads can therefore be merged in any order and still give
/// the same answer as a single sequential scan.
#[derive(Debug)]
pub struct TopKCollector {
    k: usize,
    heap: BinaryHeap<Candidate>,
    examined: usize,
}

impl TopKCollector {
    /// Create a collector that keeps at most `k` results.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)),
            examined: 0,
        }
    }

    /// Offer a candidate.
    #[inline]
    pub fn collect(&mut self, id: VectorId, distance: f32) {
        self.examined += 1;
        if self.k == 0 {
            return;
        }

        let candidate = Candidate { id, distance };
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if let Some(mut worst) = self.heap.peek_mut()
            && candidate < *worst
        {
            *worst = candidate;
        }
    }

    /// Fold another partial result into this one.
    pub fn merge(&mut self, other: TopKCollector) {
        let examined = self.examined + other.examined;
        for candidate in other.heap {
            self.collect(candidate.id, candidate.distance);
        }
        self.examined = examined;
    }

    /// Number of candidates offered so far, across merges.
    pub fn examined(&self) -> usize {
        self.examined
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Results ordered by ascending distance, ties by ascending id.
    pub fn into_sorted_vec(self) -> Vec<SearchResult> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| SearchResult {
                id: c.id,
                distance: c.distance,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_k_smallest() {
        let mut collector = TopKCollector::new(2);
        collector.collect(0, 3.0);
        collector.collect(1, 1.0);
        collector.collect(2, 2.0);
        collector.collect(3, 0.5);

        let results = collector.into_sorted_vec();
        let ids: Vec<_> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_ties_prefer_lower_id() {
        let mut collector = TopKCollector::new(2);
        collector.collect(5, 1.0);
        collector.collect(9, 1.0);
        collector.collect(2, 1.0);

        let ids: Vec<_> = collector.into_sorted_vec().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 5]);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let distances = [4.0, 1.0, 1.0, 7.0, 0.0, 2.0, 1.0, 3.0];

        let mut single = TopKCollector::new(3);
        for (id, d) in distances.iter().enumerate() {
            single.collect(id as u64, *d);
        }

        let mut left = TopKCollector::new(3);
        let mut right = TopKCollector::new(3);
        for (id, d) in distances.iter().enumerate() {
            if id % 2 == 0 {
                left.collect(id as u64, *d);
            } else {
                right.collect(id as u64, *d);
            }
        }
        right.merge(left);

        assert_eq!(right.examined(), distances.len());
        assert_eq!(right.into_sorted_vec(), single.into_sorted_vec());
    }

    #[test]
    fn test_fewer_candidates_than_k() {
        let mut collector = TopKCollector::new(10);
        collector.collect(0, 1.0);
        assert_eq!(collector.len(), 1);
        assert_eq!(collector.into_sorted_vec().len(), 1);
    }
}
