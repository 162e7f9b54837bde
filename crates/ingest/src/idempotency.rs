//! Bounded cache of recently applied event IDs.

use std::collections::{HashMap, VecDeque};

use common::EventId;

/// Remembers the most recent `capacity` event IDs.
///
/// Oldest IDs are evicted first, so a replay older than the retention horizon
/// is applied again. Replace semantics make that replay harmless as long as
/// no newer score for the same pair arrived in between.
///
/// Each reservation is tagged with a sequence number. Releasing an ID only
/// drops it from the lookup map; its queue entry stays behind as a tombstone
/// and is skipped when it reaches the front. The queue is compacted once
/// tombstones outnumber `capacity`.
#[derive(Debug)]
pub struct IdempotencyCache {
    seen: HashMap<EventId, u64>,
    order: VecDeque<(u64, EventId)>,
    capacity: usize,
    next_seq: u64,
}

impl IdempotencyCache {
    /// Creates a cache retaining at most `capacity` IDs (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            seen: HashMap::with_capacity(capacity.min(4096)),
            order: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            next_seq: 0,
        }
    }

    /// Marks `event_id` as taken. Returns false if it was already present.
    pub fn reserve(&mut self, event_id: &EventId) -> bool {
        if self.seen.contains_key(event_id) {
            return false;
        }
        while self.seen.len() >= self.capacity {
            let Some((seq, evicted)) = self.order.pop_front() else {
                break;
            };
            if self.is_live(seq, &evicted) {
                self.seen.remove(&evicted);
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.seen.insert(event_id.clone(), seq);
        self.order.push_back((seq, event_id.clone()));

        if self.order.len() > self.capacity.saturating_mul(2) {
            self.compact();
        }
        true
    }

    /// Forgets `event_id`, allowing it to be applied again. O(1).
    pub fn release(&mut self, event_id: &EventId) {
        self.seen.remove(event_id);
    }

    /// Returns true if `event_id` is currently remembered.
    pub fn contains(&self, event_id: &EventId) -> bool {
        self.seen.contains_key(event_id)
    }

    /// Number of remembered IDs.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Maximum number of remembered IDs.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn is_live(&self, seq: u64, event_id: &EventId) -> bool {
        self.seen.get(event_id) == Some(&seq)
    }

    fn compact(&mut self) {
        let seen = &self.seen;
        self.order.retain(|(seq, id)| seen.get(id) == Some(seq));
    }
}
