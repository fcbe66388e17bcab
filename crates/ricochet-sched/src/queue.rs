//! Per-body prediction queue.
//!
//! [`ParticleEventQueue`] is a binary min-heap over [`EventRecord`]s,
//! stored inline in a [`SmallVec`] so that typical queues (a handful of
//! neighbour interactions, one boundary, one transition) never allocate.

use smallvec::SmallVec;

use ricochet_core::{BodyId, EventRecord, SimTime, Subject};

/// Inline capacity of a queue before it spills to the heap.
pub const INLINE_RECORDS: usize = 8;

/// Pending predictions owned by one body.
///
/// Only holds records whose subject is the owning body. Staleness is not
/// checked here: the front may be stale, and the consumer validates it.
#[derive(Clone, Debug)]
pub struct ParticleEventQueue {
    owner: BodyId,
    heap: SmallVec<[EventRecord; INLINE_RECORDS]>,
}

impl ParticleEventQueue {
    /// An empty queue for `owner`.
    pub fn new(owner: BodyId) -> Self {
        Self {
            owner,
            heap: SmallVec::new(),
        }
    }

    /// An empty queue for `owner` with room for `capacity` records.
    pub fn with_capacity(owner: BodyId, capacity: usize) -> Self {
        Self {
            owner,
            heap: SmallVec::with_capacity(capacity),
        }
    }

    /// Build a queue from records in any order.
    ///
    /// Returns the first record whose subject is not `owner`.
    pub fn from_records(
        owner: BodyId,
        records: impl IntoIterator<Item = EventRecord>,
    ) -> Result<Self, EventRecord> {
        let mut heap = SmallVec::new();
        for r in records {
            if r.subject() != Subject::Body(owner) || r.is_none() {
                return Err(r);
            }
            heap.push(r);
        }
        let mut q = Self { owner, heap };
        q.heapify();
        Ok(q)
    }

    /// The body that owns this queue.
    #[inline]
    pub fn owner(&self) -> BodyId {
        self.owner
    }

    /// Number of stored records.
    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// `true` if no record is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Insert a record. O(log k).
    ///
    /// Sentinel records are ignored.
    pub fn push(&mut self, record: EventRecord) {
        debug_assert_eq!(record.subject(), Subject::Body(self.owner));
        if record.is_none() {
            return;
        }
        self.heap.push(record);
        self.sift_up(self.heap.len() - 1);
    }

    /// Earliest record, or the `None` sentinel when empty. O(1).
    #[inline]
    pub fn peek_min(&self) -> EventRecord {
        match self.heap.first() {
            Some(r) => *r,
            None => EventRecord::none(Subject::Body(self.owner)),
        }
    }

    /// Remove and return the earliest record. O(log k).
    pub fn pop_min(&mut self) -> Option<EventRecord> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let out = self.heap.pop();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        out
    }

    /// Drop every record. The inline buffer is retained.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Scale every record's offset from `now` by `factor`.
    ///
    /// `t' = now + (t - now) * factor`. `factor` must be positive. The heap
    /// is rebuilt because rounding can collapse distinct times into ties.
    pub fn rescale(&mut self, factor: f64, now: SimTime) {
        self.remap(|t| SimTime::new(now.value() + (t.value() - now.value()) * factor));
    }

    /// Subtract `shift` from every record time.
    pub fn shift(&mut self, shift: f64) {
        self.remap(|t| SimTime::new(t.value() - shift));
    }

    /// Records in heap order (not sorted).
    pub fn iter(&self) -> impl Iterator<Item = &EventRecord> {
        self.heap.iter()
    }

    /// Records in ascending order.
    pub fn sorted(&self) -> Vec<EventRecord> {
        let mut v: Vec<EventRecord> = self.heap.iter().copied().collect();
        v.sort_unstable();
        v
    }

    fn remap(&mut self, f: impl Fn(SimTime) -> Option<SimTime>) {
        for r in self.heap.iter_mut() {
            if let Some(t) = f(r.time()) {
                *r = r.with_time(t);
            }
        }
        self.heapify();
    }

    fn heapify(&mut self) {
        let n = self.heap.len();
        for i in (0..n / 2).rev() {
            self.sift_down(i);
        }
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[i] < self.heap[parent] {
                self.heap.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let n = self.heap.len();
        loop {
            let l = 2 * i + 1;
            let r = l + 1;
            let mut smallest = i;
            if l < n && self.heap[l] < self.heap[smallest] {
                smallest = l;
            }
            if r < n && self.heap[r] < self.heap[smallest] {
                smallest = r;
            }
            if smallest == i {
                break;
            }
            self.heap.swap(i, smallest);
            i = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricochet_core::{Epoch, EventKind};

    fn t(v: f64) -> SimTime {
        SimTime::new(v).unwrap()
    }

    fn wall(owner: u32, time: f64, aux: u32) -> EventRecord {
        EventRecord::single(
            EventKind::BoundaryCrossing,
            t(time),
            BodyId(owner),
            Epoch(0),
            aux,
        )
    }

    fn pair(owner: u32, partner: u32, time: f64) -> EventRecord {
        EventRecord::interaction(t(time), BodyId(owner), Epoch(0), BodyId(partner), Epoch(0), 0)
    }

    #[test]
    fn empty_queue_peeks_sentinel() {
        let q = ParticleEventQueue::new(BodyId(3));
        let front = q.peek_min();
        assert!(front.is_none());
        assert_eq!(front.time(), SimTime::NEVER);
        assert_eq!(front.subject(), Subject::Body(BodyId(3)));
    }

    #[test]
    fn pops_in_ascending_order() {
        let mut q = ParticleEventQueue::new(BodyId(0));
        q.push(wall(0, 4.0, 0));
        q.push(pair(0, 2, 1.0));
        q.push(pair(0, 1, 3.0));
        q.push(wall(0, 2.0, 1));
        let times: Vec<f64> = std::iter::from_fn(|| q.pop_min())
            .map(|r| r.time().value())
            .collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0, 4.0]);
        assert!(q.is_empty());
        assert!(q.pop_min().is_none());
    }

    #[test]
    fn equal_times_break_by_kind_then_partner() {
        let mut q = ParticleEventQueue::new(BodyId(0));
        q.push(wall(0, 1.0, 0));
        q.push(pair(0, 5, 1.0));
        q.push(pair(0, 2, 1.0));
        assert_eq!(q.pop_min().unwrap().partner(), Some(BodyId(2)));
        assert_eq!(q.pop_min().unwrap().partner(), Some(BodyId(5)));
        assert_eq!(q.pop_min().unwrap().kind(), EventKind::BoundaryCrossing);
    }

    #[test]
    fn sentinel_push_is_ignored() {
        let mut q = ParticleEventQueue::new(BodyId(1));
        q.push(EventRecord::none(Subject::Body(BodyId(1))));
        assert!(q.is_empty());
    }

    #[test]
    fn clear_empties() {
        let mut q = ParticleEventQueue::with_capacity(BodyId(0), 4);
        q.push(wall(0, 1.0, 0));
        q.push(wall(0, 2.0, 1));
        q.clear();
        assert!(q.is_empty());
        assert!(q.peek_min().is_none());
    }

    #[test]
    fn rescale_about_now() {
        let mut q = ParticleEventQueue::new(BodyId(0));
        q.push(wall(0, 3.0, 0));
        q.push(wall(0, 5.0, 1));
        q.rescale(0.5, t(1.0));
        let v: Vec<f64> = q.sorted().iter().map(|r| r.time().value()).collect();
        assert_eq!(v, vec![2.0, 3.0]);
    }

    #[test]
    fn shift_moves_every_record() {
        let mut q = ParticleEventQueue::new(BodyId(0));
        q.push(wall(0, 10.0, 0));
        q.push(pair(0, 1, 12.0));
        q.shift(10.0);
        assert_eq!(q.peek_min().time().value(), 0.0);
        assert_eq!(q.sorted()[1].time().value(), 2.0);
    }

    #[test]
    fn from_records_rejects_foreign_subject() {
        let ok = ParticleEventQueue::from_records(BodyId(0), [wall(0, 2.0, 0), wall(0, 1.0, 1)])
            .unwrap();
        assert_eq!(ok.peek_min().time().value(), 1.0);
        let bad = ParticleEventQueue::from_records(BodyId(0), [wall(1, 2.0, 0)]);
        assert_eq!(bad.unwrap_err().subject(), Subject::Body(BodyId(1)));
    }

    #[test]
    fn small_queues_stay_inline() {
        let mut q = ParticleEventQueue::new(BodyId(0));
        for i in 0..INLINE_RECORDS {
            q.push(wall(0, i as f64, 0));
        }
        assert!(!q.heap.spilled());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn pop_order_matches_sorted(
                entries in prop::collection::vec((0.0f64..100.0, 0u32..6, 0u32..3), 0..40)
            ) {
                let mut q = ParticleEventQueue::new(BodyId(0));
                let mut expected = Vec::new();
                for (time, partner, aux) in entries {
                    let r = if partner == 0 {
                        wall(0, time, aux)
                    } else {
                        EventRecord::interaction(t(time), BodyId(0), Epoch(0), BodyId(partner), Epoch(0), aux)
                    };
                    q.push(r);
                    expected.push(r);
                }
                expected.sort();
                let popped: Vec<EventRecord> = std::iter::from_fn(|| q.pop_min()).collect();
                prop_assert_eq!(popped, expected);
            }

            #[test]
            fn rescale_preserves_count_and_order(
                times in prop::collection::vec(1.0f64..50.0, 1..20),
                factor in 0.1f64..10.0,
            ) {
                let mut q = ParticleEventQueue::new(BodyId(0));
                for (i, &time) in times.iter().enumerate() {
                    q.push(wall(0, time, i as u32));
                }
                q.rescale(factor, t(1.0));
                prop_assert_eq!(q.len(), times.len());
                let popped: Vec<f64> = std::iter::from_fn(|| q.pop_min()).map(|r| r.time().value()).collect();
                prop_assert!(popped.windows(2).all(|w| w[0] <= w[1]));
            }
        }
    }
}
