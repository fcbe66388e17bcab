//! Global scheduler: the earliest pending record across all queues.
//!
//! An indexed binary min-heap with one slot per body (holding that body's
//! queue front, or its sentinel) and one slot per active system source.
//! Body positions live in an arena-indexed `Vec`; system positions in an
//! [`IndexMap`] so iteration order is deterministic.
//!
//! The scheduler orders records. It does not check staleness.

use indexmap::IndexMap;

use ricochet_core::{BodyId, ConfigError, EventRecord, Subject, SystemEventId};

/// Indexed min-heap over body fronts and system records.
#[derive(Clone, Debug)]
pub struct GlobalScheduler {
    heap: Vec<EventRecord>,
    body_pos: Vec<usize>,
    system_pos: IndexMap<SystemEventId, usize>,
}

impl GlobalScheduler {
    /// A scheduler with `body_count` body slots, all holding sentinels.
    pub fn new(body_count: usize) -> Self {
        let heap = (0..body_count)
            .map(|i| EventRecord::none(Subject::Body(BodyId(i as u32))))
            .collect();
        Self {
            heap,
            body_pos: (0..body_count).collect(),
            system_pos: IndexMap::new(),
        }
    }

    /// Number of body slots.
    #[inline]
    pub fn body_count(&self) -> usize {
        self.body_pos.len()
    }

    /// Number of active system sources.
    #[inline]
    pub fn system_count(&self) -> usize {
        self.system_pos.len()
    }

    /// The globally earliest non-sentinel record. O(1).
    ///
    /// `None` when every slot holds a sentinel or a `+∞` record.
    pub fn next_event(&self) -> Option<EventRecord> {
        self.heap
            .first()
            .filter(|r| !r.is_none() && r.time().is_finite())
            .copied()
    }

    /// The record at the top of the heap, sentinel included.
    pub fn peek(&self) -> Option<&EventRecord> {
        self.heap.first()
    }

    /// Replace body `id`'s slot with its new queue front. O(log N).
    pub fn on_body_updated(&mut self, id: BodyId, front: EventRecord) -> Result<(), ConfigError> {
        let pos = *self
            .body_pos
            .get(id.index())
            .ok_or(ConfigError::UnknownBody {
                id,
                context: "scheduler update",
            })?;
        debug_assert_eq!(front.subject(), Subject::Body(id));
        self.replace_at(pos, front);
        Ok(())
    }

    /// Insert or re-arm system source `id` with `record`. O(log N).
    pub fn register_system_event(&mut self, id: SystemEventId, record: EventRecord) {
        debug_assert_eq!(record.subject(), Subject::System(id));
        match self.system_pos.get(&id) {
            Some(&pos) => self.replace_at(pos, record),
            None => {
                let pos = self.heap.len();
                self.heap.push(record);
                self.system_pos.insert(id, pos);
                self.sift_up(pos);
            }
        }
    }

    /// Remove system source `id`. Returns its pending record. O(log N).
    pub fn retire_system_event(&mut self, id: SystemEventId) -> Option<EventRecord> {
        let pos = self.system_pos.shift_remove(&id)?;
        let last = self.heap.len() - 1;
        self.heap.swap(pos, last);
        let removed = self.heap.pop();
        if pos < self.heap.len() {
            self.set_pos(pos);
            self.sift_down(pos);
            self.sift_up(pos);
        }
        removed
    }

    /// Current record held for `subject`.
    pub fn front_of(&self, subject: Subject) -> Option<EventRecord> {
        let pos = match subject {
            Subject::Body(b) => *self.body_pos.get(b.index())?,
            Subject::System(s) => *self.system_pos.get(&s)?,
        };
        self.heap.get(pos).copied()
    }

    /// Active system sources in registration order.
    pub fn system_ids(&self) -> impl Iterator<Item = SystemEventId> + '_ {
        self.system_pos.keys().copied()
    }

    /// Replace every slot at once. O(N).
    ///
    /// Body slots not named in `records` hold sentinels. System sources not
    /// named are dropped. Later records for the same subject win.
    pub fn rebuild(&mut self, records: impl IntoIterator<Item = EventRecord>) -> Result<(), ConfigError> {
        let n = self.body_count();
        let mut bodies: Vec<EventRecord> = (0..n)
            .map(|i| EventRecord::none(Subject::Body(BodyId(i as u32))))
            .collect();
        let mut systems: IndexMap<SystemEventId, EventRecord> = IndexMap::new();
        for r in records {
            match r.subject() {
                Subject::Body(b) => {
                    let slot = bodies.get_mut(b.index()).ok_or(ConfigError::UnknownBody {
                        id: b,
                        context: "scheduler rebuild",
                    })?;
                    *slot = r;
                }
                Subject::System(s) => {
                    systems.insert(s, r);
                }
            }
        }
        self.heap = bodies;
        self.system_pos.clear();
        for (id, r) in systems {
            self.system_pos.insert(id, self.heap.len());
            self.heap.push(r);
        }
        for i in (0..self.heap.len() / 2).rev() {
            self.sift_down(i);
        }
        for i in 0..self.heap.len() {
            self.set_pos(i);
        }
        Ok(())
    }

    /// `true` if the heap property holds and every position entry points
    /// at its own slot.
    pub fn is_consistent(&self) -> bool {
        let heap_ok = (1..self.heap.len()).all(|i| self.heap[(i - 1) / 2] <= self.heap[i]);
        let bodies_ok = self.body_pos.iter().enumerate().all(|(b, &pos)| {
            self.heap
                .get(pos)
                .is_some_and(|r| r.subject() == Subject::Body(BodyId(b as u32)))
        });
        let systems_ok = self.system_pos.iter().all(|(&s, &pos)| {
            self.heap
                .get(pos)
                .is_some_and(|r| r.subject() == Subject::System(s))
        });
        heap_ok && bodies_ok && systems_ok && self.heap.len() == self.body_count() + self.system_count()
    }

    fn replace_at(&mut self, pos: usize, record: EventRecord) {
        let old = self.heap[pos];
        self.heap[pos] = record;
        if record < old {
            self.sift_up(pos);
        } else {
            self.sift_down(pos);
        }
    }

    fn set_pos(&mut self, i: usize) {
        match self.heap[i].subject() {
            Subject::Body(b) => self.body_pos[b.index()] = i,
            Subject::System(s) => {
                if let Some(p) = self.system_pos.get_mut(&s) {
                    *p = i;
                }
            }
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.set_pos(a);
        self.set_pos(b);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[i] < self.heap[parent] {
                self.swap(i, parent);
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
            self.swap(i, smallest);
            i = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ricochet_core::{Epoch, EventKind, SimTime};

    fn t(v: f64) -> SimTime {
        SimTime::new(v).unwrap()
    }

    fn wall(body: u32, time: f64) -> EventRecord {
        EventRecord::single(EventKind::BoundaryCrossing, t(time), BodyId(body), Epoch(0), 0)
    }

    #[test]
    fn fresh_scheduler_is_exhausted() {
        let s = GlobalScheduler::new(4);
        assert!(s.next_event().is_none());
        assert!(s.is_consistent());
    }

    #[test]
    fn updates_reposition_body() {
        let mut s = GlobalScheduler::new(3);
        s.on_body_updated(BodyId(0), wall(0, 5.0)).unwrap();
        s.on_body_updated(BodyId(1), wall(1, 3.0)).unwrap();
        s.on_body_updated(BodyId(2), wall(2, 4.0)).unwrap();
        assert_eq!(s.next_event().unwrap().subject(), Subject::Body(BodyId(1)));

        // Move body 1 later; body 2 becomes earliest.
        s.on_body_updated(BodyId(1), wall(1, 9.0)).unwrap();
        assert_eq!(s.next_event().unwrap().subject(), Subject::Body(BodyId(2)));
        assert!(s.is_consistent());
    }

    #[test]
    fn unknown_body_is_rejected() {
        let mut s = GlobalScheduler::new(1);
        let err = s.on_body_updated(BodyId(7), wall(7, 1.0)).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBody { id: BodyId(7), .. }));
    }

    #[test]
    fn infinite_front_never_selected() {
        let mut s = GlobalScheduler::new(2);
        s.on_body_updated(BodyId(0), EventRecord::none(Subject::Body(BodyId(0))))
            .unwrap();
        s.on_body_updated(
            BodyId(1),
            EventRecord::single(EventKind::BoundaryCrossing, SimTime::NEVER, BodyId(1), Epoch(0), 0),
        )
        .unwrap();
        assert!(s.next_event().is_none());
    }

    #[test]
    fn system_sources_register_and_retire() {
        let mut s = GlobalScheduler::new(2);
        s.on_body_updated(BodyId(0), wall(0, 2.0)).unwrap();
        let sys = SystemEventId(0);
        s.register_system_event(sys, EventRecord::system(t(1.0), sys, Epoch(0), 0));
        assert_eq!(s.next_event().unwrap().subject(), Subject::System(sys));

        // Re-arm replaces the slot instead of adding one.
        s.register_system_event(sys, EventRecord::system(t(3.0), sys, Epoch(1), 0));
        assert_eq!(s.system_count(), 1);
        assert_eq!(s.next_event().unwrap().subject(), Subject::Body(BodyId(0)));

        let removed = s.retire_system_event(sys).unwrap();
        assert_eq!(removed.time().value(), 3.0);
        assert!(s.retire_system_event(sys).is_none());
        assert!(s.is_consistent());
    }

    #[test]
    fn rebuild_rekeys_everything() {
        let mut s = GlobalScheduler::new(3);
        s.on_body_updated(BodyId(0), wall(0, 1.0)).unwrap();
        let sys = SystemEventId(2);
        s.rebuild([
            wall(2, 4.0),
            wall(1, 6.0),
            EventRecord::system(t(5.0), sys, Epoch(0), 0),
        ])
        .unwrap();
        assert!(s.is_consistent());
        assert!(s.front_of(Subject::Body(BodyId(0))).unwrap().is_none());
        assert_eq!(s.next_event().unwrap().subject(), Subject::Body(BodyId(2)));
        assert_eq!(s.system_ids().collect::<Vec<_>>(), vec![sys]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Body(u32, Option<f64>),
            Arm(u32, f64),
            Retire(u32),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                4 => (0u32..16, prop::option::of(0.0f64..100.0)).prop_map(|(b, t)| Op::Body(b, t)),
                1 => (0u32..4, 0.0f64..100.0).prop_map(|(s, t)| Op::Arm(s, t)),
                1 => (0u32..4).prop_map(Op::Retire),
            ]
        }

        proptest! {
            #[test]
            fn next_event_is_brute_force_minimum(ops in prop::collection::vec(op(), 1..200)) {
                let mut s = GlobalScheduler::new(16);
                let mut bodies: Vec<EventRecord> =
                    (0..16).map(|i| EventRecord::none(Subject::Body(BodyId(i)))).collect();
                let mut systems: IndexMap<u32, EventRecord> = IndexMap::new();

                for op in ops {
                    match op {
                        Op::Body(b, time) => {
                            let r = match time {
                                Some(v) => wall(b, v),
                                None => EventRecord::none(Subject::Body(BodyId(b))),
                            };
                            bodies[b as usize] = r;
                            s.on_body_updated(BodyId(b), r).unwrap();
                        }
                        Op::Arm(id, v) => {
                            let r = EventRecord::system(t(v), SystemEventId(id), Epoch(0), 0);
                            systems.insert(id, r);
                            s.register_system_event(SystemEventId(id), r);
                        }
                        Op::Retire(id) => {
                            systems.shift_remove(&id);
                            s.retire_system_event(SystemEventId(id));
                        }
                    }
                    let expected = bodies
                        .iter()
                        .chain(systems.values())
                        .filter(|r| !r.is_none())
                        .min()
                        .copied();
                    prop_assert_eq!(s.next_event(), expected);
                    prop_assert!(s.is_consistent());
                }
            }
        }
    }
}
