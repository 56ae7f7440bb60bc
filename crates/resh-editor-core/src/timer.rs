//! Per-session timer registry.
//!
//! Debounces and idle timeouts are the only scheduling primitive the editor
//! needs. Instead of scattering callbacks, every timer lives in a handle table
//! owned by the session, so tearing the session down cancels everything at
//! once and no late callback can reach a view that is gone.
//!
//! Timers are keyed: scheduling a key that is already pending replaces the
//! old deadline rather than stacking a second timer. Time is always passed in
//! by the caller, which keeps the registry deterministic under test.

use std::fmt::Debug;
use std::time::Duration;

use web_time::Instant;

/// Handle to a scheduled timer. Stale handles (for timers that fired, were
/// cancelled or replaced) are rejected by generation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Entry<K> {
    key: K,
    deadline: Instant,
    /// Insertion order, breaks ties between equal deadlines.
    seq: u64,
}

#[derive(Debug)]
struct Slot<K> {
    generation: u32,
    entry: Option<Entry<K>>,
}

#[derive(Debug)]
pub struct TimerRegistry<K> {
    slots: Vec<Slot<K>>,
    free: Vec<u32>,
    next_seq: u64,
}

impl<K> Default for TimerRegistry<K> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<K: Copy + Eq + Debug> TimerRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` to fire at `deadline`, replacing any pending timer for
    /// the same key.
    pub fn schedule(&mut self, key: K, deadline: Instant) -> TimerHandle {
        self.cancel(key);

        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = Entry { key, deadline, seq };

        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].entry = Some(entry);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                (self.slots.len() - 1) as u32
            }
        };
        let generation = self.slots[index as usize].generation;
        tracing::trace!(?key, "timer scheduled");
        TimerHandle { index, generation }
    }

    pub fn schedule_after(&mut self, key: K, now: Instant, delay: Duration) -> TimerHandle {
        self.schedule(key, now + delay)
    }

    /// Cancel the pending timer for `key`. Returns whether one existed.
    pub fn cancel(&mut self, key: K) -> bool {
        match self.index_of(key) {
            Some(index) => {
                self.release(index);
                true
            }
            None => false,
        }
    }

    /// Cancel by handle. Returns false for stale handles.
    pub fn cancel_handle(&mut self, handle: TimerHandle) -> bool {
        match self.slots.get(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.entry.is_some() => {
                self.release(handle.index);
                true
            }
            _ => false,
        }
    }

    /// Cancel every pending timer. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let live: Vec<u32> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.entry.is_some())
            .map(|(i, _)| i as u32)
            .collect();
        for index in &live {
            self.release(*index);
        }
        live.len()
    }

    pub fn is_scheduled(&self, key: K) -> bool {
        self.index_of(key).is_some()
    }

    pub fn deadline(&self, key: K) -> Option<Instant> {
        self.index_of(key)
            .and_then(|i| self.slots[i as usize].entry.as_ref())
            .map(|e| e.deadline)
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries().map(|e| e.deadline).min()
    }

    /// Remove and return every key whose deadline is at or before `now`, in
    /// deadline order.
    pub fn fire_due(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<(Instant, u64, u32)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.entry.as_ref().map(|e| (e, i)))
            .filter(|(e, _)| e.deadline <= now)
            .map(|(e, i)| (e.deadline, e.seq, i as u32))
            .collect();
        due.sort_unstable_by_key(|&(deadline, seq, _)| (deadline, seq));

        due.into_iter()
            .filter_map(|(_, _, index)| self.release(index))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> impl Iterator<Item = &Entry<K>> {
        self.slots.iter().filter_map(|slot| slot.entry.as_ref())
    }

    fn index_of(&self, key: K) -> Option<u32> {
        self.slots
            .iter()
            .position(|slot| slot.entry.as_ref().is_some_and(|e| e.key == key))
            .map(|i| i as u32)
    }

    fn release(&mut self, index: u32) -> Option<K> {
        let slot = &mut self.slots[index as usize];
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        Some(entry.key)
    }
}
