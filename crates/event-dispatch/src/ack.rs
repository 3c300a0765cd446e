use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};

use crate::message::{Outcome, TopicPartition};

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    InFlight,
    Done(Outcome),
}

#[derive(Debug, Default)]
struct PartitionCursor {
    committable: Option<i64>,
    pending: BTreeMap<i64, Slot>,
}

impl PartitionCursor {
    fn is_behind_cursor(&self, offset: i64) -> bool {
        self.committable.is_some_and(|c| offset <= c)
    }

    /// Pops the completed prefix and moves the cursor over it.
    fn advance(&mut self, commit_past_failures: bool) -> Option<i64> {
        let before = self.committable;

        while let Some(entry) = self.pending.first_entry() {
            let terminal = match entry.get() {
                Slot::InFlight => false,
                Slot::Done(Outcome::Failed(_)) => commit_past_failures,
                Slot::Done(_) => true,
            };
            if !terminal {
                break;
            }

            let offset = *entry.key();
            entry.remove();
            self.committable = Some(self.committable.map_or(offset, |c| c.max(offset)));
        }

        (self.committable != before).then_some(self.committable).flatten()
    }
}

/// Tracks per-partition completion and derives the highest offset that is
/// safe to commit.
///
/// Only offsets that were seen (tracked or marked) take part, so gaps in the
/// broker's offset sequence never block the cursor. Completions may arrive out
/// of order; the cursor only moves over a contiguous completed prefix and never
/// goes backward.
#[derive(Debug, Default)]
pub struct AckTracker {
    partitions: RwLock<HashMap<TopicPartition, Arc<Mutex<PartitionCursor>>>>,
    commit_past_failures: bool,
}

impl AckTracker {
    pub fn new(commit_past_failures: bool) -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
            commit_past_failures,
        }
    }

    fn cursor(&self, tp: &TopicPartition) -> Arc<Mutex<PartitionCursor>> {
        if let Some(cursor) = self.partitions.read().get(tp) {
            return cursor.clone();
        }

        self.partitions
            .write()
            .entry(tp.clone())
            .or_default()
            .clone()
    }

    /// Registers an offset as received but not yet decided.
    pub fn track(&self, tp: &TopicPartition, offset: i64) {
        let cursor = self.cursor(tp);
        let mut cursor = cursor.lock();

        if cursor.is_behind_cursor(offset) {
            return;
        }
        cursor.pending.entry(offset).or_insert(Slot::InFlight);
    }

    /// Records the outcome for an offset. Returns the new committable offset
    /// when this completion moved the cursor.
    pub fn mark_done(&self, tp: &TopicPartition, offset: i64, outcome: &Outcome) -> Option<i64> {
        let cursor = self.cursor(tp);
        let mut cursor = cursor.lock();

        if cursor.is_behind_cursor(offset) {
            return None;
        }
        cursor.pending.insert(offset, Slot::Done(outcome.clone()));
        cursor.advance(self.commit_past_failures)
    }

    pub fn committable_offset(&self, tp: &TopicPartition) -> Option<i64> {
        self.partitions
            .read()
            .get(tp)
            .and_then(|cursor| cursor.lock().committable)
    }

    /// Offsets that are tracked but not yet covered by the cursor.
    pub fn pending(&self, tp: &TopicPartition) -> usize {
        self.partitions
            .read()
            .get(tp)
            .map_or(0, |cursor| cursor.lock().pending.len())
    }

    pub fn partitions(&self) -> Vec<TopicPartition> {
        self.partitions.read().keys().cloned().collect()
    }
}
