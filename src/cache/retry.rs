//! Delayed re-issue of failed fetches.

use super::fetch::FetchJob;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

/// A fetch waiting for its retry time
#[derive(Debug, Clone)]
struct ScheduledRetry {
    due: Instant,
    /// Insertion order, so equal due times pop first-in first-out
    seq: u64,
    job: FetchJob,
}

impl PartialEq for ScheduledRetry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for ScheduledRetry {}

impl PartialOrd for ScheduledRetry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledRetry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior (earliest due first)
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of retries ordered by due time
#[derive(Debug, Clone, Default)]
pub struct RetryQueue {
    pending: BinaryHeap<ScheduledRetry>,
    next_seq: u64,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, job: FetchJob, due: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(ScheduledRetry { due, seq, job });
    }

    /// Pop the earliest retry if it is due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<FetchJob> {
        if self.pending.peek()?.due > now {
            return None;
        }
        self.pending.pop().map(|r| r.job)
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.pending.peek().map(|r| r.due)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
