//! The bounded multi-producer, single-consumer priority queue that backs
//! every `|` seam: entries are delivered to the consumer in strictly
//! ascending timestamp order, gated by a monotonically advancing HEAD.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{RipCurrentError, RipCurrentResult};
use crate::message::Envelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey(i64, u64);

struct QueuedEntry {
    key: QueueKey,
    envelope: Envelope,
}

impl PartialEq for QueuedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for QueuedEntry {}
impl PartialOrd for QueuedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueuedEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

#[derive(Default)]
pub struct MmpqStats {
    pub published_count: u64,
    pub dropped_count: u64,
    pub processed_count: u64,
}

struct MmpqState {
    heap: BinaryHeap<Reverse<QueuedEntry>>,
    head: i64,
    stats: MmpqStats,
    shutdown: bool,
    /// Producer threads still expected to signal completion on this edge,
    /// via [`Mmpq::producer_done`]. Starts at 1; `build()` overrides it with
    /// [`Mmpq::set_producer_count`] before wiring up an edge with more than
    /// one producer (a `+` combining two branches onto the same downstream).
    pending_producers: usize,
    next_seq: u64,
    /// Timestamps of entries actually handed to the consumer, in delivery
    /// order. Backs [`Mmpq::delivered_timestamps`], the introspection hook
    /// tests use to assert on delivery order without racing the consumer
    /// thread directly.
    delivered_log: Vec<i64>,
}

/// One edge of the dataflow graph. Producers call [`publish`](Mmpq::publish)
/// or [`schedule`](Mmpq::schedule); exactly one consumer thread drains it
/// via [`pop_ready`](Mmpq::pop_ready).
pub struct Mmpq {
    state: Mutex<MmpqState>,
    readiness: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl Mmpq {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Mmpq {
            state: Mutex::new(MmpqState {
                heap: BinaryHeap::new(),
                head: i64::MIN,
                stats: MmpqStats::default(),
                shutdown: false,
                pending_producers: 1,
                next_seq: 0,
                delivered_log: Vec::new(),
            }),
            readiness: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        })
    }

    /// Inserts `envelope` at timestamp `t` and advances HEAD to `t`. Fails
    /// if `t` is at or behind the current HEAD — a repeat of HEAD would
    /// never be delivered ahead of entries already handed to the consumer.
    pub fn publish(&self, envelope: Envelope, t: i64) -> RipCurrentResult<()> {
        self.insert(envelope, t, true)
    }

    /// Inserts `envelope` at timestamp `t` without advancing HEAD, for
    /// speculative future delivery gated by a later [`update_head`](Self::update_head).
    /// Still rejected if `t` is already at or behind HEAD: such an entry
    /// would be delivered immediately, out of order relative to whatever
    /// has already been handed to the consumer.
    pub fn schedule(&self, envelope: Envelope, t: i64) -> RipCurrentResult<()> {
        self.insert(envelope, t, false)
    }

    fn insert(&self, envelope: Envelope, t: i64, advance_head: bool) -> RipCurrentResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if t <= state.head {
            state.stats.dropped_count += 1;
            return Err(RipCurrentError::InconsistentTimestamp { expected_at_least: state.head, observed: t });
        }
        while state.heap.len() >= self.capacity && !state.shutdown {
            state = self.not_full.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Reverse(QueuedEntry { key: QueueKey(t, seq), envelope }));
        state.stats.published_count += 1;
        if advance_head {
            state.head = t;
        }
        drop(state);
        self.readiness.notify_all();
        Ok(())
    }

    /// Advances HEAD to `t`, making any entries at or before `t` eligible
    /// for delivery. Fails if `t` is behind the current HEAD.
    pub fn update_head(&self, t: i64) -> RipCurrentResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if t < state.head {
            return Err(RipCurrentError::InconsistentTimestamp { expected_at_least: state.head, observed: t });
        }
        state.head = t;
        drop(state);
        self.readiness.notify_all();
        Ok(())
    }

    /// Marks the edge as having no further producers. The consumer thread
    /// keeps draining whatever is already queued; [`pop_ready`](Self::pop_ready)
    /// only returns `None` once the queue is both shut down and fully
    /// drained (published == dropped + processed).
    ///
    /// Unconditional — for single-producer edges and direct test use. Edges
    /// with more than one producer (a `+` branch sharing a downstream) must
    /// use [`set_producer_count`](Self::set_producer_count) plus
    /// [`producer_done`](Self::producer_done) instead, or one finishing
    /// producer will shut the edge out from under its still-running
    /// siblings.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.shutdown = true;
        drop(state);
        self.readiness.notify_all();
        self.not_full.notify_all();
    }

    /// Declares how many independent producer threads will call
    /// [`producer_done`](Self::producer_done) on this edge before it should
    /// actually shut down. Must be called before any producer is started;
    /// `build()` calls this once per edge it creates, right after creation.
    pub(crate) fn set_producer_count(&self, count: usize) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.pending_producers = count;
    }

    /// One producer's completion signal. The edge only actually shuts down
    /// once every producer declared via [`set_producer_count`](Self::set_producer_count)
    /// (default 1) has called this.
    pub(crate) fn producer_done(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.pending_producers > 0 {
            state.pending_producers -= 1;
        }
        if state.pending_producers == 0 {
            state.shutdown = true;
        }
        drop(state);
        self.readiness.notify_all();
        self.not_full.notify_all();
    }

    /// Blocks until an entry at or before HEAD is ready, or the edge has
    /// shut down and drained, in which case it returns `None`.
    pub fn pop_ready(&self) -> Option<Envelope> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(Reverse(top)) = state.heap.peek() {
                if top.key.0 <= state.head {
                    let Reverse(entry) = state.heap.pop().expect("just peeked");
                    state.stats.processed_count += 1;
                    state.delivered_log.push(entry.key.0);
                    self.not_full.notify_all();
                    return Some(entry.envelope);
                }
            }
            let drained = state.stats.published_count == state.stats.dropped_count + state.stats.processed_count;
            if state.shutdown && drained {
                return None;
            }
            state = self.readiness.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// The current HEAD watermark. Fails with `NoEntriesPublishedYet` if
    /// nothing has ever been published or scheduled on this edge.
    pub fn current_head(&self) -> RipCurrentResult<i64> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.stats.published_count == 0 {
            return Err(RipCurrentError::NoEntriesPublishedYet);
        }
        Ok(state.head)
    }

    /// Timestamps actually delivered to the consumer so far, restricted to
    /// `range`. Fails with `NoEntriesPublishedYet` before the first
    /// publish, or `InvalidIterableRange` if `range` falls outside what has
    /// been delivered.
    pub fn delivered_timestamps(&self, range: std::ops::Range<usize>) -> RipCurrentResult<Vec<i64>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.stats.published_count == 0 {
            return Err(RipCurrentError::NoEntriesPublishedYet);
        }
        if range.start > range.end || range.end > state.delivered_log.len() {
            return Err(RipCurrentError::InvalidIterableRange);
        }
        Ok(state.delivered_log[range].to_vec())
    }

    pub fn stats(&self) -> MmpqStats {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        MmpqStats {
            published_count: state.stats.published_count,
            dropped_count: state.stats.dropped_count,
            processed_count: state.stats.processed_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_entries_in_ascending_timestamp_order() {
        let mmpq = Mmpq::new(16);
        mmpq.publish(Envelope::new(1_i32), 1).unwrap();
        mmpq.publish(Envelope::new(3_i32), 3).unwrap();
        assert!(mmpq.publish(Envelope::new(2_i32), 2).is_err());

        let first = mmpq.pop_ready().unwrap().downcast::<i32>().unwrap();
        let second = mmpq.pop_ready().unwrap().downcast::<i32>().unwrap();
        assert_eq!((first, second), (1, 3));
    }

    #[test]
    fn publish_at_exactly_head_is_rejected() {
        let mmpq = Mmpq::new(16);
        mmpq.publish(Envelope::new(5_i32), 5).unwrap();
        assert!(mmpq.publish(Envelope::new(6_i32), 5).is_err());
    }

    #[test]
    fn scheduled_entries_wait_for_head() {
        let mmpq = Mmpq::new(16);
        mmpq.schedule(Envelope::new(11_i32), 11).unwrap();
        mmpq.schedule(Envelope::new(19_i32), 19).unwrap();
        mmpq.schedule(Envelope::new(12_i32), 12).unwrap();
        mmpq.schedule(Envelope::new(17_i32), 17).unwrap();

        mmpq.update_head(11).unwrap();
        assert_eq!(mmpq.pop_ready().unwrap().downcast::<i32>().unwrap(), 11);

        mmpq.update_head(12).unwrap();
        assert_eq!(mmpq.pop_ready().unwrap().downcast::<i32>().unwrap(), 12);

        mmpq.update_head(18).unwrap();
        assert_eq!(mmpq.pop_ready().unwrap().downcast::<i32>().unwrap(), 17);

        mmpq.update_head(20).unwrap();
        assert_eq!(mmpq.pop_ready().unwrap().downcast::<i32>().unwrap(), 19);
    }

    #[test]
    fn shutdown_drains_then_returns_none() {
        let mmpq = Mmpq::new(16);
        mmpq.publish(Envelope::new(1_i32), 1).unwrap();
        mmpq.shutdown();
        assert!(mmpq.pop_ready().is_some());
        assert!(mmpq.pop_ready().is_none());
    }

    #[test]
    fn current_head_fails_before_the_first_publish() {
        let mmpq = Mmpq::new(16);
        assert!(matches!(mmpq.current_head(), Err(RipCurrentError::NoEntriesPublishedYet)));
        mmpq.publish(Envelope::new(5_i32), 5).unwrap();
        assert_eq!(mmpq.current_head().unwrap(), 5);
    }

    #[test]
    fn delivered_timestamps_rejects_an_out_of_bounds_range() {
        let mmpq = Mmpq::new(16);
        mmpq.publish(Envelope::new(1_i32), 1).unwrap();
        mmpq.publish(Envelope::new(2_i32), 2).unwrap();
        let _ = mmpq.pop_ready();
        let _ = mmpq.pop_ready();

        assert_eq!(mmpq.delivered_timestamps(0..2).unwrap(), vec![1, 2]);
        assert!(matches!(mmpq.delivered_timestamps(0..5), Err(RipCurrentError::InvalidIterableRange)));
    }
}
