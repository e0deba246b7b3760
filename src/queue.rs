// flowcorrelate: correlates BGP routing updates with NetFlow traffic samples
// around a route change.
// Copyright (C) 2026 NSG
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! `TimedQueue<T>`: a multi-producer, single-consumer FIFO ordered by
//! arrival, with time-based head-draining.
//!
//! A single small generic type, protected by one mutex covering push and
//! pop, covers every instantiation needed here (`TimedQueue<BgpUpdate>`
//! being the live one) rather than growing into an unbounded-interface
//! dispatcher over a closed set of payload types.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Concurrent FIFO of `(value, tag)` pairs. `tag` is the event time used for
/// `pop_if_older`; it need not be sorted across `push` calls — late
/// arrivals are tolerated.
pub struct TimedQueue<T> {
    inner: Mutex<VecDeque<(T, i64)>>,
    max_len: usize,
}

impl<T> TimedQueue<T> {
    pub fn new(max_len: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            max_len,
        }
    }

    /// Append `value` to the tail, tagged with `tag`. If this would exceed
    /// `max_len`, the oldest entry is dropped instead of growing unbounded —
    /// producers must never block, so capacity pressure sheds the oldest
    /// entry rather than backpressuring the caller.
    pub fn push(&self, value: T, tag: i64) {
        let mut q = self.inner.lock();
        if q.len() >= self.max_len {
            q.pop_front();
            log::warn!("TimedQueue at capacity ({}), dropping oldest entry", self.max_len);
        }
        q.push_back((value, tag));
    }

    /// If the head's tag is strictly less than `threshold`, remove and
    /// return it; otherwise return `None` without mutating the queue.
    pub fn pop_if_older(&self, threshold: i64) -> Option<T> {
        let mut q = self.inner.lock();
        match q.front() {
            Some((_, tag)) if *tag < threshold => q.pop_front().map(|(v, _)| v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_fifo_order() {
        let q = TimedQueue::new(10);
        q.push("a", 1);
        q.push("b", 2);
        q.push("c", 3);
        assert_eq!(q.pop_if_older(10), Some("a"));
        assert_eq!(q.pop_if_older(10), Some("b"));
        assert_eq!(q.pop_if_older(10), Some("c"));
        assert_eq!(q.pop_if_older(10), None);
    }

    #[test]
    fn only_drains_strictly_older_than_threshold() {
        let q = TimedQueue::new(10);
        q.push("a", 5);
        assert_eq!(q.pop_if_older(5), None);
        assert_eq!(q.pop_if_older(6), Some("a"));
    }

    #[test]
    fn drops_oldest_entry_once_at_capacity() {
        let q = TimedQueue::new(2);
        q.push(1, 1);
        q.push(2, 2);
        q.push(3, 3);
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop_if_older(100), Some(2));
        assert_eq!(q.pop_if_older(100), Some(3));
    }
}
