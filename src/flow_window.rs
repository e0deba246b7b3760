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
//! `FlowWindow`: a singly-linked chain of flow nodes with four monotone
//! cursors staging each flow through the Pri-enter / Post-enter / Post-exit
//! / Pri-exit lifecycle edges.
//!
//! Each cursor is naturally forward-only, so a safe singly-linked chain with
//! a sentinel-free head suffices; no intrusive doubly-linked structure or
//! raw pointers are needed. Each cursor is represented as an
//! `Option<Rc<Node>>` ("the last node this cursor has crossed, or none
//! yet") — `Rc` keeps a node alive for as long as any cursor still
//! references it, which is exactly the lifetime a raw intrusive pointer
//! would need to be given manually.

use std::rc::Rc;
use std::cell::RefCell;

use crate::flow::Flow;

struct Node {
    flow: Flow,
    tag: i64,
    next: RefCell<Option<Rc<Node>>>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Thresholds {
    pri_s_t: i64,
    pri_e_t: i64,
    post_s_t: i64,
    post_e_t: i64,
}

struct Inner {
    head: Option<Rc<Node>>,
    tail: Option<Rc<Node>>,
    pri_end: Option<Rc<Node>>,
    post_start: Option<Rc<Node>>,
    post_end: Option<Rc<Node>>,
    length: usize,
    thresholds: Thresholds,
}

/// A flow window guarded by a single lock, covering `push` and every
/// consumer-side `try_advance_*` call.
pub struct FlowWindow {
    inner: parking_lot::Mutex<Inner>,
    max_len: usize,
}

impl FlowWindow {
    pub fn new(max_len: usize) -> Self {
        Self {
            inner: parking_lot::Mutex::new(Inner {
                head: None,
                tail: None,
                pri_end: None,
                post_start: None,
                post_end: None,
                length: 0,
                thresholds: Thresholds::default(),
            }),
            max_len,
        }
    }

    /// Append `flow` to the tail, tagged by `flow.end_t`. If the window is
    /// already at `max_len`, the head node (the oldest entry still in the
    /// chain) is evicted first, the same drop-oldest policy `TimedQueue`
    /// uses. Dropping the head only touches `inner.head`/`length`; any
    /// cursor that already holds an `Rc` to that node, or to a node past
    /// it, keeps working since the chain itself is unaffected.
    pub fn push(&self, flow: Flow) {
        let mut inner = self.inner.lock();
        if inner.length >= self.max_len {
            if let Some(head) = inner.head.clone() {
                log::warn!(
                    "FlowWindow at capacity ({}), dropping oldest entry end_t={}",
                    self.max_len,
                    head.tag
                );
                let next = head.next.borrow().clone();
                inner.head = next.clone();
                if next.is_none() {
                    inner.tail = None;
                }
                inner.length -= 1;
            }
        }
        let node = Rc::new(Node {
            flow,
            tag: flow.end_t,
            next: RefCell::new(None),
        });
        match &inner.tail {
            Some(t) => *t.next.borrow_mut() = Some(node.clone()),
            None => inner.head = Some(node.clone()),
        }
        inner.tail = Some(node);
        inner.length += 1;
    }

    /// Recompute the four thresholds, given the current wall-clock second
    /// and the configured time budgets.
    pub fn set_thresholds(&self, now: i64, delay: i64, agetime: i64, syncdevi: i64) {
        let now_eff = now - delay;
        let mut inner = self.inner.lock();
        inner.thresholds = Thresholds {
            pri_s_t: now_eff - 2 * agetime,
            pri_e_t: now_eff - agetime - syncdevi,
            post_s_t: now_eff - agetime + syncdevi,
            post_e_t: now_eff,
        };
    }

    pub fn len(&self) -> usize {
        self.inner.lock().length
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move `post_end` forward one step if eligible, returning the newly
    /// admitted flow.
    pub fn try_advance_post_enter(&self) -> Option<Flow> {
        let mut inner = self.inner.lock();
        let threshold = inner.thresholds.post_e_t;
        advance_cursor(&mut inner, |i| &mut i.post_end, threshold)
    }

    /// Move `post_start` forward one step if eligible.
    pub fn try_advance_post_exit(&self) -> Option<Flow> {
        let mut inner = self.inner.lock();
        let threshold = inner.thresholds.post_s_t;
        advance_cursor(&mut inner, |i| &mut i.post_start, threshold)
    }

    /// Move `pri_end` forward one step if eligible.
    pub fn try_advance_pri_enter(&self) -> Option<Flow> {
        let mut inner = self.inner.lock();
        let threshold = inner.thresholds.pri_e_t;
        advance_cursor(&mut inner, |i| &mut i.pri_end, threshold)
    }

    /// If the head node is eligible, detach and return it. This is the only
    /// operation that shortens the chain.
    pub fn try_advance_pri_exit(&self) -> Option<Flow> {
        let mut inner = self.inner.lock();
        let threshold = inner.thresholds.pri_s_t;
        let head = inner.head.clone()?;
        if head.tag > threshold {
            return None;
        }
        let next = head.next.borrow().clone();
        inner.head = next.clone();
        if next.is_none() {
            inner.tail = None;
        }
        inner.length -= 1;
        Some(head.flow)
    }
}

/// Shared logic for the three non-evicting cursors: each looks at the node
/// immediately past its current position (or `head`, if it hasn't moved
/// yet) and advances exactly one step if that node's tag clears the
/// threshold.
fn advance_cursor(
    inner: &mut Inner,
    cursor: impl FnOnce(&mut Inner) -> &mut Option<Rc<Node>>,
    threshold: i64,
) -> Option<Flow> {
    let head = inner.head.clone();
    let slot = cursor(inner);
    let candidate = match slot {
        Some(cur) => cur.next.borrow().clone(),
        None => head,
    }?;
    if candidate.tag > threshold {
        return None;
    }
    let flow = candidate.flow;
    *cursor(inner) = Some(candidate);
    Some(flow)
}
