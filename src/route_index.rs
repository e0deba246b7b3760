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
//! `RouteIndex`: the bidirectional prefix↔destination maps for one window
//! side (Pri or Post).
//!
//! Kept as plain `HashMap`s, favoring `std` collections over exotic map
//! types in this non-hot-path bookkeeping code. Owned solely by the
//! `Ticker` — no internal synchronization here.

use std::collections::HashMap;

use crate::error::IndexError;
use crate::flow::Flow;
use crate::prefix::RoutePrefix;

/// One element of a destination's ordered route list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpInfo {
    pub route_prefix: RoutePrefix,
    pub size: u64,
}

/// One side (Pri or Post) of the route index: a pair of bidirectional maps.
#[derive(Debug, Default)]
pub struct RouteSide {
    /// `route_prefix -> dst_ip -> cumulative_bytes`.
    r2d: HashMap<RoutePrefix, HashMap<u32, u64>>,
    /// `dst_ip -> ordered route list`, oldest at head, newest at tail.
    d2r: HashMap<u32, Vec<IpInfo>>,
}

impl RouteSide {
    pub fn new() -> Self {
        Self::default()
    }

    /// `R2D[rp][dst]`, if present.
    pub fn bytes_for(&self, rp: RoutePrefix, dst: u32) -> Option<u64> {
        self.r2d.get(&rp).and_then(|m| m.get(&dst)).copied()
    }

    /// All `(dst, bytes)` pairs currently attributed to `rp`.
    pub fn destinations_for(&self, rp: RoutePrefix) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.r2d
            .get(&rp)
            .into_iter()
            .flat_map(|m| m.iter().map(|(&dst, &bytes)| (dst, bytes)))
    }

    /// The most-recently-added route for `dst` (tail of `D2R[dst]`).
    pub fn newest_route(&self, dst: u32) -> Option<IpInfo> {
        self.d2r.get(&dst).and_then(|list| list.last()).copied()
    }

    /// The oldest still-active route for `dst` (head of `D2R[dst]`).
    pub fn oldest_route(&self, dst: u32) -> Option<IpInfo> {
        self.d2r.get(&dst).and_then(|list| list.first()).copied()
    }

    /// Add `flow`'s contribution to this side's maps.
    pub fn add(&mut self, flow: &Flow) {
        let rp = RoutePrefix::encode(flow.route, flow.prefix_len);

        *self
            .r2d
            .entry(rp)
            .or_default()
            .entry(flow.dst_ip)
            .or_insert(0) += flow.size;

        let list = self.d2r.entry(flow.dst_ip).or_default();
        match list.last_mut() {
            Some(tail) if tail.route_prefix == rp => tail.size += flow.size,
            _ => list.push(IpInfo {
                route_prefix: rp,
                size: flow.size,
            }),
        }
    }

    /// Remove `flow`'s contribution from this side's maps. Preserves a
    /// deliberate removal asymmetry: when the inner map has exactly one
    /// entry left (the one being removed), the whole `rp` key is dropped
    /// instead of the single `dst` entry.
    pub fn remove(&mut self, flow: &Flow) -> Result<(), IndexError> {
        let rp = RoutePrefix::encode(flow.route, flow.prefix_len);

        if let Some(inner) = self.r2d.get_mut(&rp) {
            if let Some(bytes) = inner.get_mut(&flow.dst_ip) {
                *bytes = bytes.saturating_sub(flow.size);
                if *bytes == 0 {
                    if inner.len() <= 1 {
                        self.r2d.remove(&rp);
                    } else {
                        inner.remove(&flow.dst_ip);
                    }
                }
            }
        }

        let Some(list) = self.d2r.get_mut(&flow.dst_ip) else {
            return Err(IndexError::MissingDst {
                rp: rp.raw(),
                dst: flow.dst_ip,
            });
        };
        let Some(head) = list.first_mut() else {
            return Err(IndexError::MissingDst {
                rp: rp.raw(),
                dst: flow.dst_ip,
            });
        };
        if head.route_prefix != rp {
            return Err(IndexError::HeadMismatch {
                dst: flow.dst_ip,
                head_rp: head.route_prefix.raw(),
                expected_rp: rp.raw(),
            });
        }
        head.size = head.size.saturating_sub(flow.size);
        if head.size == 0 {
            if list.len() == 1 {
                self.d2r.remove(&flow.dst_ip);
            } else {
                list.remove(0);
            }
        }
        Ok(())
    }

    /// Reset all bookkeeping for `dst`, used by the production-mode
    /// recovery path when an internal invariant violation is detected for
    /// this key.
    pub fn reset_destination(&mut self, dst: u32) {
        self.d2r.remove(&dst);
        self.r2d.retain(|_, inner| {
            inner.remove(&dst);
            !inner.is_empty()
        });
    }
}

/// Which of the two temporal windows a `RouteSide` represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Pri,
    Post,
}

/// The full two-sided route index: one `RouteSide` per temporal window.
#[derive(Debug, Default)]
pub struct RouteIndex {
    pub pri: RouteSide,
    pub post: RouteSide,
}

impl RouteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn side(&self, which: Side) -> &RouteSide {
        match which {
            Side::Pri => &self.pri,
            Side::Post => &self.post,
        }
    }

    pub fn side_mut(&mut self, which: Side) -> &mut RouteSide {
        match which {
            Side::Pri => &mut self.pri,
            Side::Post => &mut self.post,
        }
    }

    pub fn add(&mut self, which: Side, flow: &Flow) {
        self.side_mut(which).add(flow);
    }

    pub fn remove(&mut self, which: Side, flow: &Flow) -> Result<(), IndexError> {
        self.side_mut(which).remove(flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(dst: u32, route: u32, prefix_len: u8, size: u64, end_t: i64) -> Flow {
        Flow {
            size,
            src_ip: 0,
            dst_ip: dst,
            observer_ip: 0,
            nh_ip: 0,
            src_as: 0,
            dst_as: 0,
            route,
            prefix_len,
            egress_id: 0,
            start_t: end_t - 1,
            end_t,
        }
    }

    #[test]
    fn coalesces_consecutive_same_prefix_entries() {
        let mut side = RouteSide::new();
        side.add(&flow(1, 10, 24, 10, 100));
        side.add(&flow(1, 10, 24, 20, 101));
        side.add(&flow(1, 10, 24, 30, 102));
        let rp = RoutePrefix::encode(10, 24);
        assert_eq!(side.bytes_for(rp, 1), Some(60));
        assert_eq!(side.newest_route(1), Some(IpInfo { route_prefix: rp, size: 60 }));
    }

    #[test]
    fn does_not_coalesce_across_a_different_prefix() {
        let mut side = RouteSide::new();
        side.add(&flow(1, 10, 24, 10, 100)); // Z
        side.add(&flow(1, 20, 24, 20, 101)); // W
        side.add(&flow(1, 10, 24, 30, 102)); // Z again, not adjacent to prior Z
        let z = RoutePrefix::encode(10, 24);
        let w = RoutePrefix::encode(20, 24);
        assert_eq!(
            side.d2r.get(&1).unwrap(),
            &vec![
                IpInfo { route_prefix: z, size: 10 },
                IpInfo { route_prefix: w, size: 20 },
                IpInfo { route_prefix: z, size: 30 },
            ]
        );
    }

    #[test]
    fn remove_deletes_rp_when_it_was_the_last_destination() {
        let mut side = RouteSide::new();
        side.add(&flow(1, 10, 24, 50, 100));
        let rp = RoutePrefix::encode(10, 24);
        side.remove(&flow(1, 10, 24, 50, 100)).unwrap();
        assert_eq!(side.bytes_for(rp, 1), None);
        assert!(side.d2r.get(&1).is_none());
    }

    #[test]
    fn remove_deletes_only_dst_when_others_remain_on_the_prefix() {
        let mut side = RouteSide::new();
        side.add(&flow(1, 10, 24, 50, 100));
        side.add(&flow(2, 10, 24, 60, 100));
        let rp = RoutePrefix::encode(10, 24);
        side.remove(&flow(1, 10, 24, 50, 100)).unwrap();
        assert_eq!(side.bytes_for(rp, 1), None);
        assert_eq!(side.bytes_for(rp, 2), Some(60));
    }

    #[test]
    fn remove_head_mismatch_is_reported_as_an_invariant_violation() {
        let mut side = RouteSide::new();
        side.add(&flow(1, 10, 24, 50, 100));
        let bogus = flow(1, 20, 24, 10, 100);
        let err = side.remove(&bogus).unwrap_err();
        assert!(matches!(err, IndexError::HeadMismatch { .. }));
    }
}
