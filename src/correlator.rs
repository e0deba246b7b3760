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
//! The correlation step: joins a drained BGP update against both sides of
//! the `RouteIndex` and emits one record per affected destination.

use crate::bgp::{BgpUpdate, MsgType};
use crate::prefix::RoutePrefix;
use crate::route_index::{RouteIndex, Side};

/// One correlation result: `dst_ip, pri_route_prefix, pri_volume,
/// post_route_prefix, post_volume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationRecord {
    pub dst_ip: u32,
    pub pri_route_prefix: u64,
    pub pri_volume: u64,
    pub post_route_prefix: u64,
    pub post_volume: u64,
}

/// Runs the per-update correlation join; holds no state of its own.
pub struct Correlator;

impl Correlator {
    /// Process one drained BGP update against `index`, returning one
    /// record per affected destination. `index` is read only —
    /// correlation never mutates it.
    pub fn process(index: &RouteIndex, update: &BgpUpdate) -> Vec<CorrelationRecord> {
        match update.msg_type {
            MsgType::Add => Self::process_add(index, update),
            MsgType::Delete => Self::process_delete(index, update),
            MsgType::Modify => {
                log::warn!("BGP MODIFY received (btime={}); treated as a no-op", update.btime);
                Vec::new()
            }
        }
    }

    fn process_add(index: &RouteIndex, update: &BgpUpdate) -> Vec<CorrelationRecord> {
        let rp = RoutePrefix::encode(update.new.addr, update.new.prefix_len as u8);
        let post = index.side(Side::Post);
        let pri = index.side(Side::Pri);

        post.destinations_for(rp)
            .map(|(dst, post_volume)| {
                let (pri_rp, pri_volume) = pri
                    .newest_route(dst)
                    .map(|info| (info.route_prefix.raw(), info.size))
                    .unwrap_or((0, 0));
                CorrelationRecord {
                    dst_ip: dst,
                    pri_route_prefix: pri_rp,
                    pri_volume,
                    post_route_prefix: rp.raw(),
                    post_volume,
                }
            })
            .collect()
    }

    fn process_delete(index: &RouteIndex, update: &BgpUpdate) -> Vec<CorrelationRecord> {
        let rp = RoutePrefix::encode(update.old.addr, update.old.prefix_len as u8);
        let pri = index.side(Side::Pri);
        let post = index.side(Side::Post);

        pri.destinations_for(rp)
            .map(|(dst, pri_volume)| {
                let (post_rp, post_volume) = post
                    .oldest_route(dst)
                    .map(|info| (info.route_prefix.raw(), info.size))
                    .unwrap_or((0, 0));
                CorrelationRecord {
                    dst_ip: dst,
                    pri_route_prefix: rp.raw(),
                    pri_volume,
                    post_route_prefix: post_rp,
                    post_volume,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::RouteDescriptor;
    use crate::flow::Flow;

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

    fn add_update(addr: u32, prefix_len: i32, btime: i64) -> BgpUpdate {
        BgpUpdate {
            msg_type: MsgType::Add,
            old: RouteDescriptor::default(),
            new: RouteDescriptor {
                addr,
                prefix_len,
                ..Default::default()
            },
            btime,
        }
    }

    fn delete_update(addr: u32, prefix_len: i32, btime: i64) -> BgpUpdate {
        BgpUpdate {
            msg_type: MsgType::Delete,
            old: RouteDescriptor {
                addr,
                prefix_len,
                ..Default::default()
            },
            new: RouteDescriptor::default(),
            btime,
        }
    }

    #[test]
    fn add_emits_one_record_per_post_destination() {
        let mut index = RouteIndex::new();
        index.add(Side::Post, &flow(42, 100, 24, 100, 1000));
        let update = add_update(100, 24, 1005);
        let records = Correlator::process(&index, &update);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dst_ip, 42);
        assert_eq!(records[0].post_volume, 100);
        assert_eq!(records[0].pri_volume, 0);
        assert_eq!(records[0].pri_route_prefix, 0);
    }

    #[test]
    fn add_reports_the_superseded_pri_route_when_present() {
        let mut index = RouteIndex::new();
        index.add(Side::Pri, &flow(42, 50, 24, 30, 900));
        index.add(Side::Post, &flow(42, 100, 24, 100, 1000));
        let update = add_update(100, 24, 1005);
        let records = Correlator::process(&index, &update);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pri_volume, 30);
        assert_eq!(records[0].pri_route_prefix, RoutePrefix::encode(50, 24).raw());
    }

    #[test]
    fn delete_with_no_post_traffic_emits_zeroed_post_fields() {
        let mut index = RouteIndex::new();
        index.add(Side::Pri, &flow(7, 200, 24, 50, 2000));
        let update = delete_update(200, 24, 2001);
        let records = Correlator::process(&index, &update);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dst_ip, 7);
        assert_eq!(records[0].pri_volume, 50);
        assert_eq!(records[0].post_volume, 0);
        assert_eq!(records[0].post_route_prefix, 0);
    }

    #[test]
    fn modify_is_a_no_op() {
        let index = RouteIndex::new();
        let update = BgpUpdate {
            msg_type: MsgType::Modify,
            old: RouteDescriptor::default(),
            new: RouteDescriptor::default(),
            btime: 0,
        };
        assert!(Correlator::process(&index, &update).is_empty());
    }
}
