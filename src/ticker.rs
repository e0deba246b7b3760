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
//! `Ticker`: the 1 Hz orchestration loop that drives `FlowWindow`'s four
//! cursors and drains mature BGP updates to the `Correlator`.
//!
//! The queues the ingress tasks write into are shared via `Arc` (`Shared`,
//! below), while `RouteIndex` and the sink are owned outright by the
//! `Ticker` — nothing else ever touches them or drives the cursors forward.

use std::sync::Arc;

use crate::bgp::BgpUpdate;
use crate::config::TimeSettings;
use crate::correlator::Correlator;
use crate::error::IndexError;
use crate::flow_window::FlowWindow;
use crate::queue::TimedQueue;
use crate::route_index::{RouteIndex, Side};
use crate::sink::Sink;

/// State shared between the ingress tasks and the `Ticker`.
pub struct Shared {
    pub bgp_queue: TimedQueue<BgpUpdate>,
    pub flow_window: FlowWindow,
}

impl Shared {
    pub fn new(queue_max_len: usize) -> Arc<Self> {
        Arc::new(Self {
            bgp_queue: TimedQueue::new(queue_max_len),
            flow_window: FlowWindow::new(queue_max_len),
        })
    }
}

pub struct Ticker {
    shared: Arc<Shared>,
    index: RouteIndex,
    sink: Sink,
    time: TimeSettings,
}

impl Ticker {
    pub fn new(shared: Arc<Shared>, sink: Sink, time: TimeSettings) -> Self {
        Self {
            shared,
            index: RouteIndex::new(),
            sink,
            time,
        }
    }

    /// Run one tick at wall-clock second `utime`, in a fixed step order.
    /// Step order is load-bearing: Post before Pri, so that by the time a
    /// BGP update is correlated both sides reflect a consistent view of
    /// "now" for that update's event time.
    pub fn tick(&mut self, utime: i64) {
        let w = &self.shared.flow_window;
        w.set_thresholds(utime, self.time.delay, self.time.agetime, self.time.syncdevi);

        // 1. Post-enter.
        while let Some(flow) = w.try_advance_post_enter() {
            self.index.add(Side::Post, &flow);
        }
        // 2. Post-exit.
        while let Some(flow) = w.try_advance_post_exit() {
            self.remove_or_recover(Side::Post, &flow);
        }
        // 3. Pri-enter.
        while let Some(flow) = w.try_advance_pri_enter() {
            self.index.add(Side::Pri, &flow);
        }
        // 4. Pri-exit (also unlinks the node).
        while let Some(flow) = w.try_advance_pri_exit() {
            self.remove_or_recover(Side::Pri, &flow);
        }

        // 5. Drain mature BGP updates. The threshold matches the Pri-end
        // edge, so an update is only correlated once both windows are
        // populated around its event time.
        let threshold = utime - self.time.delay - self.time.agetime;
        let mut records = Vec::new();
        while let Some(update) = self.shared.bgp_queue.pop_if_older(threshold) {
            records.extend(Correlator::process(&self.index, &update));
        }

        if let Err(e) = self.sink.write_records(&records) {
            log::error!("failed to write correlation records: {e}");
        }
        if let Err(e) = self.sink.flush() {
            log::error!("failed to flush correlation sink: {e}");
        }
    }

    /// Remove `flow` from `side`, recovering from an internal invariant
    /// violation: panic in development (the `strict-invariants` feature),
    /// log-and-reset the destination's bookkeeping in production.
    fn remove_or_recover(&mut self, side: Side, flow: &crate::flow::Flow) {
        if let Err(e) = self.index.remove(side, flow) {
            self.handle_index_error(side, flow.dst_ip, e);
        }
    }

    #[cfg(feature = "strict-invariants")]
    fn handle_index_error(&mut self, _side: Side, _dst: u32, e: IndexError) {
        panic!("route index invariant violated: {e}");
    }

    #[cfg(not(feature = "strict-invariants"))]
    fn handle_index_error(&mut self, side: Side, dst: u32, e: IndexError) {
        log::error!("route index invariant violated, resetting dst={dst}: {e}");
        self.index.side_mut(side).reset_destination(dst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::{MsgType, RouteDescriptor};
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

    fn settings() -> TimeSettings {
        TimeSettings {
            delay: 0,
            agetime: 10,
            syncdevi: 2,
        }
    }

    fn new_ticker() -> (Ticker, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let sink_path = dir.path().join("scope.log");
        let shared = Shared::new(1_000_000);
        let sink = Sink::open(&sink_path).unwrap();
        (Ticker::new(shared, sink, settings()), dir)
    }

    #[test]
    fn single_flow_single_add_emits_expected_record() {
        let (mut ticker, dir) = new_ticker();
        ticker.shared.flow_window.push(flow(
            u32::from(std::net::Ipv4Addr::new(1, 1, 1, 1)),
            u32::from(std::net::Ipv4Addr::new(10, 0, 0, 0)),
            24,
            100,
            1000,
        ));
        ticker.shared.bgp_queue.push(
            crate::bgp::BgpUpdate {
                msg_type: MsgType::Add,
                old: RouteDescriptor::default(),
                new: RouteDescriptor {
                    addr: u32::from(std::net::Ipv4Addr::new(10, 0, 0, 0)),
                    prefix_len: 24,
                    ..Default::default()
                },
                btime: 1005,
            },
            1005,
        );

        for t in [1000, 1008, 1012, 1017] {
            ticker.tick(t);
        }

        let contents = std::fs::read_to_string(dir.path().join("scope.log")).unwrap();
        assert!(contents.contains("1.1.1.1"));
        assert!(contents.trim_end().lines().count() == 1);
    }

    #[test]
    fn delete_with_no_post_traffic() {
        let (mut ticker, dir) = new_ticker();
        let dst = u32::from(std::net::Ipv4Addr::new(2, 2, 2, 2));
        let route = u32::from(std::net::Ipv4Addr::new(20, 0, 0, 0));
        ticker.shared.flow_window.push(flow(dst, route, 24, 50, 2000));
        ticker.shared.bgp_queue.push(
            crate::bgp::BgpUpdate {
                msg_type: MsgType::Delete,
                old: RouteDescriptor {
                    addr: route,
                    prefix_len: 24,
                    ..Default::default()
                },
                new: RouteDescriptor::default(),
                btime: 2001,
            },
            2001,
        );

        for t in 2000..=2021 {
            ticker.tick(t);
        }

        let contents = std::fs::read_to_string(dir.path().join("scope.log")).unwrap();
        assert!(contents.contains("2.2.2.2,"));
        assert!(contents.trim_end().ends_with(",0,0"));
    }

    #[test]
    fn flow_is_dropped_after_the_window_closes() {
        let (mut ticker, _dir) = new_ticker();
        ticker.shared.flow_window.push(flow(1, 10, 24, 1, 3000));
        for t in 3000..=3025 {
            ticker.tick(t);
        }
        assert_eq!(ticker.shared.flow_window.len(), 0);
    }
}
