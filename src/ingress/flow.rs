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
//! Flow ingress: one periodic HTTP poll per configured upstream, each
//! decoded into `Flow`s and pushed into the shared `FlowWindow`.
//!
//! Each upstream is polled from its own `tokio::spawn` task per tick, so a
//! single failing upstream never blocks or delays the others.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{QueryParams, UrlSettings};
use crate::error::FlowIngestError;
use crate::flow::parse_response;
use crate::ticker::Shared;

/// Build the upstream URL for one poll, covering the second window
/// `[utime - interval, utime]` lagged by `query.delay`.
fn build_url(server: &str, base_path: &str, query: &QueryParams, utime: i64) -> String {
    let end = (utime - query.delay) * 1_000_000_000;
    let start = end - (query.interval as i64) * 1_000_000_000;
    let limit = query.interval * query.limit_per_sec;
    format!("{server}{base_path}&start={start}&end={end}&limit={limit}")
}

/// Poll a single upstream once and push any decoded flows into the shared
/// window. Errors are logged and swallowed — a missed poll is simply a
/// missed poll; the next tick re-polls.
async fn poll_once(client: &reqwest::Client, url: &str, shared: &Shared) {
    let body = match fetch(client, url).await {
        Ok(body) => body,
        Err(e) => {
            log::warn!("flow poll failed for {url}: {e}");
            return;
        }
    };

    match parse_response(body.as_bytes()) {
        Ok((flows, errors)) => {
            for e in errors {
                log::warn!("dropping malformed flow record from {url}: {e}");
            }
            for flow in flows {
                shared.flow_window.push(flow);
            }
        }
        Err(e) => log::warn!("failed to parse flow response from {url}: {e}"),
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<String, FlowIngestError> {
    let resp = client.get(url).send().await?;
    let bytes = resp.bytes().await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Run one polling tick: fan out a request to every configured upstream
/// concurrently. Returns once all polls for this tick have completed.
pub async fn poll_tick(
    client: reqwest::Client,
    url: UrlSettings,
    query: QueryParams,
    shared: Arc<Shared>,
    utime: i64,
) {
    let mut handles = Vec::with_capacity(url.servers.len());
    for server in url.servers {
        let client = client.clone();
        let base_path = url.base_path.clone();
        let query = query.clone();
        let shared = shared.clone();
        handles.push(tokio::spawn(async move {
            let target = build_url(&server, &base_path, &query, utime);
            poll_once(&client, &target, &shared).await;
        }));
    }
    for h in handles {
        if let Err(e) = h.await {
            log::error!("flow poll task panicked: {e}");
        }
    }
}

/// Spawn the recurring poller task on the current tokio runtime.
pub fn spawn(
    client: reqwest::Client,
    url: UrlSettings,
    query: QueryParams,
    shared: Arc<Shared>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(query.interval));
        loop {
            ticker.tick().await;
            let utime = chrono::Utc::now().timestamp();
            poll_tick(client.clone(), url.clone(), query.clone(), shared.clone(), utime).await;
        }
    })
}
