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
//! Configuration loading: flat keys loaded from `config.toml` in the
//! working directory.

use std::path::Path;

use serde::Deserialize;

use crate::error::StartupError;

#[derive(Debug, Clone, Deserialize)]
pub struct UrlSettings {
    pub servers: Vec<String>,
    pub base_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryParams {
    pub interval: u64,
    pub limit_per_sec: u64,
    pub delay: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeSettings {
    pub delay: i64,
    pub agetime: i64,
    pub syncdevi: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub url: UrlSettings,
    pub query_params: QueryParams,
    pub time_settings: TimeSettings,

    /// Filesystem path of the BGP ingress datagram socket.
    #[serde(default = "default_socket_path")]
    pub bgp_socket_path: String,

    /// Where correlation records are written, one per line.
    #[serde(default = "default_sink_path")]
    pub sink_path: String,

    /// Cap on `TimedQueue`/`FlowWindow` length before the oldest entry is
    /// dropped instead of growing unbounded.
    #[serde(default = "default_queue_max_len")]
    pub queue_max_len: usize,

    /// Timeout applied to each upstream HTTP poll. Defaults to the poll
    /// interval when unset.
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

fn default_socket_path() -> String {
    "/tmp/c2gsocket".to_string()
}

fn default_sink_path() -> String {
    "./scope.log".to_string()
}

fn default_queue_max_len() -> usize {
    1_000_000
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(true));
        let settings = builder.build()?;
        Ok(settings.try_deserialize()?)
    }

    /// The HTTP timeout to apply to a single poll, defaulting to the poll
    /// interval.
    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_secs.unwrap_or(self.query_params.interval))
    }
}
