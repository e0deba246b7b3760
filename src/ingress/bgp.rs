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
//! BGP ingress: a dedicated OS thread reading 68-byte records off a Unix
//! datagram socket.
//!
//! Datagram reads gain nothing from async (each `recv` already returns a
//! complete message, there is no partial-read bookkeeping to overlap with
//! other work), so this runs on a plain blocking thread rather than inside
//! the tokio runtime.

use std::os::unix::net::UnixDatagram;
use std::path::Path;
use std::sync::Arc;

use crate::bgp::{BgpUpdate, WIRE_LEN};
use crate::error::StartupError;
use crate::ticker::Shared;

/// Bind `path`, removing any stale socket file left behind by a previous
/// run before binding fresh.
pub fn bind(path: impl AsRef<Path>) -> Result<UnixDatagram, StartupError> {
    let path = path.as_ref();
    let _ = std::fs::remove_file(path);
    UnixDatagram::bind(path).map_err(|source| StartupError::SocketBind {
        path: path.display().to_string(),
        source,
    })
}

/// Run the receive loop on the calling thread until the socket is closed.
/// Malformed datagrams are logged and dropped rather than aborting ingress.
pub fn run(socket: UnixDatagram, shared: Arc<Shared>) {
    let mut buf = [0u8; WIRE_LEN];
    loop {
        let n = match socket.recv(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                log::error!("BGP socket recv failed, stopping ingress: {e}");
                return;
            }
        };
        match BgpUpdate::decode(&buf[..n]) {
            Ok(update) => shared.bgp_queue.push(update, update.btime),
            Err(e) => log::warn!("dropping malformed BGP datagram: {e}"),
        }
    }
}

/// Spawn [`run`] on a dedicated OS thread.
pub fn spawn(socket: UnixDatagram, shared: Arc<Shared>) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("bgp-ingress".into())
        .spawn(move || run(socket, shared))
        .expect("failed to spawn bgp-ingress thread")
}
