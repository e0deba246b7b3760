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
//! Shared error types for the ingestion and correlation pipeline.

use thiserror::Error;

/// Errors decoding a single BGP wire record.
#[derive(Debug, Error)]
pub enum BgpDecodeError {
    #[error("datagram has {got} bytes, expected exactly {expected}")]
    WrongSize { got: usize, expected: usize },
    #[error("unknown msg_type {0}")]
    UnknownMsgType(i32),
    #[error("IO error decoding record: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors extracting a `Flow` out of a single upstream record.
#[derive(Debug, Error)]
pub enum FlowParseError {
    #[error("missing field `{0}` in flow record")]
    MissingField(&'static str),
    #[error("field `{0}` had an unexpected shape: {1}")]
    BadField(&'static str, String),
    #[error("could not parse timestamp `{0}`: {1}")]
    BadTimestamp(String, chrono::ParseError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors polling a single flow upstream.
#[derive(Debug, Error)]
pub enum FlowIngestError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("response body was not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("response JSON did not match the expected shape: {0}")]
    Shape(String),
}

/// Violations of the R2D/D2R bookkeeping invariants.
///
/// These should never happen in a correct run; they indicate a lost push or
/// an eviction performed out of order.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("D2R[{dst}] head has route_prefix {head_rp:#x}, expected {expected_rp:#x}")]
    HeadMismatch {
        dst: u32,
        head_rp: u64,
        expected_rp: u64,
    },
    #[error("D2R[{dst}] was empty while R2D[{rp:#x}] still referenced it")]
    MissingDst { rp: u64, dst: u32 },
}

/// Fatal startup errors, surfaced from `main` via `anyhow`.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("failed to bind BGP socket at {path}: {source}")]
    SocketBind {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to open log sink at {path}: {source}")]
    SinkOpen {
        path: String,
        source: std::io::Error,
    },
}
