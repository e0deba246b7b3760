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
//! `BgpUpdate`: a routing-table change event and its 68-byte little-endian
//! wire decoding.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::BgpDecodeError;

pub const WIRE_LEN: usize = 68;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Add,
    Delete,
    Modify,
}

impl MsgType {
    fn from_i32(v: i32) -> Result<Self, BgpDecodeError> {
        match v {
            1 => Ok(MsgType::Add),
            2 => Ok(MsgType::Delete),
            3 => Ok(MsgType::Modify),
            other => Err(BgpDecodeError::UnknownMsgType(other)),
        }
    }
}

/// A single route descriptor, as carried in either the `old_*` or `new_*`
/// half of the wire record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteDescriptor {
    pub addr: u32,
    pub prefix_len: i32,
    pub nexthop: u32,
    pub first_asn: i32,
    pub path_len: i32,
    pub pref: i32,
}

/// A BGP routing-table change event. Immutable once decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BgpUpdate {
    pub msg_type: MsgType,
    pub old: RouteDescriptor,
    pub new: RouteDescriptor,
    /// Event time, seconds since epoch.
    pub btime: i64,
}

fn read_i32(buf: &[u8], off: usize) -> i32 {
    LittleEndian::read_i32(&buf[off..off + 4])
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    LittleEndian::read_u32(&buf[off..off + 4])
}

impl BgpUpdate {
    /// Decode one fixed-layout record. `buf` must be exactly [`WIRE_LEN`]
    /// bytes; anything else is a malformed datagram.
    pub fn decode(buf: &[u8]) -> Result<Self, BgpDecodeError> {
        if buf.len() != WIRE_LEN {
            return Err(BgpDecodeError::WrongSize {
                got: buf.len(),
                expected: WIRE_LEN,
            });
        }

        let msg_type = MsgType::from_i32(read_i32(buf, 0))?;
        // bytes 4..8 are alignment padding, value ignored.
        let old = RouteDescriptor {
            addr: read_u32(buf, 8),
            prefix_len: read_i32(buf, 12),
            nexthop: read_u32(buf, 16),
            first_asn: read_i32(buf, 20),
            path_len: read_i32(buf, 24),
            pref: read_i32(buf, 28),
        };
        let new = RouteDescriptor {
            addr: read_u32(buf, 32),
            prefix_len: read_i32(buf, 36),
            nexthop: read_u32(buf, 40),
            first_asn: read_i32(buf, 44),
            path_len: read_i32(buf, 48),
            pref: read_i32(buf, 52),
        };
        let btime = LittleEndian::read_i64(&buf[56..64]);
        // bytes 64..68 are trailing alignment of the i64 on some encoders;
        // the wire format is exactly 68 bytes total.

        Ok(BgpUpdate {
            msg_type,
            old,
            new,
            btime,
        })
    }
}
