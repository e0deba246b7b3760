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
//! The correlation output sink: a buffered, line-oriented writer flushed
//! once per tick. Kept distinct from operational logging (`log`/`log4rs`):
//! this file carries only correlation records, one CSV-ish line each.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::correlator::CorrelationRecord;
use crate::error::StartupError;

pub struct Sink {
    writer: BufWriter<File>,
}

impl Sink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| StartupError::SinkOpen {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Append one line per record: `dst_ip,pri_route_prefix,pri_volume,post_route_prefix,post_volume`.
    pub fn write_records(&mut self, records: &[CorrelationRecord]) -> std::io::Result<()> {
        for r in records {
            writeln!(
                self.writer,
                "{},{},{},{},{}",
                std::net::Ipv4Addr::from(r.dst_ip),
                r.pri_route_prefix,
                r.pri_volume,
                r.post_route_prefix,
                r.post_volume
            )?;
        }
        Ok(())
    }

    /// Flush the sink; called by the `Ticker` once per tick.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_line_per_record_and_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope.log");
        let mut sink = Sink::open(&path).unwrap();
        sink.write_records(&[CorrelationRecord {
            dst_ip: u32::from(std::net::Ipv4Addr::new(10, 0, 0, 1)),
            pri_route_prefix: 1,
            pri_volume: 2,
            post_route_prefix: 3,
            post_volume: 4,
        }])
        .unwrap();
        sink.flush().unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "10.0.0.1,1,2,3,4\n");
    }
}
