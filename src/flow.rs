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
//! `Flow`: a single NetFlow record, and the logic to extract one from the
//! nested, string-escaped JSON shape the upstream log-query endpoint
//! returns.

use std::net::Ipv4Addr;

use serde_json::Value;

use crate::error::FlowParseError;

/// A single NetFlow record. Immutable once constructed; ordered within the
/// window by `end_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flow {
    pub size: u64,
    pub src_ip: u32,
    pub dst_ip: u32,
    pub observer_ip: u32,
    pub nh_ip: u32,
    pub src_as: u32,
    pub dst_as: u32,
    pub route: u32,
    pub prefix_len: u8,
    pub egress_id: u16,
    pub start_t: i64,
    pub end_t: i64,
}

/// Undo the upstream's quoting/escaping of the embedded record object: the
/// upstream serializes each record as a quoted, backslash-escaped string
/// sitting next to the braces of what should be a plain nested object, e.g.
/// `[..., "{\"a\":1}"]`. Stripping the quote immediately adjacent to
/// `{`/`}` and every backslash turns that back into `[..., {"a":1}]`, which
/// is then valid, directly-navigable JSON.
pub fn unescape_embedded_records(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let len = body.len();
    for i in 0..len {
        let b = body[i];
        if b == b'"' && i + 1 < len && body[i + 1] == b'{' {
            continue;
        }
        if i > 0 && b == b'"' && body[i - 1] == b'}' {
            continue;
        }
        if b != b'\\' {
            out.push(b);
        }
    }
    out
}

fn dotted_ip(s: &str) -> Option<u32> {
    let octets: Vec<&str> = s.split('.').collect();
    if octets.len() != 4 {
        return None;
    }
    let mut addr = [0u8; 4];
    for (i, o) in octets.iter().enumerate() {
        addr[i] = o.parse().ok()?;
    }
    Some(u32::from(Ipv4Addr::from(addr)))
}

fn field<'a>(record: &'a Value, path: &[&'static str]) -> Option<&'a Value> {
    let mut cur = record;
    for seg in path {
        cur = cur.get(seg)?;
    }
    Some(cur)
}

fn field_str<'a>(record: &'a Value, path: &'static [&'static str]) -> Result<&'a str, FlowParseError> {
    field(record, path)
        .and_then(Value::as_str)
        .ok_or(FlowParseError::MissingField(last(path)))
}

fn field_u64(record: &Value, path: &'static [&'static str]) -> Result<u64, FlowParseError> {
    let v = field(record, path).ok_or(FlowParseError::MissingField(last(path)))?;
    v.as_u64()
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| FlowParseError::BadField(last(path), v.to_string()))
}

fn field_ip(record: &Value, path: &'static [&'static str]) -> Result<u32, FlowParseError> {
    let s = field_str(record, path)?;
    dotted_ip(s).ok_or_else(|| FlowParseError::BadField(last(path), s.to_string()))
}

fn field_time(record: &Value, path: &'static [&'static str]) -> Result<i64, FlowParseError> {
    let s = field_str(record, path)?;
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|t| t.timestamp())
        .map_err(|e| FlowParseError::BadTimestamp(s.to_string(), e))
}

fn last(path: &'static [&'static str]) -> &'static str {
    path.last().copied().unwrap_or("")
}

impl Flow {
    /// Build a `Flow` from one already-unescaped per-record JSON value
    /// (the second element of a `values[i]` pair).
    pub fn from_record(record: &Value) -> Result<Self, FlowParseError> {
        Ok(Flow {
            size: field_u64(record, &["source", "bytes"])?,
            src_ip: field_ip(record, &["source", "ip"])?,
            dst_ip: field_ip(record, &["destination", "ip"])?,
            observer_ip: field_ip(record, &["observer", "ip"])?,
            nh_ip: field_ip(record, &["bgpNextHopAddress"])?,
            src_as: field_u64(record, &["bgpSrcAsNumber"])? as u32,
            dst_as: field_u64(record, &["bgpDstAsNumber"])? as u32,
            route: field_ip(record, &["dstIP"])?,
            prefix_len: field_u64(record, &["dstPrefixLength"])? as u8,
            egress_id: field_u64(record, &["netflow", "egress_interface"])? as u16,
            start_t: field_time(record, &["event", "start"])?,
            end_t: field_time(record, &["event", "end"])?,
        })
    }
}

/// Navigate `data.result[0].values[*]` of an already-unescaped response body
/// and build one `Flow` per `values[i][1]` element. Individual records that
/// fail to parse are reported alongside the ones that succeed so the caller
/// can log-and-skip them without discarding the rest of the batch.
pub fn parse_response(body: &[u8]) -> Result<(Vec<Flow>, Vec<FlowParseError>), FlowParseError> {
    let unescaped = unescape_embedded_records(body);
    let root: Value = serde_json::from_slice(&unescaped)?;

    let values = root
        .get("data")
        .and_then(|d| d.get("result"))
        .and_then(|r| r.get(0))
        .and_then(|r0| r0.get("values"))
        .and_then(Value::as_array)
        .ok_or(FlowParseError::MissingField("data.result[0].values"))?;

    let mut flows = Vec::with_capacity(values.len());
    let mut errors = Vec::new();
    for pair in values {
        let Some(record) = pair.get(1) else {
            errors.push(FlowParseError::MissingField("values[i][1]"));
            continue;
        };
        match Flow::from_record(record) {
            Ok(flow) => flows.push(flow),
            Err(e) => errors.push(e),
        }
    }
    Ok((flows, errors))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> String {
        // The upstream wraps each record as a quoted, backslash-escaped
        // string literal sitting where a nested object should be.
        let record = r#"{\"source\":{\"bytes\":100,\"ip\":\"10.0.0.1\"},\"destination\":{\"ip\":\"10.0.0.2\"},\"dstIP\":\"10.0.0.0\",\"dstPrefixLength\":24,\"bgpSrcAsNumber\":100,\"bgpDstAsNumber\":200,\"observer\":{\"ip\":\"10.0.0.3\"},\"bgpNextHopAddress\":\"10.0.0.4\",\"event\":{\"start\":\"2024-01-01T00:00:00Z\",\"end\":\"2024-01-01T00:00:10Z\"},\"netflow\":{\"egress_interface\":5}}"#;
        format!(
            r#"{{"data":{{"result":[{{"values":[["1704067200","{record}"]]}}]}}}}"#,
        )
    }

    #[test]
    fn unescapes_and_parses_a_single_flow() {
        let (flows, errors) = parse_response(sample_body().as_bytes()).unwrap();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(flows.len(), 1);
        let f = flows[0];
        assert_eq!(f.size, 100);
        assert_eq!(f.src_ip, u32::from(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(f.dst_ip, u32::from(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(f.route, u32::from(Ipv4Addr::new(10, 0, 0, 0)));
        assert_eq!(f.prefix_len, 24);
        assert_eq!(f.src_as, 100);
        assert_eq!(f.dst_as, 200);
        assert_eq!(f.observer_ip, u32::from(Ipv4Addr::new(10, 0, 0, 3)));
        assert_eq!(f.nh_ip, u32::from(Ipv4Addr::new(10, 0, 0, 4)));
        assert_eq!(f.egress_id, 5);
        assert_eq!(f.end_t - f.start_t, 10);
    }

    #[test]
    fn one_bad_record_does_not_poison_the_batch() {
        let good = r#"{\"source\":{\"bytes\":100,\"ip\":\"10.0.0.1\"},\"destination\":{\"ip\":\"10.0.0.2\"},\"dstIP\":\"10.0.0.0\",\"dstPrefixLength\":24,\"bgpSrcAsNumber\":100,\"bgpDstAsNumber\":200,\"observer\":{\"ip\":\"10.0.0.3\"},\"bgpNextHopAddress\":\"10.0.0.4\",\"event\":{\"start\":\"2024-01-01T00:00:00Z\",\"end\":\"2024-01-01T00:00:10Z\"},\"netflow\":{\"egress_interface\":5}}"#;
        let bad = r#"{\"source\":{}}"#;
        let body = format!(
            r#"{{"data":{{"result":[{{"values":[["1","{good}"],["2","{bad}"]]}}]}}}}"#,
        );
        let (flows, errors) = parse_response(body.as_bytes()).unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(errors.len(), 1);
    }
}
