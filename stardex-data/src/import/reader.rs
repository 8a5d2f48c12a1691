//! Streaming record reader for catalogue dumps.
//!
//! The dump is a top-level sequence of JSON objects, either wrapped in one
//! large array or simply concatenated. Records are decoded one at a time so
//! dumps far larger than memory stream through in constant space.
#![forbid(unsafe_code)]

use std::io::{self, Read};

use chrono::{DateTime, Utc};
use log::warn;
use serde::Deserialize;
use stardex_core::{COORD_UNSET, SystemRecord, grid_allowed, grid_id, parse_catalogue_date, scale_coord};

/// Wire shape of one catalogue entry. Unknown fields are skipped; missing
/// fields fall back to invalid sentinels and are dropped by validation
/// rather than failing the decode.
#[derive(Debug, Deserialize)]
struct RawSystem {
    #[serde(default = "unset_id")]
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    coords: RawCoords,
}

const fn unset_id() -> i64 {
    -1
}

#[derive(Debug, Default, Deserialize)]
struct RawCoords {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

/// `Read` adapter that blanks top-level array punctuation (`[`, `,`, `]` at
/// nesting depth zero, string-aware), turning both the array form and the
/// concatenated form into a whitespace-separated stream of JSON values.
struct ValueStream<R> {
    inner: R,
    depth: u32,
    in_string: bool,
    escaped: bool,
}

impl<R> ValueStream<R> {
    const fn new(inner: R) -> Self {
        Self {
            inner,
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }
}

impl<R: Read> Read for ValueStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let filled = self.inner.read(buf)?;
        for byte in &mut buf[..filled] {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if *byte == b'\\' {
                    self.escaped = true;
                } else if *byte == b'"' {
                    self.in_string = false;
                }
                continue;
            }
            match *byte {
                b'[' | b']' | b',' if self.depth == 0 => *byte = b' ',
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
        }
        Ok(filled)
    }
}

/// Lazy, finite sequence of validated records paired with their computed
/// grid cell id.
///
/// A malformed object stops further reads for this invocation, but records
/// already yielded stay staged upstream. A record cap and a cancellation
/// predicate (checked between objects) both end the sequence early without
/// error.
pub(super) struct RecordReader<'a, R: Read> {
    stream: serde_json::StreamDeserializer<'static, serde_json::de::IoRead<ValueStream<R>>, RawSystem>,
    allow: Option<&'a [bool]>,
    cancel: &'a dyn Fn() -> bool,
    remaining: u64,
    eof: bool,
    latest: Option<DateTime<Utc>>,
}

impl<'a, R: Read> RecordReader<'a, R> {
    pub(super) fn new(
        input: R,
        allow: Option<&'a [bool]>,
        limit: Option<u64>,
        cancel: &'a dyn Fn() -> bool,
    ) -> Self {
        let stream = serde_json::Deserializer::from_reader(ValueStream::new(input)).into_iter();
        Self {
            stream,
            allow,
            cancel,
            remaining: limit.unwrap_or(u64::MAX),
            eof: false,
            latest: None,
        }
    }

    /// Whether the underlying stream is exhausted (end of input, record cap
    /// reached, or stopped on a malformed object). False after a purely
    /// cooperative cancellation, which leaves the stream intact.
    pub(super) const fn at_end(&self) -> bool {
        self.eof
    }

    /// Latest timestamp among all records read so far, whether or not they
    /// survived validation or the grid filter.
    pub(super) const fn latest_date(&self) -> Option<DateTime<Utc>> {
        self.latest
    }
}

impl<R: Read> Iterator for RecordReader<'_, R> {
    type Item = (SystemRecord, u16);

    fn next(&mut self) -> Option<Self::Item> {
        while !self.eof && !(self.cancel)() {
            if self.remaining == 0 {
                self.eof = true;
                break;
            }
            let raw = match self.stream.next() {
                None => {
                    self.eof = true;
                    break;
                }
                Some(Err(err)) => {
                    warn!("malformed catalogue record, stopping read: {err}");
                    self.eof = true;
                    break;
                }
                Some(Ok(raw)) => raw,
            };
            self.remaining -= 1;

            let date = match raw.date.as_deref() {
                None => None,
                Some(text) => match parse_catalogue_date(text) {
                    Ok(parsed) => Some(parsed),
                    Err(err) => {
                        warn!("record {} has unparseable date {text:?}: {err}", raw.id);
                        continue;
                    }
                },
            };
            // The watermark covers every record that parsed a date, even
            // ones dropped below.
            if let Some(parsed) = date
                && self.latest.is_none_or(|seen| parsed > seen)
            {
                self.latest = Some(parsed);
            }

            let record = SystemRecord {
                external_id: raw.id,
                name: raw.name,
                date,
                x: raw.coords.x.map_or(COORD_UNSET, scale_coord),
                y: raw.coords.y.map_or(COORD_UNSET, scale_coord),
                z: raw.coords.z.map_or(COORD_UNSET, scale_coord),
            };
            if !record.is_valid() {
                continue;
            }

            let cell = grid_id(record.x, record.z);
            if !grid_allowed(self.allow, cell) {
                continue;
            }
            return Some((record, cell));
        }
        None
    }
}
