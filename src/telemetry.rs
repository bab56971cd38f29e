//! Timestamped telemetry records, buffered and flushed as JSON lines.
//!
//! Each flushed record is one line:
//!
//! ```text
//! {"t":12.5,"channel":["inertial","inertial"],"kind":"sample","topic":"","fields":[0.0,0.0,1.2,0.4,-3.0,0.9,0.1,-2.2]}
//! ```
//!
//! `t` is seconds since the log was opened.

use alloc::{
    string::{String, ToString},
    vec::Vec,
};
use core::{fmt, time::Duration};

use serde::Serialize;
use serde_json::Value;

/// Monotonic time source.
pub trait Clock {
    /// Time since an arbitrary fixed point, usually program start.
    fn now(&self) -> Duration;
}

/// When a record was logged, relative to when its log was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const fn from_duration(since_open: Duration) -> Self {
        Self(since_open)
    }

    pub const fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }
}

/// `(group, name)` pair identifying who wrote a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Channel(pub String, pub String);

impl Channel {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self(group.into(), name.into())
    }

    /// Channel for text from the `log` facade.
    pub fn console() -> Self {
        Self::new("console", "console")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub timestamp: Timestamp,
    pub channel: Channel,
    pub kind: String,
    pub topic: String,
    pub fields: Vec<Value>,
}

#[derive(Serialize)]
struct Line<'a> {
    t: f64,
    channel: &'a Channel,
    kind: &'a str,
    topic: &'a str,
    fields: &'a [Value],
}

impl Record {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Line {
            t: self.timestamp.as_secs_f64(),
            channel: &self.channel,
            kind: &self.kind,
            topic: &self.topic,
            fields: &self.fields,
        })
    }
}

#[derive(Debug)]
pub enum TelemetryError {
    Serialize(serde_json::Error),
    /// The sink refused a write. Records not yet written stay buffered.
    Sink,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize(err) => write!(f, "failed to serialize a record: {err}"),
            Self::Sink => f.write_str("log sink rejected a write"),
        }
    }
}

impl core::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Serialize(err) => Some(err),
            Self::Sink => None,
        }
    }
}

/// In-memory buffer of records awaiting a flush.
#[derive(Debug)]
pub struct TelemetryLog<C> {
    clock: C,
    opened: Duration,
    records: Vec<Record>,
}

impl<C: Clock> TelemetryLog<C> {
    pub fn open(clock: C) -> Self {
        let opened = clock.now();
        Self {
            clock,
            opened,
            records: Vec::new(),
        }
    }

    /// Time since the log was opened.
    pub fn now(&self) -> Timestamp {
        Timestamp(self.clock.now().saturating_sub(self.opened))
    }

    /// Buffers a record stamped with the current time and returns the stamp.
    pub fn log(
        &mut self,
        channel: &Channel,
        kind: &str,
        topic: &str,
        fields: Vec<Value>,
    ) -> Timestamp {
        let timestamp = self.now();
        self.log_with_timestamp(timestamp, channel, kind, topic, fields);
        timestamp
    }

    /// Buffers a record carrying an earlier stamp, tying it to the record
    /// that stamp came from.
    pub fn log_with_timestamp(
        &mut self,
        timestamp: Timestamp,
        channel: &Channel,
        kind: &str,
        topic: &str,
        fields: Vec<Value>,
    ) {
        self.records.push(Record {
            timestamp,
            channel: channel.clone(),
            kind: kind.to_string(),
            topic: topic.to_string(),
            fields,
        });
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn pending(&self) -> usize {
        self.records.len()
    }

    /// Writes every buffered record to `sink`, one JSON object per line.
    ///
    /// Returns how many records were written. An empty buffer writes nothing.
    /// Each line goes to the sink in a single write, so a failed write never
    /// leaves half a record behind to be repeated on the next flush.
    pub fn flush<W: fmt::Write>(&mut self, sink: &mut W) -> Result<usize, TelemetryError> {
        let mut written = 0;
        let result = self.records.iter().try_for_each(|record| {
            let mut line = record.to_json().map_err(TelemetryError::Serialize)?;
            line.push('\n');
            sink.write_str(&line).map_err(|_| TelemetryError::Sink)?;
            written += 1;
            Ok(())
        });
        self.records.drain(..written);
        result.map(|()| written)
    }
}
