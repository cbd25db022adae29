// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! The OPC UA `DateTime`: a 64-bit count of 100 nanosecond ticks since
//! 1601-01-01 00:00:00 UTC.

use std::{
    fmt,
    io::{Read, Write},
};

use chrono::{TimeZone, Utc};

use crate::encoding::{
    read_i64, write_i64, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
};

/// Offset between the Windows epoch (1601-01-01) and the Unix epoch
/// (1970-01-01), in seconds.
const EPOCH_DELTA_SECONDS: i64 = 11_644_473_600;
/// 100 nanosecond ticks per second.
const TICKS_PER_SECOND: i64 = 10_000_000;
/// Nanoseconds per tick.
const NANOS_PER_TICK: i64 = 100;

/// An OPC UA timestamp. Stored as raw ticks so that values survive an
/// encode/decode round trip exactly.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DateTime {
    ticks: i64,
}

/// An alias for DateTime, as some messages use this name for their timestamps.
pub type UtcTime = DateTime;

impl DateTime {
    /// The current time.
    pub fn now() -> DateTime {
        Self::from(Utc::now())
    }

    /// The null time, i.e. the epoch 1601-01-01 00:00:00 UTC.
    pub fn null() -> DateTime {
        DateTime { ticks: 0 }
    }

    /// Construct from a raw tick count.
    pub fn from_ticks(ticks: i64) -> DateTime {
        DateTime { ticks: ticks.max(0) }
    }

    /// The number of 100 nanosecond ticks since 1601-01-01 00:00:00 UTC.
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// True if this is the null time.
    pub fn is_null(&self) -> bool {
        self.ticks == 0
    }

    /// The timestamp as a `chrono` UTC date time. Tick values outside the
    /// range `chrono` can represent collapse to the Unix epoch.
    pub fn as_chrono(&self) -> chrono::DateTime<Utc> {
        let secs = self.ticks / TICKS_PER_SECOND - EPOCH_DELTA_SECONDS;
        let nanos = (self.ticks % TICKS_PER_SECOND) * NANOS_PER_TICK;
        Utc.timestamp_opt(secs, nanos as u32)
            .single()
            .unwrap_or_default()
    }
}

impl From<chrono::DateTime<Utc>> for DateTime {
    fn from(value: chrono::DateTime<Utc>) -> Self {
        let secs = value.timestamp() + EPOCH_DELTA_SECONDS;
        let ticks = secs * TICKS_PER_SECOND + i64::from(value.timestamp_subsec_nanos()) / NANOS_PER_TICK;
        DateTime::from_ticks(ticks)
    }
}

impl From<DateTime> for chrono::DateTime<Utc> {
    fn from(value: DateTime) -> Self {
        value.as_chrono()
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_chrono().to_rfc3339())
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl BinaryEncodable for DateTime {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_i64(stream, self.ticks)
    }
}

impl BinaryDecodable for DateTime {
    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(DateTime::from_ticks(read_i64(stream)?))
    }
}
