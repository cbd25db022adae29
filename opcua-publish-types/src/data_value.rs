// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! The `DataValue`: a value with status and timestamps, encoded behind a
//! presence mask.

use std::io::{Read, Write};

use bitflags::bitflags;

use crate::date_time::DateTime;
use crate::encoding::{
    read_u8, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
};
use crate::status_code::StatusCode;
use crate::variant::Variant;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct DataValueFlags: u8 {
        /// False if the value is null
        const HAS_VALUE = 0x1;
        /// False if the status is Good
        const HAS_STATUS = 0x2;
        /// False if the source timestamp is null
        const HAS_SOURCE_TIMESTAMP = 0x4;
        /// False if the server timestamp is null
        const HAS_SERVER_TIMESTAMP = 0x8;
    }
}

/// A value produced for a monitored item, together with the status and
/// timestamps that qualify it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// The sampled value.
    pub value: Option<Variant>,
    /// Status associated with the value. Absent means `Good`.
    pub status: Option<StatusCode>,
    /// The time the source produced the value.
    pub source_timestamp: Option<DateTime>,
    /// The time the server received the value.
    pub server_timestamp: Option<DateTime>,
}

impl DataValue {
    /// Create a value sampled at the supplied time.
    pub fn new_at(value: impl Into<Variant>, source_timestamp: DateTime) -> DataValue {
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(source_timestamp),
            server_timestamp: None,
        }
    }

    /// Create a value sampled now.
    pub fn new_now(value: impl Into<Variant>) -> DataValue {
        Self::new_at(value, DateTime::now())
    }

    /// The status of the value, with absence meaning `Good`.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }

    fn encoding_mask(&self) -> DataValueFlags {
        let mut mask = DataValueFlags::empty();
        if self.value.is_some() {
            mask |= DataValueFlags::HAS_VALUE;
        }
        if self.status.is_some() {
            mask |= DataValueFlags::HAS_STATUS;
        }
        if self.source_timestamp.is_some() {
            mask |= DataValueFlags::HAS_SOURCE_TIMESTAMP;
        }
        if self.server_timestamp.is_some() {
            mask |= DataValueFlags::HAS_SERVER_TIMESTAMP;
        }
        mask
    }
}

impl BinaryEncodable for DataValue {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        if let Some(value) = &self.value {
            size += value.byte_len();
        }
        if let Some(status) = &self.status {
            size += status.byte_len();
        }
        if let Some(timestamp) = &self.source_timestamp {
            size += timestamp.byte_len();
        }
        if let Some(timestamp) = &self.server_timestamp {
            size += timestamp.byte_len();
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = write_u8(stream, self.encoding_mask().bits())?;
        if let Some(value) = &self.value {
            size += value.encode(stream)?;
        }
        if let Some(status) = &self.status {
            size += status.encode(stream)?;
        }
        if let Some(timestamp) = &self.source_timestamp {
            size += timestamp.encode(stream)?;
        }
        if let Some(timestamp) = &self.server_timestamp {
            size += timestamp.encode(stream)?;
        }
        Ok(size)
    }
}

impl BinaryDecodable for DataValue {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let mask = DataValueFlags::from_bits_truncate(read_u8(stream)?);
        let value = if mask.contains(DataValueFlags::HAS_VALUE) {
            Some(Variant::decode(stream, decoding_options)?)
        } else {
            None
        };
        let status = if mask.contains(DataValueFlags::HAS_STATUS) {
            Some(StatusCode::decode(stream, decoding_options)?)
        } else {
            None
        };
        let source_timestamp = if mask.contains(DataValueFlags::HAS_SOURCE_TIMESTAMP) {
            Some(DateTime::decode(stream, decoding_options)?)
        } else {
            None
        };
        let server_timestamp = if mask.contains(DataValueFlags::HAS_SERVER_TIMESTAMP) {
            Some(DateTime::decode(stream, decoding_options)?)
        } else {
            None
        };
        Ok(DataValue {
            value,
            status,
            source_timestamp,
            server_timestamp,
        })
    }
}
