// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! Message header for requests.

use std::io::{Read, Write};

use crate::data_types::IntegerId;
use crate::date_time::UtcTime;
use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult};

/// The `RequestHeader` contains information common to every request from
/// client to server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestHeader {
    /// Request timestamp.
    pub timestamp: UtcTime,
    /// Client-assigned identifier for the request, returned on the response.
    pub request_handle: IntegerId,
    /// Number of milliseconds the client is prepared to wait for a response.
    /// Zero means the client does not impose a timeout.
    pub timeout_hint: u32,
}

impl RequestHeader {
    /// Create a new request header with the current time as timestamp.
    pub fn new(request_handle: IntegerId, timeout_hint: u32) -> RequestHeader {
        RequestHeader {
            timestamp: UtcTime::now(),
            request_handle,
            timeout_hint,
        }
    }
}

impl BinaryEncodable for RequestHeader {
    fn byte_len(&self) -> usize {
        self.timestamp.byte_len() + self.request_handle.byte_len() + self.timeout_hint.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.timestamp.encode(stream)?;
        size += self.request_handle.encode(stream)?;
        size += self.timeout_hint.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for RequestHeader {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let timestamp = UtcTime::decode(stream, decoding_options)?;
        let request_handle = IntegerId::decode(stream, decoding_options)?;
        let timeout_hint = u32::decode(stream, decoding_options)?;
        Ok(RequestHeader {
            timestamp,
            request_handle,
            timeout_hint,
        })
    }
}
