// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! Message header for responses.

use std::io::{Read, Write};

use crate::data_types::IntegerId;
use crate::date_time::{DateTime, UtcTime};
use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult};
use crate::request_header::RequestHeader;
use crate::status_code::StatusCode;

/// The `ResponseHeader` contains information common to every response from
/// server to client.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseHeader {
    /// Response timestamp.
    pub timestamp: UtcTime,
    /// Handle of the request this message is responding to.
    pub request_handle: IntegerId,
    /// Status of the service call as a whole.
    pub service_result: StatusCode,
}

/// Trait for types that can contain a request handle.
pub trait AsRequestHandle {
    /// Get the handle of this request.
    fn as_request_handle(&self) -> u32;
}

impl AsRequestHandle for &RequestHeader {
    fn as_request_handle(&self) -> u32 {
        self.request_handle
    }
}

impl AsRequestHandle for u32 {
    fn as_request_handle(&self) -> u32 {
        *self
    }
}

impl ResponseHeader {
    /// Create a new response header with status `Good`.
    pub fn new_good(request_header: impl AsRequestHandle) -> ResponseHeader {
        ResponseHeader::new_service_result(request_header, StatusCode::Good)
    }

    /// Create a new response header with given status.
    pub fn new_service_result(
        request_header: impl AsRequestHandle,
        service_result: StatusCode,
    ) -> ResponseHeader {
        ResponseHeader {
            timestamp: DateTime::now(),
            request_handle: request_header.as_request_handle(),
            service_result,
        }
    }
}

impl BinaryEncodable for ResponseHeader {
    fn byte_len(&self) -> usize {
        self.timestamp.byte_len() + self.request_handle.byte_len() + self.service_result.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.timestamp.encode(stream)?;
        size += self.request_handle.encode(stream)?;
        size += self.service_result.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for ResponseHeader {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let timestamp = UtcTime::decode(stream, decoding_options)?;
        let request_handle = IntegerId::decode(stream, decoding_options)?;
        let service_result = StatusCode::decode(stream, decoding_options)?;
        Ok(ResponseHeader {
            timestamp,
            request_handle,
            service_result,
        })
    }
}
