// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! The OPC UA `String`, which unlike a Rust `String` can be null.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::encoding::{
    read_i32, write_i32, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error,
};
use crate::status_code::StatusCode;

/// A string value which may be null. Distinct from an empty string, although
/// most code treats the two the same.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct UAString {
    value: Option<String>,
}

impl UAString {
    /// The null string.
    pub fn null() -> UAString {
        UAString { value: None }
    }

    /// True if the string is null.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// The string value, with null treated as the empty string.
    pub fn as_ref(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// The length of the string in bytes, or -1 for null.
    pub fn len(&self) -> isize {
        self.value.as_ref().map_or(-1, |v| v.len() as isize)
    }

    /// True if the string is null or empty.
    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }
}

impl fmt::Display for UAString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl From<&str> for UAString {
    fn from(value: &str) -> Self {
        UAString {
            value: Some(value.to_string()),
        }
    }
}

impl From<String> for UAString {
    fn from(value: String) -> Self {
        UAString { value: Some(value) }
    }
}

impl BinaryEncodable for UAString {
    fn byte_len(&self) -> usize {
        4 + self.value.as_ref().map_or(0, |v| v.len())
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let Some(value) = self.value.as_ref() else {
            return write_i32(stream, -1);
        };
        let mut size = write_i32(stream, value.len() as i32)?;
        stream.write_all(value.as_bytes()).map_err(Error::encoding)?;
        size += value.len();
        Ok(size)
    }
}

impl BinaryDecodable for UAString {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        if len == -1 {
            return Ok(UAString::null());
        }
        if len < -1 {
            return Err(Error::decoding(format!("Invalid string length {len}")));
        }
        let len = len as usize;
        if len > decoding_options.max_string_length {
            return Err(Error::new(
                StatusCode::BadEncodingLimitsExceeded,
                format!(
                    "String length {} exceeds decoding limit {}",
                    len, decoding_options.max_string_length
                ),
            ));
        }
        let mut buf = vec![0u8; len];
        stream.read_exact(&mut buf).map_err(Error::decoding)?;
        Ok(UAString {
            value: Some(String::from_utf8(buf).map_err(Error::decoding)?),
        })
    }
}
