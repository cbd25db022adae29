// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! Contains the `BinaryEncodable` and `BinaryDecodable` traits and helpers for
//! reading and writing of scalar values and other primitives.

use std::{
    error::Error as StdError,
    fmt::{self, Display},
    io::{Read, Write},
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{constants, status_code::StatusCode};

/// Result of an encoding or decoding operation.
pub type EncodingResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
/// Codec error.
///
/// Carries the status code that should be reported for the failed operation
/// as well as details about the underlying cause.
pub struct Error {
    status: StatusCode,
    context: Box<dyn StdError + Send + Sync>,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.context)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.context)
    }
}

impl Error {
    /// Create a new error with the specified `status` code and
    /// `context` as a dynamic error source.
    pub fn new(status: StatusCode, context: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            status,
            context: context.into(),
        }
    }

    /// Create a new error with status code `BadDecodingError` and
    /// `context` as a dynamic error source.
    pub fn decoding(context: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new(StatusCode::BadDecodingError, context)
    }

    /// Create a new error with status code `BadEncodingError` and
    /// `context` as a dynamic error source.
    pub fn encoding(context: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::new(StatusCode::BadEncodingError, context)
    }

    /// Get the inner status code of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

#[derive(Debug, Clone)]
/// Options restricting decoding of messages.
pub struct DecodingOptions {
    /// Maximum length in elements of any decoded array.
    pub max_array_length: usize,
    /// Maximum length in bytes of any decoded string.
    pub max_string_length: usize,
}

impl Default for DecodingOptions {
    fn default() -> Self {
        Self {
            max_array_length: constants::MAX_ARRAY_LENGTH,
            max_string_length: constants::MAX_STRING_LENGTH,
        }
    }
}

/// Types that can be encoded to the OPC UA binary wire format.
pub trait BinaryEncodable {
    /// Returns the exact byte length of the encoded representation.
    fn byte_len(&self) -> usize;
    /// Encodes the instance to the write stream, returning the number of
    /// bytes written.
    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize>;
}

/// Types that can be decoded from the OPC UA binary wire format.
pub trait BinaryDecodable: Sized {
    /// Decodes an instance from the read stream.
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self>;
}

pub fn write_u8<S: Write + ?Sized>(stream: &mut S, value: u8) -> EncodingResult<usize> {
    stream.write_u8(value).map_err(Error::encoding)?;
    Ok(1)
}

pub fn write_i32<S: Write + ?Sized>(stream: &mut S, value: i32) -> EncodingResult<usize> {
    stream.write_i32::<LittleEndian>(value).map_err(Error::encoding)?;
    Ok(4)
}

pub fn write_u32<S: Write + ?Sized>(stream: &mut S, value: u32) -> EncodingResult<usize> {
    stream.write_u32::<LittleEndian>(value).map_err(Error::encoding)?;
    Ok(4)
}

pub fn write_i64<S: Write + ?Sized>(stream: &mut S, value: i64) -> EncodingResult<usize> {
    stream.write_i64::<LittleEndian>(value).map_err(Error::encoding)?;
    Ok(8)
}

pub fn write_f64<S: Write + ?Sized>(stream: &mut S, value: f64) -> EncodingResult<usize> {
    stream.write_f64::<LittleEndian>(value).map_err(Error::encoding)?;
    Ok(8)
}

pub fn read_u8<S: Read>(stream: &mut S) -> EncodingResult<u8> {
    stream.read_u8().map_err(Error::decoding)
}

pub fn read_i32<S: Read>(stream: &mut S) -> EncodingResult<i32> {
    stream.read_i32::<LittleEndian>().map_err(Error::decoding)
}

pub fn read_u32<S: Read>(stream: &mut S) -> EncodingResult<u32> {
    stream.read_u32::<LittleEndian>().map_err(Error::decoding)
}

pub fn read_i64<S: Read>(stream: &mut S) -> EncodingResult<i64> {
    stream.read_i64::<LittleEndian>().map_err(Error::decoding)
}

pub fn read_f64<S: Read>(stream: &mut S) -> EncodingResult<f64> {
    stream.read_f64::<LittleEndian>().map_err(Error::decoding)
}

// OPC UA Part 6 - Mappings 1.03 Specification
//
// Standard UA types onto Rust types:
//
// Boolean  -> bool
// Byte     -> u8
// Int32    -> i32
// UInt32   -> u32
// Int64    -> i64
// Double   -> f64

impl BinaryEncodable for bool {
    fn byte_len(&self) -> usize {
        1
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        // 0, or 1 for true or false, single byte
        write_u8(stream, u8::from(*self))
    }
}

impl BinaryDecodable for bool {
    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(read_u8(stream)? == 1)
    }
}

impl BinaryEncodable for u8 {
    fn byte_len(&self) -> usize {
        1
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_u8(stream, *self)
    }
}

impl BinaryDecodable for u8 {
    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        read_u8(stream)
    }
}

impl BinaryEncodable for i32 {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_i32(stream, *self)
    }
}

impl BinaryDecodable for i32 {
    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        read_i32(stream)
    }
}

impl BinaryEncodable for u32 {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_u32(stream, *self)
    }
}

impl BinaryDecodable for u32 {
    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        read_u32(stream)
    }
}

impl BinaryEncodable for i64 {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_i64(stream, *self)
    }
}

impl BinaryDecodable for i64 {
    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        read_i64(stream)
    }
}

impl BinaryEncodable for f64 {
    fn byte_len(&self) -> usize {
        8
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_f64(stream, *self)
    }
}

impl BinaryDecodable for f64 {
    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        read_f64(stream)
    }
}

// Arrays are encoded as an Int32 element count followed by the elements.
// A count of -1 indicates a null array.

impl<T: BinaryEncodable> BinaryEncodable for Option<Vec<T>> {
    fn byte_len(&self) -> usize {
        4 + self
            .as_ref()
            .map(|values| values.iter().map(BinaryEncodable::byte_len).sum::<usize>())
            .unwrap_or(0)
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let Some(values) = self.as_ref() else {
            return write_i32(stream, -1);
        };
        let mut size = write_i32(stream, values.len() as i32)?;
        for value in values {
            size += value.encode(stream)?;
        }
        Ok(size)
    }
}

impl<T: BinaryDecodable> BinaryDecodable for Option<Vec<T>> {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let len = read_i32(stream)?;
        if len == -1 {
            return Ok(None);
        }
        if len < -1 {
            return Err(Error::decoding(format!("Invalid array length {len}")));
        }
        let len = len as usize;
        if len > decoding_options.max_array_length {
            return Err(Error::new(
                StatusCode::BadEncodingLimitsExceeded,
                format!(
                    "Array length {} exceeds decoding limit {}",
                    len, decoding_options.max_array_length
                ),
            ));
        }
        let mut values = Vec::with_capacity(len);
        for _ in 0..len {
            values.push(T::decode(stream, decoding_options)?);
        }
        Ok(Some(values))
    }
}
