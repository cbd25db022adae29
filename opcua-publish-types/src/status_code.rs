// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! The OPC UA `StatusCode`, restricted to the codes the publish service set
//! observes. Unrecognized codes survive decoding untouched.

use std::{
    fmt,
    io::{Read, Write},
};

use crate::encoding::{
    read_u32, write_u32, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult,
};

/// A 32-bit status code. The top two bits hold the severity, per
/// OPC UA Part 4 7.39.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct StatusCode(u32);

#[allow(non_upper_case_globals)]
impl StatusCode {
    /// The operation succeeded.
    pub const Good: StatusCode = StatusCode(0x0000_0000);
    /// The subscription was transferred to another session.
    pub const GoodSubscriptionTransferred: StatusCode = StatusCode(0x002D_0000);
    /// An internal error occurred as a result of a programming or configuration error.
    pub const BadInternalError: StatusCode = StatusCode(0x8002_0000);
    /// Not enough memory to complete the operation.
    pub const BadOutOfMemory: StatusCode = StatusCode(0x8003_0000);
    /// Encoding halted because of invalid data in the objects being serialized.
    pub const BadEncodingError: StatusCode = StatusCode(0x8006_0000);
    /// Decoding halted because of invalid data in the stream.
    pub const BadDecodingError: StatusCode = StatusCode(0x8007_0000);
    /// The message encoding/decoding limits imposed by the stack have been exceeded.
    pub const BadEncodingLimitsExceeded: StatusCode = StatusCode(0x8008_0000);
    /// The operation timed out.
    pub const BadTimeout: StatusCode = StatusCode(0x800A_0000);
    /// The session was closed by the client.
    pub const BadSessionClosed: StatusCode = StatusCode(0x8026_0000);
    /// The subscription id is not valid.
    pub const BadSubscriptionIdInvalid: StatusCode = StatusCode(0x8028_0000);
    /// The sequence number is not valid.
    pub const BadSequenceNumberInvalid: StatusCode = StatusCode(0x803F_0000);
    /// There were too many publish requests queued for the session.
    pub const BadTooManyPublishRequests: StatusCode = StatusCode(0x8078_0000);
    /// There is no subscription available for this session.
    pub const BadNoSubscription: StatusCode = StatusCode(0x8079_0000);
    /// The sequence number is unknown to the server.
    pub const BadSequenceNumberUnknown: StatusCode = StatusCode(0x807A_0000);
    /// The requested notification message is no longer available.
    pub const BadMessageNotAvailable: StatusCode = StatusCode(0x807B_0000);
    /// The secure channel has been closed.
    pub const BadSecureChannelClosed: StatusCode = StatusCode(0x8086_0000);
    /// The operation cannot be completed because the object is closed, uninitialized or in some other invalid state.
    pub const BadInvalidState: StatusCode = StatusCode(0x80AF_0000);

    /// Create a status code from a raw `u32` value, preserving unknown codes.
    pub fn from_bits(bits: u32) -> StatusCode {
        StatusCode(bits)
    }

    /// The raw `u32` value of the status code.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// True if the severity is `Good`.
    pub fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// True if the severity is `Bad`.
    pub fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// True if the severity is `Uncertain`.
    pub fn is_uncertain(&self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    /// The symbolic name of the status code, if it is one of the codes this
    /// crate defines.
    pub fn name(&self) -> Option<&'static str> {
        Some(match *self {
            StatusCode::Good => "Good",
            StatusCode::GoodSubscriptionTransferred => "GoodSubscriptionTransferred",
            StatusCode::BadInternalError => "BadInternalError",
            StatusCode::BadOutOfMemory => "BadOutOfMemory",
            StatusCode::BadEncodingError => "BadEncodingError",
            StatusCode::BadDecodingError => "BadDecodingError",
            StatusCode::BadEncodingLimitsExceeded => "BadEncodingLimitsExceeded",
            StatusCode::BadTimeout => "BadTimeout",
            StatusCode::BadSessionClosed => "BadSessionClosed",
            StatusCode::BadSubscriptionIdInvalid => "BadSubscriptionIdInvalid",
            StatusCode::BadSequenceNumberInvalid => "BadSequenceNumberInvalid",
            StatusCode::BadTooManyPublishRequests => "BadTooManyPublishRequests",
            StatusCode::BadNoSubscription => "BadNoSubscription",
            StatusCode::BadSequenceNumberUnknown => "BadSequenceNumberUnknown",
            StatusCode::BadMessageNotAvailable => "BadMessageNotAvailable",
            StatusCode::BadSecureChannelClosed => "BadSecureChannelClosed",
            StatusCode::BadInvalidState => "BadInvalidState",
            _ => return None,
        })
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "StatusCode({:#010X})", self.0),
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<StatusCode> for u32 {
    fn from(value: StatusCode) -> Self {
        value.bits()
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        StatusCode::from_bits(value)
    }
}

impl BinaryEncodable for StatusCode {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_u32(stream, self.0)
    }
}

impl BinaryDecodable for StatusCode {
    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(StatusCode(read_u32(stream)?))
    }
}
