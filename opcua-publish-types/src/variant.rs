// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! The `Variant`, restricted to the scalar types notification payloads carry.

use std::io::{Read, Write};

use crate::encoding::{
    read_u8, write_u8, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error,
};
use crate::errors::OpcUAError;
use crate::string::UAString;

/// Type ids of the scalar types a `Variant` can hold, matching the encoding
/// mask values of OPC UA Part 6 5.2.2.16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VariantScalarTypeId {
    Boolean = 1,
    Int32 = 6,
    UInt32 = 7,
    Double = 11,
    String = 12,
}

/// A polymorphic scalar value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// An empty value.
    #[default]
    Empty,
    Boolean(bool),
    Int32(i32),
    UInt32(u32),
    Double(f64),
    String(UAString),
}

impl Variant {
    /// The scalar type id of the contained value, or `None` for `Empty`.
    pub fn scalar_type_id(&self) -> Option<VariantScalarTypeId> {
        match self {
            Variant::Empty => None,
            Variant::Boolean(_) => Some(VariantScalarTypeId::Boolean),
            Variant::Int32(_) => Some(VariantScalarTypeId::Int32),
            Variant::UInt32(_) => Some(VariantScalarTypeId::UInt32),
            Variant::Double(_) => Some(VariantScalarTypeId::Double),
            Variant::String(_) => Some(VariantScalarTypeId::String),
        }
    }

    /// True if the variant holds no value.
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Boolean(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::Int32(value)
    }
}

impl From<u32> for Variant {
    fn from(value: u32) -> Self {
        Variant::UInt32(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Double(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.into())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value.into())
    }
}

macro_rules! variant_try_from {
    ($ty:ty, $arm:ident) => {
        impl TryFrom<Variant> for $ty {
            type Error = OpcUAError;

            fn try_from(value: Variant) -> Result<Self, Self::Error> {
                match value {
                    Variant::$arm(v) => Ok(v),
                    other => Err(OpcUAError::UnexpectedVariantType {
                        variant_id: other.scalar_type_id(),
                        message: format!(
                            "Expected a {} variant",
                            stringify!($arm)
                        ),
                    }),
                }
            }
        }
    };
}

variant_try_from!(bool, Boolean);
variant_try_from!(i32, Int32);
variant_try_from!(u32, UInt32);
variant_try_from!(f64, Double);

impl BinaryEncodable for Variant {
    fn byte_len(&self) -> usize {
        1 + match self {
            Variant::Empty => 0,
            Variant::Boolean(v) => v.byte_len(),
            Variant::Int32(v) => v.byte_len(),
            Variant::UInt32(v) => v.byte_len(),
            Variant::Double(v) => v.byte_len(),
            Variant::String(v) => v.byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let type_id = self.scalar_type_id().map_or(0, |id| id as u8);
        let mut size = write_u8(stream, type_id)?;
        size += match self {
            Variant::Empty => 0,
            Variant::Boolean(v) => v.encode(stream)?,
            Variant::Int32(v) => v.encode(stream)?,
            Variant::UInt32(v) => v.encode(stream)?,
            Variant::Double(v) => v.encode(stream)?,
            Variant::String(v) => v.encode(stream)?,
        };
        Ok(size)
    }
}

impl BinaryDecodable for Variant {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let type_id = read_u8(stream)?;
        Ok(match type_id {
            0 => Variant::Empty,
            1 => Variant::Boolean(bool::decode(stream, decoding_options)?),
            6 => Variant::Int32(i32::decode(stream, decoding_options)?),
            7 => Variant::UInt32(u32::decode(stream, decoding_options)?),
            11 => Variant::Double(f64::decode(stream, decoding_options)?),
            12 => Variant::String(UAString::decode(stream, decoding_options)?),
            id => {
                return Err(Error::decoding(format!(
                    "Unsupported variant type id {id}"
                )))
            }
        })
    }
}
