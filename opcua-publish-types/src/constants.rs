// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! Limits placed on decoded messages, regardless of transport limits.

/// Maximum number of elements in any decoded array.
pub const MAX_ARRAY_LENGTH: usize = 1000;
/// Maximum length in bytes of any decoded string.
pub const MAX_STRING_LENGTH: usize = 65535;
