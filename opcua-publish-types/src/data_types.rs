// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! Simple type aliases from OPC UA Part 3.

/// This primitive data type is a UInt32 that is used as an identifier, such as
/// a handle.
pub type IntegerId = u32;

/// A UInt32 counter that wraps around to 1 after reaching its upper bound.
pub type Counter = u32;
