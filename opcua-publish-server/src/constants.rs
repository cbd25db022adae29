// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! Server publishing defaults. All of these can be overridden through
//! [`PublishLimits`](crate::config::PublishLimits).

/// Maximum number of publish requests a session may have queued before the
/// oldest is rejected.
pub const MAX_PUBLISH_REQUESTS_IN_QUEUE: usize = 100;

/// The smallest publishing interval the server will revise a subscription to.
pub const MIN_PUBLISHING_INTERVAL_MS: u64 = 50;

/// Keep-alive count used when the client requests 0.
pub const DEFAULT_KEEP_ALIVE_COUNT: u32 = 10;

/// Largest keep-alive count a subscription may request.
pub const MAX_KEEP_ALIVE_COUNT: u32 = 30_000;

/// Maximum number of notifications batched into a single publish response.
pub const MAX_NOTIFICATIONS_PER_PUBLISH: usize = 100;

/// Number of sent notification messages a subscription retains for
/// republishing until they are acknowledged.
pub const MAX_REPUBLISH_DEPTH: usize = 100;

/// Maximum number of produced-but-unsent notifications queued per
/// subscription.
pub const MAX_QUEUED_NOTIFICATIONS: usize = 1000;
