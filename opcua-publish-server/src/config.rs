// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! Configuration of the publish engine and the revision limits applied to
//! subscription parameters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Limits applied to publishing.
pub struct PublishLimits {
    /// Maximum number of pending publish requests per session. When a new
    /// request would leave more than this queued, the oldest is answered with
    /// `BadTooManyPublishRequests`.
    #[serde(default = "defaults::max_publish_request_in_queue")]
    pub max_publish_request_in_queue: usize,
    /// Specifies the minimum publishing interval for this server in
    /// milliseconds.
    #[serde(default = "defaults::min_publishing_interval_ms")]
    pub min_publishing_interval_ms: u64,
    /// Maximum value of `KeepAliveCount`.
    #[serde(default = "defaults::max_keep_alive_count")]
    pub max_keep_alive_count: u32,
    /// Default value of `KeepAliveCount`, used if the client sets it to 0.
    #[serde(default = "defaults::default_keep_alive_count")]
    pub default_keep_alive_count: u32,
    /// Maximum number of notifications per publish message.
    #[serde(default = "defaults::max_notifications_per_publish")]
    pub max_notifications_per_publish: usize,
    /// Number of sent notification messages retained per subscription for
    /// republishing.
    #[serde(default = "defaults::max_republish_depth")]
    pub max_republish_depth: usize,
    /// Maximum number of queued notifications per subscription.
    #[serde(default = "defaults::max_queued_notifications")]
    pub max_queued_notifications: usize,
}

impl Default for PublishLimits {
    fn default() -> Self {
        Self {
            max_publish_request_in_queue: defaults::max_publish_request_in_queue(),
            min_publishing_interval_ms: defaults::min_publishing_interval_ms(),
            max_keep_alive_count: defaults::max_keep_alive_count(),
            default_keep_alive_count: defaults::default_keep_alive_count(),
            max_notifications_per_publish: defaults::max_notifications_per_publish(),
            max_republish_depth: defaults::max_republish_depth(),
            max_queued_notifications: defaults::max_queued_notifications(),
        }
    }
}

mod defaults {
    use crate::constants;

    pub fn max_publish_request_in_queue() -> usize {
        constants::MAX_PUBLISH_REQUESTS_IN_QUEUE
    }
    pub fn min_publishing_interval_ms() -> u64 {
        constants::MIN_PUBLISHING_INTERVAL_MS
    }
    pub fn max_keep_alive_count() -> u32 {
        constants::MAX_KEEP_ALIVE_COUNT
    }
    pub fn default_keep_alive_count() -> u32 {
        constants::DEFAULT_KEEP_ALIVE_COUNT
    }
    pub fn max_notifications_per_publish() -> usize {
        constants::MAX_NOTIFICATIONS_PER_PUBLISH
    }
    pub fn max_republish_depth() -> usize {
        constants::MAX_REPUBLISH_DEPTH
    }
    pub fn max_queued_notifications() -> usize {
        constants::MAX_QUEUED_NOTIFICATIONS
    }
}
