// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! Per-subscription publishing cadence: the publishing interval and the
//! keep-alive and lifetime counters derived from it.

use std::time::{Duration, Instant};

/// Tracks when a subscription's publishing interval elapses and how many
/// intervals remain before a keep-alive is due or the lifetime expires.
///
/// All interval arithmetic uses `Instant`, so a wall clock stepping backwards
/// cannot stall the subscription.
#[derive(Debug)]
pub struct SubscriptionTimer {
    publishing_interval: Duration,
    max_lifetime_count: u32,
    max_keep_alive_count: u32,
    lifetime_count: u32,
    keep_alive_count: u32,
    last_elapsed: Option<Instant>,
}

impl SubscriptionTimer {
    /// Create a timer from revised subscription parameters.
    pub fn new(
        publishing_interval: Duration,
        max_lifetime_count: u32,
        max_keep_alive_count: u32,
    ) -> SubscriptionTimer {
        SubscriptionTimer {
            publishing_interval,
            max_lifetime_count,
            max_keep_alive_count,
            lifetime_count: max_lifetime_count,
            keep_alive_count: max_keep_alive_count,
            last_elapsed: None,
        }
    }

    /// The revised publishing interval.
    pub fn publishing_interval(&self) -> Duration {
        self.publishing_interval
    }

    /// Check whether the publishing interval has elapsed at `now`, recording
    /// the expiry when it has. The first check always fires.
    pub fn interval_elapsed(&mut self, now: Instant) -> bool {
        match self.last_elapsed {
            None => {
                self.last_elapsed = Some(now);
                true
            }
            Some(last) => {
                if now.saturating_duration_since(last) >= self.publishing_interval {
                    self.last_elapsed = Some(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Reset the keep-alive counter to the maximum keep-alive count of the
    /// subscription.
    pub fn reset_keep_alive_counter(&mut self) {
        self.keep_alive_count = self.max_keep_alive_count;
    }

    /// Reset the lifetime counter to the value specified for the lifetime of
    /// the subscription in the create subscription service.
    pub fn reset_lifetime_counter(&mut self) {
        self.lifetime_count = self.max_lifetime_count;
    }

    /// Start or restart the publishing timer and decrement the lifetime
    /// counter.
    pub fn start_publishing_timer(&mut self) {
        self.lifetime_count = self.lifetime_count.saturating_sub(1);
    }

    /// Decrement the keep-alive counter.
    pub fn decrement_keep_alive_counter(&mut self) {
        self.keep_alive_count = self.keep_alive_count.saturating_sub(1);
    }

    /// Publishing intervals remaining before the lifetime expires.
    pub fn time_to_expiration(&self) -> u32 {
        self.lifetime_count
    }

    /// Publishing intervals remaining before a keep-alive is due.
    pub fn time_to_keep_alive(&self) -> u32 {
        self.keep_alive_count
    }

    /// True once the lifetime counter has run out.
    pub fn is_expired(&self) -> bool {
        self.lifetime_count == 0
    }
}
