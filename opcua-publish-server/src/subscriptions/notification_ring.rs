// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! The retransmission ring of a subscription: sent notification messages are
//! retained here, in production order, until the client acknowledges them or
//! the subscription is deleted.

use std::collections::VecDeque;

use log::warn;
use opcua_publish_types::{NotificationMessage, StatusCode};

/// Retains sent notification messages and assigns their sequence numbers.
///
/// Sequence numbers start at 1 and wrap around past `u32::MAX` back to 1,
/// skipping 0, per OPC UA Part 4 7.21.
#[derive(Debug)]
pub struct NotificationRing {
    retained: VecDeque<NotificationMessage>,
    next_sequence_number: u32,
    capacity: usize,
    overflowed: bool,
}

impl NotificationRing {
    /// Create a ring retaining at most `capacity` messages.
    pub fn new(capacity: usize) -> NotificationRing {
        NotificationRing {
            retained: VecDeque::new(),
            next_sequence_number: 1,
            capacity: capacity.max(1),
            overflowed: false,
        }
    }

    /// The sequence number the next stored message will receive. Keep-alive
    /// messages carry this value without consuming it.
    pub fn next_sequence_number(&self) -> u32 {
        self.next_sequence_number
    }

    /// Consume and return the next sequence number without retaining a
    /// message. Used for status change messages, which are delivered but not
    /// kept for republishing.
    pub fn assign_sequence_number(&mut self) -> u32 {
        let sequence_number = self.next_sequence_number;
        self.next_sequence_number = Self::following(sequence_number);
        sequence_number
    }

    /// Assign the next sequence number to `message`, retain a copy, and
    /// return the stamped message for delivery.
    pub fn assign_and_store(
        &mut self,
        mut message: NotificationMessage,
    ) -> (u32, NotificationMessage) {
        let sequence_number = self.assign_sequence_number();
        message.sequence_number = sequence_number;
        self.retained.push_back(message.clone());
        if self.retained.len() > self.capacity {
            let evicted = self.retained.pop_front();
            self.overflowed = true;
            warn!(
                "Notification ring dropped unacknowledged message {:?}",
                evicted.map(|m| m.sequence_number)
            );
        }
        (sequence_number, message)
    }

    /// Acknowledge the message with the given sequence number. The entry and
    /// everything older than it are released.
    pub fn ack(&mut self, sequence_number: u32) -> StatusCode {
        if sequence_number == 0 {
            return StatusCode::BadSequenceNumberInvalid;
        }
        let Some(position) = self
            .retained
            .iter()
            .position(|m| m.sequence_number == sequence_number)
        else {
            return StatusCode::BadSequenceNumberUnknown;
        };
        self.retained.drain(..=position);
        StatusCode::Good
    }

    /// Snapshot of the retained sequence numbers, in production order.
    pub fn available(&self) -> Vec<u32> {
        self.retained.iter().map(|m| m.sequence_number).collect()
    }

    /// Copy of the retained message with the given sequence number, for
    /// republishing.
    pub fn find(&self, sequence_number: u32) -> Option<NotificationMessage> {
        self.retained
            .iter()
            .find(|m| m.sequence_number == sequence_number)
            .cloned()
    }

    /// Remove and return the oldest retained message.
    pub fn take_oldest(&mut self) -> Option<NotificationMessage> {
        self.retained.pop_front()
    }

    /// True if a message was evicted since the last call; reading clears the
    /// flag.
    pub fn take_overflow(&mut self) -> bool {
        std::mem::take(&mut self.overflowed)
    }

    pub fn len(&self) -> usize {
        self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    fn following(sequence_number: u32) -> u32 {
        // 0 is skipped on wrap.
        if sequence_number == u32::MAX {
            1
        } else {
            sequence_number + 1
        }
    }

    #[cfg(test)]
    pub(crate) fn set_next_sequence_number(&mut self, sequence_number: u32) {
        self.next_sequence_number = sequence_number;
    }
}
