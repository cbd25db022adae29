// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! Server-side subscriptions and the publish engine that multiplexes client
//! publish requests against them.

pub mod engine;
pub mod notification_ring;
pub mod publish_queue;
pub mod subscription;
pub mod timer;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use opcua_publish_types::{DateTime, NotificationMessage, StatusCode};

/// The state of a subscription, per the state table in OPC UA Part 4
/// 5.13.1.2.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    /// The subscription has been removed or its lifetime has expired.
    Closed,
    /// The subscription was created and has not ticked yet.
    Creating,
    /// The subscription is delivering notifications normally.
    Normal,
    /// The publishing interval elapsed without a publish request available to
    /// answer.
    Late,
    /// The subscription is idle and counting down towards a keep-alive.
    KeepAlive,
}

/// Why a subscription is being processed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TickReason {
    /// A publish request was received and the engine selected this
    /// subscription to answer it.
    ReceivedPublishRequest,
    /// The publishing timer cadence fired.
    TickTimerFired,
}

/// A notification message produced by a subscription tick, ready to be paired
/// with a publish request.
#[derive(Debug)]
pub struct SubscriptionEmission {
    /// The message to deliver.
    pub message: NotificationMessage,
    /// True if the subscription has further notifications queued beyond this
    /// message.
    pub more_notifications: bool,
}

/// Identifies a publish engine within the process. Subscriptions hold this as
/// a non-owning back-reference to the engine they are attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublishEngineId(u32);

impl fmt::Display for PublishEngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "publish-engine-{}", self.0)
    }
}

static NEXT_PUBLISH_ENGINE_ID: AtomicU32 = AtomicU32::new(1);

impl PublishEngineId {
    pub(crate) fn next() -> PublishEngineId {
        PublishEngineId(NEXT_PUBLISH_ENGINE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

static NEXT_SUBSCRIPTION_ID: AtomicU32 = AtomicU32::new(1);

/// Allocate a subscription id. Ids are unique within the process for its
/// lifetime and are only recycled by a restart.
pub fn next_subscription_id() -> u32 {
    NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// The contract a subscription presents to the publish engine. The engine
/// schedules, pairs and cancels through this interface alone and never
/// inspects monitored items or any other internals.
pub trait PublishSubscription {
    /// Server-assigned id of the subscription.
    fn id(&self) -> u32;
    /// Relative priority. When more than one subscription can answer a
    /// publish request the highest priority wins.
    fn priority(&self) -> u8;
    /// Current state.
    fn state(&self) -> SubscriptionState;
    /// Whether publishing is enabled.
    fn publishing_enabled(&self) -> bool;
    /// True once any notification or keep-alive has been delivered.
    fn message_sent(&self) -> bool;
    /// Publishing intervals left before the lifetime expires.
    fn time_to_expiration(&self) -> u32;
    /// Publishing intervals left before a keep-alive is due.
    fn time_to_keep_alive(&self) -> u32;
    /// True if the subscription retains sent messages or has notifications
    /// queued for sending.
    fn has_pending_notifications(&self) -> bool;
    /// Number of monitored items owned by the subscription.
    fn monitored_item_count(&self) -> usize;

    /// The engine this subscription is attached to, if any.
    fn publish_engine(&self) -> Option<PublishEngineId>;
    /// Set or clear the engine back-reference. Only the engine calls this,
    /// from attach and detach.
    fn set_publish_engine(&mut self, engine: Option<PublishEngineId>);

    /// Run the subscription state machine once, producing at most one
    /// message. `publishing_req_queued` tells the subscription whether the
    /// engine has a publish request it could answer with.
    fn process_subscription(
        &mut self,
        now: DateTime,
        now_instant: Instant,
        tick_reason: TickReason,
        publishing_req_queued: bool,
    ) -> Option<SubscriptionEmission>;

    /// Acknowledge a previously delivered notification message.
    fn acknowledge_notification(&mut self, sequence_number: u32) -> StatusCode;
    /// Sequence numbers of the retained messages, in production order.
    fn available_sequence_numbers(&self) -> Vec<u32>;
    /// Remove and return the oldest retained message. Used when draining a
    /// deleted subscription.
    fn pop_retained_notification(&mut self) -> Option<NotificationMessage>;
    /// Return a copy of the retained message with the given sequence number.
    fn republish(&mut self, retransmit_sequence_number: u32)
        -> Result<NotificationMessage, StatusCode>;

    /// Reset the lifetime counter, marking client activity.
    fn reset_lifetime_counter(&mut self);
    /// Ask the subscription to re-emit a full current-value snapshot on its
    /// next publish.
    fn resend_initial_values(&mut self);
    /// The subscription is being transferred away; produce the status change
    /// message announcing it to the source session.
    fn notify_transfer(&mut self, now: DateTime) -> NotificationMessage;
}
