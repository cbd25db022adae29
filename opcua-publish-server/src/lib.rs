// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! The server side of the OPC UA publish service set: subscriptions, their
//! state machines and retransmission rings, and the publish engine that
//! multiplexes a session's publish requests against them.
//!
//! The engine is single-threaded and cooperative. Embedders run it on one
//! execution context (a tokio task, typically), feed decoded
//! [`PublishRequest`](opcua_publish_types::PublishRequest) structures in
//! through [`PublishEngine::on_publish_request`], drive the publishing
//! cadence by calling [`PublishEngine::tick`], and receive each
//! [`PublishResponse`](opcua_publish_types::PublishResponse) on the one-shot
//! channel handed in with its request.
//!
//! Monitored item sampling is not part of this crate. Samplers push batches
//! into a [`Subscription`] with
//! [`notify_data_change`](Subscription::notify_data_change) and
//! [`notify_events`](Subscription::notify_events), and poll
//! [`take_resend_data`](Subscription::take_resend_data) to honor transfers
//! that requested a fresh snapshot.

pub mod config;
pub mod constants;
pub mod subscriptions;

pub use config::PublishLimits;
pub use subscriptions::engine::PublishEngine;
pub use subscriptions::notification_ring::NotificationRing;
pub use subscriptions::publish_queue::{
    PendingPublish, PublishQueue, PublishResponseReceiver, PublishResponseSender,
};
pub use subscriptions::subscription::{Subscription, SubscriptionCreateParams};
pub use subscriptions::timer::SubscriptionTimer;
pub use subscriptions::{
    next_subscription_id, PublishEngineId, PublishSubscription, SubscriptionEmission,
    SubscriptionState, TickReason,
};
