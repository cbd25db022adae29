// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! A single server-side subscription: the state machine of OPC UA Part 4
//! 5.13.1.2, the notifications it queues and batches, and the retransmission
//! ring of sent messages.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use opcua_publish_types::{
    DateTime, EventFieldList, MonitoredItemNotification, NotificationMessage, StatusCode,
};

use crate::config::PublishLimits;

use super::notification_ring::NotificationRing;
use super::timer::SubscriptionTimer;
use super::{
    PublishEngineId, PublishSubscription, SubscriptionEmission, SubscriptionState, TickReason,
};

/// Inputs to one evaluation of the subscription state table.
#[derive(Debug)]
pub struct SubscriptionStateParams {
    pub notifications_available: bool,
    pub more_notifications: bool,
    pub publishing_req_queued: bool,
    pub publishing_interval_elapsed: bool,
}

/// What the subscription should send as a result of a state evaluation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UpdateStateAction {
    None,
    ReturnKeepAlive,
    ReturnNotifications,
}

/// Which row of the state table in OPC UA Part 4 5.13.1.2 handled the
/// evaluation. Exposed so tests can pin transitions to the table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum HandledState {
    None0 = 0,
    Closed1 = 1,
    Create3 = 3,
    Normal4 = 4,
    Normal5 = 5,
    IntervalElapsed6 = 6,
    IntervalElapsed7 = 7,
    IntervalElapsed8 = 8,
    IntervalElapsed9 = 9,
    Late10 = 10,
    Late11 = 11,
    Late12 = 12,
    KeepAlive13 = 13,
    KeepAlive14 = 14,
    KeepAlive15 = 15,
    KeepAlive16 = 16,
    KeepAlive17 = 17,
}

/// Outcome of one state evaluation.
#[derive(Debug)]
pub struct UpdateStateResult {
    pub handled_state: HandledState,
    pub update_state_action: UpdateStateAction,
}

impl UpdateStateResult {
    fn new(handled_state: HandledState, update_state_action: UpdateStateAction) -> Self {
        UpdateStateResult {
            handled_state,
            update_state_action,
        }
    }
}

/// Client-requested subscription parameters, before revision against server
/// limits.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionCreateParams {
    /// Requested publishing interval. Revised up to the server floor.
    pub publishing_interval: Duration,
    /// Requested lifetime count, in publishing intervals. Revised up to three
    /// times the revised keep-alive count.
    pub max_lifetime_count: u32,
    /// Requested keep-alive count, in publishing intervals. Zero selects the
    /// server default.
    pub max_keep_alive_count: u32,
    /// Requested cap on notifications per publish response. Zero selects the
    /// server limit.
    pub max_notifications_per_publish: usize,
    /// Relative priority of the subscription.
    pub priority: u8,
    /// Whether publishing starts enabled.
    pub publishing_enabled: bool,
}

impl Default for SubscriptionCreateParams {
    fn default() -> Self {
        SubscriptionCreateParams {
            publishing_interval: Duration::from_millis(1000),
            max_lifetime_count: 0,
            max_keep_alive_count: 0,
            max_notifications_per_publish: 0,
            priority: 0,
            publishing_enabled: true,
        }
    }
}

/// A server-side subscription. The publish engine schedules it through the
/// [`PublishSubscription`] trait; monitored item sampling feeds it through
/// [`Subscription::notify_data_change`] and [`Subscription::notify_events`].
#[derive(Debug)]
pub struct Subscription {
    subscription_id: u32,
    priority: u8,
    publishing_enabled: bool,
    state: SubscriptionState,
    /// True once a notification or keep-alive has been sent on the
    /// subscription. Ensures something goes out the first time the publishing
    /// timer expires.
    message_sent: bool,
    /// Send the latest value of every monitored item on the next sample pass,
    /// whether it changed or not.
    resend_data: bool,
    publish_engine: Option<PublishEngineId>,
    timer: SubscriptionTimer,
    retained: NotificationRing,
    max_notifications_per_publish: usize,
    max_queued_notifications: usize,
    queued_data_changes: VecDeque<MonitoredItemNotification>,
    queued_events: VecDeque<EventFieldList>,
    has_monitored_item_notifications: bool,
    monitored_item_count: usize,
    /// Set when queued or retained notifications had to be dropped; the next
    /// emitted message reports it as a status change.
    notifications_lost: bool,
}

impl Subscription {
    /// Create a subscription, revising the requested parameters against the
    /// server limits.
    pub fn new(
        subscription_id: u32,
        params: SubscriptionCreateParams,
        limits: &PublishLimits,
    ) -> Subscription {
        let publishing_interval = params
            .publishing_interval
            .max(Duration::from_millis(limits.min_publishing_interval_ms));
        let max_keep_alive_count = if params.max_keep_alive_count == 0 {
            limits.default_keep_alive_count
        } else {
            params.max_keep_alive_count.min(limits.max_keep_alive_count)
        };
        let max_lifetime_count = params.max_lifetime_count.max(3 * max_keep_alive_count);
        let max_notifications_per_publish = if params.max_notifications_per_publish == 0 {
            limits.max_notifications_per_publish
        } else {
            params
                .max_notifications_per_publish
                .min(limits.max_notifications_per_publish)
        };
        debug!(
            "Creating subscription {} with publishing interval {:?}, keep alive {}, lifetime {}",
            subscription_id, publishing_interval, max_keep_alive_count, max_lifetime_count
        );
        Subscription {
            subscription_id,
            priority: params.priority,
            publishing_enabled: params.publishing_enabled,
            state: SubscriptionState::Creating,
            message_sent: false,
            resend_data: false,
            publish_engine: None,
            timer: SubscriptionTimer::new(
                publishing_interval,
                max_lifetime_count,
                max_keep_alive_count,
            ),
            retained: NotificationRing::new(
                limits
                    .max_notifications_per_publish
                    .saturating_mul(limits.max_republish_depth),
            ),
            max_notifications_per_publish,
            max_queued_notifications: limits.max_queued_notifications,
            queued_data_changes: VecDeque::new(),
            queued_events: VecDeque::new(),
            has_monitored_item_notifications: false,
            monitored_item_count: 0,
            notifications_lost: false,
        }
    }

    /// The revised publishing interval.
    pub fn publishing_interval(&self) -> Duration {
        self.timer.publishing_interval()
    }

    /// True if the producer side has notifications queued for sending.
    pub fn has_monitored_item_notifications(&self) -> bool {
        self.has_monitored_item_notifications
    }

    /// Enable or disable publishing. Counts as client activity.
    pub fn set_publishing_enabled(&mut self, publishing_enabled: bool) {
        self.publishing_enabled = publishing_enabled;
        self.timer.reset_lifetime_counter();
    }

    /// Record the number of monitored items currently owned by the
    /// subscription. Item management lives outside this crate.
    pub fn set_monitored_item_count(&mut self, count: usize) {
        self.monitored_item_count = count;
    }

    /// Queue sampled data change notifications for the next publish.
    pub fn notify_data_change(
        &mut self,
        notifications: impl IntoIterator<Item = MonitoredItemNotification>,
    ) {
        self.queued_data_changes.extend(notifications);
        self.enforce_queue_bound();
        self.update_notifications_cache();
    }

    /// Queue sampled event notifications for the next publish.
    pub fn notify_events(&mut self, events: impl IntoIterator<Item = EventFieldList>) {
        self.queued_events.extend(events);
        self.enforce_queue_bound();
        self.update_notifications_cache();
    }

    /// True if a resend of current values was requested since the last call;
    /// reading clears the flag. Polled by the sampler.
    pub fn take_resend_data(&mut self) -> bool {
        std::mem::take(&mut self.resend_data)
    }

    fn enforce_queue_bound(&mut self) {
        let mut dropped = 0usize;
        while self.queued_data_changes.len() + self.queued_events.len()
            > self.max_queued_notifications
        {
            if self.queued_data_changes.len() >= self.queued_events.len() {
                self.queued_data_changes.pop_front();
            } else {
                self.queued_events.pop_front();
            }
            dropped += 1;
        }
        if dropped > 0 {
            self.notifications_lost = true;
            warn!(
                "Subscription {} dropped {} queued notifications, the client is not keeping up",
                self.subscription_id, dropped
            );
        }
    }

    fn update_notifications_cache(&mut self) {
        self.has_monitored_item_notifications =
            !self.queued_data_changes.is_empty() || !self.queued_events.is_empty();
    }

    fn queued_notification_count(&self) -> usize {
        self.queued_data_changes.len() + self.queued_events.len()
    }

    /// Drain one batch of queued notifications into a message, stamp it with
    /// the next sequence number and retain it for republishing.
    fn build_notification_message(&mut self, now: DateTime) -> SubscriptionEmission {
        let max_notifications = self.max_notifications_per_publish.max(1);
        let mut data_changes = Vec::new();
        while data_changes.len() < max_notifications {
            match self.queued_data_changes.pop_front() {
                Some(notification) => data_changes.push(notification),
                None => break,
            }
        }
        let mut events = Vec::new();
        while data_changes.len() + events.len() < max_notifications {
            match self.queued_events.pop_front() {
                Some(event) => events.push(event),
                None => break,
            }
        }
        self.update_notifications_cache();

        let mut message = NotificationMessage::data_change(0, now, data_changes, events);
        if std::mem::take(&mut self.notifications_lost) | self.retained.take_overflow() {
            message.push_status_change(StatusCode::BadOutOfMemory);
        }
        let (sequence_number, message) = self.retained.assign_and_store(message);
        debug!(
            "Subscription {} produced notification message {}",
            self.subscription_id, sequence_number
        );
        SubscriptionEmission {
            message,
            more_notifications: self.has_monitored_item_notifications,
        }
    }

    /// Evaluate the state table in OPC UA Part 4 5.13.1.2.
    ///
    /// Some rows of the table are handled outside of this function: creation
    /// failure (state 2) never reaches the engine, and deletion and transfer
    /// are engine operations.
    pub fn update_state(
        &mut self,
        tick_reason: TickReason,
        p: SubscriptionStateParams,
    ) -> UpdateStateResult {
        // A publish request cannot arrive at the same evaluation as a timer
        // expiry; the engine passes one reason at a time.
        debug_assert!(
            !(tick_reason == TickReason::ReceivedPublishRequest && p.publishing_interval_elapsed)
        );

        trace!(
            "subscription {} state inputs: state {:?}, reason {:?}, params {:?}, enabled {}, keep alive {}, lifetime {}, message sent {}",
            self.subscription_id,
            self.state,
            tick_reason,
            p,
            self.publishing_enabled,
            self.timer.time_to_keep_alive(),
            self.timer.time_to_expiration(),
            self.message_sent
        );

        match self.state {
            SubscriptionState::Closed => {
                // State #1
                return UpdateStateResult::new(HandledState::Closed1, UpdateStateAction::None);
            }
            SubscriptionState::Creating => {
                // State #3: the subscription becomes Normal on its first tick
                // and that tick is evaluated against the Normal rows.
                self.state = SubscriptionState::Normal;
                self.message_sent = false;
                let result = self.update_state(tick_reason, p);
                return UpdateStateResult::new(HandledState::Create3, result.update_state_action);
            }
            SubscriptionState::Normal => {
                if tick_reason == TickReason::ReceivedPublishRequest {
                    if self.publishing_enabled && p.more_notifications {
                        // State #5
                        self.timer.reset_lifetime_counter();
                        self.message_sent = true;
                        return UpdateStateResult::new(
                            HandledState::Normal5,
                            UpdateStateAction::ReturnNotifications,
                        );
                    }
                    // State #4
                    return UpdateStateResult::new(HandledState::Normal4, UpdateStateAction::None);
                } else if p.publishing_interval_elapsed {
                    if p.publishing_req_queued
                        && self.publishing_enabled
                        && p.notifications_available
                    {
                        // State #6
                        self.timer.reset_lifetime_counter();
                        self.timer.start_publishing_timer();
                        self.message_sent = true;
                        return UpdateStateResult::new(
                            HandledState::IntervalElapsed6,
                            UpdateStateAction::ReturnNotifications,
                        );
                    } else if p.publishing_req_queued
                        && !self.message_sent
                        && (!self.publishing_enabled || !p.notifications_available)
                    {
                        // State #7
                        self.timer.reset_lifetime_counter();
                        self.timer.start_publishing_timer();
                        self.message_sent = true;
                        return UpdateStateResult::new(
                            HandledState::IntervalElapsed7,
                            UpdateStateAction::ReturnKeepAlive,
                        );
                    } else if !p.publishing_req_queued
                        && (!self.message_sent
                            || (self.publishing_enabled && p.notifications_available))
                    {
                        // State #8
                        self.timer.start_publishing_timer();
                        self.state = SubscriptionState::Late;
                        return UpdateStateResult::new(
                            HandledState::IntervalElapsed8,
                            UpdateStateAction::None,
                        );
                    } else if self.message_sent
                        && (!self.publishing_enabled || !p.notifications_available)
                    {
                        // State #9
                        self.timer.start_publishing_timer();
                        self.timer.reset_keep_alive_counter();
                        self.state = SubscriptionState::KeepAlive;
                        return UpdateStateResult::new(
                            HandledState::IntervalElapsed9,
                            UpdateStateAction::None,
                        );
                    }
                }
            }
            SubscriptionState::Late => {
                if tick_reason == TickReason::ReceivedPublishRequest {
                    if self.publishing_enabled
                        && (p.notifications_available || p.more_notifications)
                    {
                        // State #10
                        self.timer.reset_lifetime_counter();
                        self.state = SubscriptionState::Normal;
                        self.message_sent = true;
                        return UpdateStateResult::new(
                            HandledState::Late10,
                            UpdateStateAction::ReturnNotifications,
                        );
                    }
                    // State #11
                    self.timer.reset_lifetime_counter();
                    self.state = SubscriptionState::KeepAlive;
                    self.message_sent = true;
                    return UpdateStateResult::new(
                        HandledState::Late11,
                        UpdateStateAction::ReturnKeepAlive,
                    );
                } else if p.publishing_interval_elapsed {
                    // State #12
                    self.timer.start_publishing_timer();
                    return UpdateStateResult::new(HandledState::Late12, UpdateStateAction::None);
                }
            }
            SubscriptionState::KeepAlive => {
                if tick_reason == TickReason::ReceivedPublishRequest {
                    // State #13
                    return UpdateStateResult::new(
                        HandledState::KeepAlive13,
                        UpdateStateAction::None,
                    );
                } else if p.publishing_interval_elapsed {
                    if self.publishing_enabled
                        && p.notifications_available
                        && p.publishing_req_queued
                    {
                        // State #14
                        self.message_sent = true;
                        self.state = SubscriptionState::Normal;
                        return UpdateStateResult::new(
                            HandledState::KeepAlive14,
                            UpdateStateAction::ReturnNotifications,
                        );
                    } else if p.publishing_req_queued
                        && self.timer.time_to_keep_alive() == 1
                        && (!self.publishing_enabled || !p.notifications_available)
                    {
                        // State #15
                        self.timer.start_publishing_timer();
                        self.timer.reset_keep_alive_counter();
                        return UpdateStateResult::new(
                            HandledState::KeepAlive15,
                            UpdateStateAction::ReturnKeepAlive,
                        );
                    } else if self.timer.time_to_keep_alive() > 1
                        && (!self.publishing_enabled || !p.notifications_available)
                    {
                        // State #16
                        self.timer.start_publishing_timer();
                        self.timer.decrement_keep_alive_counter();
                        return UpdateStateResult::new(
                            HandledState::KeepAlive16,
                            UpdateStateAction::None,
                        );
                    } else if !p.publishing_req_queued
                        && (self.timer.time_to_keep_alive() == 1
                            || (self.publishing_enabled && p.notifications_available))
                    {
                        // State #17
                        self.timer.start_publishing_timer();
                        self.state = SubscriptionState::Late;
                        return UpdateStateResult::new(
                            HandledState::KeepAlive17,
                            UpdateStateAction::None,
                        );
                    }
                }
            }
        }

        UpdateStateResult::new(HandledState::None0, UpdateStateAction::None)
    }
}

impl PublishSubscription for Subscription {
    fn id(&self) -> u32 {
        self.subscription_id
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn state(&self) -> SubscriptionState {
        self.state
    }

    fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }

    fn message_sent(&self) -> bool {
        self.message_sent
    }

    fn time_to_expiration(&self) -> u32 {
        self.timer.time_to_expiration()
    }

    fn time_to_keep_alive(&self) -> u32 {
        self.timer.time_to_keep_alive()
    }

    fn has_pending_notifications(&self) -> bool {
        !self.retained.is_empty() || self.has_monitored_item_notifications
    }

    fn monitored_item_count(&self) -> usize {
        self.monitored_item_count
    }

    fn publish_engine(&self) -> Option<PublishEngineId> {
        self.publish_engine
    }

    fn set_publish_engine(&mut self, engine: Option<PublishEngineId>) {
        self.publish_engine = engine;
    }

    fn process_subscription(
        &mut self,
        now: DateTime,
        now_instant: Instant,
        tick_reason: TickReason,
        publishing_req_queued: bool,
    ) -> Option<SubscriptionEmission> {
        if self.state == SubscriptionState::Closed {
            return None;
        }

        // The publishing interval only advances on the timer cadence, never
        // on request arrival. A creating subscription fires immediately.
        let publishing_interval_elapsed = match tick_reason {
            TickReason::ReceivedPublishRequest => false,
            TickReason::TickTimerFired => {
                self.state == SubscriptionState::Creating || self.timer.interval_elapsed(now_instant)
            }
        };

        let notifications_available = self.has_monitored_item_notifications;
        let more_notifications = self.queued_notification_count() > self.max_notifications_per_publish;

        if !(notifications_available || publishing_interval_elapsed || publishing_req_queued) {
            return None;
        }

        let update = self.update_state(
            tick_reason,
            SubscriptionStateParams {
                notifications_available,
                more_notifications,
                publishing_req_queued,
                publishing_interval_elapsed,
            },
        );
        trace!(
            "subscription {} tick handled by {:?}",
            self.subscription_id,
            update.handled_state
        );

        let emission = match update.update_state_action {
            UpdateStateAction::None => None,
            UpdateStateAction::ReturnKeepAlive => {
                debug!("Subscription {} sending keep alive", self.subscription_id);
                Some(SubscriptionEmission {
                    message: NotificationMessage::keep_alive(
                        self.retained.next_sequence_number(),
                        now,
                    ),
                    more_notifications: false,
                })
            }
            UpdateStateAction::ReturnNotifications => Some(self.build_notification_message(now)),
        };

        if self.timer.is_expired() {
            warn!(
                "Subscription {} lifetime expired and will be removed",
                self.subscription_id
            );
            self.state = SubscriptionState::Closed;
            let sequence_number = self.retained.assign_sequence_number();
            return Some(SubscriptionEmission {
                message: NotificationMessage::status_change(
                    sequence_number,
                    now,
                    StatusCode::BadTimeout,
                ),
                more_notifications: false,
            });
        }

        emission
    }

    fn acknowledge_notification(&mut self, sequence_number: u32) -> StatusCode {
        let result = self.retained.ack(sequence_number);
        trace!(
            "Subscription {} acknowledge {} = {}",
            self.subscription_id,
            sequence_number,
            result
        );
        result
    }

    fn available_sequence_numbers(&self) -> Vec<u32> {
        self.retained.available()
    }

    fn pop_retained_notification(&mut self) -> Option<NotificationMessage> {
        self.retained.take_oldest()
    }

    fn republish(
        &mut self,
        retransmit_sequence_number: u32,
    ) -> Result<NotificationMessage, StatusCode> {
        self.retained
            .find(retransmit_sequence_number)
            .map(|message| {
                // A successful republish counts as client activity.
                self.timer.reset_lifetime_counter();
                message
            })
            .ok_or(StatusCode::BadMessageNotAvailable)
    }

    fn reset_lifetime_counter(&mut self) {
        self.timer.reset_lifetime_counter();
    }

    fn resend_initial_values(&mut self) {
        self.resend_data = true;
    }

    fn notify_transfer(&mut self, now: DateTime) -> NotificationMessage {
        debug!(
            "Subscription {} transferred away from its session",
            self.subscription_id
        );
        let sequence_number = self.retained.assign_sequence_number();
        NotificationMessage::status_change(
            sequence_number,
            now,
            StatusCode::GoodSubscriptionTransferred,
        )
    }
}
