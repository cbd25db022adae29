// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! The publish engine: multiplexes the publish requests of one session
//! against the subscriptions attached to it, pairing requests with the
//! notification messages subscriptions produce.

use std::cmp::Reverse;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use log::{debug, info, warn};
use opcua_publish_types::{
    DateTime, NotificationMessage, PublishRequest, PublishResponse, RepublishRequest,
    RepublishResponse, ResponseHeader, StatusCode,
};

use crate::config::PublishLimits;

use super::publish_queue::{PendingPublish, PublishQueue, PublishResponseSender};
use super::subscription::Subscription;
use super::{PublishEngineId, PublishSubscription, SubscriptionState, TickReason};

/// Multiplexes pending publish requests against the subscriptions of one
/// session.
///
/// Requests and notifications arrive independently of each other, so at any
/// instant at most one of the two queues is non-empty: a waiting request is
/// answered the moment a notification is produced, and a notification
/// produced with no request waiting is stashed until the next request
/// arrives.
///
/// The engine is single-threaded; every operation runs to completion on the
/// caller's execution context and delivery callbacks fire synchronously from
/// within the operation that completes them.
#[derive(Debug)]
pub struct PublishEngine<S = Subscription> {
    engine_id: PublishEngineId,
    limits: PublishLimits,
    /// Subscriptions attached to this engine, by subscription id.
    subscriptions: HashMap<u32, S>,
    /// Publish requests waiting for something to deliver.
    publish_queue: PublishQueue,
    /// Responses produced with no request available to carry them.
    pending_responses: VecDeque<PublishResponse>,
    /// Deleted subscriptions still holding retained messages, drained by
    /// future publish requests.
    closed_subscriptions: VecDeque<S>,
    is_session_closed: bool,
}

impl<S: PublishSubscription> PublishEngine<S> {
    /// Create an engine with the given limits.
    pub fn new(limits: PublishLimits) -> PublishEngine<S> {
        PublishEngine {
            engine_id: PublishEngineId::next(),
            limits,
            subscriptions: HashMap::new(),
            publish_queue: PublishQueue::new(),
            pending_responses: VecDeque::new(),
            closed_subscriptions: VecDeque::new(),
            is_session_closed: false,
        }
    }

    /// The process-unique id of this engine.
    pub fn engine_id(&self) -> PublishEngineId {
        self.engine_id
    }

    /// Number of subscriptions attached.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Number of publish requests waiting to be answered.
    pub fn pending_publish_request_count(&self) -> usize {
        self.publish_queue.len()
    }

    /// Number of stashed responses waiting for a publish request.
    pub fn pending_publish_response_count(&self) -> usize {
        self.pending_responses.len()
    }

    /// True once the session owning this engine closed.
    pub fn is_session_closed(&self) -> bool {
        self.is_session_closed
    }

    /// A subscription attached to this engine.
    pub fn subscription(&self, subscription_id: u32) -> Option<&S> {
        self.subscriptions.get(&subscription_id)
    }

    /// Mutable access to a subscription, for the sampler that feeds it.
    pub fn subscription_mut(&mut self, subscription_id: u32) -> Option<&mut S> {
        self.subscriptions.get_mut(&subscription_id)
    }

    /// Attach a subscription to this engine. The subscription must not be
    /// attached anywhere else.
    pub fn add_subscription(&mut self, mut subscription: S) {
        assert!(
            subscription.publish_engine().is_none(),
            "subscription {} is already attached to an engine",
            subscription.id()
        );
        subscription.set_publish_engine(Some(self.engine_id));
        debug!(
            "Adding subscription {} to {}",
            subscription.id(),
            self.engine_id
        );
        self.subscriptions.insert(subscription.id(), subscription);
    }

    /// Detach a subscription, clearing its back-reference. The subscription
    /// must be attached to this engine.
    pub fn detach_subscription(&mut self, subscription_id: u32) -> S {
        let mut subscription = self
            .subscriptions
            .remove(&subscription_id)
            .unwrap_or_else(|| {
                panic!("subscription {subscription_id} is not attached to this engine")
            });
        assert_eq!(
            subscription.publish_engine(),
            Some(self.engine_id),
            "subscription {subscription_id} is owned by another engine"
        );
        subscription.set_publish_engine(None);
        subscription
    }

    /// Handle a publish request. The `sender` is always consumed: every
    /// request is answered exactly once, with a notification message or a
    /// status-only response.
    pub fn on_publish_request(
        &mut self,
        now: DateTime,
        now_instant: Instant,
        request: PublishRequest,
        sender: PublishResponseSender,
    ) {
        // Acknowledgements apply before the response for this request is
        // constructed, so `available_sequence_numbers` reflects them.
        let ack_results = self.process_subscription_acknowledgements(&request);
        let mut record = PendingPublish {
            request: Box::new(request),
            response: sender,
            ack_results,
            received_at: now_instant,
            deadline: None,
        };

        // A response produced earlier with no request to carry it is handed
        // to the first request that arrives.
        if let Some(response) = self.pending_responses.pop_front() {
            debug!("Answering publish request from a stashed response");
            Self::deliver(record, response);
            return;
        }

        if self.is_session_closed {
            Self::reply_service_result(record, StatusCode::BadSessionClosed);
            return;
        }

        if self.subscriptions.is_empty() {
            if self.closed_head_has_notifications() {
                // A deleted subscription still owes the client notifications;
                // this request collects the oldest one immediately.
                debug_assert!(self.publish_queue.is_empty());
                self.publish_queue.enqueue(record);
                self.feed_closed_subscription();
            } else {
                Self::reply_service_result(record, StatusCode::BadNoSubscription);
            }
            return;
        }

        let timeout_hint = record.request.request_header.timeout_hint;
        if timeout_hint > 0 {
            record.deadline = Some(now_instant + Duration::from_millis(u64::from(timeout_hint)));
        }
        self.publish_queue.enqueue(record);

        self.feed_late_subscription(now, now_instant);
        self.feed_closed_subscription();

        // Admission control runs last so that a request consumed by the feed
        // steps above does not force an eviction.
        if let Some(evicted) = self
            .publish_queue
            .evict_over_capacity(self.limits.max_publish_request_in_queue)
        {
            warn!(
                "Too many publish requests, rejecting the oldest (handle {})",
                evicted.request.request_header.request_handle
            );
            Self::reply_service_result(evicted, StatusCode::BadTooManyPublishRequests);
        }
    }

    /// Deliver a notification message for a subscription: paired with the
    /// oldest waiting request when one exists, stashed otherwise.
    ///
    /// Requires a pending publish request unless `force` is set. Returns
    /// true if the message was paired with a request.
    pub fn send_notification_message(
        &mut self,
        subscription_id: u32,
        message: NotificationMessage,
        available_sequence_numbers: Option<Vec<u32>>,
        more_notifications: bool,
        force: bool,
    ) -> bool {
        debug_assert!(force || !self.publish_queue.is_empty());
        let response = PublishResponse {
            response_header: ResponseHeader::new_good(0u32),
            subscription_id,
            available_sequence_numbers,
            more_notifications,
            notification_message: message,
            results: None,
        };
        match self.publish_queue.dequeue() {
            Some(record) => {
                Self::deliver(record, response);
                true
            }
            None => {
                // Only reachable under `force`; the stash is emptied before
                // the request queue can grow again.
                self.pending_responses.push_back(response);
                false
            }
        }
    }

    /// Answer the oldest waiting request with a keep-alive carrying the
    /// sequence number of the next real message. Returns false when no
    /// request is waiting; nothing is sent then and the subscription must
    /// stay in keep-alive.
    pub fn send_keep_alive_response(
        &mut self,
        subscription_id: u32,
        next_sequence_number: u32,
        now: DateTime,
    ) -> bool {
        if self.publish_queue.is_empty() {
            return false;
        }
        let available = self
            .subscriptions
            .get(&subscription_id)
            .map(|s| s.available_sequence_numbers());
        self.send_notification_message(
            subscription_id,
            NotificationMessage::keep_alive(next_sequence_number, now),
            available,
            false,
            false,
        )
    }

    /// Purge timed-out publish requests, then give every subscription a
    /// publishing-timer tick, delivering whatever they produce.
    pub fn tick(&mut self, now: DateTime, now_instant: Instant) {
        for record in self.publish_queue.purge_timed_out(now_instant) {
            debug!(
                "Publish request (handle {}) timed out",
                record.request.request_header.request_handle
            );
            Self::reply_service_result(record, StatusCode::BadTimeout);
        }

        // Highest priority first; equal priorities most-endangered first.
        let mut order: Vec<_> = self
            .subscriptions
            .values()
            .map(|s| (Reverse(s.priority()), s.time_to_expiration(), s.id()))
            .collect();
        order.sort_unstable();
        for (_, _, subscription_id) in order {
            self.process_one_subscription(
                subscription_id,
                now,
                now_instant,
                TickReason::TickTimerFired,
            );
        }
    }

    /// Remove a subscription from the engine. Retained messages it still
    /// holds stay reachable through the closed-drain list until delivered.
    pub fn on_close_subscription(&mut self, subscription_id: u32) {
        let mut subscription = self
            .subscriptions
            .remove(&subscription_id)
            .unwrap_or_else(|| {
                panic!("subscription {subscription_id} is not attached to this engine")
            });
        subscription.set_publish_engine(None);
        if !subscription.available_sequence_numbers().is_empty() {
            debug!(
                "Subscription {} closed with retained messages, parking it for draining",
                subscription_id
            );
            self.closed_subscriptions.push_back(subscription);
        }

        if self.subscriptions.is_empty() {
            while !self.publish_queue.is_empty() && self.closed_head_has_notifications() {
                self.feed_closed_subscription();
            }
            for record in self.publish_queue.drain_all() {
                Self::reply_service_result(record, StatusCode::BadNoSubscription);
            }
        }
    }

    /// The session closed: fail every pending request and refuse new ones.
    pub fn on_session_close(&mut self) {
        info!("{}: session closed", self.engine_id);
        self.is_session_closed = true;
        for record in self.publish_queue.drain_all() {
            Self::reply_service_result(record, StatusCode::BadSessionClosed);
        }
    }

    /// The secure channel is being replaced under the same session: pending
    /// requests die with the old channel, the subscriptions survive.
    pub fn cancel_pending_publish_request_before_channel_change(&mut self) {
        info!("{}: channel changing, cancelling pending requests", self.engine_id);
        for record in self.publish_queue.drain_all() {
            Self::reply_service_result(record, StatusCode::BadSecureChannelClosed);
        }
    }

    /// Discard all queues. The caller must have detached or closed every
    /// subscription and drained outstanding requests first.
    pub fn shutdown(&mut self) {
        assert!(
            self.subscriptions.is_empty(),
            "{} shut down with subscriptions still attached",
            self.engine_id
        );
        self.publish_queue.clear();
        self.pending_responses.clear();
        self.closed_subscriptions.clear();
    }

    /// Serve a republish request from the retransmission ring of the
    /// subscription.
    pub fn republish(
        &mut self,
        subscription_id: u32,
        retransmit_sequence_number: u32,
    ) -> Result<NotificationMessage, StatusCode> {
        let Some(subscription) = self.subscriptions.get_mut(&subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        subscription.republish(retransmit_sequence_number)
    }

    /// Handle a decoded republish request, producing the response.
    pub fn on_republish_request(&mut self, request: &RepublishRequest) -> RepublishResponse {
        match self.republish(request.subscription_id, request.retransmit_sequence_number) {
            Ok(notification_message) => RepublishResponse {
                response_header: ResponseHeader::new_good(&request.request_header),
                notification_message,
            },
            Err(status) => RepublishResponse {
                response_header: ResponseHeader::new_service_result(
                    &request.request_header,
                    status,
                ),
                notification_message: NotificationMessage::default(),
            },
        }
    }

    /// Move a subscription to another engine, preserving retained messages
    /// and sequence continuity. The source session learns of the transfer
    /// through a status change on its next publish response.
    pub fn transfer(
        &mut self,
        subscription_id: u32,
        dest: &mut PublishEngine<S>,
        send_initial_values: bool,
        now: DateTime,
    ) {
        assert_ne!(
            self.engine_id, dest.engine_id,
            "cannot transfer a subscription to its own engine"
        );
        let (message, available) = {
            let subscription = self
                .subscriptions
                .get_mut(&subscription_id)
                .unwrap_or_else(|| {
                    panic!("subscription {subscription_id} is not attached to this engine")
                });
            (
                subscription.notify_transfer(now),
                subscription.available_sequence_numbers(),
            )
        };
        self.send_notification_message(subscription_id, message, Some(available), false, true);

        let subscription = self.detach_subscription(subscription_id);
        dest.add_subscription(subscription);
        let subscription = dest
            .subscriptions
            .get_mut(&subscription_id)
            .expect("just attached");
        subscription.reset_lifetime_counter();
        if send_initial_values {
            subscription.resend_initial_values();
        }
        info!(
            "Transferred subscription {} from {} to {}",
            subscription_id, self.engine_id, dest.engine_id
        );
    }

    /// Transfer every subscription to `dest`, in creation order.
    pub fn transfer_all(
        &mut self,
        dest: &mut PublishEngine<S>,
        send_initial_values: bool,
        now: DateTime,
    ) {
        // Ids are allocated from a monotonic counter, so ascending id order
        // is creation order.
        let mut ids: Vec<u32> = self.subscriptions.keys().copied().collect();
        ids.sort_unstable();
        for subscription_id in ids {
            self.transfer(subscription_id, dest, send_initial_values, now);
        }
        debug_assert!(self.subscriptions.is_empty());
    }

    fn process_subscription_acknowledgements(
        &mut self,
        request: &PublishRequest,
    ) -> Option<Vec<StatusCode>> {
        let acknowledgements = request.subscription_acknowledgements.as_ref()?;
        let results = acknowledgements
            .iter()
            .map(|ack| {
                if let Some(subscription) = self.subscriptions.get_mut(&ack.subscription_id) {
                    subscription.acknowledge_notification(ack.sequence_number)
                } else if let Some(subscription) = self
                    .closed_subscriptions
                    .iter_mut()
                    .find(|s| s.id() == ack.subscription_id)
                {
                    // The client may still acknowledge messages of a
                    // subscription it deleted while they drain.
                    subscription.acknowledge_notification(ack.sequence_number)
                } else {
                    StatusCode::BadSubscriptionIdInvalid
                }
            })
            .collect();
        Some(results)
    }

    /// Serve the most deserving late subscription with the request that just
    /// arrived: first-publish candidates by remaining lifetime, then enabled
    /// late subscriptions by priority and urgency.
    fn feed_late_subscription(&mut self, now: DateTime, now_instant: Instant) {
        if self.publish_queue.is_empty() {
            return;
        }
        let candidate = self
            .subscriptions
            .values()
            .filter(|s| !s.message_sent() && s.state() == SubscriptionState::Late)
            .min_by_key(|s| (s.time_to_expiration(), s.id()))
            .map(|s| s.id())
            .or_else(|| {
                self.subscriptions
                    .values()
                    .filter(|s| s.state() == SubscriptionState::Late && s.publishing_enabled())
                    .min_by_key(|s| (Reverse(s.priority()), s.time_to_expiration(), s.id()))
                    .map(|s| s.id())
            });
        if let Some(subscription_id) = candidate {
            self.process_one_subscription(
                subscription_id,
                now,
                now_instant,
                TickReason::ReceivedPublishRequest,
            );
        }
    }

    /// Deliver the oldest retained message of the closed-drain head to the
    /// oldest waiting request. Fully drained subscriptions are discarded.
    fn feed_closed_subscription(&mut self) {
        if self.publish_queue.is_empty() {
            return;
        }
        loop {
            let Some(head) = self.closed_subscriptions.front_mut() else {
                return;
            };
            let Some(message) = head.pop_retained_notification() else {
                self.closed_subscriptions.pop_front();
                continue;
            };
            let subscription_id = head.id();
            let available = head.available_sequence_numbers();
            let more_notifications = !available.is_empty();
            if !more_notifications {
                self.closed_subscriptions.pop_front();
            }
            debug!(
                "Draining retained message {} of closed subscription {}",
                message.sequence_number, subscription_id
            );
            self.send_notification_message(
                subscription_id,
                message,
                Some(available),
                more_notifications,
                false,
            );
            return;
        }
    }

    fn closed_head_has_notifications(&self) -> bool {
        self.closed_subscriptions
            .front()
            .is_some_and(|s| !s.available_sequence_numbers().is_empty())
    }

    /// Run one subscription's state machine and deliver its emission. A
    /// subscription whose lifetime expired closes here.
    fn process_one_subscription(
        &mut self,
        subscription_id: u32,
        now: DateTime,
        now_instant: Instant,
        tick_reason: TickReason,
    ) {
        let publishing_req_queued = !self.publish_queue.is_empty();
        let Some(subscription) = self.subscriptions.get_mut(&subscription_id) else {
            return;
        };
        let emission =
            subscription.process_subscription(now, now_instant, tick_reason, publishing_req_queued);
        let state = subscription.state();
        let available = subscription.available_sequence_numbers();
        if let Some(emission) = emission {
            // An expiry status change goes out even with no request waiting.
            let force = state == SubscriptionState::Closed;
            self.send_notification_message(
                subscription_id,
                emission.message,
                Some(available),
                emission.more_notifications,
                force,
            );
        }
        if state == SubscriptionState::Closed {
            self.on_close_subscription(subscription_id);
        }
    }

    fn deliver(record: PendingPublish, mut response: PublishResponse) {
        response.response_header.request_handle = record.request.request_header.request_handle;
        response.results = record.ack_results;
        record.response.send(response);
    }

    fn reply_service_result(record: PendingPublish, service_result: StatusCode) {
        let mut response = PublishResponse::new_service_result(
            record.request.request_header.request_handle,
            service_result,
        );
        response.results = record.ack_results;
        record.response.send(response);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::{Duration, Instant};

    use opcua_publish_types::{
        DateTime, NotificationMessage, PublishRequest, RequestHeader, StatusCode,
        SubscriptionAcknowledgement,
    };

    use crate::config::PublishLimits;
    use crate::subscriptions::publish_queue::{PublishResponseReceiver, PublishResponseSender};
    use crate::subscriptions::{
        PublishEngineId, PublishSubscription, SubscriptionEmission, SubscriptionState, TickReason,
    };

    use super::PublishEngine;

    /// A scriptable stand-in for a subscription: emits pre-loaded messages
    /// and records the calls the engine makes.
    struct TestSubscription {
        id: u32,
        priority: u8,
        state: SubscriptionState,
        publishing_enabled: bool,
        message_sent: bool,
        time_to_expiration: u32,
        publish_engine: Option<PublishEngineId>,
        retained: Vec<NotificationMessage>,
        to_emit: VecDeque<NotificationMessage>,
        processed: usize,
        lifetime_resets: usize,
        initial_value_resends: usize,
    }

    impl TestSubscription {
        fn new(id: u32) -> TestSubscription {
            TestSubscription {
                id,
                priority: 0,
                state: SubscriptionState::Normal,
                publishing_enabled: true,
                message_sent: true,
                time_to_expiration: 100,
                publish_engine: None,
                retained: Vec::new(),
                to_emit: VecDeque::new(),
                processed: 0,
                lifetime_resets: 0,
                initial_value_resends: 0,
            }
        }

        fn late(mut self) -> TestSubscription {
            self.state = SubscriptionState::Late;
            self
        }

        fn with_retained(mut self, sequence_numbers: &[u32]) -> TestSubscription {
            self.retained = sequence_numbers
                .iter()
                .map(|&s| NotificationMessage::status_change(s, DateTime::now(), StatusCode::Good))
                .collect();
            self
        }

        fn with_emission(mut self, sequence_number: u32) -> TestSubscription {
            self.to_emit.push_back(NotificationMessage::status_change(
                sequence_number,
                DateTime::now(),
                StatusCode::Good,
            ));
            self
        }
    }

    impl PublishSubscription for TestSubscription {
        fn id(&self) -> u32 {
            self.id
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
            self.time_to_expiration
        }
        fn time_to_keep_alive(&self) -> u32 {
            0
        }
        fn has_pending_notifications(&self) -> bool {
            !self.retained.is_empty() || !self.to_emit.is_empty()
        }
        fn monitored_item_count(&self) -> usize {
            0
        }
        fn publish_engine(&self) -> Option<PublishEngineId> {
            self.publish_engine
        }
        fn set_publish_engine(&mut self, engine: Option<PublishEngineId>) {
            self.publish_engine = engine;
        }

        fn process_subscription(
            &mut self,
            _now: DateTime,
            _now_instant: Instant,
            _tick_reason: TickReason,
            publishing_req_queued: bool,
        ) -> Option<SubscriptionEmission> {
            self.processed += 1;
            if !publishing_req_queued {
                return None;
            }
            let message = self.to_emit.pop_front()?;
            self.retained.push(message.clone());
            self.state = SubscriptionState::Normal;
            self.message_sent = true;
            Some(SubscriptionEmission {
                more_notifications: !self.to_emit.is_empty(),
                message,
            })
        }

        fn acknowledge_notification(&mut self, sequence_number: u32) -> StatusCode {
            let before = self.retained.len();
            self.retained.retain(|m| m.sequence_number != sequence_number);
            if self.retained.len() < before {
                StatusCode::Good
            } else {
                StatusCode::BadSequenceNumberUnknown
            }
        }

        fn available_sequence_numbers(&self) -> Vec<u32> {
            self.retained.iter().map(|m| m.sequence_number).collect()
        }

        fn pop_retained_notification(&mut self) -> Option<NotificationMessage> {
            if self.retained.is_empty() {
                None
            } else {
                Some(self.retained.remove(0))
            }
        }

        fn republish(
            &mut self,
            retransmit_sequence_number: u32,
        ) -> Result<NotificationMessage, StatusCode> {
            self.retained
                .iter()
                .find(|m| m.sequence_number == retransmit_sequence_number)
                .cloned()
                .ok_or(StatusCode::BadMessageNotAvailable)
        }

        fn reset_lifetime_counter(&mut self) {
            self.lifetime_resets += 1;
        }

        fn resend_initial_values(&mut self) {
            self.initial_value_resends += 1;
        }

        fn notify_transfer(&mut self, now: DateTime) -> NotificationMessage {
            NotificationMessage::status_change(
                0,
                now,
                StatusCode::GoodSubscriptionTransferred,
            )
        }
    }

    fn engine_with_capacity(capacity: usize) -> PublishEngine<TestSubscription> {
        PublishEngine::new(PublishLimits {
            max_publish_request_in_queue: capacity,
            ..Default::default()
        })
    }

    fn engine() -> PublishEngine<TestSubscription> {
        engine_with_capacity(100)
    }

    fn publish(
        engine: &mut PublishEngine<TestSubscription>,
        request_handle: u32,
        timeout_hint: u32,
    ) -> PublishResponseReceiver {
        publish_with_acks(engine, request_handle, timeout_hint, None)
    }

    fn publish_with_acks(
        engine: &mut PublishEngine<TestSubscription>,
        request_handle: u32,
        timeout_hint: u32,
        acknowledgements: Option<Vec<SubscriptionAcknowledgement>>,
    ) -> PublishResponseReceiver {
        let (sender, receiver) = PublishResponseSender::channel();
        let request = PublishRequest {
            request_header: RequestHeader::new(request_handle, timeout_hint),
            subscription_acknowledgements: acknowledgements,
        };
        engine.on_publish_request(DateTime::now(), Instant::now(), request, sender);
        receiver
    }

    #[test]
    fn empty_engine_rejects_publish() {
        let mut engine = engine();
        let mut receiver = publish(&mut engine, 7, 0);
        let response = receiver.try_recv().unwrap();
        assert_eq!(response.response_header.request_handle, 7);
        assert_eq!(
            response.response_header.service_result,
            StatusCode::BadNoSubscription
        );
        assert_eq!(engine.pending_publish_request_count(), 0);
    }

    #[test]
    fn closed_session_rejects_publish() {
        let mut engine = engine();
        engine.add_subscription(TestSubscription::new(1));
        engine.on_session_close();
        let mut receiver = publish(&mut engine, 3, 0);
        let response = receiver.try_recv().unwrap();
        assert_eq!(
            response.response_header.service_result,
            StatusCode::BadSessionClosed
        );
        assert!(engine.is_session_closed());
    }

    #[test]
    fn session_close_cancels_pending_requests() {
        let mut engine = engine();
        engine.add_subscription(TestSubscription::new(1));
        let mut r1 = publish(&mut engine, 1, 0);
        let mut r2 = publish(&mut engine, 2, 0);
        engine.on_session_close();
        for receiver in [&mut r1, &mut r2] {
            let response = receiver.try_recv().unwrap();
            assert_eq!(
                response.response_header.service_result,
                StatusCode::BadSessionClosed
            );
        }
        assert_eq!(engine.pending_publish_request_count(), 0);
    }

    #[test]
    fn channel_change_cancels_but_session_survives() {
        let mut engine = engine();
        engine.add_subscription(TestSubscription::new(1).with_emission(1));
        let mut r1 = publish(&mut engine, 1, 0);
        engine.cancel_pending_publish_request_before_channel_change();
        let response = r1.try_recv().unwrap();
        assert_eq!(
            response.response_header.service_result,
            StatusCode::BadSecureChannelClosed
        );
        assert!(!engine.is_session_closed());

        // Requests on the new channel pair normally.
        let mut r2 = publish(&mut engine, 2, 0);
        engine.tick(DateTime::now(), Instant::now());
        let response = r2.try_recv().unwrap();
        assert_eq!(response.response_header.service_result, StatusCode::Good);
    }

    #[test]
    fn too_many_requests_evicts_the_oldest() {
        let mut engine = engine_with_capacity(2);
        engine.add_subscription(TestSubscription::new(1));
        let mut r1 = publish(&mut engine, 1, 0);
        let mut r2 = publish(&mut engine, 2, 0);
        let mut r3 = publish(&mut engine, 3, 0);

        let response = r1.try_recv().unwrap();
        assert_eq!(response.response_header.request_handle, 1);
        assert_eq!(
            response.response_header.service_result,
            StatusCode::BadTooManyPublishRequests
        );
        assert!(r2.try_recv().is_err());
        assert!(r3.try_recv().is_err());
        assert_eq!(engine.pending_publish_request_count(), 2);
    }

    #[test]
    fn tick_pairs_notification_with_oldest_request() {
        let mut engine = engine();
        engine.add_subscription(TestSubscription::new(1).with_emission(1));
        let mut r1 = publish(&mut engine, 41, 0);
        let mut r2 = publish(&mut engine, 42, 0);
        engine.tick(DateTime::now(), Instant::now());

        let response = r1.try_recv().unwrap();
        assert_eq!(response.response_header.request_handle, 41);
        assert_eq!(response.response_header.service_result, StatusCode::Good);
        assert_eq!(response.subscription_id, 1);
        assert_eq!(response.available_sequence_numbers, Some(vec![1]));
        assert_eq!(response.notification_message.sequence_number, 1);
        assert!(!response.more_notifications);

        // The second request stays queued for the next notification.
        assert!(r2.try_recv().is_err());
        assert_eq!(engine.pending_publish_request_count(), 1);
    }

    #[test]
    fn forced_notification_is_stashed_and_answers_next_request() {
        let mut engine = engine();
        engine.add_subscription(TestSubscription::new(1));
        let message = NotificationMessage::status_change(
            4,
            DateTime::now(),
            StatusCode::GoodSubscriptionTransferred,
        );
        let paired = engine.send_notification_message(1, message, Some(vec![]), false, true);
        assert!(!paired);
        assert_eq!(engine.pending_publish_response_count(), 1);
        assert_eq!(engine.pending_publish_request_count(), 0);

        let mut receiver = publish(&mut engine, 9, 0);
        let response = receiver.try_recv().unwrap();
        assert_eq!(response.response_header.request_handle, 9);
        assert_eq!(response.notification_message.sequence_number, 4);
        assert_eq!(engine.pending_publish_response_count(), 0);
    }

    #[test]
    fn acknowledgements_are_applied_before_responding() {
        let mut engine = engine();
        engine.add_subscription(
            TestSubscription::new(1)
                .late()
                .with_retained(&[1, 2])
                .with_emission(3),
        );
        let acks = vec![
            SubscriptionAcknowledgement {
                subscription_id: 1,
                sequence_number: 1,
            },
            SubscriptionAcknowledgement {
                subscription_id: 99,
                sequence_number: 1,
            },
        ];
        let mut receiver = publish_with_acks(&mut engine, 5, 0, Some(acks));
        let response = receiver.try_recv().unwrap();
        assert_eq!(
            response.results,
            Some(vec![StatusCode::Good, StatusCode::BadSubscriptionIdInvalid])
        );
        // Sequence number 1 was acknowledged before the response was built.
        assert_eq!(response.available_sequence_numbers, Some(vec![2, 3]));
        assert_eq!(response.notification_message.sequence_number, 3);
    }

    #[test]
    fn timed_out_request_gets_bad_timeout() {
        let mut engine = engine();
        engine.add_subscription(TestSubscription::new(1));
        let now = Instant::now();
        let (sender, mut receiver) = PublishResponseSender::channel();
        engine.on_publish_request(
            DateTime::now(),
            now,
            PublishRequest {
                request_header: RequestHeader::new(8, 1000),
                subscription_acknowledgements: None,
            },
            sender,
        );
        assert!(receiver.try_recv().is_err());

        engine.tick(DateTime::now(), now + Duration::from_millis(1500));
        let response = receiver.try_recv().unwrap();
        assert_eq!(response.response_header.request_handle, 8);
        assert_eq!(response.response_header.service_result, StatusCode::BadTimeout);
    }

    #[test]
    fn closed_subscription_drains_retained_messages() {
        let mut engine = engine();
        engine.add_subscription(TestSubscription::new(1).with_retained(&[4, 5]));
        engine.on_close_subscription(1);
        assert_eq!(engine.subscription_count(), 0);

        let mut r1 = publish(&mut engine, 1, 0);
        let response = r1.try_recv().unwrap();
        assert_eq!(response.notification_message.sequence_number, 4);
        assert_eq!(response.available_sequence_numbers, Some(vec![5]));
        assert!(response.more_notifications);

        let mut r2 = publish(&mut engine, 2, 0);
        let response = r2.try_recv().unwrap();
        assert_eq!(response.notification_message.sequence_number, 5);
        assert!(!response.more_notifications);

        let mut r3 = publish(&mut engine, 3, 0);
        let response = r3.try_recv().unwrap();
        assert_eq!(
            response.response_header.service_result,
            StatusCode::BadNoSubscription
        );
    }

    #[test]
    fn closing_last_subscription_cancels_what_cannot_be_drained() {
        let mut engine = engine();
        engine.add_subscription(TestSubscription::new(1).with_retained(&[2]));
        let mut r1 = publish(&mut engine, 1, 0);
        let mut r2 = publish(&mut engine, 2, 0);
        engine.on_close_subscription(1);

        // The first request collects the retained message, the second has
        // nothing left to wait for.
        let response = r1.try_recv().unwrap();
        assert_eq!(response.notification_message.sequence_number, 2);
        let response = r2.try_recv().unwrap();
        assert_eq!(
            response.response_header.service_result,
            StatusCode::BadNoSubscription
        );
    }

    #[test]
    fn feed_late_prefers_first_publish_then_priority() {
        let mut engine = engine();
        // Never-published subscription 2 beats the higher-priority 1.
        let mut first = TestSubscription::new(1).late().with_emission(10);
        first.priority = 200;
        let mut starved = TestSubscription::new(2).late().with_emission(20);
        starved.message_sent = false;
        starved.time_to_expiration = 3;
        engine.add_subscription(first);
        engine.add_subscription(starved);

        let mut receiver = publish(&mut engine, 1, 0);
        let response = receiver.try_recv().unwrap();
        assert_eq!(response.subscription_id, 2);

        // With both published, the higher priority wins.
        let mut receiver = publish(&mut engine, 2, 0);
        let response = receiver.try_recv().unwrap();
        assert_eq!(response.subscription_id, 1);
    }

    #[test]
    fn keep_alive_requires_a_waiting_request() {
        let mut engine = engine();
        engine.add_subscription(TestSubscription::new(1).with_retained(&[2]));
        assert!(!engine.send_keep_alive_response(1, 3, DateTime::now()));
        assert_eq!(engine.pending_publish_response_count(), 0);

        let mut receiver = publish(&mut engine, 6, 0);
        assert!(engine.send_keep_alive_response(1, 3, DateTime::now()));
        let response = receiver.try_recv().unwrap();
        assert!(response.notification_message.is_keep_alive());
        assert_eq!(response.notification_message.sequence_number, 3);
        assert_eq!(response.available_sequence_numbers, Some(vec![2]));
    }

    #[test]
    fn republish_serves_from_the_ring() {
        let mut engine = engine();
        engine.add_subscription(TestSubscription::new(1).with_retained(&[6, 7]));
        let message = engine.republish(1, 7).unwrap();
        assert_eq!(message.sequence_number, 7);
        assert_eq!(
            engine.republish(1, 9).unwrap_err(),
            StatusCode::BadMessageNotAvailable
        );
        assert_eq!(
            engine.republish(99, 1).unwrap_err(),
            StatusCode::BadSubscriptionIdInvalid
        );
    }

    #[test]
    fn transfer_moves_subscription_and_stashes_status_change() {
        let mut source: PublishEngine<TestSubscription> = engine();
        let mut dest: PublishEngine<TestSubscription> = engine();
        source.add_subscription(TestSubscription::new(1).with_retained(&[3]));

        source.transfer(1, &mut dest, true, DateTime::now());

        assert_eq!(source.subscription_count(), 0);
        assert_eq!(dest.subscription_count(), 1);
        let moved = dest.subscription(1).unwrap();
        assert_eq!(moved.publish_engine, Some(dest.engine_id()));
        assert_eq!(moved.lifetime_resets, 1);
        assert_eq!(moved.initial_value_resends, 1);

        // The source session learns of the transfer on its next publish.
        assert_eq!(source.pending_publish_response_count(), 1);
        let mut receiver = publish(&mut source, 11, 0);
        let response = receiver.try_recv().unwrap();
        assert_eq!(response.subscription_id, 1);
        assert_eq!(response.available_sequence_numbers, Some(vec![3]));
        assert_eq!(source.pending_publish_response_count(), 0);
    }

    #[test]
    fn transfer_all_empties_the_source() {
        let mut source: PublishEngine<TestSubscription> = engine();
        let mut dest: PublishEngine<TestSubscription> = engine();
        source.add_subscription(TestSubscription::new(1));
        source.add_subscription(TestSubscription::new(2));
        source.transfer_all(&mut dest, false, DateTime::now());
        assert_eq!(source.subscription_count(), 0);
        assert_eq!(dest.subscription_count(), 2);
        assert_eq!(dest.subscription(1).unwrap().initial_value_resends, 0);
    }

    #[test]
    #[should_panic(expected = "shut down with subscriptions still attached")]
    fn shutdown_requires_no_subscriptions() {
        let mut engine = engine();
        engine.add_subscription(TestSubscription::new(1));
        engine.shutdown();
    }

    #[test]
    #[should_panic(expected = "is not attached to this engine")]
    fn detach_requires_ownership() {
        let mut engine = engine();
        engine.detach_subscription(12);
    }

    #[test]
    #[should_panic(expected = "already attached to an engine")]
    fn double_attach_is_a_bug() {
        let mut e1: PublishEngine<TestSubscription> = engine();
        let mut e2: PublishEngine<TestSubscription> = engine();
        e1.add_subscription(TestSubscription::new(1));
        let subscription = e1.detach_subscription(1);
        e2.add_subscription(subscription);
        let mut stolen = e2.detach_subscription(1);
        stolen.set_publish_engine(Some(e1.engine_id()));
        e1.add_subscription(stolen);
    }
}
