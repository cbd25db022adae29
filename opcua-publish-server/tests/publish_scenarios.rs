// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! End-to-end tests of the publish engine with real subscriptions: pairing,
//! rejection, draining, timeouts and transfer, as a session front-end would
//! drive them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::time::timeout;

use opcua_publish_server::{
    next_subscription_id, PublishEngine, PublishLimits, PublishResponseReceiver,
    PublishResponseSender, PublishSubscription, Subscription, SubscriptionCreateParams,
};
use opcua_publish_types::{
    DataValue, DateTime, MonitoredItemNotification, NotificationData, PublishRequest,
    PublishResponse, RequestHeader, StatusCode, SubscriptionAcknowledgement,
};

fn engine() -> PublishEngine {
    PublishEngine::new(PublishLimits::default())
}

fn subscription(subscription_id: u32) -> Subscription {
    Subscription::new(
        subscription_id,
        SubscriptionCreateParams {
            publishing_interval: Duration::from_millis(100),
            max_keep_alive_count: 5,
            max_lifetime_count: 1000,
            priority: 0,
            publishing_enabled: true,
            ..Default::default()
        },
        &PublishLimits::default(),
    )
}

fn data_change(client_handle: u32, value: i32) -> MonitoredItemNotification {
    MonitoredItemNotification {
        client_handle,
        value: DataValue::new_now(value),
    }
}

fn publish(
    engine: &mut PublishEngine,
    request_handle: u32,
    timeout_hint: u32,
    now_instant: Instant,
) -> PublishResponseReceiver {
    publish_with_acks(engine, request_handle, timeout_hint, None, now_instant)
}

fn publish_with_acks(
    engine: &mut PublishEngine,
    request_handle: u32,
    timeout_hint: u32,
    acknowledgements: Option<Vec<SubscriptionAcknowledgement>>,
    now_instant: Instant,
) -> PublishResponseReceiver {
    let (sender, receiver) = PublishResponseSender::channel();
    engine.on_publish_request(
        DateTime::now(),
        now_instant,
        PublishRequest {
            request_header: RequestHeader::new(request_handle, timeout_hint),
            subscription_acknowledgements: acknowledgements,
        },
        sender,
    );
    receiver
}

/// One queue is always empty; a violation would mean a request sat waiting
/// while a response sat stashed.
fn assert_queues_consistent(engine: &PublishEngine) {
    assert!(
        engine.pending_publish_request_count() == 0
            || engine.pending_publish_response_count() == 0
    );
}

/// Produce `count` notification messages through the normal tick path,
/// returning the responses.
fn produce_messages(
    engine: &mut PublishEngine,
    subscription_id: u32,
    count: u32,
    start: Instant,
) -> Vec<PublishResponse> {
    let mut responses = Vec::new();
    let mut at = start;
    for i in 0..count {
        let mut receiver = publish(engine, 1000 + i, 0, at);
        engine
            .subscription_mut(subscription_id)
            .unwrap()
            .notify_data_change(vec![data_change(1, i as i32)]);
        engine.tick(DateTime::now(), at);
        responses.push(receiver.try_recv().expect("expected a paired response"));
        assert_queues_consistent(engine);
        at += Duration::from_millis(200);
    }
    responses
}

#[test]
fn notification_answers_waiting_request() {
    let mut engine = engine();
    let subscription_id = next_subscription_id();
    engine.add_subscription(subscription(subscription_id));

    let now = Instant::now();
    let mut receiver = publish(&mut engine, 42, 5000, now);
    engine
        .subscription_mut(subscription_id)
        .unwrap()
        .notify_data_change(vec![data_change(7, -1)]);
    engine.tick(DateTime::now(), now);

    let response = receiver.try_recv().unwrap();
    assert_eq!(response.response_header.request_handle, 42);
    assert_eq!(response.response_header.service_result, StatusCode::Good);
    assert_eq!(response.subscription_id, subscription_id);
    assert_eq!(response.available_sequence_numbers, Some(vec![1]));
    assert!(!response.more_notifications);
    assert_eq!(response.notification_message.sequence_number, 1);
    let payloads = response.notification_message.notification_data.unwrap();
    assert!(matches!(&payloads[0], NotificationData::DataChange(_)));
    assert_eq!(engine.pending_publish_request_count(), 0);
    assert_queues_consistent(&engine);
}

#[test]
fn queue_overflow_rejects_oldest_request() {
    let mut engine: PublishEngine = PublishEngine::new(PublishLimits {
        max_publish_request_in_queue: 2,
        ..Default::default()
    });
    let subscription_id = next_subscription_id();
    engine.add_subscription(subscription(subscription_id));

    let now = Instant::now();
    let mut r1 = publish(&mut engine, 1, 0, now);
    let mut r2 = publish(&mut engine, 2, 0, now);
    let mut r3 = publish(&mut engine, 3, 0, now);

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
fn no_subscription_is_rejected_immediately() {
    let mut engine = engine();
    let mut receiver = publish(&mut engine, 7, 0, Instant::now());
    let response = receiver.try_recv().unwrap();
    assert_eq!(response.response_header.request_handle, 7);
    assert_eq!(
        response.response_header.service_result,
        StatusCode::BadNoSubscription
    );
}

#[test]
fn deleted_subscription_drains_unacknowledged_messages() {
    let mut engine = engine();
    let subscription_id = next_subscription_id();
    engine.add_subscription(subscription(subscription_id));

    let start = Instant::now();
    let responses = produce_messages(&mut engine, subscription_id, 5, start);
    assert_eq!(
        responses
            .iter()
            .map(|r| r.notification_message.sequence_number)
            .collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );

    // The client acknowledged everything up to 3.
    for sequence_number in 1..=3 {
        assert_eq!(
            engine
                .subscription_mut(subscription_id)
                .unwrap()
                .acknowledge_notification(sequence_number),
            StatusCode::Good
        );
    }

    engine.on_close_subscription(subscription_id);
    assert_eq!(engine.subscription_count(), 0);

    // The retained messages are still owed to the client.
    let at = start + Duration::from_secs(10);
    let mut r1 = publish(&mut engine, 101, 0, at);
    let response = r1.try_recv().unwrap();
    assert_eq!(response.notification_message.sequence_number, 4);
    assert_eq!(response.available_sequence_numbers, Some(vec![5]));
    assert!(response.more_notifications);

    let mut r2 = publish(&mut engine, 102, 0, at);
    let response = r2.try_recv().unwrap();
    assert_eq!(response.notification_message.sequence_number, 5);
    assert!(!response.more_notifications);

    let mut r3 = publish(&mut engine, 103, 0, at);
    let response = r3.try_recv().unwrap();
    assert_eq!(
        response.response_header.service_result,
        StatusCode::BadNoSubscription
    );
}

#[test]
fn silent_subscription_times_the_request_out() {
    let mut engine = engine();
    let subscription_id = next_subscription_id();
    engine.add_subscription(subscription(subscription_id));

    let now = Instant::now();
    let mut receiver = publish(&mut engine, 9, 1000, now);
    assert!(receiver.try_recv().is_err());

    engine.tick(DateTime::now(), now + Duration::from_millis(1500));
    let response = receiver.try_recv().unwrap();
    assert_eq!(response.response_header.request_handle, 9);
    assert_eq!(response.response_header.service_result, StatusCode::BadTimeout);
    assert_eq!(engine.pending_publish_request_count(), 0);
}

#[test]
fn acknowledgements_shrink_available_sequence_numbers() {
    let mut engine = engine();
    let subscription_id = next_subscription_id();
    engine.add_subscription(subscription(subscription_id));

    let start = Instant::now();
    produce_messages(&mut engine, subscription_id, 3, start);

    // Acknowledge 1 and 2 on the request that collects message 4.
    let at = start + Duration::from_secs(1);
    let mut receiver = publish_with_acks(
        &mut engine,
        200,
        0,
        Some(vec![
            SubscriptionAcknowledgement {
                subscription_id,
                sequence_number: 1,
            },
            SubscriptionAcknowledgement {
                subscription_id,
                sequence_number: 2,
            },
            SubscriptionAcknowledgement {
                subscription_id: subscription_id + 1000,
                sequence_number: 1,
            },
        ]),
        at,
    );
    engine
        .subscription_mut(subscription_id)
        .unwrap()
        .notify_data_change(vec![data_change(1, 99)]);
    engine.tick(DateTime::now(), at);

    let response = receiver.try_recv().unwrap();
    assert_eq!(
        response.results,
        Some(vec![
            StatusCode::Good,
            StatusCode::Good,
            StatusCode::BadSubscriptionIdInvalid
        ])
    );
    // No acknowledged sequence number may ever be offered again.
    assert_eq!(response.available_sequence_numbers, Some(vec![3, 4]));
}

#[test]
fn transfer_announces_itself_to_the_source_session() {
    let mut source = engine();
    let mut dest = engine();
    let subscription_id = next_subscription_id();
    source.add_subscription(subscription(subscription_id));

    let start = Instant::now();
    let responses = produce_messages(&mut source, subscription_id, 3, start);
    assert_eq!(responses.len(), 3);
    for sequence_number in 1..=2 {
        source
            .subscription_mut(subscription_id)
            .unwrap()
            .acknowledge_notification(sequence_number);
    }

    source.transfer(subscription_id, &mut dest, true, DateTime::now());

    // The subscription is re-homed...
    assert_eq!(source.subscription_count(), 0);
    let dest_engine_id = dest.engine_id();
    let moved = dest.subscription_mut(subscription_id).unwrap();
    assert_eq!(moved.publish_engine(), Some(dest_engine_id));
    assert_eq!(moved.available_sequence_numbers(), vec![3]);
    // The transfer reset the lifetime counter and requested a snapshot.
    assert_eq!(moved.time_to_expiration(), 1000);
    assert!(moved.take_resend_data());
    assert!(!moved.take_resend_data());

    // ...and the source session hears about it on its next publish.
    assert_eq!(source.pending_publish_response_count(), 1);
    assert_queues_consistent(&source);
    let mut receiver = publish(&mut source, 77, 0, start + Duration::from_secs(2));
    let response = receiver.try_recv().unwrap();
    assert_eq!(response.subscription_id, subscription_id);
    assert_eq!(response.available_sequence_numbers, Some(vec![3]));
    let payloads = response.notification_message.notification_data.unwrap();
    assert!(matches!(
        &payloads[0],
        NotificationData::StatusChange(s) if s.status == StatusCode::GoodSubscriptionTransferred
    ));
    assert_eq!(source.pending_publish_response_count(), 0);
}

#[test]
fn delivered_sequence_numbers_are_gap_free() {
    let mut engine = engine();
    let subscription_id = next_subscription_id();
    engine.add_subscription(subscription(subscription_id));

    let responses = produce_messages(&mut engine, subscription_id, 10, Instant::now());
    for pair in responses.windows(2) {
        assert_eq!(
            pair[1].notification_message.sequence_number,
            pair[0].notification_message.sequence_number + 1
        );
    }
}

#[tokio::test]
async fn engine_runs_behind_a_tick_task() {
    let engine = Arc::new(Mutex::new(engine()));
    let subscription_id = next_subscription_id();
    engine
        .lock()
        .add_subscription(subscription(subscription_id));

    // The cadence a session would drive: one task owns the timer.
    let ticker = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(20));
            loop {
                interval.tick().await;
                engine.lock().tick(DateTime::now(), Instant::now());
            }
        })
    };

    let receiver = publish(&mut engine.lock(), 1, 10_000, Instant::now());
    engine
        .lock()
        .subscription_mut(subscription_id)
        .unwrap()
        .notify_data_change(vec![data_change(1, 5)]);

    let response = timeout(Duration::from_secs(5), receiver)
        .await
        .expect("timed out waiting for the publish response")
        .expect("sender dropped");
    assert_eq!(response.response_header.service_result, StatusCode::Good);
    assert_eq!(response.notification_message.sequence_number, 1);

    ticker.abort();
    engine.lock().on_close_subscription(subscription_id);
    engine.lock().shutdown();
}
