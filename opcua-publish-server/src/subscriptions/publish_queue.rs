// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! The queue of publish requests a session has outstanding, and the one-shot
//! channel each request is eventually answered on.

use std::collections::VecDeque;
use std::time::Instant;

use log::debug;
use opcua_publish_types::{PublishRequest, PublishResponse, StatusCode};
use tokio::sync::oneshot;

/// Receiving half of a publish response channel.
pub type PublishResponseReceiver = oneshot::Receiver<PublishResponse>;

/// Sending half of a publish response channel. Consuming `self` on send makes
/// "exactly one response per request" a compile-time property.
#[derive(Debug)]
pub struct PublishResponseSender {
    sender: oneshot::Sender<PublishResponse>,
}

impl PublishResponseSender {
    /// Create a connected sender/receiver pair for one publish request.
    pub fn channel() -> (PublishResponseSender, PublishResponseReceiver) {
        let (sender, receiver) = oneshot::channel();
        (PublishResponseSender { sender }, receiver)
    }

    /// Deliver the response. A dropped receiver means the transport went away
    /// while the request was queued; there is nobody left to tell.
    pub fn send(self, response: PublishResponse) {
        if self.sender.send(response).is_err() {
            debug!("Discarding publish response, the receiver was dropped");
        }
    }
}

/// A publish request waiting to be answered.
#[derive(Debug)]
pub struct PendingPublish {
    /// The decoded request.
    pub request: Box<PublishRequest>,
    /// Channel the response goes out on.
    pub response: PublishResponseSender,
    /// Result of applying the request's subscription acknowledgements,
    /// echoed on whatever response completes this request.
    pub ack_results: Option<Vec<StatusCode>>,
    /// When the request was received.
    pub received_at: Instant,
    /// When the request expires, derived from the `timeout_hint` of the
    /// request header. `None` if the client did not impose a timeout.
    pub deadline: Option<Instant>,
}

/// FIFO of pending publish requests with deadline bookkeeping. The engine
/// enforces the queue bound as an admission step, after giving late and
/// draining subscriptions the chance to consume the new request.
#[derive(Debug, Default)]
pub struct PublishQueue {
    requests: VecDeque<PendingPublish>,
}

impl PublishQueue {
    pub fn new() -> PublishQueue {
        Self::default()
    }

    /// Append a request to the back of the queue.
    pub fn enqueue(&mut self, record: PendingPublish) {
        self.requests.push_back(record);
    }

    /// Remove and return the oldest request.
    pub fn dequeue(&mut self) -> Option<PendingPublish> {
        self.requests.pop_front()
    }

    /// Remove and return the oldest request if the queue holds more than
    /// `capacity` requests.
    pub fn evict_over_capacity(&mut self, capacity: usize) -> Option<PendingPublish> {
        if self.requests.len() > capacity {
            self.requests.pop_front()
        } else {
            None
        }
    }

    /// Remove and return every request whose deadline has passed.
    pub fn purge_timed_out(&mut self, now: Instant) -> Vec<PendingPublish> {
        let mut timed_out = Vec::new();
        let mut index = 0;
        while index < self.requests.len() {
            let expired = self.requests[index]
                .deadline
                .is_some_and(|deadline| deadline < now);
            if expired {
                if let Some(record) = self.requests.remove(index) {
                    timed_out.push(record);
                }
            } else {
                index += 1;
            }
        }
        timed_out
    }

    /// Remove and return every queued request, for cancellation fan-out.
    pub fn drain_all(&mut self) -> Vec<PendingPublish> {
        self.requests.drain(..).collect()
    }

    /// Drop every queued request without answering. The senders are dropped,
    /// so receivers observe a closed channel.
    pub fn clear(&mut self) {
        self.requests.clear();
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
