// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! Request and response types of the publish service set, Part 4 5.13.5
//! and 5.13.6.

use std::io::{Read, Write};

use crate::data_types::IntegerId;
use crate::encoding::{BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult};
use crate::notification::NotificationMessage;
use crate::response_header::ResponseHeader;
use crate::request_header::RequestHeader;
use crate::status_code::StatusCode;

/// Acknowledges receipt of a notification message of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SubscriptionAcknowledgement {
    /// The subscription the acknowledgement applies to.
    pub subscription_id: IntegerId,
    /// The sequence number being acknowledged.
    pub sequence_number: IntegerId,
}

///https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.5/#5.13.5.2
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PublishRequest {
    pub request_header: RequestHeader,
    pub subscription_acknowledgements: Option<Vec<SubscriptionAcknowledgement>>,
}

///https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.5/#5.13.5.2
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PublishResponse {
    pub response_header: ResponseHeader,
    /// The subscription the notification message belongs to.
    pub subscription_id: IntegerId,
    /// Sequence numbers of the messages the subscription still retains for
    /// republishing, in the order they were produced.
    pub available_sequence_numbers: Option<Vec<IntegerId>>,
    /// True if the subscription has further notifications queued.
    pub more_notifications: bool,
    /// The notification message itself.
    pub notification_message: NotificationMessage,
    /// One result per acknowledgement in the request.
    pub results: Option<Vec<StatusCode>>,
}

impl PublishResponse {
    /// A response carrying only a service result, used to complete a publish
    /// request that cannot be answered with a notification message.
    pub fn new_service_result(
        request_handle: IntegerId,
        service_result: StatusCode,
    ) -> PublishResponse {
        PublishResponse {
            response_header: ResponseHeader::new_service_result(request_handle, service_result),
            ..Default::default()
        }
    }
}

///https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.6/#5.13.6.2
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepublishRequest {
    pub request_header: RequestHeader,
    pub subscription_id: IntegerId,
    /// The sequence number of the message to be republished.
    pub retransmit_sequence_number: IntegerId,
}

///https://reference.opcfoundation.org/v105/Core/docs/Part4/5.13.6/#5.13.6.2
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RepublishResponse {
    pub response_header: ResponseHeader,
    pub notification_message: NotificationMessage,
}

impl BinaryEncodable for SubscriptionAcknowledgement {
    fn byte_len(&self) -> usize {
        self.subscription_id.byte_len() + self.sequence_number.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.subscription_id.encode(stream)?;
        size += self.sequence_number.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for SubscriptionAcknowledgement {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let subscription_id = IntegerId::decode(stream, decoding_options)?;
        let sequence_number = IntegerId::decode(stream, decoding_options)?;
        Ok(SubscriptionAcknowledgement {
            subscription_id,
            sequence_number,
        })
    }
}

impl BinaryEncodable for PublishRequest {
    fn byte_len(&self) -> usize {
        self.request_header.byte_len() + self.subscription_acknowledgements.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.request_header.encode(stream)?;
        size += self.subscription_acknowledgements.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for PublishRequest {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let request_header = RequestHeader::decode(stream, decoding_options)?;
        let subscription_acknowledgements = BinaryDecodable::decode(stream, decoding_options)?;
        Ok(PublishRequest {
            request_header,
            subscription_acknowledgements,
        })
    }
}

impl BinaryEncodable for PublishResponse {
    fn byte_len(&self) -> usize {
        let mut size = self.response_header.byte_len();
        size += self.subscription_id.byte_len();
        size += self.available_sequence_numbers.byte_len();
        size += self.more_notifications.byte_len();
        size += self.notification_message.byte_len();
        size += self.results.byte_len();
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.response_header.encode(stream)?;
        size += self.subscription_id.encode(stream)?;
        size += self.available_sequence_numbers.encode(stream)?;
        size += self.more_notifications.encode(stream)?;
        size += self.notification_message.encode(stream)?;
        size += self.results.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for PublishResponse {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let response_header = ResponseHeader::decode(stream, decoding_options)?;
        let subscription_id = IntegerId::decode(stream, decoding_options)?;
        let available_sequence_numbers = BinaryDecodable::decode(stream, decoding_options)?;
        let more_notifications = bool::decode(stream, decoding_options)?;
        let notification_message = NotificationMessage::decode(stream, decoding_options)?;
        let results = BinaryDecodable::decode(stream, decoding_options)?;
        Ok(PublishResponse {
            response_header,
            subscription_id,
            available_sequence_numbers,
            more_notifications,
            notification_message,
            results,
        })
    }
}

impl BinaryEncodable for RepublishRequest {
    fn byte_len(&self) -> usize {
        self.request_header.byte_len()
            + self.subscription_id.byte_len()
            + self.retransmit_sequence_number.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.request_header.encode(stream)?;
        size += self.subscription_id.encode(stream)?;
        size += self.retransmit_sequence_number.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for RepublishRequest {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let request_header = RequestHeader::decode(stream, decoding_options)?;
        let subscription_id = IntegerId::decode(stream, decoding_options)?;
        let retransmit_sequence_number = IntegerId::decode(stream, decoding_options)?;
        Ok(RepublishRequest {
            request_header,
            subscription_id,
            retransmit_sequence_number,
        })
    }
}

impl BinaryEncodable for RepublishResponse {
    fn byte_len(&self) -> usize {
        self.response_header.byte_len() + self.notification_message.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.response_header.encode(stream)?;
        size += self.notification_message.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for RepublishResponse {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let response_header = ResponseHeader::decode(stream, decoding_options)?;
        let notification_message = NotificationMessage::decode(stream, decoding_options)?;
        Ok(RepublishResponse {
            response_header,
            notification_message,
        })
    }
}
