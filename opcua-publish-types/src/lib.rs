// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! Type definitions for the OPC UA publish service set: the decoded request
//! and response structures a server-side publish engine ingests and emits,
//! together with a binary codec for them.
//!
//! The types here cover the `Publish` and `Republish` services and the
//! notification payloads of OPC UA Part 4 7.21. Secure-channel framing and
//! the full type system of a complete stack are deliberately absent.

pub mod constants;
pub mod data_types;
pub mod data_value;
pub mod date_time;
pub mod encoding;
pub mod errors;
pub mod notification;
pub mod publish;
pub mod request_header;
pub mod response_header;
pub mod status_code;
pub mod string;
pub mod variant;

pub use data_types::{Counter, IntegerId};
pub use data_value::DataValue;
pub use date_time::{DateTime, UtcTime};
pub use encoding::{
    BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error,
};
pub use errors::OpcUAError;
pub use notification::{
    DataChangeNotification, EventFieldList, EventNotificationList, MonitoredItemNotification,
    NotificationData, NotificationMessage, StatusChangeNotification,
};
pub use publish::{
    PublishRequest, PublishResponse, RepublishRequest, RepublishResponse,
    SubscriptionAcknowledgement,
};
pub use request_header::RequestHeader;
pub use response_header::{AsRequestHandle, ResponseHeader};
pub use status_code::StatusCode;
pub use string::UAString;
pub use variant::{Variant, VariantScalarTypeId};

#[cfg(test)]
mod tests;
