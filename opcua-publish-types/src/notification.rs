// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock, Einar Omang

//! The `NotificationMessage` and the notification payloads it can carry,
//! per OPC UA Part 4 7.21.

use std::io::{Read, Write};

use log::trace;

use crate::data_types::IntegerId;
use crate::data_value::DataValue;
use crate::date_time::{DateTime, UtcTime};
use crate::encoding::{
    read_u32, write_u32, BinaryDecodable, BinaryEncodable, DecodingOptions, EncodingResult, Error,
};
use crate::status_code::StatusCode;
use crate::variant::Variant;

/// DefaultBinary encoding ids for the notification payloads.
mod object_ids {
    pub const DATA_CHANGE_NOTIFICATION: u32 = 811;
    pub const STATUS_CHANGE_NOTIFICATION: u32 = 820;
    pub const EVENT_NOTIFICATION_LIST: u32 = 916;
}

/// A single changed value attributed to a monitored item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitoredItemNotification {
    /// The client-assigned handle of the monitored item.
    pub client_handle: IntegerId,
    /// The changed value.
    pub value: DataValue,
}

/// A batch of changed values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataChangeNotification {
    /// The changed values, one entry per monitored item report.
    pub monitored_items: Option<Vec<MonitoredItemNotification>>,
}

/// The selected fields of a single event, attributed to a monitored item.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventFieldList {
    /// The client-assigned handle of the monitored item.
    pub client_handle: IntegerId,
    /// The selected event field values.
    pub event_fields: Option<Vec<Variant>>,
}

/// A batch of events.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventNotificationList {
    /// The queued events.
    pub events: Option<Vec<EventFieldList>>,
}

/// Reports a change in the state of the subscription itself.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusChangeNotification {
    /// The new status of the subscription.
    pub status: StatusCode,
}

/// One notification payload. A notification message carries up to one data
/// change payload and one event payload (table 158 covers the case where a
/// subscription monitors both), or a single status change.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationData {
    DataChange(DataChangeNotification),
    Events(EventNotificationList),
    StatusChange(StatusChangeNotification),
}

/// A batch of notifications attributed to one subscription, carrying a
/// sequence number. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotificationMessage {
    /// Sequence number of the message, unique and ascending per subscription.
    pub sequence_number: IntegerId,
    /// The time the message was produced.
    pub publish_time: UtcTime,
    /// The notification payloads. Absent for a keep-alive.
    pub notification_data: Option<Vec<NotificationData>>,
}

impl NotificationMessage {
    /// Create a notification message which contains data changes AND / OR
    /// events. Calling this with neither will panic.
    pub fn data_change(
        sequence_number: u32,
        publish_time: DateTime,
        data_change_notifications: Vec<MonitoredItemNotification>,
        event_notifications: Vec<EventFieldList>,
    ) -> NotificationMessage {
        if data_change_notifications.is_empty() && event_notifications.is_empty() {
            panic!("No notifications supplied to data_change()");
        }

        let mut notification_data = Vec::with_capacity(2);
        if !data_change_notifications.is_empty() {
            let data_change_notification = DataChangeNotification {
                monitored_items: Some(data_change_notifications),
            };
            trace!("data change notification = {:?}", data_change_notification);
            notification_data.push(NotificationData::DataChange(data_change_notification));
        }
        if !event_notifications.is_empty() {
            let event_notification_list = EventNotificationList {
                events: Some(event_notifications),
            };
            trace!("event notification = {:?}", event_notification_list);
            notification_data.push(NotificationData::Events(event_notification_list));
        }

        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Some(notification_data),
        }
    }

    /// Create a status change notification message.
    pub fn status_change(
        sequence_number: u32,
        publish_time: DateTime,
        status: StatusCode,
    ) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Some(vec![NotificationData::StatusChange(
                StatusChangeNotification { status },
            )]),
        }
    }

    /// Create a keep-alive notification message. It carries the sequence
    /// number of the next real message and no payload.
    pub fn keep_alive(sequence_number: u32, publish_time: DateTime) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: None,
        }
    }

    /// True if the message carries no payload.
    pub fn is_keep_alive(&self) -> bool {
        self.notification_data
            .as_ref()
            .map_or(true, |data| data.is_empty())
    }

    /// Append a status change payload to the message.
    pub fn push_status_change(&mut self, status: StatusCode) {
        self.notification_data
            .get_or_insert_with(Vec::new)
            .push(NotificationData::StatusChange(StatusChangeNotification {
                status,
            }));
    }
}

impl BinaryEncodable for MonitoredItemNotification {
    fn byte_len(&self) -> usize {
        self.client_handle.byte_len() + self.value.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.client_handle.encode(stream)?;
        size += self.value.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for MonitoredItemNotification {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let client_handle = IntegerId::decode(stream, decoding_options)?;
        let value = DataValue::decode(stream, decoding_options)?;
        Ok(MonitoredItemNotification {
            client_handle,
            value,
        })
    }
}

impl BinaryEncodable for DataChangeNotification {
    fn byte_len(&self) -> usize {
        self.monitored_items.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        self.monitored_items.encode(stream)
    }
}

impl BinaryDecodable for DataChangeNotification {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(DataChangeNotification {
            monitored_items: BinaryDecodable::decode(stream, decoding_options)?,
        })
    }
}

impl BinaryEncodable for EventFieldList {
    fn byte_len(&self) -> usize {
        self.client_handle.byte_len() + self.event_fields.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.client_handle.encode(stream)?;
        size += self.event_fields.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for EventFieldList {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let client_handle = IntegerId::decode(stream, decoding_options)?;
        let event_fields = BinaryDecodable::decode(stream, decoding_options)?;
        Ok(EventFieldList {
            client_handle,
            event_fields,
        })
    }
}

impl BinaryEncodable for EventNotificationList {
    fn byte_len(&self) -> usize {
        self.events.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        self.events.encode(stream)
    }
}

impl BinaryDecodable for EventNotificationList {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(EventNotificationList {
            events: BinaryDecodable::decode(stream, decoding_options)?,
        })
    }
}

impl BinaryEncodable for StatusChangeNotification {
    fn byte_len(&self) -> usize {
        self.status.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        self.status.encode(stream)
    }
}

impl BinaryDecodable for StatusChangeNotification {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(StatusChangeNotification {
            status: StatusCode::decode(stream, decoding_options)?,
        })
    }
}

impl BinaryEncodable for NotificationData {
    fn byte_len(&self) -> usize {
        4 + match self {
            NotificationData::DataChange(v) => v.byte_len(),
            NotificationData::Events(v) => v.byte_len(),
            NotificationData::StatusChange(v) => v.byte_len(),
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = match self {
            NotificationData::DataChange(_) => {
                write_u32(stream, object_ids::DATA_CHANGE_NOTIFICATION)?
            }
            NotificationData::Events(_) => write_u32(stream, object_ids::EVENT_NOTIFICATION_LIST)?,
            NotificationData::StatusChange(_) => {
                write_u32(stream, object_ids::STATUS_CHANGE_NOTIFICATION)?
            }
        };
        size += match self {
            NotificationData::DataChange(v) => v.encode(stream)?,
            NotificationData::Events(v) => v.encode(stream)?,
            NotificationData::StatusChange(v) => v.encode(stream)?,
        };
        Ok(size)
    }
}

impl BinaryDecodable for NotificationData {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let object_id = read_u32(stream)?;
        Ok(match object_id {
            object_ids::DATA_CHANGE_NOTIFICATION => NotificationData::DataChange(
                DataChangeNotification::decode(stream, decoding_options)?,
            ),
            object_ids::EVENT_NOTIFICATION_LIST => {
                NotificationData::Events(EventNotificationList::decode(stream, decoding_options)?)
            }
            object_ids::STATUS_CHANGE_NOTIFICATION => NotificationData::StatusChange(
                StatusChangeNotification::decode(stream, decoding_options)?,
            ),
            id => {
                return Err(Error::decoding(format!(
                    "Unsupported notification payload with encoding id {id}"
                )))
            }
        })
    }
}

impl BinaryEncodable for NotificationMessage {
    fn byte_len(&self) -> usize {
        self.sequence_number.byte_len()
            + self.publish_time.byte_len()
            + self.notification_data.byte_len()
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = self.sequence_number.encode(stream)?;
        size += self.publish_time.encode(stream)?;
        size += self.notification_data.encode(stream)?;
        Ok(size)
    }
}

impl BinaryDecodable for NotificationMessage {
    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let sequence_number = IntegerId::decode(stream, decoding_options)?;
        let publish_time = UtcTime::decode(stream, decoding_options)?;
        let notification_data = BinaryDecodable::decode(stream, decoding_options)?;
        Ok(NotificationMessage {
            sequence_number,
            publish_time,
            notification_data,
        })
    }
}
