//! Queue messages

use md5::{Digest, Md5};
use std::collections::HashMap;
use uuid::Uuid;

/// Transport marker for string-valued attributes in the attribute digest
const STRING_TRANSPORT: u8 = 1;

/// A user-defined message attribute. Only string-valued types are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttribute {
    pub data_type: String,
    pub string_value: String,
}

impl MessageAttribute {
    pub fn new(data_type: impl Into<String>, string_value: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            string_value: string_value.into(),
        }
    }
}

/// Input to a send: everything the caller controls about a message
#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub body: String,
    pub attributes: HashMap<String, MessageAttribute>,
    pub delay_seconds: u32,
    pub deduplication_id: Option<String>,
    pub group_id: Option<String>,
}

impl NewMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Set the message group; an empty id means no group.
    #[must_use]
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        let group_id = group_id.into();
        self.group_id = (!group_id.is_empty()).then_some(group_id);
        self
    }
}

/// A message stored in a queue. Never modified once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub message_id: String,
    pub body: String,
    pub md5_of_body: String,
    pub attributes: HashMap<String, MessageAttribute>,
    /// `None` when the message carries no attributes
    pub md5_of_attributes: Option<String>,
    pub delay_seconds: u32,
    pub deduplication_id: Option<String>,
    pub group_id: Option<String>,
    pub sent_timestamp: i64,
}

impl Message {
    pub fn new(input: NewMessage) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            md5_of_body: md5_hex(&input.body),
            md5_of_attributes: md5_of_attributes(&input.attributes),
            body: input.body,
            attributes: input.attributes,
            delay_seconds: input.delay_seconds,
            deduplication_id: input.deduplication_id,
            group_id: input.group_id,
            sent_timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// What a sender gets back once a message has been accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: String,
    pub md5_of_body: String,
    pub md5_of_attributes: Option<String>,
}

impl From<&Message> for SentMessage {
    fn from(message: &Message) -> Self {
        Self {
            message_id: message.message_id.clone(),
            md5_of_body: message.md5_of_body.clone(),
            md5_of_attributes: message.md5_of_attributes.clone(),
        }
    }
}

fn md5_hex(body: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

/// Digest SQS clients check message attributes against: attributes in name
/// order, each field prefixed with its big-endian `u32` length.
fn md5_of_attributes(attributes: &HashMap<String, MessageAttribute>) -> Option<String> {
    if attributes.is_empty() {
        return None;
    }

    let mut names: Vec<&String> = attributes.keys().collect();
    names.sort();

    let mut hasher = Md5::new();
    for name in names {
        let attribute = &attributes[name];
        update_length_prefixed(&mut hasher, name.as_bytes());
        update_length_prefixed(&mut hasher, attribute.data_type.as_bytes());
        hasher.update([STRING_TRANSPORT]);
        update_length_prefixed(&mut hasher, attribute.string_value.as_bytes());
    }
    Some(hex::encode(hasher.finalize()))
}

fn update_length_prefixed(hasher: &mut Md5, bytes: &[u8]) {
    #[allow(clippy::cast_possible_truncation)]
    hasher.update((bytes.len() as u32).to_be_bytes());
    hasher.update(bytes);
}
