// SPDX-License-Identifier: MIT OR Apache-2.0
//! Extracts `{adapterId, chatId?, channelType?}` from an inbound subject
//! under `relay.human.>`, which follows the convention
//! `relay.human.<adapterId>.<channelType>.<chatId>` or
//! `relay.human.<adapterId>.<chatId>`.

/// The parsed components of a `relay.human.>` subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanSubject {
    /// The adapter instance this subject addresses.
    pub adapter_id: String,
    /// The chat identifier, if the subject carries one.
    pub chat_id: Option<String>,
    /// The channel type, if the subject carries one.
    pub channel_type: Option<String>,
}

const PREFIX: &str = "relay.human.";

/// Parse `subject`, returning `None` if it is not under `relay.human.>`.
#[must_use]
pub fn parse(subject: &str) -> Option<HumanSubject> {
    let rest = subject.strip_prefix(PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    let segments: Vec<&str> = rest.split('.').collect();
    match segments.len() {
        1 => Some(HumanSubject {
            adapter_id: segments[0].to_string(),
            chat_id: None,
            channel_type: None,
        }),
        2 => Some(HumanSubject {
            adapter_id: segments[0].to_string(),
            chat_id: Some(segments[1].to_string()),
            channel_type: None,
        }),
        _ => Some(HumanSubject {
            adapter_id: segments[0].to_string(),
            channel_type: Some(segments[1].to_string()),
            chat_id: Some(segments[2..].join(".")),
        }),
    }
}
