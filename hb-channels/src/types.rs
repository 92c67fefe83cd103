use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

id_newtype!(MessageId);
id_newtype!(ChannelId);
id_newtype!(SenderId);
id_newtype!(ChatId);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFormat {
    #[default]
    Plain,
    Markdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub sender_id: SenderId,
    /// Display name as the platform reports it (Telegram `first_name`).
    #[serde(default)]
    pub sender_name: Option<String>,
    pub chat_id: ChatId,
    pub is_group: bool,
    pub content: String,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Where replies should go: the originating chat.
    pub fn reply_target(&self) -> &str {
        self.chat_id.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub content: String,
    #[serde(default)]
    pub reply_to_message_id: Option<MessageId>,
    #[serde(default)]
    pub format: MessageFormat,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            reply_to_message_id: None,
            format: MessageFormat::Plain,
        }
    }

    pub fn markdown(content: impl Into<String>) -> Self {
        Self {
            format: MessageFormat::Markdown,
            ..Self::text(content)
        }
    }

    pub fn in_reply_to(mut self, message_id: MessageId) -> Self {
        self.reply_to_message_id = Some(message_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_newtypes_are_transparent_in_json() {
        let id = ChatId::new("42");
        assert_eq!(serde_json::to_string(&id).expect("encode"), "\"42\"");
        assert_eq!(&*id, "42");
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn outbound_builders_set_format_and_reply() {
        let msg = OutboundMessage::markdown("*hi*").in_reply_to(MessageId::new("7"));
        assert_eq!(msg.format, MessageFormat::Markdown);
        assert_eq!(msg.reply_to_message_id.as_ref().map(MessageId::as_str), Some("7"));
        assert_eq!(OutboundMessage::text("x").format, MessageFormat::Plain);
    }
}
