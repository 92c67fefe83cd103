//! Chat-platform adapters for the bot front-end.
//!
//! Adapters are pure I/O: they convert platform updates to/from
//! `InboundMessage` / `OutboundMessage`.

mod telegram;
mod traits;
mod types;

pub use telegram::{TELEGRAM_MAX_MESSAGE_CHARS, TelegramAdapter, split_message};
pub use traits::ChannelAdapter;
pub use types::{ChannelId, ChatId, InboundMessage, MessageFormat, MessageId, OutboundMessage, SenderId};
