use crate::types::{InboundMessage, OutboundMessage};
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Unique channel identifier, e.g. "telegram".
    fn channel_id(&self) -> &str;

    /// Start receiving messages. Push to tx for each inbound message until
    /// `shutdown` fires.
    async fn start(&self, tx: mpsc::Sender<InboundMessage>, shutdown: CancellationToken)
    -> Result<()>;

    /// Send a message to a specific chat on this platform.
    async fn send(&self, recipient_id: &str, message: OutboundMessage) -> Result<()>;

    /// Send typing state updates where supported.
    async fn send_typing(&self, _recipient_id: &str) -> Result<()> {
        Err(anyhow::anyhow!(
            "send_typing is not supported by this channel"
        ))
    }

    fn supports_typing_events(&self) -> bool {
        false
    }
}
