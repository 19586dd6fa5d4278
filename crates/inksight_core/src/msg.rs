use crate::{LifecycleAction, SendId, SourceImage};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// The status view became visible and wants a live channel.
    StatusViewMounted,
    /// The status socket finished its handshake.
    StatusChannelOpened,
    /// The status socket is gone, for whatever reason.
    StatusChannelClosed,
    /// Lifecycle event pushed by the scanning pipeline.
    Lifecycle {
        action: LifecycleAction,
        page_number: Option<u32>,
    },
    /// User edited the chat input.
    DraftChanged(String),
    /// User submitted the current chat input.
    QuerySubmitted,
    /// User asked to abandon the reply being streamed.
    CancelRequested,
    /// A `source_images` frame arrived for a send.
    SourceImagesReceived {
        send_id: SendId,
        images: Vec<SourceImage>,
    },
    /// A `response` frame arrived for a send.
    ResponseDelta { send_id: SendId, content: String },
    /// The response body ended normally.
    ReplyFinished { send_id: SendId },
    /// The transport failed before the body ended.
    ReplyFailed { send_id: SendId },
    /// The send was cancelled before the body ended.
    ReplyCancelled { send_id: SendId },
    /// User asked to leave the application.
    QuitRequested,
}
