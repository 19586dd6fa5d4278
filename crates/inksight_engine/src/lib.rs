//! Inksight engine: socket and streaming IO behind a command/event handle.
mod chat;
mod engine;
mod frame;
mod sink;
mod status;
mod types;

pub use chat::{ChatSettings, ChatTransport, ReqwestChatTransport};
pub use engine::{EngineConfig, EngineError, EngineHandle};
pub use frame::{
    parse_frame_line, FrameDecoder, FrameError, DEFAULT_MAX_LINE_BYTES, FRAME_PREFIX,
};
pub use sink::{ChannelEventSink, EventSink};
pub use status::{decode_status_frame, run_status_channel, StatusSettings};
pub use types::{
    ChatError, ChatFrame, ChatRequest, EngineEvent, FailureKind, HistoryEntry, HistoryRole,
    SendId, SourceImage, StatusAction, StatusError, StatusEvent, StreamSummary,
};
