//! Inksight core: pure state machine and view-model helpers.
mod effect;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use state::{
    AppState, ChatMessage, ConnectionStatus, LifecycleAction, Role, SendId, SourceImage, View,
    APOLOGY_MESSAGE,
};
pub use update::update;
pub use view_model::{
    AppViewModel, ChatView, MessageRow, SourceRow, StatusView, TimelineStep, RELEVANCE_THRESHOLD,
};
