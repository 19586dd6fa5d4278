use crate::{ChatMessage, SendId, View};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    OpenStatusChannel,
    CloseStatusChannel,
    NavigateTo(View),
    SendQuery {
        send_id: SendId,
        query: String,
        history: Vec<ChatMessage>,
    },
    CancelQuery { send_id: SendId },
    Exit,
}
