use crate::view_model::{build_chat_view, build_status_view, AppViewModel};

pub type SendId = u64;

/// Shown in place of an answer when the chat transport fails.
pub const APOLOGY_MESSAGE: &str = "Sorry, there was an error processing your request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Status,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
    Scanning,
    Processing,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Scanning,
    Processing,
    End,
    Unrecognized(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub page_number: String,
    pub image_path: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub source_images: Option<Vec<SourceImage>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            source_images: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            source_images: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StatusPanel {
    status: ConnectionStatus,
    current_page: u32,
    channel_open: bool,
    navigated: bool,
}

impl Default for StatusPanel {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            current_page: 1,
            channel_open: false,
            navigated: false,
        }
    }
}

/// The assistant reply currently being streamed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingReply {
    pub(crate) send_id: SendId,
    pub(crate) content: String,
    pub(crate) source_images: Option<Vec<SourceImage>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ChatPanel {
    messages: Vec<ChatMessage>,
    draft: String,
    pending: Option<PendingReply>,
    last_send_id: SendId,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    view: View,
    status: StatusPanel,
    chat: ChatPanel,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the session on `view` instead of the status screen.
    pub fn starting_on(view: View) -> Self {
        Self {
            view,
            ..Self::default()
        }
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            view: self.view,
            status: build_status_view(self.status.status, self.status.current_page),
            chat: build_chat_view(&self.chat.messages, self.chat.pending.as_ref()),
            dirty: self.dirty,
        }
    }

    pub fn current_view(&self) -> View {
        self.view
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.status.status
    }

    pub fn current_page(&self) -> u32 {
        self.status.current_page
    }

    pub fn status_channel_open(&self) -> bool {
        self.status.channel_open
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.chat.messages
    }

    pub fn draft(&self) -> &str {
        &self.chat.draft
    }

    /// Send-in-progress guard.
    pub fn is_sending(&self) -> bool {
        self.chat.pending.is_some()
    }

    pub fn pending_send_id(&self) -> Option<SendId> {
        self.chat.pending.as_ref().map(|pending| pending.send_id)
    }

    /// Returns whether anything visible changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_view(&mut self, view: View) {
        if self.view != view {
            self.view = view;
            self.mark_dirty();
        }
    }

    /// Marks the status channel as requested. Returns false if it already was.
    pub(crate) fn open_status_channel(&mut self) -> bool {
        if self.status.channel_open {
            return false;
        }
        self.status.channel_open = true;
        true
    }

    /// Marks the status channel as released. Returns false if nothing was open.
    pub(crate) fn release_status_channel(&mut self) -> bool {
        std::mem::replace(&mut self.status.channel_open, false)
    }

    pub(crate) fn set_status(&mut self, status: ConnectionStatus) {
        if self.status.status != status {
            self.status.status = status;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_page(&mut self, page_number: Option<u32>) {
        if let Some(page) = page_number.filter(|page| *page > 0) {
            if self.status.current_page != page {
                self.status.current_page = page;
                self.mark_dirty();
            }
        }
    }

    /// Records the single navigation allowed per session.
    pub(crate) fn claim_navigation(&mut self) -> bool {
        !std::mem::replace(&mut self.status.navigated, true)
    }

    pub(crate) fn set_draft(&mut self, draft: String) {
        self.chat.draft = draft;
    }

    pub(crate) fn take_draft(&mut self) -> String {
        std::mem::take(&mut self.chat.draft)
    }

    /// Appends the user turn and opens a pending reply. Returns the new send id
    /// and the history as it was before this turn.
    pub(crate) fn begin_send(&mut self, query: &str) -> (SendId, Vec<ChatMessage>) {
        let history = self.chat.messages.clone();
        self.chat.last_send_id += 1;
        let send_id = self.chat.last_send_id;
        self.chat.messages.push(ChatMessage::user(query));
        self.chat.pending = Some(PendingReply {
            send_id,
            content: String::new(),
            source_images: None,
        });
        self.mark_dirty();
        (send_id, history)
    }

    fn pending_mut(&mut self, send_id: SendId) -> Option<&mut PendingReply> {
        self.chat
            .pending
            .as_mut()
            .filter(|pending| pending.send_id == send_id)
    }

    fn take_pending(&mut self, send_id: SendId) -> Option<PendingReply> {
        if self.pending_send_id() == Some(send_id) {
            self.chat.pending.take()
        } else {
            None
        }
    }

    pub(crate) fn replace_source_images(&mut self, send_id: SendId, images: Vec<SourceImage>) {
        if let Some(pending) = self.pending_mut(send_id) {
            pending.source_images = Some(images);
            self.mark_dirty();
        }
    }

    pub(crate) fn append_delta(&mut self, send_id: SendId, content: &str) {
        if let Some(pending) = self.pending_mut(send_id) {
            pending.content.push_str(content);
            self.mark_dirty();
        }
    }

    pub(crate) fn commit_reply(&mut self, send_id: SendId) {
        if let Some(pending) = self.take_pending(send_id) {
            self.chat.messages.push(ChatMessage {
                role: Role::Assistant,
                content: pending.content,
                source_images: pending.source_images,
            });
            self.mark_dirty();
        }
    }

    pub(crate) fn fail_reply(&mut self, send_id: SendId) {
        if self.take_pending(send_id).is_some() {
            self.chat.messages.push(ChatMessage::assistant(APOLOGY_MESSAGE));
            self.mark_dirty();
        }
    }

    pub(crate) fn drop_reply(&mut self, send_id: SendId) {
        if self.take_pending(send_id).is_some() {
            self.mark_dirty();
        }
    }
}
