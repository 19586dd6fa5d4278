use crate::state::PendingReply;
use crate::{ChatMessage, ConnectionStatus, Role, SourceImage, View};

/// Source images scoring below this are not shown.
pub const RELEVANCE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub view: View,
    pub status: StatusView,
    pub chat: ChatView,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusView {
    pub status: ConnectionStatus,
    pub badge: &'static str,
    pub headline: &'static str,
    pub detail: String,
    /// Only set while a page is being scanned or processed.
    pub page: Option<u32>,
    pub timeline: Vec<TimelineStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineStep {
    pub label: &'static str,
    pub reached: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatView {
    pub messages: Vec<MessageRow>,
    /// Accumulated text of the reply being streamed.
    pub streaming: Option<String>,
    pub streaming_sources: Vec<SourceRow>,
    /// Streaming has started but no text has arrived yet.
    pub thinking: bool,
    pub input_enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub role: Role,
    pub content: String,
    pub sources: Vec<SourceRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    pub page_number: String,
    pub image_path: String,
    pub match_percent: u8,
}

pub(crate) fn build_status_view(status: ConnectionStatus, current_page: u32) -> StatusView {
    let (badge, headline) = match status {
        ConnectionStatus::Disconnected => ("Disconnected", "Inksight Offline"),
        ConnectionStatus::Connected => ("Waiting", "Ready to Scan"),
        ConnectionStatus::Scanning => ("Scanning", "Scanning in Progress"),
        ConnectionStatus::Processing => ("Processing", "Processing Content"),
        ConnectionStatus::Finished => ("Finished", "Scan Complete"),
    };
    let detail = match status {
        ConnectionStatus::Disconnected => {
            "Please check your Inksight connection and try again.".to_string()
        }
        ConnectionStatus::Connected => {
            "Your Inksight is connected and ready to begin scanning.".to_string()
        }
        ConnectionStatus::Scanning => {
            format!("Currently scanning page {current_page} of your document.")
        }
        ConnectionStatus::Processing => {
            format!("Processing page {current_page}. Converting to interactive content.")
        }
        ConnectionStatus::Finished => {
            "Your document has been successfully processed and is ready to view.".to_string()
        }
    };
    let page = matches!(
        status,
        ConnectionStatus::Scanning | ConnectionStatus::Processing
    )
    .then_some(current_page);

    let scanned = matches!(
        status,
        ConnectionStatus::Scanning | ConnectionStatus::Processing | ConnectionStatus::Finished
    );
    let processed = matches!(
        status,
        ConnectionStatus::Processing | ConnectionStatus::Finished
    );
    let timeline = vec![
        TimelineStep {
            label: "Connect",
            reached: status != ConnectionStatus::Disconnected,
        },
        TimelineStep {
            label: "Scan",
            reached: scanned,
        },
        TimelineStep {
            label: "Process",
            reached: processed,
        },
        TimelineStep {
            label: "Complete",
            reached: status == ConnectionStatus::Finished,
        },
    ];

    StatusView {
        status,
        badge,
        headline,
        detail,
        page,
        timeline,
    }
}

pub(crate) fn build_chat_view(messages: &[ChatMessage], pending: Option<&PendingReply>) -> ChatView {
    let messages = messages
        .iter()
        .map(|message| MessageRow {
            role: message.role,
            content: message.content.clone(),
            sources: source_rows(message.source_images.as_deref()),
        })
        .collect();

    ChatView {
        messages,
        streaming: pending.map(|reply| reply.content.clone()),
        streaming_sources: source_rows(pending.and_then(|reply| reply.source_images.as_deref())),
        thinking: pending.is_some_and(|reply| reply.content.is_empty()),
        input_enabled: pending.is_none(),
    }
}

fn source_rows(images: Option<&[SourceImage]>) -> Vec<SourceRow> {
    images
        .unwrap_or_default()
        .iter()
        .filter(|image| image.score >= RELEVANCE_THRESHOLD)
        .map(|image| SourceRow {
            page_number: image.page_number.clone(),
            image_path: image.image_path.clone(),
            match_percent: (image.score.clamp(0.0, 1.0) * 100.0).round() as u8,
        })
        .collect()
}
