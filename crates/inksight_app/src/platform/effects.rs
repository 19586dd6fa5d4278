use std::ops::ControlFlow;
use std::sync::{mpsc, Arc};

use inksight_core::{ChatMessage, Effect, LifecycleAction, Msg, Role, SourceImage};
use inksight_engine::{
    ChatFrame, ChatRequest, EngineConfig, EngineError, EngineEvent, EngineHandle, EventSink,
    FailureKind, HistoryEntry, HistoryRole, StatusAction,
};
use inksight_logging::{ink_debug, ink_info, ink_warn};

/// Executes core effects against the engine.
pub struct EffectRunner {
    engine: EngineHandle,
    model: Option<String>,
}

impl EffectRunner {
    pub fn new(
        config: EngineConfig,
        model: Option<String>,
        msg_tx: mpsc::Sender<Msg>,
    ) -> Result<Self, EngineError> {
        let engine = EngineHandle::new(config, Arc::new(MsgSink { msg_tx }))?;
        Ok(Self { engine, model })
    }

    /// Breaks once an [`Effect::Exit`] has been seen.
    pub fn enqueue(&self, effects: Vec<Effect>) -> ControlFlow<()> {
        let mut flow = ControlFlow::Continue(());
        for effect in effects {
            match effect {
                Effect::OpenStatusChannel => self.engine.open_status(),
                Effect::CloseStatusChannel => self.engine.close_status(),
                Effect::NavigateTo(view) => ink_info!("Navigating to {:?}", view),
                Effect::SendQuery {
                    send_id,
                    query,
                    history,
                } => {
                    ink_info!(
                        "SendQuery send_id={} query_len={} history={}",
                        send_id,
                        query.len(),
                        history.len()
                    );
                    self.engine.send_chat(
                        send_id,
                        ChatRequest {
                            query,
                            history: history.iter().map(history_entry).collect(),
                            model: self.model.clone(),
                        },
                    );
                }
                Effect::CancelQuery { send_id } => self.engine.cancel_chat(send_id),
                Effect::Exit => flow = ControlFlow::Break(()),
            }
        }
        flow
    }

    pub fn shutdown(mut self) {
        self.engine.shutdown();
    }
}

struct MsgSink {
    msg_tx: mpsc::Sender<Msg>,
}

impl EventSink for MsgSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.msg_tx.send(map_event(event));
    }
}

fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::StatusOpened => Msg::StatusChannelOpened,
        EngineEvent::Status(status) => Msg::Lifecycle {
            action: map_action(status.action),
            page_number: status.page_number,
        },
        EngineEvent::StatusClosed { error } => {
            if let Some(err) = error {
                ink_warn!("Status channel lost: {}", err);
            }
            Msg::StatusChannelClosed
        }
        EngineEvent::Chat { send_id, frame } => match frame {
            ChatFrame::SourceImages(images) => Msg::SourceImagesReceived {
                send_id,
                images: images.into_iter().map(source_image).collect(),
            },
            ChatFrame::Response(content) => Msg::ResponseDelta { send_id, content },
        },
        EngineEvent::ChatCompleted { send_id, result } => match result {
            Ok(summary) => {
                ink_debug!(
                    "Reply send_id={} frames={} skipped={}",
                    send_id,
                    summary.frames,
                    summary.skipped
                );
                Msg::ReplyFinished { send_id }
            }
            Err(err) if err.kind == FailureKind::Cancelled => Msg::ReplyCancelled { send_id },
            Err(err) => {
                ink_warn!("Reply send_id={} failed: {}", send_id, err);
                Msg::ReplyFailed { send_id }
            }
        },
    }
}

fn map_action(action: StatusAction) -> LifecycleAction {
    match action {
        StatusAction::Start => LifecycleAction::Start,
        StatusAction::Scanning => LifecycleAction::Scanning,
        StatusAction::Processing => LifecycleAction::Processing,
        StatusAction::End => LifecycleAction::End,
        StatusAction::Other(other) => LifecycleAction::Unrecognized(other),
    }
}

fn source_image(image: inksight_engine::SourceImage) -> SourceImage {
    SourceImage {
        page_number: image.page_number,
        image_path: image.image_path,
        score: image.score,
    }
}

fn history_entry(message: &ChatMessage) -> HistoryEntry {
    HistoryEntry {
        role: match message.role {
            Role::User => HistoryRole::User,
            Role::Assistant => HistoryRole::Assistant,
        },
        content: message.content.clone(),
    }
}
