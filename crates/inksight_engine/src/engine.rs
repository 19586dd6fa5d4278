use std::io;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use inksight_logging::{ink_debug, ink_info, ink_warn};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chat::{ChatSettings, ChatTransport, ReqwestChatTransport};
use crate::status::{run_status_channel, StatusSettings};
use crate::{ChatRequest, EngineEvent, EventSink, SendId};

/// How long shutdown waits for tasks to release their connections.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub status: StatusSettings,
    pub chat: ChatSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to build async runtime: {0}")]
    Runtime(io::Error),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(io::Error),
}

enum EngineCommand {
    OpenStatus,
    CloseStatus,
    SendChat { send_id: SendId, request: ChatRequest },
    CancelChat { send_id: SendId },
    Shutdown,
}

/// A spawned task together with the token that stops it.
struct Guarded {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Guarded {
    fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }
}

pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    worker: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig, sink: Arc<dyn EventSink>) -> Result<Self, EngineError> {
        let transport = Arc::new(ReqwestChatTransport::new(config.chat.clone()));
        Self::with_transport(config.status, transport, sink)
    }

    pub fn with_transport(
        status: StatusSettings,
        transport: Arc<dyn ChatTransport>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, EngineError> {
        let runtime = Runtime::new().map_err(EngineError::Runtime)?;
        let (cmd_tx, cmd_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("inksight-engine".to_string())
            .spawn(move || {
                let mut worker = Worker {
                    runtime,
                    root: CancellationToken::new(),
                    status_settings: status,
                    transport,
                    sink,
                    status: None,
                    chat: None,
                    draining: Vec::new(),
                };
                while let Ok(command) = cmd_rx.recv() {
                    if !worker.handle_command(command) {
                        break;
                    }
                }
                worker.shutdown();
            })
            .map_err(EngineError::Spawn)?;

        Ok(Self {
            cmd_tx,
            worker: Some(worker),
        })
    }

    pub fn open_status(&self) {
        let _ = self.cmd_tx.send(EngineCommand::OpenStatus);
    }

    pub fn close_status(&self) {
        let _ = self.cmd_tx.send(EngineCommand::CloseStatus);
    }

    pub fn send_chat(&self, send_id: SendId, request: ChatRequest) {
        let _ = self.cmd_tx.send(EngineCommand::SendChat { send_id, request });
    }

    pub fn cancel_chat(&self, send_id: SendId) {
        let _ = self.cmd_tx.send(EngineCommand::CancelChat { send_id });
    }

    /// Cancels every task and waits for the engine thread to finish.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.cmd_tx.send(EngineCommand::Shutdown);
            let _ = worker.join();
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    runtime: Runtime,
    root: CancellationToken,
    status_settings: StatusSettings,
    transport: Arc<dyn ChatTransport>,
    sink: Arc<dyn EventSink>,
    status: Option<Guarded>,
    chat: Option<(SendId, Guarded)>,
    /// Cancelled tasks still releasing their connections.
    draining: Vec<JoinHandle<()>>,
}

impl Worker {
    /// Returns false once the engine should stop.
    fn handle_command(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::OpenStatus => self.open_status(),
            EngineCommand::CloseStatus => {
                if let Some(status) = self.status.take() {
                    ink_info!("Closing status channel");
                    self.retire(status);
                }
            }
            EngineCommand::SendChat { send_id, request } => self.send_chat(send_id, request),
            EngineCommand::CancelChat { send_id } => {
                if self.chat.as_ref().is_some_and(|(id, _)| *id == send_id) {
                    if let Some((_, chat)) = self.chat.take() {
                        ink_info!("Cancelling chat send_id={}", send_id);
                        self.retire(chat);
                    }
                } else {
                    ink_debug!("Cancel for unknown send_id={}", send_id);
                }
            }
            EngineCommand::Shutdown => return false,
        }
        true
    }

    fn open_status(&mut self) {
        if self.status.as_ref().is_some_and(Guarded::is_live) {
            ink_debug!("Status channel already running");
            return;
        }
        let token = self.root.child_token();
        let settings = self.status_settings.clone();
        let sink = self.sink.clone();
        let task_token = token.clone();
        let task = self.runtime.spawn(async move {
            let result = run_status_channel(&settings, sink.as_ref(), &task_token).await;
            if let Err(err) = &result {
                ink_warn!("Status channel ended with error: {}", err);
            }
            sink.emit(EngineEvent::StatusClosed { error: result.err() });
        });
        self.status = Some(Guarded { token, task });
    }

    fn send_chat(&mut self, send_id: SendId, request: ChatRequest) {
        if let Some((previous, chat)) = self.chat.take() {
            if chat.is_live() {
                ink_warn!("Chat send_id={} superseded by send_id={}", previous, send_id);
            }
            self.retire(chat);
        }
        let token = self.root.child_token();
        let transport = self.transport.clone();
        let sink = self.sink.clone();
        let task_token = token.clone();
        let task = self.runtime.spawn(async move {
            let result = transport
                .stream_reply(send_id, &request, sink.as_ref(), &task_token)
                .await;
            if let Err(err) = &result {
                ink_warn!("Chat send_id={} failed: {}", send_id, err);
            }
            sink.emit(EngineEvent::ChatCompleted { send_id, result });
        });
        self.chat = Some((send_id, Guarded { token, task }));
    }

    fn retire(&mut self, guarded: Guarded) {
        guarded.token.cancel();
        self.draining.retain(|task| !task.is_finished());
        self.draining.push(guarded.task);
    }

    fn shutdown(self) {
        ink_info!("Engine shutting down");
        self.root.cancel();
        let mut tasks = self.draining;
        tasks.extend(self.status.map(|status| status.task));
        tasks.extend(self.chat.map(|(_, chat)| chat.task));
        self.runtime.block_on(async {
            for task in tasks {
                let _ = tokio::time::timeout(SHUTDOWN_GRACE, task).await;
            }
        });
    }
}
