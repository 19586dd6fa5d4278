use std::time::Duration;

use futures_util::StreamExt;
use inksight_logging::{ink_debug, ink_info};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::frame::{FrameDecoder, DEFAULT_MAX_LINE_BYTES};
use crate::{
    ChatError, ChatRequest, EngineEvent, EventSink, FailureKind, SendId, StreamSummary,
};

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub endpoint: String,
    pub connect_timeout: Duration,
    /// Whole-request limit, body included. `None` lets long answers stream.
    pub request_timeout: Option<Duration>,
    /// Longer lines in the reply body are skipped.
    pub max_line_bytes: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/api/chat".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Posts `request` and emits one [`EngineEvent::Chat`] per decoded frame.
    async fn stream_reply(
        &self,
        send_id: SendId,
        request: &ChatRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, ChatError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestChatTransport {
    settings: ChatSettings,
}

impl ReqwestChatTransport {
    pub fn new(settings: ChatSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, ChatError> {
        let mut builder = reqwest::Client::builder().connect_timeout(self.settings.connect_timeout);
        if let Some(timeout) = self.settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|err| ChatError::new(FailureKind::Network, err.to_string()))
    }
}

#[async_trait::async_trait]
impl ChatTransport for ReqwestChatTransport {
    async fn stream_reply(
        &self,
        send_id: SendId,
        request: &ChatRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<StreamSummary, ChatError> {
        let url = reqwest::Url::parse(&self.settings.endpoint)
            .map_err(|err| ChatError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let body = serde_json::to_vec(request)
            .map_err(|err| ChatError::new(FailureKind::InvalidRequest, err.to_string()))?;
        let client = self.build_client()?;

        ink_info!(
            "Chat send_id={} query_len={} history={} -> {}",
            send_id,
            request.query.len(),
            request.history.len(),
            url
        );

        let pending = client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .body(body)
            .send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChatError::cancelled()),
            result = pending => result.map_err(map_reqwest_error)?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        if status == StatusCode::NO_CONTENT {
            return Err(ChatError::new(FailureKind::MissingBody, status.to_string()));
        }

        let mut decoder = FrameDecoder::with_max_line(self.settings.max_line_bytes);
        let mut summary = StreamSummary::default();
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ChatError::cancelled()),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(map_reqwest_error)?;
            summary.bytes += chunk.len() as u64;
            for frame in decoder.push(&chunk) {
                summary.frames += 1;
                sink.emit(EngineEvent::Chat { send_id, frame });
            }
        }
        for frame in decoder.finish() {
            summary.frames += 1;
            sink.emit(EngineEvent::Chat { send_id, frame });
        }
        summary.skipped = decoder.skipped();

        ink_debug!(
            "Chat send_id={} done frames={} skipped={} bytes={}",
            send_id,
            summary.frames,
            summary.skipped,
            summary.bytes
        );
        Ok(summary)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ChatError {
    if err.is_timeout() {
        return ChatError::new(FailureKind::Timeout, err.to_string());
    }
    ChatError::new(FailureKind::Network, err.to_string())
}
