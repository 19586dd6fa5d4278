use std::time::Duration;

use futures_util::StreamExt;
use inksight_logging::{ink_debug, ink_info, ink_warn};
use serde::{Deserialize, Deserializer};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::{EngineEvent, EventSink, StatusAction, StatusError, StatusEvent};

type StatusSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct StatusSettings {
    pub url: String,
    pub connect_timeout: Duration,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws/frontend".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Deserialize)]
struct RawStatusFrame {
    #[serde(default)]
    action: Option<String>,
    #[serde(default, deserialize_with = "lenient_page_number")]
    page_number: Option<u32>,
}

/// Decodes one text frame from the status socket.
pub fn decode_status_frame(text: &str) -> Result<StatusEvent, serde_json::Error> {
    let raw: RawStatusFrame = serde_json::from_str(text)?;
    Ok(StatusEvent {
        action: StatusAction::from_wire(raw.action.as_deref()),
        page_number: raw.page_number,
    })
}

fn lenient_page_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        serde_json::Value::Number(number) => number
            .as_u64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|page| page.fract() == 0.0 && *page >= 0.0)
                    .map(|page| page as u64)
            })
            .and_then(|page| u32::try_from(page).ok()),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }))
}

/// Runs the status channel until the peer closes it or `cancel` fires.
///
/// Emits [`EngineEvent::StatusOpened`] once the handshake completes and one
/// [`EngineEvent::Status`] per decodable frame. The socket is owned here and
/// closed here, whichever way the loop ends.
pub async fn run_status_channel(
    settings: &StatusSettings,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) -> Result<(), StatusError> {
    let url = url::Url::parse(&settings.url)
        .map_err(|err| StatusError::InvalidUrl(err.to_string()))?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(StatusError::InvalidUrl(format!(
            "unsupported scheme {}",
            url.scheme()
        )));
    }

    let connect = tokio::time::timeout(settings.connect_timeout, connect_async(url.as_str()));
    let mut socket = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(()),
        result = connect => match result {
            Err(_) => return Err(StatusError::Timeout),
            Ok(Err(err)) => return Err(StatusError::Connect(err.to_string())),
            Ok(Ok((socket, _response))) => socket,
        },
    };

    ink_info!("Status channel connected to {}", url);
    sink.emit(EngineEvent::StatusOpened);

    let outcome = pump(&mut socket, sink, cancel).await;

    if let Err(err) = socket.close(None).await {
        ink_debug!("Status socket close after shutdown: {}", err);
    }
    ink_info!("Status channel released");
    outcome
}

async fn pump(
    socket: &mut StatusSocket,
    sink: &dyn EventSink,
    cancel: &CancellationToken,
) -> Result<(), StatusError> {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            next = socket.next() => next,
        };
        match next {
            None => return Ok(()),
            Some(Ok(Message::Text(text))) => match decode_status_frame(&text) {
                Ok(event) => {
                    ink_debug!(
                        "Status event {:?} page={:?}",
                        event.action,
                        event.page_number
                    );
                    sink.emit(EngineEvent::Status(event));
                }
                Err(err) => {
                    ink_warn!("Skipping malformed status frame ({} bytes): {}", text.len(), err);
                }
            },
            Some(Ok(Message::Close(frame))) => {
                ink_debug!("Status peer closed: {:?}", frame);
                return Ok(());
            }
            Some(Ok(Message::Binary(data))) => {
                ink_debug!("Ignoring binary status frame ({} bytes)", data.len());
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(StatusError::Protocol(err.to_string())),
        }
    }
}
