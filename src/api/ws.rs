// =============================================================================
// WebSocket Stream Handler
// =============================================================================
//
// Clients connect to `/api/v1/stream` and send one text frame holding either
// a single-symbol request (`{"symbol": ...}`) or a batch (`{"symbols": [...]}`).
// From then on every KlineEvent of the subscription is pushed as a JSON text
// frame. A rejected request gets one error frame and a close.
//
// The subscription is released when the socket closes, errors, or the
// client stops reading long enough for the broadcast channel to close.
// =============================================================================

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::error::{EngineError, EngineResult};
use crate::orchestrator::{BatchStreamRequest, StreamRequest, Subscription};

/// First client frame.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StreamCommand {
    Batch(BatchStreamRequest),
    Single(StreamRequest),
}

impl StreamCommand {
    pub fn parse(text: &str) -> EngineResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| EngineError::validation(format!("invalid stream request: {e}")))
    }
}

pub async fn stream_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

async fn handle_stream(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // ---- wait for the request frame ----
    let command = loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => break StreamCommand::parse(&text),
            Some(Ok(Message::Ping(data))) => {
                if sender.send(Message::Pong(data)).await.is_err() {
                    return;
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!("stream socket closed before a request arrived");
                return;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(error = %e, "stream socket error before request");
                return;
            }
        }
    };

    let subscribed = match command {
        Ok(StreamCommand::Single(request)) => state.orchestrator.subscribe(request).await,
        Ok(StreamCommand::Batch(request)) => state.orchestrator.subscribe_batch(request).await,
        Err(e) => Err(e),
    };
    let mut subscription = match subscribed {
        Ok(sub) => sub,
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "stream request rejected");
            let body = json!({ "type": "error", "error": e.kind(), "message": e.to_string() });
            let _ = sender.send(Message::Text(body.to_string())).await;
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    info!(id = %subscription.id(), keys = subscription.keys().len(), "stream client subscribed");

    pump(&mut subscription, &mut sender, &mut receiver).await;

    subscription.unsubscribe();
    info!(id = %subscription.id(), "stream client disconnected");
}

async fn pump<S, R>(subscription: &mut Subscription, sender: &mut S, receiver: &mut R)
where
    S: futures_util::Sink<Message, Error = axum::Error> + Unpin,
    R: futures_util::Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        tokio::select! {
            event = subscription.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(symbol = event.symbol(), error = %e, "failed to serialise kline event");
                            continue;
                        }
                    };
                    if let Err(e) = sender.send(Message::Text(text)).await {
                        debug!(error = %e, "stream send failed, disconnecting");
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(id = %subscription.id(), skipped, "stream client lagging, oldest events dropped");
                }
                Err(RecvError::Closed) => return,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(_))) | None => return,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "stream socket receive error");
                    return;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_dispatch_by_shape() {
        let single = StreamCommand::parse(r#"{"symbol":"BTCUSDT","interval":"1m","indicators":{"rsi":{}}}"#).unwrap();
        assert!(matches!(single, StreamCommand::Single(ref r) if r.symbol == "BTCUSDT" && !r.closed_only));

        let batch = StreamCommand::parse(r#"{"symbols":["BTCUSDT","ETHUSDT"],"interval":"5m","closedOnly":true}"#).unwrap();
        assert!(matches!(batch, StreamCommand::Batch(ref r) if r.symbols.len() == 2 && r.closed_only));
    }

    #[test]
    fn bad_command_is_validation() {
        let err = StreamCommand::parse(r#"{"interval":"1m"}"#).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }
}
