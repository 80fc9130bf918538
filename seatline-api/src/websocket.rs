//! Observer endpoint. Each connection registers with the observer registry
//! and receives every bus message as a text frame, in bus order. Inbound
//! text frames are echoed back as `ACK:{text}`.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use seatline_core::ObserverRegistry;
use std::sync::Arc;
use tracing::{debug, info};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let observers = state.observers.clone();
    ws.on_upgrade(move |socket: WebSocket| async move {
        let (sender, receiver) = socket.split();
        serve_observer(sender, receiver, observers).await;
    })
}

/// Drives one observer connection until the client goes away or the
/// registry drops it.
pub(crate) async fn serve_observer<S, R, E>(mut sender: S, mut receiver: R, observers: Arc<ObserverRegistry>)
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    let (observer_id, mut events) = observers.register().await;
    info!("Observer {} connected", observer_id);

    loop {
        tokio::select! {
            biased;

            event = events.recv() => {
                let Some(message) = event else {
                    debug!("Observer {} dropped by registry", observer_id);
                    break;
                };
                if sender.send(Message::Text(message.as_ref().into())).await.is_err() {
                    break;
                }
            }
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let ack = format!("ACK:{}", text.as_str());
                    if sender.send(Message::Text(ack.into())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    observers.deregister(observer_id).await;
    info!("Observer {} disconnected", observer_id);
}
