use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::aggregate::{list_active, load_aggregate};
use crate::polls::PollError;
use crate::state::AppState;

use super::{ClientCommand, ErrorFrame, PollEvent, Subscription};

pub async fn websocket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_connection(socket, state))
}

async fn serve_connection(mut socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    let mut events = state.events.subscribe();
    let mut subscription = Subscription::default();
    debug!(%connection_id, "Realtime client connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let message = match incoming {
                    Some(Ok(message)) => message,
                    Some(Err(err)) => {
                        warn!(%connection_id, "Realtime socket error: {err}");
                        break;
                    }
                    None => break,
                };
                match message {
                    Message::Text(text) => {
                        let reply = handle_frame(&state, &mut subscription, text.as_str()).await;
                        if let Some(reply) = reply {
                            if send_event(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            received = events.recv() => match received {
                Ok(event) => {
                    if subscription.wants(&event) && send_event(&mut socket, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%connection_id, skipped, "Realtime client lagged; events dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    debug!(%connection_id, "Realtime client disconnected");
}

/// Applies one client frame and returns the direct reply, if any.
pub(crate) async fn handle_frame(
    state: &AppState,
    subscription: &mut Subscription,
    frame: &str,
) -> Option<PollEvent> {
    let command = match serde_json::from_str::<ClientCommand>(frame) {
        Ok(command) => command,
        Err(err) => {
            return Some(PollEvent::Error(ErrorFrame {
                message: format!("Unrecognised command: {err}"),
            }));
        }
    };

    match command {
        ClientCommand::JoinPoll { poll_id } => {
            subscription.join(poll_id);
            match load_aggregate(&state.database, poll_id, state.visibility).await {
                Ok(poll) => Some(PollEvent::PollData(poll)),
                Err(PollError::PollNotFound) => None,
                Err(err) => Some(storage_error(err)),
            }
        }
        ClientCommand::LeavePoll { poll_id } => {
            subscription.leave(poll_id);
            None
        }
        ClientCommand::RequestPolls => match list_active(&state.database).await {
            Ok(polls) => Some(PollEvent::PollsList(polls)),
            Err(err) => Some(storage_error(err)),
        },
    }
}

fn storage_error(err: PollError) -> PollEvent {
    error!("Realtime query failed: {err}");
    PollEvent::Error(ErrorFrame {
        message: "Failed to load polls".to_string(),
    })
}

async fn send_event(socket: &mut WebSocket, event: &PollEvent) -> Result<(), axum::Error> {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(err) => {
            error!(event = event.name(), "Failed to encode realtime event: {err}");
            return Ok(());
        }
    };
    socket.send(Message::Text(payload.into())).await
}
