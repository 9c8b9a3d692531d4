use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── Board event types ────────────────────────────────────────────────

/// Emitted after a mutation has been persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum BoardEvent {
    BoardCreated {
        board_id: Uuid,
    },
    BoardUpdated {
        board_id: Uuid,
    },
    BoardArchived {
        board_id: Uuid,
        archived: bool,
    },
    BoardDeleted {
        board_id: Uuid,
    },
    ListsChanged {
        board_id: Uuid,
    },
    CardsChanged {
        board_id: Uuid,
        list_id: Uuid,
    },
    CardMoved {
        board_id: Uuid,
        card_id: Uuid,
        from_list_id: Uuid,
        to_list_id: Uuid,
        position: i32,
    },
    BoardsImported {
        imported: usize,
    },
}

impl BoardEvent {
    /// The board this event concerns. `None` for events that span boards.
    pub fn board_id(&self) -> Option<Uuid> {
        match self {
            BoardEvent::BoardCreated { board_id }
            | BoardEvent::BoardUpdated { board_id }
            | BoardEvent::BoardArchived { board_id, .. }
            | BoardEvent::BoardDeleted { board_id }
            | BoardEvent::ListsChanged { board_id }
            | BoardEvent::CardsChanged { board_id, .. }
            | BoardEvent::CardMoved { board_id, .. } => Some(*board_id),
            BoardEvent::BoardsImported { .. } => None,
        }
    }
}

// ── Subscription filter ──────────────────────────────────────────────

/// Which events a socket receives.
///
/// Set from the `?board=<id>` query on connect. A client can switch later by
/// sending `{"board": "<id>"}`, or `{"board": null}` to follow every board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct WsFilter {
    #[serde(default)]
    pub board: Option<Uuid>,
}

impl WsFilter {
    pub fn matches(&self, event: &BoardEvent) -> bool {
        match (self.board, event.board_id()) {
            (Some(wanted), Some(board_id)) => wanted == board_id,
            _ => true,
        }
    }
}

// ── WebSocket handler ────────────────────────────────────────────────

/// Upgrade and stream events from `tx` that pass `filter`.
pub async fn ws_handler_with_sender(
    ws: WebSocketUpgrade,
    filter: WsFilter,
    tx: broadcast::Sender<BoardEvent>,
) -> impl IntoResponse {
    let rx = tx.subscribe();
    ws.on_upgrade(move |socket| run_socket_loop(socket, filter, rx))
}

/// Forward matching events until the client leaves or stops answering pings.
async fn run_socket_loop(
    socket: WebSocket,
    mut filter: WsFilter,
    mut rx: broadcast::Receiver<BoardEvent>,
) {
    let (mut sender, mut receiver) = socket.split();
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await;
    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;

    loop {
        let outgoing = tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    debug!("WebSocket client stopped answering pings");
                    break;
                }
                awaiting_pong = true;
                Message::Ping(Default::default())
            }

            result = rx.recv() => match result {
                Ok(event) if filter.matches(&event) => match encode(&event) {
                    Some(msg) => msg,
                    None => continue,
                },
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
                // The client refetches the board on its next read.
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "WebSocket client lagged behind board events");
                    continue;
                }
            },

            msg = receiver.next() => match msg {
                Some(Ok(Message::Pong(_))) => {
                    last_pong = Instant::now();
                    awaiting_pong = false;
                    continue;
                }
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<WsFilter>(text.as_str()) {
                        Ok(next) => {
                            debug!(board = ?next.board, "WebSocket client changed subscription");
                            filter = next;
                        }
                        Err(e) => warn!(error = %e, "Ignoring malformed WebSocket message"),
                    }
                    continue;
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            },
        };
        if sender.send(outgoing).await.is_err() {
            break;
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

fn encode(event: &BoardEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!(error = %e, "Failed to serialize board event");
            None
        }
    }
}

// ── Broadcast helper ─────────────────────────────────────────────────

/// Hand an event to every connected socket. No subscribers is not an error.
pub fn broadcast_event(tx: &broadcast::Sender<BoardEvent>, event: BoardEvent) {
    let _ = tx.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moved(board_id: Uuid) -> BoardEvent {
        BoardEvent::CardMoved {
            board_id,
            card_id: Uuid::nil(),
            from_list_id: Uuid::nil(),
            to_list_id: Uuid::nil(),
            position: 3,
        }
    }

    #[test]
    fn test_board_event_is_tagged() {
        let board_id = Uuid::new_v4();
        let json = serde_json::to_string(&BoardEvent::BoardDeleted { board_id }).unwrap();
        assert!(json.contains("\"type\":\"BoardDeleted\""));
        assert!(json.contains("\"data\""));
        assert!(json.contains(&board_id.to_string()));
    }

    #[test]
    fn test_card_moved_serialization() {
        let msg = moved(Uuid::nil());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"CardMoved\""));
        assert!(json.contains("\"position\":3"));
        let back: BoardEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_filter_keeps_only_watched_board() {
        let watched = Uuid::new_v4();
        let filter = WsFilter {
            board: Some(watched),
        };
        assert!(filter.matches(&moved(watched)));
        assert!(filter.matches(&BoardEvent::ListsChanged { board_id: watched }));
        assert!(!filter.matches(&moved(Uuid::new_v4())));
        assert!(!filter.matches(&BoardEvent::BoardDeleted {
            board_id: Uuid::new_v4()
        }));
    }

    #[test]
    fn test_cross_board_events_reach_every_filter() {
        let imported = BoardEvent::BoardsImported { imported: 2 };
        assert_eq!(imported.board_id(), None);
        assert!(WsFilter::default().matches(&imported));
        assert!(
            WsFilter {
                board: Some(Uuid::new_v4())
            }
            .matches(&imported)
        );
    }

    #[test]
    fn test_unfiltered_socket_sees_everything() {
        let filter = WsFilter::default();
        assert!(filter.matches(&moved(Uuid::new_v4())));
        assert!(filter.matches(&BoardEvent::BoardCreated {
            board_id: Uuid::new_v4()
        }));
    }

    #[test]
    fn test_subscription_message_parses() {
        let board = Uuid::new_v4();
        let filter: WsFilter =
            serde_json::from_str(&format!(r#"{{"board":"{}"}}"#, board)).unwrap();
        assert_eq!(filter.board, Some(board));
        let all: WsFilter = serde_json::from_str(r#"{"board":null}"#).unwrap();
        assert_eq!(all, WsFilter::default());
        assert!(serde_json::from_str::<WsFilter>(r#"{"board":"nope"}"#).is_err());
    }

    #[test]
    fn test_encode_produces_text_frame() {
        let board_id = Uuid::new_v4();
        match encode(&BoardEvent::ListsChanged { board_id }) {
            Some(Message::Text(text)) => assert!(text.contains("ListsChanged")),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[test]
    fn test_broadcast_reaches_subscribers() {
        let (tx, mut rx) = broadcast::channel(4);
        let board_id = Uuid::new_v4();
        broadcast_event(&tx, BoardEvent::ListsChanged { board_id });
        assert_eq!(
            rx.try_recv().unwrap(),
            BoardEvent::ListsChanged { board_id }
        );
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let (tx, rx) = broadcast::channel::<BoardEvent>(4);
        drop(rx);
        broadcast_event(&tx, BoardEvent::BoardCreated { board_id: Uuid::nil() });
    }
}
