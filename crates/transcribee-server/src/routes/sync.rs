//! `/documents/sync/{id}/` — the document change-log websocket.
//!
//! Auth is resolved from query-string credentials before the upgrade
//! (browsers cannot set headers on a websocket handshake, `SPEC_FULL.md`
//! §4.5); once upgraded, the connection replays the backlog, then
//! multiplexes inbound writes, hub broadcasts, and a keepalive ping.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use uuid::Uuid;

use crate::auth::{self, credentials, AuthLevel};
use crate::state::AppState;

/// Policy-violation close code for a write attempt below `READ_WRITE`.
const WS_POLICY_VIOLATION: u16 = 1008;

/// Keepalive ping cadence for idle connections.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// `GET /documents/sync/{id}/`. Resolves auth before upgrading so a
/// rejected credential surfaces as a normal HTTP error response rather
/// than a socket that opens and immediately closes.
pub async fn handle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let mut conn = match state.conn().await {
        Ok(conn) => conn,
        Err(e) => return crate::error::AppError::from(e).into_response(),
    };
    let presented = match credentials::from_query(&params) {
        Ok(presented) => presented,
        Err(e) => return e.into_response(),
    };
    let ctx = match auth::resolve_document_auth(&mut conn, id, &presented).await {
        Ok(ctx) => ctx,
        Err(e) => return e.into_response(),
    };
    drop(conn);

    ws.on_upgrade(move |socket| run_connection(socket, state, id, ctx.level))
}

async fn run_connection(socket: WebSocket, state: AppState, document_id: Uuid, level: AuthLevel) {
    let (mut sender, mut receiver) = socket.split();

    let mut conn = match state.conn().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!(error = %e, "sync: failed to acquire connection for backlog");
            return;
        }
    };
    let backlog = match transcribee_db::repo::updates::backlog(&mut conn, document_id).await {
        Ok(backlog) => backlog,
        Err(e) => {
            tracing::error!(error = %e, "sync: failed to load backlog");
            return;
        }
    };
    drop(conn);

    let encoded = transcribee_sync::wire::encode_backlog(
        backlog.iter().map(|u| u.change_bytes.as_slice()),
    );
    if sender.send(Message::Binary(encoded)).await.is_err() {
        return;
    }

    let mut subscription = state.hub.subscribe(document_id).await;
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Binary(bytes))) => {
                        if level < AuthLevel::ReadWrite {
                            let _ = sender.send(Message::Close(Some(CloseFrame {
                                code: WS_POLICY_VIOLATION,
                                reason: "read-only credential attempted a write".into(),
                            }))).await;
                            break;
                        }

                        let mut conn = match state.conn().await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::error!(error = %e, "sync: failed to acquire connection for write");
                                break;
                            }
                        };
                        if let Err(e) = transcribee_db::repo::updates::append(&mut conn, document_id, &bytes).await {
                            tracing::error!(error = %e, "sync: failed to persist change");
                            break;
                        }
                        drop(conn);

                        state.hub.publish(document_id, subscription.id, bytes).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "sync: websocket read error");
                        break;
                    }
                }
            }

            broadcast = subscription.receiver.recv() => {
                match broadcast {
                    Some(bytes) => {
                        let frame = transcribee_sync::wire::Frame::Change(bytes).encode();
                        if sender.send(Message::Binary(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            _ = ping_interval.tick() => {
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.hub.unsubscribe(document_id, subscription.id).await;
}
