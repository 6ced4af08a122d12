use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use serde_json::json;
use tracing::{debug, info, instrument};

use super::hub::{ChannelId, Subscription};
use super::messages::WsMessage;
use crate::screening::ScreeningId;
use crate::shared::{AppError, AppState};

/// WebSocket endpoint for live seat updates on one screening
///
/// GET /api/screenings/:id/ws
/// Auth runs in middleware before the upgrade; browsers pass ?token= there.
#[instrument(name = "screening_ws", skip(state, ws))]
pub async fn screening_ws(
    State(state): State<AppState>,
    Path(screening_id): Path<ScreeningId>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    state.registry.get_screening(screening_id)?;
    Ok(ws.on_upgrade(move |socket| run_screening_socket(state, screening_id, socket)))
}

/// WebSocket endpoint for the admin audit firehose
///
/// GET /admin/ws
#[instrument(name = "admin_ws", skip(state, ws))]
pub async fn admin_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_admin_socket(state, socket))
}

/// Subscribe-then-snapshot, then pump deltas until the client goes away.
///
/// The order matters: subscribing first means any delta committed between
/// snapshot and first receive is still delivered. A delta the snapshot
/// already reflects is harmless because seat updates carry absolute states.
/// When the hub drops us for falling behind, we resync from a fresh snapshot
/// instead of closing.
async fn run_screening_socket(state: AppState, screening_id: ScreeningId, mut socket: WebSocket) {
    let channel = ChannelId::Screening(screening_id);
    info!(screening_id = %screening_id, "Seat update subscriber connected");

    loop {
        let mut subscription = state.hub.subscribe(channel);

        let snapshot = match (
            state.registry.get_screening(screening_id),
            state.registry.seat_map(screening_id),
        ) {
            (Ok(screening), Ok(seats)) => json!({
                "screening": screening,
                "seats": seats,
            }),
            _ => break,
        };

        let text = WsMessage::snapshot(snapshot, subscription.joined_seq).to_json();
        if socket.send(Message::Text(text)).await.is_err() {
            state.hub.unsubscribe(channel, subscription.subscriber_id);
            break;
        }

        let resync = pump(&mut socket, &mut subscription).await;
        state.hub.unsubscribe(channel, subscription.subscriber_id);
        if !resync {
            break;
        }
        debug!(screening_id = %screening_id, "Subscriber fell behind, resyncing from snapshot");
    }

    let _ = socket.send(Message::Close(None)).await;
    info!(screening_id = %screening_id, "Seat update subscriber disconnected");
}

async fn run_admin_socket(state: AppState, mut socket: WebSocket) {
    info!("Audit firehose subscriber connected");

    loop {
        let mut subscription = state.hub.subscribe(ChannelId::Admin);

        let entries = state.audit.recent(50).await;
        let text = WsMessage::snapshot(json!({ "entries": entries }), subscription.joined_seq)
            .to_json();
        if socket.send(Message::Text(text)).await.is_err() {
            state.hub.unsubscribe(ChannelId::Admin, subscription.subscriber_id);
            break;
        }

        let resync = pump(&mut socket, &mut subscription).await;
        state
            .hub
            .unsubscribe(ChannelId::Admin, subscription.subscriber_id);
        if !resync {
            break;
        }
        debug!("Audit subscriber fell behind, resyncing from snapshot");
    }

    let _ = socket.send(Message::Close(None)).await;
    info!("Audit firehose subscriber disconnected");
}

/// Forwards hub messages to the socket until one side ends. Returns true if
/// the hub closed the queue (resync wanted), false if the client is gone.
async fn pump(socket: &mut WebSocket, subscription: &mut Subscription) -> bool {
    loop {
        tokio::select! {
            outbound = subscription.receiver.recv() => {
                match outbound {
                    Some(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            return false;
                        }
                    }
                    // Dropped by the hub for falling behind
                    None => return true,
                }
            }

            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => return false,
                    // Clients never drive state over the socket
                    Some(Ok(_)) => {}
                    Some(Err(_)) => return false,
                }
            }
        }
    }
}
