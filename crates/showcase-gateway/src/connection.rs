use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use showcase_types::api::Claims;
use showcase_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How much of an unparseable command is echoed into the log.
const RAW_PREVIEW_CHARS: usize = 200;

type Subscriptions = Arc<RwLock<HashSet<String>>>;

/// Per-connection state shared between the send and receive halves.
struct ConnectionState {
    subscriptions: Subscriptions,
    /// Set once the client identified: (user_id, conn_id)
    identity: tokio::sync::Mutex<Option<(Uuid, Uuid)>>,
    direct_tx: mpsc::UnboundedSender<GatewayEvent>,
}

/// Handle one WebSocket connection to the change feed.
///
/// Anonymous clients may subscribe to configuration sections right away;
/// `Identify` additionally routes follow notifications for that user here.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    if let Some(msg) = encode(&GatewayEvent::Ready { user_id: None }) {
        if sender.send(msg).await.is_err() {
            return;
        }
    }

    // Subscribe before reading any command so no update slips between
    // Subscribe and the first recv().
    let mut broadcast_rx = dispatcher.subscribe();
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel();

    let state = Arc::new(ConnectionState {
        subscriptions: Arc::new(RwLock::new(HashSet::new())),
        identity: tokio::sync::Mutex::new(None),
        direct_tx,
    });

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts + targeted events -> client, with heartbeat
    let send_subscriptions = state.subscriptions.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    };

                    if !should_forward(&event, &send_subscriptions) {
                        continue;
                    }

                    if let Some(msg) = encode(&event) {
                        if sender.send(msg).await.is_err() {
                            break;
                        }
                    }
                }
                result = direct_rx.recv() => {
                    let Some(event) = result else { break };
                    if let Some(msg) = encode(&event) {
                        if sender.send(msg).await.is_err() {
                            break;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let recv_state = state.clone();
    let recv_dispatcher = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&recv_dispatcher, &recv_state, &jwt_secret, cmd).await;
                    }
                    Err(e) => {
                        warn!("bad gateway command: {} -- raw: {}", e, preview(&text, RAW_PREVIEW_CHARS));
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let identity = *state.identity.lock().await;
    if let Some((user_id, conn_id)) = identity {
        dispatcher.unregister_user_channel(user_id, conn_id).await;
        info!("{} disconnected from gateway", user_id);
    } else {
        debug!("anonymous client disconnected from gateway");
    }
}

async fn handle_command(
    dispatcher: &Dispatcher,
    state: &ConnectionState,
    jwt_secret: &str,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::Identify { token } => {
            let Some(claims) = verify_token(&token, jwt_secret) else {
                warn!("gateway client sent an invalid token");
                return;
            };

            let mut identity = state.identity.lock().await;
            if let Some((previous, conn_id)) = identity.take() {
                dispatcher.unregister_user_channel(previous, conn_id).await;
            }

            let conn_id = dispatcher
                .register_user_channel(claims.sub, state.direct_tx.clone())
                .await;
            *identity = Some((claims.sub, conn_id));
            info!("{} ({}) identified on gateway", claims.username, claims.sub);

            let _ = state.direct_tx.send(GatewayEvent::Ready {
                user_id: Some(claims.sub),
            });
        }

        GatewayCommand::Subscribe { sections } => {
            debug!("gateway client subscribing to {} sections", sections.len());
            {
                let mut subs = state
                    .subscriptions
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *subs = sections.iter().cloned().collect();
            }
            // Acknowledge only after the set is updated: every later broadcast passes the filter.
            let _ = state.direct_tx.send(GatewayEvent::Subscribed { sections });
        }

        GatewayCommand::Unsubscribe { sections } => {
            let mut subs = state
                .subscriptions
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for section in &sections {
                subs.remove(section);
            }
        }
    }
}

/// Section-scoped events only reach connections subscribed to that section.
/// Everything else is delivered through the per-connection direct channel.
fn should_forward(event: &GatewayEvent, subscriptions: &Subscriptions) -> bool {
    event.section().is_some_and(|section| {
        subscriptions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(section)
    })
}

fn verify_token(token: &str, jwt_secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

/// At most `max_chars` characters of `text`, cut on a char boundary.
fn preview(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(end, _)| &text[..end])
}

fn encode(event: &GatewayEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            warn!("failed to encode gateway event: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subs(sections: &[&str]) -> Subscriptions {
        Arc::new(RwLock::new(sections.iter().map(|s| s.to_string()).collect()))
    }

    fn update(section: &str) -> GatewayEvent {
        GatewayEvent::ConfigUpdate {
            section: section.into(),
            value: serde_json::json!({}),
            revision: 1,
        }
    }

    #[test]
    fn forwards_only_subscribed_sections() {
        let subscriptions = subs(&["hero"]);
        assert!(should_forward(&update("hero"), &subscriptions));
        assert!(!should_forward(&update("footer"), &subscriptions));
    }

    #[test]
    fn follow_events_are_not_broadcast_to_everyone() {
        let event = GatewayEvent::FollowCreate {
            follower_id: Uuid::new_v4(),
            followee_id: Uuid::new_v4(),
        };
        assert!(!should_forward(&event, &subs(&["hero"])));
    }

    #[test]
    fn preview_cuts_on_char_boundary() {
        let text = format!("{}é{}", "a".repeat(199), "b".repeat(10));
        let cut = preview(&text, 200);
        assert_eq!(cut.chars().count(), 200);
        assert!(cut.ends_with('é'));

        assert_eq!(preview("短い", 200), "短い");
        assert_eq!(preview("", 200), "");
    }

    #[test]
    fn invalid_tokens_are_rejected() {
        assert!(verify_token("not-a-jwt", "secret").is_none());
    }
}
