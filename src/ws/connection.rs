//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::{SubscriptionManager, Topic};
use crate::auth::Caller;
use crate::domain::PoolEvent;
use crate::service::PoolService;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<PoolEvent>,
    pool_service: Arc<PoolService>,
    caller: Caller,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response =
                            handle_text_message(text.as_str(), &mut subs, &pool_service, &caller).await;
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(pool_event) => {
                        if subs.matches(pool_event.pool_code()) {
                            let msg = WsMessage::new(
                                uuid::Uuid::new_v4().to_string(),
                                WsMessageType::Event,
                                serde_json::to_value(&pool_event).unwrap_or_default(),
                            );
                            let json = serde_json::to_string(&msg).unwrap_or_default();
                            if ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, user_id = %caller.user_id, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!(user_id = %caller.user_id, "ws connection closed");
}

/// Handles a text message from the client, returning an optional JSON response.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    pool_service: &PoolService,
    caller: &Caller,
) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error("", 400, "malformed JSON")).ok();
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return serde_json::to_string(&WsMessage::error(msg.id, 404, "unknown command")).ok();
    };

    let response = match command {
        WsCommand::Subscribe { pool_codes } => {
            let mut subscribed = Vec::new();
            let mut rejected = Vec::new();
            for raw in pool_codes {
                let Some(topic) = Topic::parse(&raw) else {
                    rejected.push(raw);
                    continue;
                };
                if may_subscribe(topic, pool_service, caller).await {
                    subs.subscribe(topic);
                    subscribed.push(topic.to_string());
                } else {
                    rejected.push(raw);
                }
            }
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "subscribed": subscribed,
                    "rejected": rejected,
                    "topics": subs.topics(),
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
        WsCommand::Unsubscribe { pool_codes } => {
            let unsubscribed: Vec<String> = pool_codes
                .iter()
                .filter_map(|raw| Topic::parse(raw))
                .filter(|topic| subs.unsubscribe(*topic))
                .map(|topic| topic.to_string())
                .collect();
            WsMessage::new(
                msg.id,
                WsMessageType::Response,
                serde_json::json!({
                    "unsubscribed": unsubscribed,
                    "topics": subs.topics(),
                    "count": subs.count(),
                    "wildcard": subs.is_subscribed_all(),
                }),
            )
        }
    };
    serde_json::to_string(&response).ok()
}

/// Operators may hold any topic; other callers only pools they joined.
async fn may_subscribe(topic: Topic, pool_service: &PoolService, caller: &Caller) -> bool {
    if caller.is_operator() {
        return true;
    }
    match topic {
        Topic::Pool(code) => pool_service
            .registry()
            .membership(code, &caller.user_id)
            .await
            .is_some(),
        Topic::All | Topic::City(_) => false,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::auth::Role;
    use crate::domain::{CityCatalog, EventBus, MembershipLimits, PoolDraft, PoolRegistry};
    use crate::service::ServiceSettings;

    async fn service_with_pool() -> PoolService {
        let registry = Arc::new(PoolRegistry::new(
            Arc::new(CityCatalog::builtin()),
            MembershipLimits::default(),
        ));
        let Ok(_) = registry.create_pool("34", PoolDraft::new("Plumber", dec!(99))).await else {
            panic!("create failed");
        };
        let Ok(_) = registry.join_pool("34001", "member", 1, 7).await else {
            panic!("join failed");
        };
        PoolService::new(registry, EventBus::new(16), ServiceSettings::default())
    }

    fn command(name: &str, topics: &[&str]) -> String {
        serde_json::json!({
            "id": "c1",
            "type": "command",
            "timestamp": chrono::Utc::now(),
            "payload": {"command": name, "pool_codes": topics},
        })
        .to_string()
    }

    async fn send(
        text: &str,
        subs: &mut SubscriptionManager,
        service: &PoolService,
        caller: &Caller,
    ) -> serde_json::Value {
        let Some(reply) = handle_text_message(text, subs, service, caller).await else {
            panic!("no reply");
        };
        let Ok(value) = serde_json::from_str(&reply) else {
            panic!("reply is not JSON");
        };
        value
    }

    #[tokio::test]
    async fn members_get_only_their_pools() {
        let service = service_with_pool().await;
        let caller = Caller::new("member", Role::User);
        let mut subs = SubscriptionManager::new();

        let reply = send(
            &command("subscribe", &["34001", "34002", "34", "*", "bad"]),
            &mut subs,
            &service,
            &caller,
        )
        .await;
        assert_eq!(reply.pointer("/payload/subscribed"), Some(&serde_json::json!(["34001"])));
        assert_eq!(
            reply.pointer("/payload/rejected"),
            Some(&serde_json::json!(["34002", "34", "*", "bad"]))
        );
        assert_eq!(reply.pointer("/payload/wildcard"), Some(&serde_json::json!(false)));
    }

    #[tokio::test]
    async fn operators_may_subscribe_broadly() {
        let service = service_with_pool().await;
        let caller = Caller::new("op", Role::Operator);
        let mut subs = SubscriptionManager::new();

        let _ = send(&command("subscribe", &["*", "06"]), &mut subs, &service, &caller).await;
        assert!(subs.is_subscribed_all());

        let reply = send(&command("unsubscribe", &["*"]), &mut subs, &service, &caller).await;
        assert_eq!(reply.pointer("/payload/topics"), Some(&serde_json::json!(["06"])));
    }

    #[tokio::test]
    async fn malformed_messages_get_errors() {
        let service = service_with_pool().await;
        let caller = Caller::new("member", Role::User);
        let mut subs = SubscriptionManager::new();

        let reply = send("not json", &mut subs, &service, &caller).await;
        assert_eq!(reply.get("type"), Some(&serde_json::json!("error")));

        let reply = send(&command("rename", &[]), &mut subs, &service, &caller).await;
        assert_eq!(reply.pointer("/payload/code"), Some(&serde_json::json!(404)));
    }
}
