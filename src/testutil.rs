//! In-process stub backend for wire-level tests.
//!
//! Serves the REST surface the editor consumes plus the `/ws/shop-editor`
//! channel, records every client frame it receives, and answers lock
//! requests according to the configured behavior. Tests drive the real
//! client stack against it: real HTTP, real WebSocket, real codec.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::api::{AuthStatus, HistoryEntry, ShopRecord};
use crate::sync::protocol::{
    ClientMessage, EditorProtocol, FieldChange, LockDenial, LockGrant, ServerMessage,
};
use crate::sync::ShopId;

/// Scripted behavior for one stub instance
#[derive(Clone)]
pub struct StubOptions {
    /// Whether `GET /auth/status` reports an administrator
    pub admin: bool,
    /// Answer lock requests with `lock_failed` naming "Bob"
    pub deny_locks: bool,
    /// Drop the socket right after the handshake (reconnect tests)
    pub close_after_hello: bool,
    /// Broadcast `field_updated` back for every `update_field`
    pub echo_updates: bool,
}

impl Default for StubOptions {
    fn default() -> Self {
        Self {
            admin: true,
            deny_locks: false,
            close_after_hello: false,
            echo_updates: false,
        }
    }
}

struct StubState {
    options: StubOptions,
    shops: Mutex<Vec<ShopRecord>>,
    history: Mutex<Vec<HistoryEntry>>,
    received: Mutex<Vec<ClientMessage>>,
    patches: Mutex<Vec<(ShopId, String, Value)>>,
    connections: AtomicUsize,
}

/// Handle to a running stub backend
pub struct StubBackend {
    addr: SocketAddr,
    state: Arc<StubState>,
}

impl StubBackend {
    pub async fn spawn(options: StubOptions) -> Self {
        let state = Arc::new(StubState {
            options,
            shops: Mutex::new(seed_shops()),
            history: Mutex::new(seed_history()),
            received: Mutex::new(Vec::new()),
            patches: Mutex::new(Vec::new()),
            connections: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/api/v1/auth/status", get(auth_status))
            .route("/api/v1/admin/shops", get(list_shops))
            .route("/api/v1/admin/shops/:id", patch(patch_shop))
            .route("/api/v1/admin/shops/:id/history", get(shop_history))
            .route("/ws/shop-editor", get(ws_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws/shop-editor", self.addr)
    }

    /// Every client frame received over the channel, in arrival order
    pub fn received(&self) -> Vec<ClientMessage> {
        self.state.received.lock().clone()
    }

    /// Every REST PATCH applied, as (shop id, field, value)
    pub fn patches(&self) -> Vec<(ShopId, String, Value)> {
        self.state.patches.lock().clone()
    }

    /// Number of channel connections accepted so far
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Block until at least `count` client frames arrived, or panic after
    /// a generous timeout.
    pub async fn wait_for_received(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if self.state.received.lock().len() >= count {
                return;
            }
            if tokio::time::Instant::now() > deadline {
                panic!(
                    "timed out waiting for {} frames, got {:?}",
                    count,
                    self.received()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

fn seed_shops() -> Vec<ShopRecord> {
    vec![
        ShopRecord {
            id: 1,
            name: "Menya Taisho".to_string(),
            address: "1-2-3 Kanda".to_string(),
            business_hours: "11:00-21:00".to_string(),
            closed_days: "Wednesdays".to_string(),
            seats: "12 counter seats".to_string(),
            wait_time: Some(10),
            updated_at: Some("2026-08-01T09:00:00+00:00".to_string()),
            updated_by: Some("setup".to_string()),
        },
        ShopRecord {
            id: 2,
            name: "Ramen Jiro".to_string(),
            address: "2-16-4 Mita".to_string(),
            business_hours: "11:30-20:00".to_string(),
            closed_days: "Sundays".to_string(),
            seats: String::new(),
            wait_time: None,
            updated_at: None,
            updated_by: None,
        },
    ]
}

fn seed_history() -> Vec<HistoryEntry> {
    vec![HistoryEntry {
        changed_at: "2026-08-01T09:00:00+00:00".to_string(),
        field: "wait_time".to_string(),
        old_value: json!(30),
        new_value: json!(10),
        changed_by: "Alice".to_string(),
    }]
}

async fn auth_status(State(state): State<Arc<StubState>>) -> Json<AuthStatus> {
    Json(AuthStatus {
        authenticated: true,
        user_id: Some("admin-1".to_string()),
        username: Some("Me".to_string()),
        account_status: Some("active".to_string()),
        is_admin: state.options.admin,
    })
}

async fn list_shops(State(state): State<Arc<StubState>>) -> Json<Value> {
    let shops = state.shops.lock().clone();
    Json(json!({ "shops": shops }))
}

async fn patch_shop(
    Path(id): Path<ShopId>,
    State(state): State<Arc<StubState>>,
    Json(body): Json<serde_json::Map<String, Value>>,
) -> Result<Json<ShopRecord>, StatusCode> {
    let mut shops = state.shops.lock();
    let shop = shops
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or(StatusCode::NOT_FOUND)?;

    for (field, value) in &body {
        state.patches.lock().push((id, field.clone(), value.clone()));

        let mut as_value = serde_json::to_value(&*shop).map_err(|_| StatusCode::BAD_REQUEST)?;
        as_value[field] = value.clone();
        *shop = serde_json::from_value(as_value).map_err(|_| StatusCode::BAD_REQUEST)?;
    }
    shop.updated_at = Some("2026-08-06T00:00:00+00:00".to_string());
    shop.updated_by = Some("Me".to_string());

    Ok(Json(shop.clone()))
}

async fn shop_history(
    Path(id): Path<ShopId>,
    State(state): State<Arc<StubState>>,
) -> Result<Json<Value>, StatusCode> {
    if state.shops.lock().iter().all(|s| s.id != id) {
        return Err(StatusCode::NOT_FOUND);
    }
    let history = state.history.lock().clone();
    Ok(Json(json!({ "history": history })))
}

async fn ws_handler(
    upgrade: WebSocketUpgrade,
    State(state): State<Arc<StubState>>,
) -> impl IntoResponse {
    state.connections.fetch_add(1, Ordering::SeqCst);
    upgrade.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<StubState>) {
    let hello = match EditorProtocol::encode_server(&ServerMessage::Connected) {
        Ok(text) => text,
        Err(_) => return,
    };
    if socket.send(WsMessage::Text(hello)).await.is_err() {
        return;
    }
    if state.options.close_after_hello {
        return;
    }

    while let Some(Ok(frame)) = socket.recv().await {
        let WsMessage::Text(text) = frame else { continue };
        let Ok(msg) = EditorProtocol::decode_client(&text) else {
            continue;
        };
        state.received.lock().push(msg.clone());

        let reply = match msg {
            ClientMessage::LockRequest { shop_id } => {
                if state.options.deny_locks {
                    Some(ServerMessage::LockFailed(LockDenial {
                        shop_id,
                        locked_by: "u2".to_string(),
                        locked_by_name: "Bob".to_string(),
                    }))
                } else {
                    Some(ServerMessage::LockAcquired(LockGrant {
                        shop_id,
                        user_id: "admin-1".to_string(),
                        user_name: "Me".to_string(),
                    }))
                }
            }
            ClientMessage::UpdateField {
                shop_id,
                field,
                value,
            } => state.options.echo_updates.then(|| {
                ServerMessage::FieldUpdated(FieldChange {
                    shop_id,
                    field,
                    value,
                    updated_by_name: Some("Me".to_string()),
                })
            }),
            ClientMessage::UnlockRequest { shop_id } => {
                Some(ServerMessage::LockReleased { shop_id })
            }
        };

        if let Some(reply) = reply {
            let Ok(text) = EditorProtocol::encode_server(&reply) else {
                continue;
            };
            if socket.send(WsMessage::Text(text)).await.is_err() {
                break;
            }
        }
    }
}
