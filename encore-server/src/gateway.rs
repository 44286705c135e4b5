use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
};
use encore_core::{Encore, EncoreEvent, PrimaryKey, QueueEntryData, SessionData};
use futures_util::{SinkExt, StreamExt};
use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{context::ServerContext, Router};

type ConnectionId = u64;

/// Events pushed to every connected client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GatewayEvent {
    /// The full session, sent on connect and after every mutation
    #[serde(rename_all = "camelCase")]
    State {
        queue: Vec<QueueEntryData>,
        current_song: Option<QueueEntryData>,
    },
    /// Whether the display screen shows the join QR code
    QrVisible { visible: bool },
}

impl GatewayEvent {
    fn state(session: SessionData) -> Self {
        Self::State {
            queue: session.queue,
            current_song: session.current_song,
        }
    }
}

impl From<EncoreEvent> for GatewayEvent {
    fn from(value: EncoreEvent) -> Self {
        match value {
            EncoreEvent::StateUpdate { new_state } => Self::state(new_state),
            EncoreEvent::QrVisibility { visible } => Self::QrVisible { visible },
        }
    }
}

/// Commands any client may send over the gateway.
/// Malformed or unresolvable messages are dropped silently, no error event
/// goes back to the sender.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    AddToQueue { song_id: PrimaryKey, name: String },
    NextSong,
    #[serde(rename_all = "camelCase")]
    RemoveSong { entry_id: i64 },
    ClearQueue,
    SetQrVisible { visible: bool },
}

/// Manages gateway connections. There is no per-client state, every
/// connection observes the one global session.
pub struct Gateway {
    me: Weak<Self>,
    next_id: AtomicU64,
    connections: Mutex<Vec<Connection>>,
}

struct Connection {
    id: ConnectionId,
    sender: UnboundedSender<GatewayEvent>,
}

pub struct ConnectionHandle {
    id: ConnectionId,
    sender: UnboundedSender<GatewayEvent>,
    receiver: UnboundedReceiver<GatewayEvent>,
    /// Required to remove the connection when dropped
    manager: Weak<Gateway>,
}

impl Gateway {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            next_id: AtomicU64::new(0),
            connections: Default::default(),
        })
    }

    pub fn broadcast(&self, event: GatewayEvent) {
        let connections = self.connections.lock();

        for connection in connections.iter() {
            let _ = connection.sender.send(event.clone());
        }
    }

    /// Registers a connection. The handle receives every broadcast from this
    /// point on, so connect before snapshotting any state to send down it.
    fn connect(&self) -> ConnectionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = unbounded_channel();

        self.connections.lock().push(Connection {
            id,
            sender: sender.clone(),
        });

        ConnectionHandle {
            id,
            sender,
            receiver,
            manager: self.me.clone(),
        }
    }

    fn disconnect(&self, id: ConnectionId) {
        self.connections.lock().retain(|c| c.id != id)
    }
}

impl ConnectionHandle {
    /// Queues an event for this connection only, behind any broadcasts
    /// already delivered to it
    fn push(&self, event: GatewayEvent) {
        let _ = self.sender.send(event);
    }

    async fn recv(&mut self) -> Option<GatewayEvent> {
        self.receiver.recv().await
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

/// Drains the core event channel into the gateway for as long as the
/// system is alive
pub fn spawn_event_bridge(encore: &Arc<Encore>, gateway: Arc<Gateway>) {
    let events = encore.events();

    tokio::task::spawn_blocking(move || {
        while let Ok(event) = events.recv() {
            gateway.broadcast(event.into());
        }
    });
}

async fn gateway_handler(
    State(context): State<ServerContext>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, context))
}

async fn handle_socket(socket: WebSocket, context: ServerContext) {
    // Register before snapshotting: a mutation landing in between is then
    // either broadcast to this connection or already part of the snapshot.
    // The other way around it would be lost, leaving the client stale.
    let mut handle = context.gateway.connect();

    // Every client gets the latest state once, unprompted
    let snapshot = context.encore.session.current_state().await;
    handle.push(GatewayEvent::state(snapshot));
    handle.push(GatewayEvent::QrVisible {
        visible: context.encore.session.qr_visible(),
    });

    let (mut outgoing, mut incoming) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = handle.recv().await {
            let message = serde_json::to_string(&event).expect("serializes properly");

            if outgoing.send(Message::Text(message)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = incoming.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => dispatch(event, &context).await,
                    Err(e) => debug!("Dropping malformed gateway message: {}", e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Whichever half finishes first tears the connection down
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn dispatch(event: ClientEvent, context: &ServerContext) {
    let session = &context.encore.session;

    match event {
        ClientEvent::AddToQueue { song_id, name } => session.enqueue(song_id, &name).await,
        ClientEvent::NextSong => session.advance().await,
        ClientEvent::RemoveSong { entry_id } => session.remove_entry(entry_id).await,
        ClientEvent::ClearQueue => session.clear().await,
        ClientEvent::SetQrVisible { visible } => session.set_qr_visible(visible).await,
    }
}

pub fn router() -> Router {
    Router::new().route("/", get(gateway_handler))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn client_events_parse_from_the_wire_shapes() {
        let add: ClientEvent =
            serde_json::from_str(r#"{"type":"addToQueue","songId":3,"name":"Ana"}"#).unwrap();
        assert_eq!(
            add,
            ClientEvent::AddToQueue {
                song_id: 3,
                name: "Ana".to_string()
            }
        );

        let next: ClientEvent = serde_json::from_str(r#"{"type":"nextSong"}"#).unwrap();
        assert_eq!(next, ClientEvent::NextSong);

        let remove: ClientEvent =
            serde_json::from_str(r#"{"type":"removeSong","entryId":1700000000000}"#).unwrap();
        assert_eq!(
            remove,
            ClientEvent::RemoveSong {
                entry_id: 1700000000000
            }
        );

        let clear: ClientEvent = serde_json::from_str(r#"{"type":"clearQueue"}"#).unwrap();
        assert_eq!(clear, ClientEvent::ClearQueue);

        let qr: ClientEvent =
            serde_json::from_str(r#"{"type":"setQrVisible","visible":true}"#).unwrap();
        assert_eq!(qr, ClientEvent::SetQrVisible { visible: true });

        let malformed = serde_json::from_str::<ClientEvent>(r#"{"type":"shutdown"}"#);
        assert!(malformed.is_err());
    }

    #[test]
    fn gateway_events_serialize_to_the_wire_shapes() {
        let state = serde_json::to_value(GatewayEvent::state(SessionData::default())).unwrap();
        assert_eq!(state["type"], "state");
        assert!(state["queue"].is_array());
        assert!(state["currentSong"].is_null());

        let qr = serde_json::to_value(GatewayEvent::QrVisible { visible: false }).unwrap();
        assert_eq!(qr["type"], "qrVisible");
        assert_eq!(qr["visible"], false);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let gateway = Gateway::new();

        let mut first = gateway.connect();
        let mut second = gateway.connect();

        gateway.broadcast(GatewayEvent::QrVisible { visible: true });

        for handle in [&mut first, &mut second] {
            assert!(matches!(
                handle.recv().await,
                Some(GatewayEvent::QrVisible { visible: true })
            ));
        }
    }

    #[tokio::test]
    async fn a_broadcast_during_connection_setup_is_never_lost() {
        let gateway = Gateway::new();

        // A client registers, then a mutation is broadcast before the
        // client's own snapshot is queued. The broadcast must not fall into
        // the gap, and the snapshot pushed afterwards stays the newest event.
        let mut handle = gateway.connect();
        gateway.broadcast(GatewayEvent::QrVisible { visible: true });
        handle.push(GatewayEvent::state(SessionData::default()));

        assert!(matches!(
            handle.recv().await,
            Some(GatewayEvent::QrVisible { visible: true })
        ));
        assert!(matches!(
            handle.recv().await,
            Some(GatewayEvent::State { .. })
        ));
        assert!(handle.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropping_a_handle_unregisters_the_connection() {
        let gateway = Gateway::new();

        let handle = gateway.connect();
        assert_eq!(gateway.connections.lock().len(), 1);

        drop(handle);
        assert!(gateway.connections.lock().is_empty());
    }
}
