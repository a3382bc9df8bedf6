//! The client table.
//!
//! One entry per live TCP connection.  Every outbound line goes
//! through the entry's bounded queue; a client whose queue overflows is
//! disconnected rather than allowed to stall a session.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use quiznet_core::types::{ClientId, SessionId};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};

pub const MAX_CLIENTS: usize = 100;
const OUTBOUND_DEPTH: usize = 64;

struct Client {
    addr: SocketAddr,
    pseudo: Option<String>,
    session_id: Option<SessionId>,
    outbound_tx: mpsc::Sender<String>,
    close_tx: watch::Sender<bool>,
}

/// Channels handed to a freshly registered connection.
pub struct Registration {
    pub client_id: ClientId,
    pub outbound_rx: mpsc::Receiver<String>,
    pub close_rx: watch::Receiver<bool>,
}

pub struct ClientHub {
    clients: Mutex<HashMap<ClientId, Client>>,
    next_id: AtomicU64,
}

impl ClientHub {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a connection.  Returns `None` when the table is full;
    /// the caller closes the socket.
    pub async fn register(&self, addr: SocketAddr) -> Option<Registration> {
        let mut clients = self.clients.lock().await;
        if clients.len() >= MAX_CLIENTS {
            warn!("Client table is full, rejecting {}", addr);
            return None;
        }
        let client_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_DEPTH);
        let (close_tx, close_rx) = watch::channel(false);
        clients.insert(
            client_id,
            Client {
                addr,
                pseudo: None,
                session_id: None,
                outbound_tx,
                close_tx,
            },
        );
        Some(Registration {
            client_id,
            outbound_rx,
            close_rx,
        })
    }

    /// Drop a client from the table.  Returns the session it was in,
    /// if any, so the caller can drain it out of the session.
    pub async fn unregister(&self, client_id: ClientId) -> Option<SessionId> {
        let mut clients = self.clients.lock().await;
        clients.remove(&client_id).and_then(|c| {
            debug!("Unregister client {} ({})", client_id, c.addr);
            c.session_id
        })
    }

    pub async fn authenticate(&self, client_id: ClientId, pseudo: &str) {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get_mut(&client_id) {
            client.pseudo = Some(pseudo.to_owned());
        }
    }

    pub async fn pseudo(&self, client_id: ClientId) -> Option<String> {
        let clients = self.clients.lock().await;
        clients.get(&client_id).and_then(|c| c.pseudo.clone())
    }

    pub async fn session_of(&self, client_id: ClientId) -> Option<SessionId> {
        let clients = self.clients.lock().await;
        clients.get(&client_id).and_then(|c| c.session_id)
    }

    pub async fn set_session(&self, client_id: ClientId, session_id: SessionId) {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get_mut(&client_id) {
            client.session_id = Some(session_id);
        }
    }

    pub async fn clear_session(&self, client_id: ClientId) {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get_mut(&client_id) {
            client.session_id = None;
        }
    }

    /// Clear the membership of everyone still pointing at a session,
    /// called when the session unloads.
    pub async fn clear_session_members(&self, session_id: SessionId) {
        let mut clients = self.clients.lock().await;
        for client in clients.values_mut() {
            if client.session_id == Some(session_id) {
                client.session_id = None;
            }
        }
    }

    /// Queue one line to one client.  A full queue means the client
    /// cannot keep up: it gets disconnected instead of blocking us.
    pub async fn send_to(&self, client_id: ClientId, line: String) {
        let clients = self.clients.lock().await;
        let Some(client) = clients.get(&client_id) else {
            debug!("Discard line for unknown client {}", client_id);
            return;
        };
        match client.outbound_tx.try_send(line) {
            Ok(()) => (),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Client {} is too slow, disconnecting", client_id);
                let _ = client.close_tx.send(true);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Client {} is gone", client_id);
            }
        }
    }

    pub async fn send_to_many(&self, targets: &[ClientId], line: &str) {
        for client_id in targets {
            self.send_to(*client_id, line.to_owned()).await;
        }
    }

    /// Signal every connection to close.
    pub async fn close_all(&self) {
        let clients = self.clients.lock().await;
        for client in clients.values() {
            let _ = client.close_tx.send(true);
        }
    }

    pub async fn count(&self) -> usize {
        self.clients.lock().await.len()
    }
}
