//! Server network layer handling WebSocket connections and the session event loop

use crate::client_manager::ClientManager;
use crate::routes::{build_router, AppState};
use crate::session::{SessionConfig, SessionManager};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientEvent, ConnectionId, ServerEvent};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from connection and timer tasks to the session loop
#[derive(Debug)]
pub enum ServerMessage {
    ClientConnected {
        client_id: ConnectionId,
    },
    ClientDisconnected {
        client_id: ConnectionId,
    },
    EventReceived {
        client_id: ConnectionId,
        event: ClientEvent,
    },
    RoundTimerElapsed {
        round: u64,
    },
    EvictionDue {
        round: u64,
        inactive: Vec<ConnectionId>,
    },
    Shutdown,
}

/// Messages sent from the session to the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendEvent {
        event: ServerEvent,
        client_id: ConnectionId,
    },
    BroadcastEvent {
        event: ServerEvent,
        exclude: Option<ConnectionId>,
    },
}

/// Main server coordinating the transport and the game session
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    static_dir: PathBuf,
    clients: Arc<RwLock<ClientManager>>,
    session: SessionManager,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        static_dir: impl Into<PathBuf>,
        config: SessionConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            static_dir: static_dir.into(),
            clients: Arc::new(RwLock::new(ClientManager::new())),
            session: SessionManager::new(config, game_tx, server_tx.clone()),
            server_tx,
            server_rx,
            game_rx,
        })
    }

    /// Address the listener is bound to. Useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sender that can stop the event loop with [`ServerMessage::Shutdown`].
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns the HTTP server (static files, status endpoint, WebSocket upgrade)
    fn spawn_http_server(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = self.listener.take().ok_or("server is already running")?;
        let state = AppState {
            clients: Arc::clone(&self.clients),
            server_tx: self.server_tx.clone(),
        };
        let app = build_router(state, &self.static_dir);
        info!("Serving static files from {}", self.static_dir.display());

        tokio::spawn(async move {
            let service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                error!("HTTP server stopped: {}", e);
            }
        });
        Ok(())
    }

    /// Spawns task that routes outbound events to client queues
    fn spawn_network_sender(&mut self) {
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                let clients_guard = clients.read().await;
                match message {
                    GameMessage::SendEvent { event, client_id } => {
                        clients_guard.send_to(client_id, event);
                    }
                    GameMessage::BroadcastEvent { event, exclude } => {
                        let delivered = clients_guard.broadcast(&event, exclude);
                        debug!("Broadcast {} to {} clients", event.name(), delivered);
                    }
                }
            }
        });
    }

    /// Applies one message to the session. Returns false on shutdown.
    fn handle_message(&mut self, message: ServerMessage) -> bool {
        match message {
            ServerMessage::ClientConnected { client_id } => {
                self.session.register(client_id);
            }
            ServerMessage::ClientDisconnected { client_id } => {
                self.session.unregister(client_id);
            }
            ServerMessage::EventReceived { client_id, event } => {
                self.session.handle_client_event(client_id, event);
            }
            ServerMessage::RoundTimerElapsed { round } => {
                self.session.handle_round_timeout(round);
            }
            ServerMessage::EvictionDue { round, inactive } => {
                self.session.evict_inactive(round, &inactive);
            }
            ServerMessage::Shutdown => {
                info!("Server shutting down");
                return false;
            }
        }
        true
    }

    /// Main server loop. Every session mutation happens here, one message at a time.
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_sender();
        self.spawn_http_server()?;

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            if !self.handle_message(message) {
                break;
            }
        }

        Ok(())
    }
}

/// Drives one WebSocket connection until either side goes away
pub async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Broadcasts can reach this client before its `currentPlayers` snapshot.
    // The snapshot replaces whatever the client built from them.
    let client_id = {
        let mut clients = state.clients.write().await;
        clients.add_client(Some(addr), event_tx)
    };

    if let Err(e) = state
        .server_tx
        .send(ServerMessage::ClientConnected { client_id })
    {
        error!("Failed to register client {}: {}", client_id, e);
        state.clients.write().await.remove_client(&client_id);
        return;
    }

    let mut writer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let text = match event.encode() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode {}: {}", event.name(), e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(text.into())).await {
                debug!("Failed to send to client {}: {}", client_id, e);
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => match ClientEvent::decode(text.as_str()) {
                    Ok(event) => {
                        if let Err(e) = state
                            .server_tx
                            .send(ServerMessage::EventReceived { client_id, event })
                        {
                            error!("Failed to send event to main loop: {}", e);
                            break;
                        }
                    }
                    Err(e) => warn!("Malformed event from client {}: {}", client_id, e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Connection error from client {}: {}", client_id, e);
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    writer.abort();
    state.clients.write().await.remove_client(&client_id);
    if let Err(e) = state
        .server_tx
        .send(ServerMessage::ClientDisconnected { client_id })
    {
        error!("Failed to report disconnect of client {}: {}", client_id, e);
    }
}
