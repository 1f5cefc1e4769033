//! Server network layer: TCP listener and WebSocket upgrade

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::game::Simulation;
use crate::hub::{Hub, HubHandle};
use crate::session::{self, Session};
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async_with_config;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

/// Accepts players and hands them to the hub
pub struct Server {
    listener: TcpListener,
    hub: HubHandle,
    simulation: Arc<dyn Simulation>,
    config: Arc<ServerConfig>,
    websocket: WebSocketConfig,
}

impl Server {
    /// Binds the listener and starts the hub loop.
    pub async fn bind(
        config: ServerConfig,
        simulation: Arc<dyn Simulation>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind_address).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let websocket = config.websocket_config();
        Ok(Server {
            listener,
            hub: Hub::spawn(),
            simulation,
            config: Arc::new(config),
            websocket,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Accept loop. Each socket is upgraded and joined on its own task.
    pub async fn run(self) -> Result<(), ServerError> {
        info!("Server started successfully");

        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            let hub = self.hub.clone();
            let simulation = Arc::clone(&self.simulation);
            let config = Arc::clone(&self.config);
            let websocket = self.websocket.clone();

            tokio::spawn(async move {
                if let Err(e) = accept(stream, addr, websocket, &hub, simulation, config).await {
                    warn!("Rejected connection from {}: {}", addr, e);
                }
            });
        }
    }
}

/// Upgrades a raw socket and runs the join handshake on it.
pub async fn accept(
    stream: TcpStream,
    addr: SocketAddr,
    websocket: WebSocketConfig,
    hub: &HubHandle,
    simulation: Arc<dyn Simulation>,
    config: Arc<ServerConfig>,
) -> Result<Session, ServerError> {
    stream.set_nodelay(true)?;
    let socket = accept_async_with_config(stream, Some(websocket)).await?;

    let session = session::join(socket, hub, simulation, config).await;
    info!("Player {} joined from {}", session.player_id, addr);
    Ok(session)
}
