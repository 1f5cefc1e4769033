use crate::game::ClientWorld;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::{codec, CodecError, Command, Event, PlayerId};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to connect: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("Socket error: {0}")]
    Socket(#[from] tungstenite::Error),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Connection closed by server")]
    Closed,
}

/// Headless peer: one WebSocket plus the world it mirrors
pub struct Client {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    world: ClientWorld,
}

impl Client {
    /// Connects to `url`, e.g. `ws://127.0.0.1:8080`.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        info!("Connecting to {}...", url);
        let (socket, _response) = connect_async(url).await.map_err(ClientError::Connect)?;

        Ok(Client {
            socket,
            world: ClientWorld::new(),
        })
    }

    pub fn world(&self) -> &ClientWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut ClientWorld {
        &mut self.world
    }

    /// Id assigned by the server, known once `Init` has been received.
    pub fn player_id(&self) -> Option<PlayerId> {
        self.world.player_id
    }

    pub async fn send_event(&mut self, event: &Event) -> Result<(), ClientError> {
        let bytes = codec::encode(event)?;
        self.send_raw(bytes).await
    }

    pub async fn send_command(&mut self, command: &Command) -> Result<(), ClientError> {
        self.send_event(&Event::command(command)?).await
    }

    /// Sends `bytes` as one binary frame without encoding them.
    pub async fn send_raw(&mut self, bytes: Vec<u8>) -> Result<(), ClientError> {
        self.socket.send(Message::binary(bytes)).await?;
        Ok(())
    }

    /// Waits for the next server frame and returns its records undecoded.
    pub async fn recv_frame(&mut self) -> Result<Vec<Vec<u8>>, ClientError> {
        loop {
            let message = match self.socket.next().await {
                Some(message) => message?,
                None => return Err(ClientError::Closed),
            };

            match message {
                Message::Binary(data) => {
                    let records = codec::decode_batch(&data)?;
                    return Ok(records.into_iter().map(<[u8]>::to_vec).collect());
                }
                Message::Close(frame) => {
                    debug!("Server closed the connection: {:?}", frame);
                    return Err(ClientError::Closed);
                }
                Message::Text(text) => warn!("Ignoring text frame of {} bytes", text.len()),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    /// Reads one server frame, applies every event in it to the local world
    /// and returns them. Records that are not valid events are skipped.
    pub async fn recv_events(&mut self) -> Result<Vec<Event>, ClientError> {
        let records = self.recv_frame().await?;
        let mut events = Vec::with_capacity(records.len());

        for record in records {
            match codec::decode(&record) {
                Ok(event) => {
                    self.world.apply(&event);
                    events.push(event);
                }
                Err(e) => warn!("Skipping relayed record of {} bytes: {}", record.len(), e),
            }
        }

        Ok(events)
    }

    /// Starts the closing handshake and waits for the server to finish it.
    pub async fn close(mut self) -> Result<(), ClientError> {
        match self.socket.close(None).await {
            Ok(()) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return Ok(())
            }
            Err(e) => return Err(e.into()),
        }

        while let Some(message) = self.socket.next().await {
            match message {
                Ok(_) => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    break
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!("Disconnected");
        Ok(())
    }
}
