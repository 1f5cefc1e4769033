//! Per-connection reader and writer pumps
//!
//! Each joined socket is split in two. The reader pump owns the receiving
//! half and is the only code that reads from it; the writer pump owns the
//! sending half and is the only code that writes to it. The two are joined
//! only by the connection's bounded outbound queue, whose sending side lives
//! in the hub registry.
//!
//! Teardown always ends at the reader: when the read side fails, times out,
//! or sees a close, the reader announces the exit and unregisters, which
//! closes the queue and lets the writer send its close frame and finish.
//! A writer that stops on its own drops its [`WriterGone`] token, which wakes
//! the reader and runs the same exit path.

use crate::config::ServerConfig;
use crate::game::Simulation;
use crate::hub::{ConnectionId, HubHandle, Payload};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use shared::{codec, Event, PlayerId};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;

/// Sending half of an upgraded socket
pub type WsSink<S> = SplitSink<WebSocketStream<S>, Message>;
/// Receiving half of an upgraded socket
pub type WsReceiver<S> = SplitStream<WebSocketStream<S>>;

/// Held by the writer pump for as long as it runs
pub type WriterGone = oneshot::Sender<()>;
/// Resolves once the writer pump has stopped
pub type WriterWatch = oneshot::Receiver<()>;

/// Links a connection's writer to its reader.
pub fn writer_link() -> (WriterGone, WriterWatch) {
    oneshot::channel()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Why a reader pump stopped
#[derive(Debug)]
pub enum ReadEnd {
    /// The peer sent a close frame
    Closed(Option<CloseFrame>),
    /// The stream ended without a close frame
    Eof,
    /// Nothing arrived within the liveness window
    Timeout,
    /// The writer pump stopped first, e.g. on a missed write deadline
    WriterStopped,
    Error(WsError),
}

impl ReadEnd {
    /// Whether the ending deserves an error log. Normal, going-away and
    /// abnormal closures are routine.
    pub fn is_unexpected(&self) -> bool {
        match self {
            ReadEnd::Closed(None) | ReadEnd::Eof | ReadEnd::Timeout | ReadEnd::WriterStopped => {
                false
            }
            ReadEnd::Closed(Some(frame)) => !is_expected_close(frame.code),
            ReadEnd::Error(e) => !is_expected_error(e),
        }
    }

    /// Whether the peer broke the protocol, e.g. by sending an oversized frame.
    pub fn is_protocol_violation(&self) -> bool {
        match self {
            ReadEnd::Error(WsError::Capacity(_)) => true,
            ReadEnd::Error(WsError::Protocol(e)) => {
                !matches!(e, ProtocolError::ResetWithoutClosingHandshake)
            }
            _ => false,
        }
    }
}

fn is_expected_close(code: CloseCode) -> bool {
    matches!(code, CloseCode::Normal | CloseCode::Away | CloseCode::Abnormal)
}

fn is_expected_error(error: &WsError) -> bool {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => true,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        WsError::Io(e) => matches!(
            e.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

/// Writes one message, giving up once `deadline` has passed.
pub(crate) async fn send_with_deadline<S>(
    sink: &mut WsSink<S>,
    message: Message,
    deadline: Duration,
) -> Result<(), WsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(deadline, sink.send(message)).await {
        Ok(result) => result,
        Err(_) => Err(WsError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            "write deadline exceeded",
        ))),
    }
}

/// A joined player's side of the hub
pub struct Connection {
    id: ConnectionId,
    player_id: PlayerId,
    hub: HubHandle,
    simulation: Arc<dyn Simulation>,
    config: Arc<ServerConfig>,
    state: ConnectionState,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        player_id: PlayerId,
        hub: HubHandle,
        simulation: Arc<dyn Simulation>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            id,
            player_id,
            hub,
            simulation,
            config,
            state: ConnectionState::Connecting,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Marks the join handshake as complete.
    pub fn activate(&mut self) {
        self.set_state(ConnectionState::Active);
    }

    fn set_state(&mut self, state: ConnectionState) {
        debug!("Connection {} {:?} -> {:?}", self.id, self.state, state);
        self.state = state;
    }

    /// Reads frames until the socket fails, then tears the connection down.
    ///
    /// Takes the connection by value, so the exit sequence runs once. Also
    /// stops when `writer` reports that the writer pump is gone.
    pub async fn read_pump<S>(
        mut self,
        mut stream: WsReceiver<S>,
        mut writer: WriterWatch,
    ) -> ReadEnd
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let end = loop {
            // Any inbound frame, pong included, resets the liveness deadline.
            let read = tokio::select! {
                read = timeout(self.config.pong_wait, stream.next()) => read,
                _ = &mut writer => break ReadEnd::WriterStopped,
            };
            let message = match read {
                Err(_) => break ReadEnd::Timeout,
                Ok(None) => break ReadEnd::Eof,
                Ok(Some(Err(e))) => break ReadEnd::Error(e),
                Ok(Some(Ok(message))) => message,
            };

            match message {
                Message::Binary(data) => self.relay(&data),
                Message::Text(text) => self.relay(text.as_bytes()),
                Message::Pong(_) => trace!("Pong from connection {}", self.id),
                Message::Close(frame) => break ReadEnd::Closed(frame),
                Message::Ping(_) | Message::Frame(_) => {}
            }
        };

        self.close(&end);
        drop(stream);
        end
    }

    fn relay(&self, data: &[u8]) {
        debug!("Connection {} sent {} bytes", self.id, data.len());

        // Peers get the raw frame whether or not it decodes.
        self.hub.broadcast(data.to_vec());

        match codec::decode(data) {
            Ok(event) => self.simulation.handle_event(&event),
            Err(e) => warn!("Malformed frame from player {}: {}", self.player_id, e),
        }
    }

    fn close(&mut self, end: &ReadEnd) {
        self.set_state(ConnectionState::Closing);

        if let ReadEnd::Timeout = end {
            info!(
                "Player {} silent for {:?}, closing",
                self.player_id, self.config.pong_wait
            );
        } else if let ReadEnd::WriterStopped = end {
            info!("Player {} stopped accepting writes, closing", self.player_id);
        } else if end.is_protocol_violation() {
            warn!("Player {} violated the protocol: {:?}", self.player_id, end);
        } else if end.is_unexpected() {
            error!("Player {} connection error: {:?}", self.player_id, end);
        } else {
            debug!("Player {} connection ended: {:?}", self.player_id, end);
        }

        let exit = Event::Exit {
            player_id: self.player_id,
        };
        self.simulation.handle_event(&exit);
        match codec::encode(&exit) {
            Ok(bytes) => self.hub.broadcast(bytes),
            Err(e) => error!("Failed to encode exit for player {}: {}", self.player_id, e),
        }
        self.hub.unregister(self.id);

        info!("Player {} left", self.player_id);
        self.set_state(ConnectionState::Closed);
    }
}

/// Drains the outbound queue onto the socket and keeps the peer alive with
/// pings. Stops on the first failed write or once the hub closes the queue,
/// dropping `gone` either way.
pub async fn write_pump<S>(
    id: ConnectionId,
    mut sink: WsSink<S>,
    mut queue: mpsc::Receiver<Payload>,
    config: Arc<ServerConfig>,
    gone: WriterGone,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut ticker = interval_at(Instant::now() + config.ping_period, config.ping_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            payload = queue.recv() => {
                let Some(first) = payload else {
                    // The hub closed the queue.
                    if let Err(e) = send_with_deadline(&mut sink, Message::Close(None), config.write_wait).await {
                        debug!("Connection {} close frame not sent: {}", id, e);
                    }
                    break;
                };

                // Coalesce whatever is already queued, in order.
                let mut batch = vec![first];
                while batch.len() < config.send_queue_capacity {
                    match queue.try_recv() {
                        Ok(payload) => batch.push(payload),
                        Err(_) => break,
                    }
                }

                let frame = codec::encode_batch(&batch);
                trace!("Connection {} flushing {} payloads", id, batch.len());
                if let Err(e) = send_with_deadline(&mut sink, Message::binary(frame), config.write_wait).await {
                    debug!("Connection {} write failed: {}", id, e);
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = send_with_deadline(&mut sink, Message::Ping(Default::default()), config.write_wait).await {
                    debug!("Connection {} ping failed: {}", id, e);
                    break;
                }
            }
        }
    }

    debug!("Connection {} writer stopped", id);
    drop(gone);
}
