//! Join handshake
//!
//! A new player is registered with the hub, then gets its `Init` snapshot
//! written straight to its socket, and only then is its unit announced to
//! everyone with a `Connect` broadcast. The writer pump does not start until
//! the handshake is over, so anything the hub queued for the newcomer in the
//! meantime, its own `Connect` included, reaches it after the `Init`.

use crate::config::ServerConfig;
use crate::connection::{send_with_deadline, write_pump, writer_link, Connection, ReadEnd};
use crate::game::Simulation;
use crate::hub::{ConnectionId, HubHandle};
use futures::StreamExt;
use log::{error, warn};
use shared::{codec, Event, PlayerId};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// A joined player and the pumps serving it
pub struct Session {
    pub player_id: PlayerId,
    pub connection_id: ConnectionId,
    pub reader: JoinHandle<ReadEnd>,
    pub writer: JoinHandle<()>,
}

/// Runs the join handshake on an upgraded socket and starts its pumps.
///
/// A failed `Init` write is not handled here: the reader will hit the same
/// dead socket and run the normal exit path.
pub async fn join<S>(
    socket: WebSocketStream<S>,
    hub: &HubHandle,
    simulation: Arc<dyn Simulation>,
    config: Arc<ServerConfig>,
) -> Session
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let player_id = simulation.add_player();
    let connection_id = hub.next_connection_id();
    let mut connection = Connection::new(
        connection_id,
        player_id,
        hub.clone(),
        Arc::clone(&simulation),
        Arc::clone(&config),
    );

    let (sender, queue) = mpsc::channel(config.send_queue_capacity);
    hub.register(connection_id, sender);

    let (mut sink, stream) = socket.split();

    let init = Event::Init {
        player_id,
        units: simulation.units(),
    };
    match codec::encode(&init) {
        Ok(bytes) => {
            let frame = codec::encode_batch([bytes]);
            if let Err(e) =
                send_with_deadline(&mut sink, Message::binary(frame), config.write_wait).await
            {
                warn!("Failed to send init to player {}: {}", player_id, e);
            }
        }
        Err(e) => error!("Failed to encode init for player {}: {}", player_id, e),
    }

    match simulation.unit(player_id) {
        Some(unit) => match codec::encode(&Event::Connect { unit }) {
            Ok(bytes) => hub.broadcast(bytes),
            Err(e) => error!("Failed to encode connect for player {}: {}", player_id, e),
        },
        None => warn!("Player {} has no unit to announce", player_id),
    }

    connection.activate();
    let (gone, watch) = writer_link();
    let writer = tokio::spawn(write_pump(connection_id, sink, queue, config, gone));
    let reader = tokio::spawn(connection.read_pump(stream, watch));

    Session {
        player_id,
        connection_id,
        reader,
        writer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::World;
    use crate::hub::Hub;
    use futures::SinkExt;
    use shared::Unit;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::protocol::Role;

    type Peer = WebSocketStream<DuplexStream>;

    async fn connect(hub: &HubHandle, world: &Arc<World>) -> (Session, Peer) {
        let config = Arc::new(ServerConfig::default());
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server =
            WebSocketStream::from_raw_socket(server_io, Role::Server, Some(config.websocket_config()))
                .await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;

        let session = join(server, hub, world.clone(), config).await;
        (session, client)
    }

    async fn next_event(peer: &mut Peer, pending: &mut Vec<Event>) -> Event {
        while pending.is_empty() {
            let message = timeout(Duration::from_secs(2), peer.next())
                .await
                .expect("timed out waiting for an event")
                .expect("stream ended")
                .expect("socket error");
            if let Message::Binary(data) = message {
                for record in codec::decode_batch(&data).unwrap() {
                    pending.push(codec::decode(record).unwrap());
                }
            }
        }
        pending.remove(0)
    }

    #[tokio::test]
    async fn test_first_player_gets_own_snapshot() {
        let hub = Hub::spawn();
        let world = Arc::new(World::new());

        let (session, mut peer) = connect(&hub, &world).await;
        let mut pending = Vec::new();

        match next_event(&mut peer, &mut pending).await {
            Event::Init { player_id, units } => {
                assert_eq!(player_id, session.player_id);
                assert_eq!(units.len(), 1);
                assert!(units.contains_key(&player_id));
            }
            other => panic!("Expected init, got {:?}", other),
        }

        // Its own arrival is announced after the snapshot.
        match next_event(&mut peer, &mut pending).await {
            Event::Connect { unit } => assert_eq!(unit.id, session.player_id),
            other => panic!("Expected connect, got {:?}", other),
        }
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_second_player_announced_to_first() {
        let hub = Hub::spawn();
        let world = Arc::new(World::new());

        let (first, mut first_peer) = connect(&hub, &world).await;
        let mut first_pending = Vec::new();
        assert!(matches!(
            next_event(&mut first_peer, &mut first_pending).await,
            Event::Init { .. }
        ));
        assert!(matches!(
            next_event(&mut first_peer, &mut first_pending).await,
            Event::Connect { .. }
        ));

        let (second, mut second_peer) = connect(&hub, &world).await;
        let mut second_pending = Vec::new();

        match next_event(&mut second_peer, &mut second_pending).await {
            Event::Init { player_id, units } => {
                assert_eq!(player_id, second.player_id);
                let expected: HashMap<PlayerId, Unit> = world.units();
                assert_eq!(units, expected);
                assert!(units.contains_key(&first.player_id));
            }
            other => panic!("Expected init, got {:?}", other),
        }

        match next_event(&mut first_peer, &mut first_pending).await {
            Event::Connect { unit } => assert_eq!(unit.id, second.player_id),
            other => panic!("Expected connect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disconnect_announces_exit_once() {
        let hub = Hub::spawn();
        let world = Arc::new(World::new());

        let (first, mut first_peer) = connect(&hub, &world).await;
        let (second, mut second_peer) = connect(&hub, &world).await;
        let mut second_pending = Vec::new();

        first_peer.close(None).await.unwrap();
        let end = timeout(Duration::from_secs(2), first.reader)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(end, ReadEnd::Closed(_)));
        timeout(Duration::from_secs(2), first.writer)
            .await
            .unwrap()
            .unwrap();

        loop {
            if let Event::Exit { player_id } = next_event(&mut second_peer, &mut second_pending).await {
                assert_eq!(player_id, first.player_id);
                break;
            }
        }
        assert_eq!(hub.connection_count().await, 1);

        // Anything still queued for the second player arrives before the
        // marker's relay; a duplicate exit would show up here.
        let marker = Event::Opaque {
            kind: 99,
            payload: b"marker".to_vec(),
        };
        second_peer
            .send(Message::binary(codec::encode(&marker).unwrap()))
            .await
            .unwrap();
        loop {
            match next_event(&mut second_peer, &mut second_pending).await {
                Event::Exit { player_id } => panic!("Second exit for player {}", player_id),
                event if event == marker => break,
                _ => {}
            }
        }

        assert!(world.unit(first.player_id).is_none());
        assert!(world.unit(second.player_id).is_some());
    }
}
