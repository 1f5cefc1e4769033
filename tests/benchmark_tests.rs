//! Performance benchmarks for the hot paths of the transport

use server::game::{Simulation, World};
use server::hub::{Hub, Payload};
use shared::{codec, Command, Direction, Event, Unit};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Benchmarks encoding and decoding of relayed commands
#[test]
fn benchmark_command_codec() {
    let event = Event::command(&Command::Move {
        player_id: 7,
        direction: Direction::Right,
    })
    .unwrap();

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let bytes = codec::encode(&event).unwrap();
        let decoded = codec::decode(&bytes).unwrap();
        assert!(decoded.as_command().is_some());
    }

    let duration = start.elapsed();
    println!(
        "Command codec: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks encoding a large snapshot
#[test]
fn benchmark_snapshot_encoding() {
    let units: HashMap<_, _> = (1..=64)
        .map(|id| (id, Unit::new(id, id as f32 * 10.0, 50.0, (id % 4) as u8)))
        .collect();
    let init = Event::Init {
        player_id: 1,
        units,
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let bytes = codec::encode(&init).unwrap();
        let frame = codec::encode_batch([bytes]);
        assert_eq!(codec::decode_batch(&frame).unwrap().len(), 1);
    }

    let duration = start.elapsed();
    println!(
        "Snapshot encoding: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
}

/// Benchmarks batch framing of many queued payloads
#[test]
fn benchmark_batch_framing() {
    let payloads: Vec<Vec<u8>> = (0..256).map(|i| vec![i as u8; 40]).collect();

    let iterations = 2_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let frame = codec::encode_batch(&payloads);
        let records = codec::decode_batch(&frame).unwrap();
        assert_eq!(records.len(), payloads.len());
    }

    let duration = start.elapsed();
    println!(
        "Batch framing: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
}

/// Stress test: one hub fanning out to many connections
#[tokio::test]
async fn stress_test_hub_fan_out() {
    let hub = Hub::spawn();
    let connections = 100;
    let messages = 200;

    let mut receivers = Vec::new();
    for _ in 0..connections {
        let (tx, rx) = mpsc::channel::<Payload>(messages);
        hub.register(hub.next_connection_id(), tx);
        receivers.push(rx);
    }

    let start = Instant::now();

    for i in 0..messages {
        hub.broadcast(vec![(i % 256) as u8; 32]);
    }
    assert_eq!(hub.connection_count().await, connections);

    let duration = start.elapsed();
    println!(
        "Hub fan-out: {} messages to {} connections in {:?}",
        messages, connections, duration
    );

    for rx in &mut receivers {
        let mut received = 0;
        while let Ok(payload) = rx.try_recv() {
            assert_eq!(payload[0], (received % 256) as u8);
            received += 1;
        }
        assert_eq!(received, messages);
    }

    assert!(duration.as_millis() < 2000);
}

/// Stress test: many threads feeding events into one world
#[test]
fn stress_test_concurrent_world() {
    let world = Arc::new(World::new());
    let players: Vec<_> = (0..16).map(|_| world.add_player()).collect();

    let start = Instant::now();
    let handles: Vec<_> = players
        .iter()
        .map(|&player_id| {
            let world = Arc::clone(&world);
            std::thread::spawn(move || {
                for i in 0..1_000 {
                    let direction = Direction::ALL[i % Direction::ALL.len()];
                    let event = Event::command(&Command::Move {
                        player_id,
                        direction,
                    })
                    .unwrap();
                    world.handle_event(&event);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let duration = start.elapsed();
    println!("Concurrent world: 16000 events in {:?}", duration);

    assert_eq!(world.units().len(), 16);
    assert!(duration.as_millis() < 5000);
}
