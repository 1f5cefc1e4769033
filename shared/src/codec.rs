//! Binary framing for [`Event`]s.
//!
//! Peers send one encoded event per WebSocket message. The server may coalesce
//! several payloads into one outbound message; such a batch frame is a run of
//! records, each a little-endian `u32` length followed by the payload bytes.

use crate::Event;
use thiserror::Error;

/// Largest inbound message a peer may send. Enforced by the socket reader.
pub const MAX_MESSAGE_SIZE: usize = 512;

const LEN_PREFIX: usize = std::mem::size_of::<u32>();

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode event: {0}")]
    Encode(bincode::Error),
    #[error("failed to decode event: {0}")]
    Decode(bincode::Error),
    #[error("batch frame truncated at byte {offset}")]
    Truncated { offset: usize },
}

pub fn encode(event: &Event) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(event).map_err(CodecError::Encode)
}

pub fn decode(bytes: &[u8]) -> Result<Event, CodecError> {
    bincode::deserialize(bytes).map_err(CodecError::Decode)
}

/// Concatenates payloads into one batch frame, preserving their order.
pub fn encode_batch<I, B>(payloads: I) -> Vec<u8>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut frame = Vec::new();
    for payload in payloads {
        let payload = payload.as_ref();
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload);
    }
    frame
}

/// Splits a batch frame back into its payloads.
pub fn decode_batch(frame: &[u8]) -> Result<Vec<&[u8]>, CodecError> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < frame.len() {
        let header = frame
            .get(offset..offset + LEN_PREFIX)
            .ok_or(CodecError::Truncated { offset })?;
        let mut len = [0u8; LEN_PREFIX];
        len.copy_from_slice(header);
        let len = u32::from_le_bytes(len) as usize;

        let start = offset + LEN_PREFIX;
        let record = frame
            .get(start..start + len)
            .ok_or(CodecError::Truncated { offset })?;
        records.push(record);
        offset = start + len;
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Command, Direction, Unit};
    use std::collections::HashMap;

    fn sample_events() -> Vec<Event> {
        let mut units = HashMap::new();
        units.insert(1, Unit::new(1, 100.0, 200.0, 0));
        units.insert(2, Unit::new(2, 300.0, 400.0, 1));

        vec![
            Event::Init {
                player_id: 2,
                units,
            },
            Event::Init {
                player_id: 1,
                units: HashMap::new(),
            },
            Event::Connect {
                unit: Unit::new(3, 10.0, 20.0, 2),
            },
            Event::Exit { player_id: 42 },
            Event::Opaque {
                kind: 7,
                payload: vec![],
            },
            Event::command(&Command::Move {
                player_id: 9,
                direction: Direction::Up,
            })
            .unwrap(),
        ]
    }

    #[test]
    fn test_every_variant_survives_codec() {
        for event in sample_events() {
            let bytes = encode(&event).unwrap();
            assert_eq!(decode(&bytes).unwrap(), event, "{} changed", event.name());
        }
    }

    #[test]
    fn test_small_events_fit_inbound_limit() {
        let exit = encode(&Event::Exit { player_id: u32::MAX }).unwrap();
        let connect = encode(&Event::Connect {
            unit: Unit::new(1, 0.0, 0.0, 0),
        })
        .unwrap();
        assert!(exit.len() <= MAX_MESSAGE_SIZE);
        assert!(connect.len() <= MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_malformed_frames_rejected() {
        let valid = encode(&Event::Exit { player_id: 5 }).unwrap();

        assert!(decode(&valid[..valid.len() / 2]).is_err());
        assert!(decode(&[]).is_err());

        let mut corrupted = valid.clone();
        corrupted[0] = 0xFF;
        assert!(matches!(decode(&corrupted), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_batch_preserves_order() {
        let payloads: Vec<Vec<u8>> = vec![vec![1], vec![], vec![2, 3, 4], vec![5; 600]];
        let frame = encode_batch(&payloads);
        let records = decode_batch(&frame).unwrap();

        assert_eq!(records.len(), payloads.len());
        for (record, payload) in records.iter().zip(&payloads) {
            assert_eq!(*record, payload.as_slice());
        }
    }

    #[test]
    fn test_empty_batch() {
        let frame = encode_batch(Vec::<Vec<u8>>::new());
        assert!(frame.is_empty());
        assert!(decode_batch(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_batch() {
        let frame = encode_batch([vec![1u8, 2, 3], vec![4u8, 5]]);

        let short_payload = &frame[..frame.len() - 1];
        assert!(matches!(
            decode_batch(short_payload),
            Err(CodecError::Truncated { offset: 7 })
        ));

        let short_header = &frame[..2];
        assert!(matches!(
            decode_batch(short_header),
            Err(CodecError::Truncated { offset: 0 })
        ));
    }

    #[test]
    fn test_batch_of_events_decodes() {
        let events = sample_events();
        let encoded: Vec<Vec<u8>> = events.iter().map(|e| encode(e).unwrap()).collect();
        let frame = encode_batch(&encoded);

        let decoded: Vec<Event> = decode_batch(&frame)
            .unwrap()
            .into_iter()
            .map(|record| decode(record).unwrap())
            .collect();
        assert_eq!(decoded, events);
    }
}
