//! Property-based tests for the frame codec.
//!
//! - Any valid message survives encode then decode unchanged
//! - A corrupted begin or end marker is always a protocol error
//! - A truncated frame never yields a message

use hotline::constants::{HEADER_LEN, TRAILER_LEN};
use hotline::protocol::{read_message, CodecError, Message, MessageType};
use proptest::prelude::*;

fn kind_strategy() -> impl Strategy<Value = MessageType> {
    (0u8..=7).prop_map(|value| MessageType::try_from(value).unwrap())
}

fn message_strategy() -> impl Strategy<Value = Message> {
    (kind_strategy(), any::<u16>(), any::<u16>(), prop::collection::vec(any::<u8>(), 0..512))
        .prop_map(|(kind, channel_id, client_id, payload)| {
            Message::new(kind, channel_id, client_id, payload)
        })
}

#[test]
fn prop_decode_inverts_encode() {
    proptest!(|(msg in message_strategy())| {
        let wire = msg.encode().unwrap();
        prop_assert_eq!(wire.len(), HEADER_LEN + msg.payload.len() + TRAILER_LEN);
        prop_assert_eq!(Message::decode(&wire).unwrap(), msg);
    });
}

#[test]
fn prop_corrupted_begin_marker_is_rejected() {
    proptest!(|(msg in message_strategy(), index in 0usize..2, flip in 1u8..=255)| {
        let mut wire = msg.encode().unwrap();
        wire[index] ^= flip;
        let err = Message::decode(&wire).unwrap_err();
        prop_assert!(matches!(err, CodecError::BadBeginMagic { .. }), "got {err:?}");
        prop_assert!(err.is_protocol());
    });
}

#[test]
fn prop_corrupted_end_marker_is_rejected() {
    proptest!(|(msg in message_strategy(), from_end in 1usize..=2, flip in 1u8..=255)| {
        let mut wire = msg.encode().unwrap();
        let index = wire.len() - from_end;
        wire[index] ^= flip;
        let err = Message::decode(&wire).unwrap_err();
        prop_assert!(matches!(err, CodecError::BadEndMagic { .. }), "got {err:?}");
        prop_assert!(err.is_protocol());
    });
}

#[test]
fn prop_unknown_type_is_rejected() {
    proptest!(|(msg in message_strategy(), kind in 8u8..=255)| {
        let mut wire = msg.encode().unwrap();
        wire[2] = kind;
        prop_assert!(matches!(Message::decode(&wire), Err(CodecError::UnknownType(k)) if k == kind));
    });
}

#[test]
fn prop_truncated_frame_never_decodes() {
    proptest!(|(msg in message_strategy(), cut in any::<prop::sample::Index>())| {
        let wire = msg.encode().unwrap();
        let len = cut.index(wire.len());
        let mut reader = &wire[..len];
        let err = read_message(&mut reader).unwrap_err();
        prop_assert!(matches!(err, CodecError::PeerClosed), "got {err:?}");
    });
}

#[test]
fn prop_back_to_back_frames_decode_in_order() {
    proptest!(|(msgs in prop::collection::vec(message_strategy(), 1..8))| {
        let mut wire = Vec::new();
        for msg in &msgs {
            wire.extend(msg.encode().unwrap());
        }
        let mut reader = wire.as_slice();
        for msg in &msgs {
            prop_assert_eq!(&read_message(&mut reader).unwrap(), msg);
        }
        prop_assert!(reader.is_empty());
    });
}
