//! Blocking frame codec over any byte stream.
//!
//! Every field moves through [`fill`] / [`drain`], which retry until the
//! whole buffer has been transferred. `EINTR` is retried; a zero-byte
//! transfer is reported as [`CodecError::PeerClosed`].

use std::io::{ErrorKind, Read, Write};

use crate::constants::{HEADER_LEN, MAGIC_BEGIN, MAGIC_END, MAX_PAYLOAD_SIZE, TRAILER_LEN};

use super::error::CodecError;
use super::message::{Message, MessageType};

/// Read exactly `buf.len()` bytes.
fn fill<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<(), CodecError> {
    let mut done = 0;
    while done < buf.len() {
        match reader.read(&mut buf[done..]) {
            Ok(0) => return Err(CodecError::PeerClosed),
            Ok(n) => done += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(CodecError::Io(e)),
        }
    }
    Ok(())
}

/// Write all of `buf`.
fn drain<W: Write + ?Sized>(writer: &mut W, buf: &[u8]) -> Result<(), CodecError> {
    let mut done = 0;
    while done < buf.len() {
        match writer.write(&buf[done..]) {
            Ok(0) => return Err(CodecError::PeerClosed),
            Ok(n) => done += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(CodecError::Io(e)),
        }
    }
    Ok(())
}

fn read_u16<R: Read + ?Sized>(reader: &mut R) -> Result<u16, CodecError> {
    let mut raw = [0u8; 2];
    fill(reader, &mut raw)?;
    Ok(u16::from_be_bytes(raw))
}

fn read_u32<R: Read + ?Sized>(reader: &mut R) -> Result<u32, CodecError> {
    let mut raw = [0u8; 4];
    fill(reader, &mut raw)?;
    Ok(u32::from_be_bytes(raw))
}

/// Read one complete frame.
///
/// Either the whole frame is returned or an error is; a frame whose end
/// marker is wrong is discarded along with its payload.
pub fn read_message<R: Read + ?Sized>(reader: &mut R) -> Result<Message, CodecError> {
    let begin = read_u16(reader)?;
    if begin != MAGIC_BEGIN {
        return Err(CodecError::BadBeginMagic { found: begin, expected: MAGIC_BEGIN });
    }

    let mut type_byte = [0u8; 1];
    fill(reader, &mut type_byte)?;
    let kind = MessageType::try_from(type_byte[0])?;

    let channel_id = read_u16(reader)?;
    let client_id = read_u16(reader)?;
    let size = read_u32(reader)?;
    if size > MAX_PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge {
            size: u64::from(size),
            max: u64::from(MAX_PAYLOAD_SIZE),
        });
    }

    let mut payload = vec![0u8; size as usize];
    fill(reader, &mut payload)?;

    let end = read_u16(reader)?;
    if end != MAGIC_END {
        return Err(CodecError::BadEndMagic { found: end, expected: MAGIC_END });
    }

    Ok(Message { kind, channel_id, client_id, payload })
}

/// Write one complete frame.
///
/// The frame is assembled in memory first and pushed with a single
/// full-transfer loop, so a failed payload check never leaves a partial
/// header on the stream.
pub fn write_message<W: Write + ?Sized>(writer: &mut W, msg: &Message) -> Result<(), CodecError> {
    let size = u32::try_from(msg.payload.len())
        .ok()
        .filter(|size| *size <= MAX_PAYLOAD_SIZE)
        .ok_or(CodecError::PayloadTooLarge {
            size: msg.payload.len() as u64,
            max: u64::from(MAX_PAYLOAD_SIZE),
        })?;

    let mut buf = Vec::with_capacity(HEADER_LEN + msg.payload.len() + TRAILER_LEN);
    buf.extend_from_slice(&MAGIC_BEGIN.to_be_bytes());
    buf.push(msg.kind.as_u8());
    buf.extend_from_slice(&msg.channel_id.to_be_bytes());
    buf.extend_from_slice(&msg.client_id.to_be_bytes());
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend_from_slice(&msg.payload);
    buf.extend_from_slice(&MAGIC_END.to_be_bytes());

    drain(writer, &buf)?;
    writer.flush()?;
    Ok(())
}
