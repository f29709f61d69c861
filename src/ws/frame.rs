/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::io;

use tokio::io::{AsyncBufRead, AsyncReadExt};

pub(crate) const CLOSE_NORMAL: u16 = 1000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum OpCode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl OpCode {
    fn as_str(&self) -> &'static str {
        match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::Close => "Close",
            OpCode::Ping => "Ping",
            OpCode::Pong => "Pong",
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value & 0x0F {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            n => Err(n),
        }
    }
}

pub(crate) struct FrameHeader {
    pub(crate) fin: bool,
    pub(crate) opcode: OpCode,
    pub(crate) masked: bool,
    pub(crate) mask_key: [u8; 4],
    pub(crate) payload_len: u64,
}

/// Read one frame header. The fixed 2 bytes select how many more header
/// bytes follow: a 16 or 64 bit payload length and a 4 byte mask key.
pub(crate) async fn read_frame_header<R>(reader: &mut R) -> io::Result<FrameHeader>
where
    R: AsyncBufRead + Unpin,
{
    let mut fixed = [0u8; 2];
    reader.read_exact(&mut fixed).await?;

    let fin = fixed[0] & 0x80 != 0;
    let opcode = OpCode::try_from(fixed[0]).map_err(|n| {
        io::Error::new(io::ErrorKind::InvalidData, format!("unknown opcode {n:#x}"))
    })?;
    let masked = fixed[1] & 0x80 != 0;

    let payload_len = match fixed[1] & 0x7F {
        126 => {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf).await?;
            u64::from(u16::from_be_bytes(buf))
        }
        127 => {
            let mut buf = [0u8; 8];
            reader.read_exact(&mut buf).await?;
            u64::from_be_bytes(buf)
        }
        n => u64::from(n),
    };

    let mut mask_key = [0u8; 4];
    if masked {
        reader.read_exact(&mut mask_key).await?;
    }

    Ok(FrameHeader {
        fin,
        opcode,
        masked,
        mask_key,
        payload_len,
    })
}

pub(crate) fn apply_mask(key: [u8; 4], payload: &mut [u8]) {
    for (i, b) in payload.iter_mut().enumerate() {
        *b ^= key[i & 3];
    }
}

/// Encode a single final frame header for `payload`. When `mask` is set a
/// random key is appended to the header and the payload is masked in place,
/// so header and payload can be gather-written as two buffers.
pub(crate) fn encode_frame(opcode: OpCode, payload: &mut [u8], mask: bool) -> Vec<u8> {
    let mut header = Vec::with_capacity(14);
    header.push(0x80 | opcode as u8);

    let mask_bit = if mask { 0x80 } else { 0x00 };
    let len = payload.len() as u64;
    if len < 126 {
        header.push(mask_bit | len as u8);
    } else if len <= u64::from(u16::MAX) {
        header.push(mask_bit | 126);
        header.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        header.push(mask_bit | 127);
        header.extend_from_slice(&len.to_be_bytes());
    }

    if mask {
        let key: [u8; 4] = rand::random();
        header.extend_from_slice(&key);
        apply_mask(key, payload);
    }

    header
}

/// Close frame payload: a 2 byte status code followed by the reason text.
pub(crate) fn close_payload(code: u16, reason: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + reason.len());
    buf.extend_from_slice(&code.to_be_bytes());
    buf.extend_from_slice(reason);
    buf
}

pub(crate) fn parse_close_payload(payload: &[u8]) -> (u16, &[u8]) {
    if payload.len() >= 2 {
        (
            u16::from_be_bytes([payload[0], payload[1]]),
            &payload[2..],
        )
    } else {
        // no status code present
        (1005, b"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::io::BufReader;
    use tokio_util::io::StreamReader;

    async fn parse_bytes(frame: Vec<u8>) -> FrameHeader {
        let stream = tokio_stream::iter(vec![std::io::Result::Ok(Bytes::from(frame))]);
        let mut reader = BufReader::new(StreamReader::new(stream));
        read_frame_header(&mut reader).await.unwrap()
    }

    #[tokio::test]
    async fn roundtrip_short_unmasked() {
        let mut payload = b"ping".to_vec();
        let mut frame = encode_frame(OpCode::Text, &mut payload, false);
        frame.extend_from_slice(&payload);

        let header = parse_bytes(frame).await;
        assert!(header.fin);
        assert_eq!(header.opcode, OpCode::Text);
        assert!(!header.masked);
        assert_eq!(header.payload_len, 4);
        assert_eq!(payload, b"ping");
    }

    #[tokio::test]
    async fn roundtrip_masked() {
        let original = b"hello websocket".to_vec();
        let mut payload = original.clone();
        let mut frame = encode_frame(OpCode::Binary, &mut payload, true);
        frame.extend_from_slice(&payload);

        let header = parse_bytes(frame.clone()).await;
        assert!(header.masked);
        assert_eq!(header.payload_len, original.len() as u64);

        // unmasking restores the original payload
        let mut body = payload;
        apply_mask(header.mask_key, &mut body);
        assert_eq!(body, original);
    }

    #[tokio::test]
    async fn extended_16bit_length() {
        let mut payload = vec![0u8; 300];
        let frame = encode_frame(OpCode::Binary, &mut payload, false);
        assert_eq!(frame[1] & 0x7F, 126);

        let mut full = frame;
        full.extend_from_slice(&payload);
        let header = parse_bytes(full).await;
        assert_eq!(header.payload_len, 300);
    }

    #[tokio::test]
    async fn extended_64bit_length() {
        let mut payload = vec![0u8; 70_000];
        let frame = encode_frame(OpCode::Binary, &mut payload, false);
        assert_eq!(frame[1] & 0x7F, 127);

        let mut full = frame;
        full.extend_from_slice(&payload);
        let header = parse_bytes(full).await;
        assert_eq!(header.payload_len, 70_000);
    }

    #[test]
    fn close_payload_roundtrip() {
        let payload = close_payload(CLOSE_NORMAL, b"bye");
        let (code, reason) = parse_close_payload(&payload);
        assert_eq!(code, CLOSE_NORMAL);
        assert_eq!(reason, b"bye");

        let (code, reason) = parse_close_payload(b"");
        assert_eq!(code, 1005);
        assert!(reason.is_empty());
    }

    #[test]
    fn opcode_classification() {
        assert!(OpCode::Close.is_control());
        assert!(OpCode::Ping.is_control());
        assert!(!OpCode::Text.is_control());
        assert_eq!(OpCode::try_from(0x81), Ok(OpCode::Text));
        assert!(OpCode::try_from(0x03).is_err());
    }
}
