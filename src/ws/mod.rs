/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use bytes::Bytes;
use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};

use crate::error::HttpClientError;
use crate::io::{ClientStream, DelimiterReadExt, GatherWriteExt};

pub(crate) mod frame;
pub use frame::OpCode;
use frame::{CLOSE_NORMAL, FrameHeader};

const MAX_FRAME_PAYLOAD: u64 = 64 << 20;

/// Called for every data message delivered by the read loop, and once with
/// an error when the loop terminates abnormally.
pub type WsMessageCallback = Box<dyn FnMut(Result<Bytes, HttpClientError>) + Send>;
/// Called with the close reason when the peer sends a close frame.
pub type WsCloseCallback = Box<dyn FnMut(&str) + Send>;

pub(crate) enum WsCommand {
    Send {
        opcode: OpCode,
        payload: Vec<u8>,
        mask: bool,
        done: oneshot::Sender<Result<(), HttpClientError>>,
    },
}

/// Handle to the detached read loop owning the upgraded connection.
pub(crate) struct WsSession {
    cmd_tx: mpsc::Sender<WsCommand>,
}

impl WsSession {
    pub(crate) async fn send(
        &self,
        opcode: OpCode,
        payload: Vec<u8>,
        mask: bool,
    ) -> Result<(), HttpClientError> {
        let (done, done_rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Send {
                opcode,
                payload,
                mask,
                done,
            })
            .await
            .map_err(|_| HttpClientError::NotConnected)?;
        done_rx.await.map_err(|_| HttpClientError::NotConnected)?
    }
}

pub(crate) fn spawn_read_loop(
    stream: ClientStream,
    on_msg: Option<WsMessageCallback>,
    on_close: Option<WsCloseCallback>,
) -> WsSession {
    let (cmd_tx, cmd_rx) = mpsc::channel(1);
    tokio::spawn(read_loop(stream, cmd_rx, on_msg, on_close));
    WsSession { cmd_tx }
}

fn deliver_error(on_msg: &mut Option<WsMessageCallback>, e: HttpClientError) {
    debug!("websocket read loop terminated: {e}");
    if let Some(cb) = on_msg {
        cb(Err(e));
    }
}

/// Receive one complete message, reassembling continuation frames.
async fn recv_full_frame(
    reader: &mut BufReader<ReadHalf<ClientStream>>,
) -> Result<(OpCode, Vec<u8>), HttpClientError> {
    let mut opcode: Option<OpCode> = None;
    let mut payload = Vec::new();

    loop {
        let header: FrameHeader = frame::read_frame_header(reader)
            .await
            .map_err(map_ws_read_err)?;

        match opcode {
            None => {
                if header.opcode == OpCode::Continuation {
                    return Err(HttpClientError::ReadFailed(invalid_data(
                        "first frame must not be a continuation",
                    )));
                }
                opcode = Some(header.opcode);
            }
            Some(_) => {
                if header.opcode != OpCode::Continuation {
                    return Err(HttpClientError::ReadFailed(invalid_data(
                        "expected a continuation frame",
                    )));
                }
            }
        }

        if header.payload_len > MAX_FRAME_PAYLOAD {
            return Err(HttpClientError::ReadFailed(invalid_data(
                "frame payload too large",
            )));
        }
        if header.payload_len > 0 {
            let start = payload.len();
            payload.resize(start + header.payload_len as usize, 0);
            reader
                .read_exact(&mut payload[start..])
                .await
                .map_err(map_ws_read_err)?;
            if header.masked {
                frame::apply_mask(header.mask_key, &mut payload[start..]);
            }
        }

        if header.fin {
            break;
        }
    }

    Ok((opcode.unwrap_or(OpCode::Binary), payload))
}

fn invalid_data(msg: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string())
}

fn map_ws_read_err(e: std::io::Error) -> HttpClientError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        HttpClientError::RemoteClosed
    } else {
        HttpClientError::ReadFailed(e)
    }
}

async fn write_frame<W>(
    writer: &mut W,
    opcode: OpCode,
    mut payload: Vec<u8>,
    mask: bool,
) -> Result<(), HttpClientError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let header = frame::encode_frame(opcode, &mut payload, mask);
    writer
        .write_all_vectored(&header, &payload)
        .await
        .map_err(HttpClientError::WriteFailed)
}

async fn read_loop(
    stream: ClientStream,
    mut cmd_rx: mpsc::Receiver<WsCommand>,
    mut on_msg: Option<WsMessageCallback>,
    mut on_close: Option<WsCloseCallback>,
) {
    let (r, mut writer): (ReadHalf<ClientStream>, WriteHalf<ClientStream>) =
        tokio::io::split(stream);
    let mut reader = BufReader::new(r);

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => match cmd {
                Some(WsCommand::Send { opcode, payload, mask, done }) => {
                    let r = write_frame(&mut writer, opcode, payload, mask).await;
                    let _ = done.send(r);
                }
                None => {
                    // the client side is gone, say goodbye quietly
                    let payload = frame::close_payload(CLOSE_NORMAL, b"");
                    let _ = write_frame(&mut writer, OpCode::Close, payload, true).await;
                    let _ = writer.shutdown().await;
                    return;
                }
            },
            r = reader.fill_wait_data() => {
                match r {
                    Ok(true) => {}
                    Ok(false) => {
                        deliver_error(&mut on_msg, HttpClientError::RemoteClosed);
                        return;
                    }
                    Err(e) => {
                        deliver_error(&mut on_msg, HttpClientError::ReadFailed(e));
                        return;
                    }
                }

                let (opcode, payload) = match recv_full_frame(&mut reader).await {
                    Ok(v) => v,
                    Err(e) => {
                        deliver_error(&mut on_msg, e);
                        return;
                    }
                };

                match opcode {
                    OpCode::Close => {
                        let (code, reason) = frame::parse_close_payload(&payload);
                        if let Some(cb) = &mut on_close {
                            cb(&String::from_utf8_lossy(reason));
                        }
                        let reply = frame::close_payload(code, b"");
                        let _ = write_frame(&mut writer, OpCode::Close, reply, true).await;
                        let _ = writer.shutdown().await;
                        return;
                    }
                    OpCode::Ping => {
                        if let Err(e) = write_frame(&mut writer, OpCode::Pong, payload, true).await {
                            deliver_error(&mut on_msg, e);
                            return;
                        }
                    }
                    OpCode::Pong => {}
                    _ => {
                        if let Some(cb) = &mut on_msg {
                            cb(Ok(Bytes::from(payload)));
                        }
                    }
                }
            }
        }
    }
}
