/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use bytes::BytesMut;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};

use crate::error::HttpClientError;
use crate::io::DelimiterReadExt;
use crate::parse::ChunkSizeLine;
use crate::CRLF;

const BODY_LINE_MAX_SIZE: usize = 1024;

/// Where decoded body bytes go: the in-memory accumulator backing the
/// response body, or a download file.
pub(crate) enum BodySink<'a> {
    Buffer(&'a mut BytesMut),
    File(&'a mut File),
}

impl BodySink<'_> {
    async fn write(&mut self, data: &[u8]) -> Result<(), HttpClientError> {
        match self {
            BodySink::Buffer(buf) => {
                buf.extend_from_slice(data);
                Ok(())
            }
            BodySink::File(file) => file
                .write_all(data)
                .await
                .map_err(HttpClientError::FileIoFailed),
        }
    }

    pub(crate) async fn flush(&mut self) -> Result<(), HttpClientError> {
        if let BodySink::File(file) = self {
            file.flush().await.map_err(HttpClientError::FileIoFailed)?;
        }
        Ok(())
    }
}

fn map_read_err(e: io::Error) -> HttpClientError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        HttpClientError::RemoteClosed
    } else {
        HttpClientError::ReadFailed(e)
    }
}

/// Read exactly `len` body bytes into the sink. Bytes already buffered in
/// the reader are served first, so a body fully carried over from the
/// header read completes without touching the socket.
pub(crate) async fn read_fixed<R>(
    reader: &mut R,
    len: u64,
    sink: &mut BodySink<'_>,
) -> Result<(), HttpClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut left = len;
    while left > 0 {
        let data = reader
            .fill_buf()
            .await
            .map_err(HttpClientError::ReadFailed)?;
        if data.is_empty() {
            return Err(HttpClientError::RemoteClosed);
        }
        let n = (data.len() as u64).min(left) as usize;
        sink.write(&data[..n]).await?;
        reader.consume(n);
        left -= n as u64;
    }
    sink.flush().await
}

async fn consume_chunk_end<R>(reader: &mut R) -> Result<(), HttpClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf).await.map_err(map_read_err)?;
    if crlf != *b"\r\n" {
        return Err(HttpClientError::InvalidChunkSize);
    }
    Ok(())
}

/// Decode a chunked body into the sink. A zero size chunk terminates; its
/// trailing CRLF is consumed so pipelined bytes behind the body stay intact.
pub(crate) async fn read_chunked<R>(
    reader: &mut R,
    sink: &mut BodySink<'_>,
) -> Result<(), HttpClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut size_line = BytesMut::with_capacity(32);
    loop {
        size_line.clear();
        let (found, nr) = reader
            .read_buf_until(CRLF, BODY_LINE_MAX_SIZE, &mut size_line)
            .await
            .map_err(HttpClientError::ReadFailed)?;
        if !found {
            return if nr < BODY_LINE_MAX_SIZE {
                Err(HttpClientError::RemoteClosed)
            } else {
                Err(HttpClientError::InvalidChunkSize)
            };
        }

        let chunk =
            ChunkSizeLine::parse(&size_line).map_err(|_| HttpClientError::InvalidChunkSize)?;

        if chunk.chunk_size == 0 {
            consume_chunk_end(reader).await?;
            sink.flush().await?;
            return Ok(());
        }

        let mut left = chunk.chunk_size;
        while left > 0 {
            let data = reader
                .fill_buf()
                .await
                .map_err(HttpClientError::ReadFailed)?;
            if data.is_empty() {
                return Err(HttpClientError::RemoteClosed);
            }
            let n = (data.len() as u64).min(left) as usize;
            sink.write(&data[..n]).await?;
            reader.consume(n);
            left -= n as u64;
        }

        consume_chunk_end(reader).await?;
    }
}
