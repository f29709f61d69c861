/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::io;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::BytesMut;
use tokio::io::AsyncBufRead;

/// Read until a multi byte delimiter is seen, appending everything up to and
/// including the delimiter to `buf`. Bytes after the delimiter stay buffered
/// in the reader. Resolves to `(found, nr)` where `nr` is the number of bytes
/// appended; `found` is false on EOF or when `max_len` was exceeded.
pub struct ReadBufUntil<'a, R: ?Sized> {
    reader: &'a mut R,
    delimiter: &'a [u8],
    buf: &'a mut BytesMut,
    start: usize,
    read: usize,
    limit: usize,
}

impl<'a, R> ReadBufUntil<'a, R>
where
    R: AsyncBufRead + ?Sized + Unpin,
{
    pub(super) fn new(
        reader: &'a mut R,
        delimiter: &'a [u8],
        max_len: usize,
        buf: &'a mut BytesMut,
    ) -> Self {
        let start = buf.len();
        Self {
            reader,
            delimiter,
            buf,
            start,
            read: 0,
            limit: max_len,
        }
    }
}

fn read_until_internal<R: AsyncBufRead + ?Sized>(
    mut reader: Pin<&mut R>,
    cx: &mut Context<'_>,
    delimiter: &[u8],
    buf: &mut BytesMut,
    start: usize,
    read: &mut usize,
    limit: usize,
) -> Poll<io::Result<(bool, usize)>> {
    loop {
        let (done, used) = {
            let available = ready!(reader.as_mut().poll_fill_buf(cx))?;
            if available.is_empty() {
                return Poll::Ready(Ok((false, mem::replace(read, 0))));
            }

            // the delimiter may span bytes taken by a previous fill and the
            // start of this window
            let buffered = &buf[start..];
            let overlap = delimiter.len() - 1;
            let mut end_in_window: Option<usize> = None;
            let max_k = overlap.min(buffered.len());
            for k in (1..=max_k).rev() {
                let (head, tail) = delimiter.split_at(k);
                if buffered.ends_with(head) && available.starts_with(tail) {
                    end_in_window = Some(tail.len());
                    break;
                }
            }
            if end_in_window.is_none() {
                if let Some(i) = memchr::memmem::find(available, delimiter) {
                    end_in_window = Some(i + delimiter.len());
                }
            }

            match end_in_window {
                Some(take) => {
                    buf.extend_from_slice(&available[..take]);
                    (true, take)
                }
                None => {
                    buf.extend_from_slice(available);
                    (false, available.len())
                }
            }
        };
        reader.as_mut().consume(used);
        *read += used;
        if done {
            return if *read > limit {
                Poll::Ready(Ok((false, mem::replace(read, 0))))
            } else {
                Poll::Ready(Ok((true, mem::replace(read, 0))))
            };
        }
        if *read > limit {
            return Poll::Ready(Ok((false, mem::replace(read, 0))));
        }
    }
}

impl<R: AsyncBufRead + ?Sized + Unpin> Future for ReadBufUntil<'_, R> {
    type Output = io::Result<(bool, usize)>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Self {
            reader,
            delimiter,
            buf,
            start,
            read,
            limit,
        } = &mut *self;
        read_until_internal(Pin::new(reader), cx, *delimiter, buf, *start, read, *limit)
    }
}

#[cfg(test)]
mod tests {
    use super::super::DelimiterReadExt;
    use bytes::{Bytes, BytesMut};
    use tokio::io::{BufReader, Result};
    use tokio_util::io::StreamReader;

    #[tokio::test]
    async fn single_read() {
        let content = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello";
        let stream = tokio_stream::iter(vec![Result::Ok(Bytes::from_static(content))]);
        let stream = StreamReader::new(stream);
        let mut buf_stream = BufReader::new(stream);
        let mut out = BytesMut::new();

        let (found, nr) = buf_stream
            .read_buf_until(b"\r\n\r\n", 4096, &mut out)
            .await
            .unwrap();
        assert!(found);
        assert_eq!(nr, content.len() - 5);
        assert!(out.ends_with(b"\r\n\r\n"));
    }

    #[tokio::test]
    async fn delimiter_split_across_reads() {
        let parts = vec![
            Result::Ok(Bytes::from_static(b"HTTP/1.1 200 OK\r")),
            Result::Ok(Bytes::from_static(b"\n\r")),
            Result::Ok(Bytes::from_static(b"\nbody")),
        ];
        let stream = StreamReader::new(tokio_stream::iter(parts));
        let mut buf_stream = BufReader::new(stream);
        let mut out = BytesMut::new();

        let (found, nr) = buf_stream
            .read_buf_until(b"\r\n\r\n", 4096, &mut out)
            .await
            .unwrap();
        assert!(found);
        assert_eq!(nr, 19);
        assert_eq!(out.as_ref(), b"HTTP/1.1 200 OK\r\n\r\n");
    }

    #[tokio::test]
    async fn byte_at_a_time() {
        let content = b"5\r\nhello\r\n";
        let parts: Vec<Result<Bytes>> = content
            .iter()
            .map(|b| Result::Ok(Bytes::copy_from_slice(std::slice::from_ref(b))))
            .collect();
        let stream = StreamReader::new(tokio_stream::iter(parts));
        let mut buf_stream = BufReader::new(stream);
        let mut out = BytesMut::new();

        let (found, nr) = buf_stream.read_buf_until(b"\r\n", 128, &mut out).await.unwrap();
        assert!(found);
        assert_eq!(nr, 3);
        assert_eq!(out.as_ref(), b"5\r\n");
    }

    #[tokio::test]
    async fn eof_before_delimiter() {
        let stream = StreamReader::new(tokio_stream::iter(vec![Result::Ok(
            Bytes::from_static(b"partial"),
        )]));
        let mut buf_stream = BufReader::new(stream);
        let mut out = BytesMut::new();

        let (found, nr) = buf_stream
            .read_buf_until(b"\r\n\r\n", 4096, &mut out)
            .await
            .unwrap();
        assert!(!found);
        assert_eq!(nr, 7);
    }

    #[tokio::test]
    async fn over_limit() {
        let stream = StreamReader::new(tokio_stream::iter(vec![Result::Ok(
            Bytes::from_static(b"0123456789abcdef\r\n"),
        )]));
        let mut buf_stream = BufReader::new(stream);
        let mut out = BytesMut::new();

        let (found, nr) = buf_stream.read_buf_until(b"\r\n", 8, &mut out).await.unwrap();
        assert!(!found);
        assert!(nr >= 8);
    }
}
