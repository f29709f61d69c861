/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::io::{self, IoSlice};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pin_project_lite::pin_project;
use tokio::io::AsyncWrite;

pin_project! {
    /// Gather write of two buffers, then flush. Uses a single vectored write
    /// per poll while both buffers have remaining bytes.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct WriteAllVectored<'a, W: ?Sized> {
        writer: &'a mut W,
        head: &'a [u8],
        tail: &'a [u8],
        flush_done: bool,
    }
}

impl<'a, W> WriteAllVectored<'a, W>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    pub(super) fn new(writer: &'a mut W, head: &'a [u8], tail: &'a [u8]) -> Self {
        WriteAllVectored {
            writer,
            head,
            tail,
            flush_done: false,
        }
    }
}

impl<W> Future for WriteAllVectored<'_, W>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    type Output = io::Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let me = self.project();
        while !me.head.is_empty() || !me.tail.is_empty() {
            let n = if me.head.is_empty() {
                ready!(Pin::new(&mut *me.writer).poll_write(cx, me.tail))?
            } else if me.tail.is_empty() {
                ready!(Pin::new(&mut *me.writer).poll_write(cx, me.head))?
            } else {
                let bufs = [IoSlice::new(me.head), IoSlice::new(me.tail)];
                ready!(Pin::new(&mut *me.writer).poll_write_vectored(cx, &bufs))?
            };
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            if n <= me.head.len() {
                *me.head = &me.head[n..];
            } else {
                let taken = n - me.head.len();
                *me.head = &[];
                *me.tail = &me.tail[taken..];
            }
        }

        if !*me.flush_done {
            ready!(Pin::new(&mut *me.writer).poll_flush(cx))?;
            *me.flush_done = true;
        }

        Poll::Ready(Ok(()))
    }
}
