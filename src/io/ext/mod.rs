/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use bytes::BytesMut;
use tokio::io::{AsyncBufRead, AsyncWrite};

mod read_buf_until;
pub use read_buf_until::ReadBufUntil;

mod fill_wait_data;
pub use fill_wait_data::FillWaitData;

mod write_all_flush;
pub use write_all_flush::WriteAllFlush;

mod write_all_vectored;
pub use write_all_vectored::WriteAllVectored;

pub trait DelimiterReadExt: AsyncBufRead {
    fn read_buf_until<'a>(
        &'a mut self,
        delimiter: &'a [u8],
        max_len: usize,
        buf: &'a mut BytesMut,
    ) -> ReadBufUntil<'a, Self>
    where
        Self: Unpin,
    {
        ReadBufUntil::new(self, delimiter, max_len, buf)
    }

    fn fill_wait_data(&mut self) -> FillWaitData<'_, Self>
    where
        Self: Unpin,
    {
        FillWaitData::new(self)
    }
}

impl<R: AsyncBufRead + ?Sized> DelimiterReadExt for R {}

pub trait GatherWriteExt: AsyncWrite {
    fn write_all_flush<'a>(&'a mut self, buf: &'a [u8]) -> WriteAllFlush<'a, Self>
    where
        Self: Unpin,
    {
        WriteAllFlush::new(self, buf)
    }

    fn write_all_vectored<'a>(
        &'a mut self,
        head: &'a [u8],
        tail: &'a [u8],
    ) -> WriteAllVectored<'a, Self>
    where
        Self: Unpin,
    {
        WriteAllVectored::new(self, head, tail)
    }
}

impl<W: AsyncWrite + ?Sized> GatherWriteExt for W {}
