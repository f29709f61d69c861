/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;

use thiserror::Error;

use crate::parse::LineParseError;
use crate::uri::UriParseError;

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("invalid uri: {0}")]
    InvalidUri(#[from] UriParseError),
    #[error("invalid response header: {0}")]
    InvalidResponseHeader(LineParseError),
    #[error("response header too large (> {0})")]
    TooLargeHeader(usize),
    #[error("invalid chunk size")]
    InvalidChunkSize,
    #[error("remote closed connection")]
    RemoteClosed,
    #[error("request timed out")]
    TimedOut,
    #[error("not connected")]
    NotConnected,
    #[error("tls client not configured")]
    TlsNotConfigured,
    #[error("connect failed: {0:?}")]
    ConnectFailed(io::Error),
    #[error("tls handshake failed: {0:?}")]
    TlsHandshakeFailed(io::Error),
    #[error("read failed: {0:?}")]
    ReadFailed(io::Error),
    #[error("write failed: {0:?}")]
    WriteFailed(io::Error),
    #[error("open file failed: {0:?}")]
    FileOpenFailed(io::Error),
    #[error("file io failed: {0:?}")]
    FileIoFailed(io::Error),
    #[error("upgrade rejected with status {0}")]
    UpgradeRejected(u16),
    #[error("no multipart data to send")]
    NoMultipartData,
}

impl HttpClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpClientError::TimedOut)
    }
}
