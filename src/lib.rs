/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

//! Asynchronous HTTP/1.1 client over a single persistent connection.
//!
//! One [`HttpClient`] owns one connection and runs one request at a time.
//! It reconnects transparently, decodes fixed-length and chunked bodies,
//! streams multipart uploads and file downloads, follows one redirect on
//! request, upgrades to WebSocket in place, and can race every request
//! against a configurable deadline. [`BlockingHttpClient`] wraps the same
//! client in an owned single-threaded event loop for synchronous callers.

mod blocking;
mod body;
mod client;
mod config;
mod error;
mod fault;
mod header;
mod io;
mod mime;
mod multipart;
mod parse;
mod request;
mod response;
mod tls;
mod uri;
mod ws;

pub use blocking::BlockingHttpClient;
pub use client::HttpClient;
pub use config::{DEFAULT_MAX_SINGLE_PART_SIZE, DEFAULT_REQUEST_TIMEOUT, HttpClientConfig};
pub use error::HttpClientError;
pub use fault::FaultPolicy;
pub use parse::LineParseError;
pub use request::ContentType;
pub use response::Response;
pub use tls::{TlsClientConfig, TlsClientConfigBuilder, TlsConfigError};
pub use uri::{Scheme, UriParseError, UriParts, complete_scheme};
pub use ws::{OpCode, WsCloseCallback, WsMessageCallback};

pub(crate) const CRLF: &[u8] = b"\r\n";
pub(crate) const TWO_CRLF: &[u8] = b"\r\n\r\n";
