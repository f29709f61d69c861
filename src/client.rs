/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use base64::prelude::*;
use bytes::{Bytes, BytesMut};
use http::Method;
use log::{debug, warn};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::body::{self, BodySink};
use crate::config::{
    DEFAULT_MAX_SINGLE_PART_SIZE, DEFAULT_REQUEST_TIMEOUT, HttpClientConfig, ProxyConfig,
};
use crate::error::HttpClientError;
use crate::fault::FaultPolicy;
use crate::io::{ClientStream, DelimiterReadExt, GatherWriteExt};
use crate::multipart::{self, FormPart};
use crate::parse::LineParseError;
use crate::request::{ContentType, RequestContext, build_request_header};
use crate::response::{Response, ResponseHead};
use crate::tls::{TlsClientConfig, TlsClientConfigBuilder, TlsConfigError};
use crate::uri::{UriParseError, UriParts, complete_scheme};
use crate::ws::frame::CLOSE_NORMAL;
use crate::ws::{self, OpCode, WsCloseCallback, WsMessageCallback, WsSession, frame};
use crate::TWO_CRLF;

const DEFAULT_MAX_HEADER_SIZE: usize = 64 * 1024;
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// A reusable connection-bearing HTTP/1.1 client.
///
/// One client owns at most one connection and runs one request at a time;
/// the `&mut self` receivers make concurrent use impossible. A request
/// issued while the connection is closed transparently reconnects, with the
/// TLS layer selected by the request scheme.
pub struct HttpClient {
    stream: Option<BufReader<ClientStream>>,

    user_headers: Vec<(String, String)>,
    form_data: BTreeMap<String, FormPart>,
    max_single_part_size: usize,

    proxy: ProxyConfig,
    tls: Option<TlsClientConfig>,

    redirect_uri: Option<String>,
    follow_redirect: bool,

    timeout: Option<Duration>,
    max_header_size: usize,

    chunk_acc: BytesMut,

    ws_sec_key: Option<String>,
    ws_session: Option<WsSession>,
    on_ws_msg: Option<WsMessageCallback>,
    on_ws_close: Option<WsCloseCallback>,

    fault: FaultPolicy,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    pub fn new() -> Self {
        HttpClient {
            stream: None,
            user_headers: Vec::new(),
            form_data: BTreeMap::new(),
            max_single_part_size: DEFAULT_MAX_SINGLE_PART_SIZE,
            proxy: ProxyConfig::default(),
            tls: None,
            redirect_uri: None,
            follow_redirect: false,
            timeout: None,
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            chunk_acc: BytesMut::new(),
            ws_sec_key: None,
            ws_session: None,
            on_ws_msg: None,
            on_ws_close: None,
            fault: FaultPolicy::default(),
        }
    }

    /// Apply a whole [`HttpClientConfig`] at once.
    pub fn init_config(&mut self, config: &HttpClientConfig) -> Result<(), TlsConfigError> {
        if let Some(timeout) = config.timeout {
            self.set_timeout(timeout);
        }
        if let Some(key) = &config.ws_sec_key {
            self.set_ws_sec_key(key.clone());
        }
        if let Some(size) = config.max_single_part_size {
            self.set_max_single_part_size(size);
        }
        if let (Some(host), Some(port)) = (&config.proxy_host, config.proxy_port) {
            self.set_proxy(host.clone(), port);
        }
        if let (Some(user), Some(pass)) = (&config.proxy_basic_user, &config.proxy_basic_pass) {
            self.set_proxy_basic_auth(user.clone(), pass.clone());
        }
        if let Some(token) = &config.proxy_bearer_token {
            self.set_proxy_bearer_auth(token.clone());
        }
        if let Some(tls) = &config.tls {
            self.init_tls(tls)?;
        }
        Ok(())
    }

    /// Build and install the TLS layer. A failure here is sticky: the TLS
    /// config stays absent and later HTTPS requests fail without a
    /// handshake attempt.
    pub fn init_tls(&mut self, builder: &TlsClientConfigBuilder) -> Result<(), TlsConfigError> {
        match builder.build() {
            Ok(config) => {
                self.tls = Some(config);
                Ok(())
            }
            Err(e) => {
                warn!("tls init failed: {e}");
                self.tls = None;
                Err(e)
            }
        }
    }

    pub fn has_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Queue a header for the next request. `Host` and duplicate names are
    /// silently rejected. The list is cleared when the request finishes,
    /// whether it succeeded or not.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if name.is_empty() || name == "Host" {
            return false;
        }
        if self.user_headers.iter().any(|(n, _)| *n == name) {
            return false;
        }
        self.user_headers.push((name, value.into()));
        true
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    pub fn default_timeout(&mut self) {
        self.timeout = Some(DEFAULT_REQUEST_TIMEOUT);
    }

    pub fn set_proxy(&mut self, host: impl Into<String>, port: u16) {
        self.proxy.host = Some(host.into());
        self.proxy.port = Some(port);
    }

    pub fn set_proxy_basic_auth(&mut self, user: impl Into<String>, pass: impl Into<String>) {
        self.proxy.basic_user = Some(user.into());
        self.proxy.basic_pass = Some(pass.into());
    }

    pub fn set_proxy_bearer_auth(&mut self, token: impl Into<String>) {
        self.proxy.bearer_token = Some(token.into());
    }

    pub fn enable_follow_redirect(&mut self, enable: bool) {
        self.follow_redirect = enable;
    }

    /// The `Location` target recorded from the last 3xx response.
    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    pub fn set_ws_sec_key(&mut self, key: impl Into<String>) {
        self.ws_sec_key = Some(key.into());
    }

    pub fn set_max_single_part_size(&mut self, size: usize) {
        self.max_single_part_size = size;
    }

    pub fn fault_policy_mut(&mut self) -> &mut FaultPolicy {
        &mut self.fault
    }

    pub fn on_ws_msg<F>(&mut self, callback: F)
    where
        F: FnMut(Result<Bytes, HttpClientError>) + Send + 'static,
    {
        self.on_ws_msg = Some(Box::new(callback));
    }

    pub fn on_ws_close<F>(&mut self, callback: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.on_ws_close = Some(Box::new(callback));
    }

    pub async fn get(&mut self, uri: &str) -> Result<Response, HttpClientError> {
        let resp = self
            .request_with(Method::GET, uri, RequestContext::default())
            .await?;
        if resp.is_redirect()
            && self.follow_redirect
            && let Some(target) = self.redirect_uri.clone()
        {
            return self
                .request_with(Method::GET, &target, RequestContext::default())
                .await;
        }
        Ok(resp)
    }

    pub async fn post(
        &mut self,
        uri: &str,
        content: impl Into<Bytes>,
        content_type: ContentType,
    ) -> Result<Response, HttpClientError> {
        let ctx = RequestContext::with_body(content_type, content.into());
        self.request_with(Method::POST, uri, ctx).await
    }

    pub async fn put(
        &mut self,
        uri: &str,
        content: impl Into<Bytes>,
        content_type: ContentType,
    ) -> Result<Response, HttpClientError> {
        let ctx = RequestContext::with_body(content_type, content.into());
        self.request_with(Method::PUT, uri, ctx).await
    }

    pub async fn delete(
        &mut self,
        uri: &str,
        content: impl Into<Bytes>,
        content_type: ContentType,
    ) -> Result<Response, HttpClientError> {
        let ctx = RequestContext::with_body(content_type, content.into());
        self.request_with(Method::DELETE, uri, ctx).await
    }

    pub async fn head(&mut self, uri: &str) -> Result<Response, HttpClientError> {
        self.request(Method::HEAD, uri).await
    }

    pub async fn patch(&mut self, uri: &str) -> Result<Response, HttpClientError> {
        self.request(Method::PATCH, uri).await
    }

    pub async fn options(&mut self, uri: &str) -> Result<Response, HttpClientError> {
        self.request(Method::OPTIONS, uri).await
    }

    pub async fn trace(&mut self, uri: &str) -> Result<Response, HttpClientError> {
        self.request(Method::TRACE, uri).await
    }

    pub async fn connect(&mut self, uri: &str) -> Result<Response, HttpClientError> {
        self.request(Method::CONNECT, uri).await
    }

    /// Issue a bodyless request with an arbitrary method.
    pub async fn request(
        &mut self,
        method: Method,
        uri: &str,
    ) -> Result<Response, HttpClientError> {
        self.request_with(method, uri, RequestContext::default())
            .await
    }

    /// Stream the queued multipart form to `uri` as a POST. The form table
    /// and the user header list are cleared when this returns.
    pub async fn upload(&mut self, uri: &str) -> Result<Response, HttpClientError> {
        let form = std::mem::take(&mut self.form_data);
        let result = self.upload_inner(uri, &form).await;
        self.user_headers.clear();
        match result {
            Ok(resp) => Ok(resp),
            Err(e) => {
                debug!("upload failed: {e}");
                self.close().await;
                Err(e)
            }
        }
    }

    /// Convenience form adding a single file part before uploading.
    pub async fn upload_file(
        &mut self,
        uri: &str,
        name: impl Into<String>,
        filename: impl Into<String>,
    ) -> Result<Response, HttpClientError> {
        if !self.add_file_part(name, filename) {
            return Err(HttpClientError::NoMultipartData);
        }
        self.upload(uri).await
    }

    /// GET `uri` and write the body to `path`, appending to whatever is
    /// already there. `range` adds a `Range: bytes=...` request header.
    pub async fn download(
        &mut self,
        uri: &str,
        path: impl AsRef<Path>,
        range: Option<&str>,
    ) -> Result<Response, HttpClientError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .await
            .map_err(HttpClientError::FileOpenFailed)?;

        let mut ctx = RequestContext {
            sink: Some(file),
            ..Default::default()
        };
        if let Some(range) = range {
            ctx.extra_header = format!("Range: bytes={range}\r\n");
        }
        self.request_with(Method::GET, uri, ctx).await
    }

    /// Queue an inline string part. Duplicate field names are rejected.
    pub fn add_text_part(&mut self, name: impl Into<String>, content: impl Into<Bytes>) -> bool {
        let name = name.into();
        if self.form_data.contains_key(&name) {
            return false;
        }
        let content = content.into();
        let size = content.len() as u64;
        self.form_data.insert(
            name,
            FormPart {
                filename: None,
                content,
                size,
            },
        );
        true
    }

    /// Queue a file part. The file must exist now to learn its size; it is
    /// opened again and streamed at send time.
    pub fn add_file_part(&mut self, name: impl Into<String>, filename: impl Into<String>) -> bool {
        let name = name.into();
        if self.form_data.contains_key(&name) {
            debug!("multipart field {name} already exists");
            return false;
        }
        let filename = filename.into();
        let size = match std::fs::metadata(&filename) {
            Ok(meta) => meta.len(),
            Err(e) => {
                debug!("cannot stat multipart file {filename}: {e}");
                return false;
            }
        };
        self.form_data.insert(
            name,
            FormPart {
                filename: Some(filename),
                content: Bytes::new(),
                size,
            },
        );
        true
    }

    /// Upgrade to WebSocket. On a `101` response the connection is handed to
    /// a detached read loop which delivers messages and close events to the
    /// registered callbacks; afterwards the frames of this client go through
    /// [`send_ws`](Self::send_ws) and friends.
    pub async fn ws_connect(&mut self, uri: &str) -> Result<Response, HttpClientError> {
        let url = complete_scheme(uri).into_owned();
        let u = UriParts::parse(&url)?;
        if !u.is_websocket() {
            return Err(HttpClientError::InvalidUri(UriParseError::UnsupportedScheme));
        }

        let key = match &self.ws_sec_key {
            Some(key) => key.clone(),
            None => BASE64_STANDARD.encode(rand::random::<[u8; 16]>()),
        };
        self.add_header("Upgrade", "websocket");
        self.add_header("Connection", "Upgrade");
        self.add_header("Sec-WebSocket-Key", key);
        self.add_header("Sec-WebSocket-Version", "13");

        let resp = self
            .request_with(Method::GET, &url, RequestContext::default())
            .await?;
        if resp.status != 101 {
            self.close().await;
            return Err(HttpClientError::UpgradeRejected(resp.status));
        }

        let Some(buf_reader) = self.stream.take() else {
            return Err(HttpClientError::NotConnected);
        };
        // bytes buffered behind the 101 are dropped; frames only start
        // flowing once the loop owns the connection
        let stream = buf_reader.into_inner();
        let session = ws::spawn_read_loop(stream, self.on_ws_msg.take(), self.on_ws_close.take());
        self.ws_session = Some(session);
        Ok(resp)
    }

    /// Send a text frame. Client frames are masked.
    pub async fn send_ws(&mut self, msg: impl Into<Vec<u8>>) -> Result<(), HttpClientError> {
        self.send_ws_frame(OpCode::Text, msg.into(), true).await
    }

    pub async fn send_ws_binary(
        &mut self,
        msg: impl Into<Vec<u8>>,
    ) -> Result<(), HttpClientError> {
        self.send_ws_frame(OpCode::Binary, msg.into(), true).await
    }

    /// Send a close frame with a normal-closure status and `reason`.
    pub async fn send_ws_close(&mut self, reason: &str) -> Result<(), HttpClientError> {
        let payload = frame::close_payload(CLOSE_NORMAL, reason.as_bytes());
        self.send_ws_frame(OpCode::Close, payload, true).await
    }

    async fn send_ws_frame(
        &mut self,
        opcode: OpCode,
        payload: Vec<u8>,
        mask: bool,
    ) -> Result<(), HttpClientError> {
        let Some(session) = &self.ws_session else {
            return Err(HttpClientError::NotConnected);
        };
        session.send(opcode, payload, mask).await
    }

    /// Close the connection. Shutdown errors are swallowed; the client is
    /// reusable afterwards and will reconnect on the next request.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }

    /// Drop all connection state, including a live WebSocket session.
    pub async fn reset(&mut self) {
        self.close().await;
        self.ws_session = None;
        self.redirect_uri = None;
    }

    pub async fn reconnect(&mut self, uri: &str) -> Result<Response, HttpClientError> {
        self.reset().await;
        self.get(uri).await
    }

    async fn request_with(
        &mut self,
        method: Method,
        uri: &str,
        mut ctx: RequestContext,
    ) -> Result<Response, HttpClientError> {
        self.chunk_acc.clear();
        let url = complete_scheme(uri).into_owned();

        let result = self.request_guarded(&method, &url, &mut ctx).await;
        self.user_headers.clear();
        match result {
            Ok(resp) => Ok(resp),
            Err(e) => {
                debug!("{method} {url} failed: {e}");
                self.close().await;
                Err(e)
            }
        }
    }

    /// Run the request under the configured deadline. On expiry the request
    /// future is dropped mid-flight and the socket is closed by the caller,
    /// so the relabeled `TimedOut` always wins over the transport error the
    /// forced close would have produced.
    async fn request_guarded(
        &mut self,
        method: &Method,
        url: &str,
        ctx: &mut RequestContext,
    ) -> Result<Response, HttpClientError> {
        let u = UriParts::parse(url)?;
        match self.timeout {
            Some(duration) => tokio::time::timeout(duration, self.do_request(&u, method, ctx))
                .await
                .unwrap_or(Err(HttpClientError::TimedOut)),
            None => self.do_request(&u, method, ctx).await,
        }
    }

    async fn do_request(
        &mut self,
        u: &UriParts,
        method: &Method,
        ctx: &mut RequestContext,
    ) -> Result<Response, HttpClientError> {
        self.ensure_connected(u).await?;
        let header = build_request_header(u, method, ctx, &self.user_headers, &self.proxy);
        let body = ctx.body.clone();
        self.stream_write_vectored(&header, &body).await?;
        self.read_response(method, ctx).await
    }

    async fn ensure_connected(&mut self, u: &UriParts) -> Result<(), HttpClientError> {
        if self.stream.is_some() {
            return Ok(());
        }
        if u.is_ssl() && self.tls.is_none() {
            return Err(HttpClientError::TlsNotConfigured);
        }

        let host = self.proxy.host.clone().unwrap_or_else(|| u.host.clone());
        let port = self.proxy.port.unwrap_or_else(|| u.port_or_default());
        debug!("connecting to {host}:{port}");
        let tcp = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(HttpClientError::ConnectFailed)?;

        let stream = if u.is_ssl() {
            let Some(tls) = &self.tls else {
                return Err(HttpClientError::TlsNotConfigured);
            };
            let tls_stream = tls
                .handshake(tcp, &u.host)
                .await
                .map_err(HttpClientError::TlsHandshakeFailed)?;
            ClientStream::Tls(Box::new(tls_stream))
        } else {
            ClientStream::Plain(tcp)
        };

        self.stream = Some(BufReader::with_capacity(READ_BUFFER_SIZE, stream));
        Ok(())
    }

    async fn stream_write_vectored(
        &mut self,
        head: &[u8],
        tail: &[u8],
    ) -> Result<(), HttpClientError> {
        if self.fault.take_write_failed() {
            return Err(HttpClientError::NotConnected);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(HttpClientError::NotConnected);
        };
        stream
            .write_all_vectored(head, tail)
            .await
            .map_err(HttpClientError::WriteFailed)
    }

    async fn stream_write(&mut self, buf: &[u8]) -> Result<(), HttpClientError> {
        if self.fault.take_write_failed() {
            return Err(HttpClientError::NotConnected);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(HttpClientError::NotConnected);
        };
        stream
            .write_all_flush(buf)
            .await
            .map_err(HttpClientError::WriteFailed)
    }

    /// One response cycle: header block, then the body by delivery mode,
    /// leaving any pipelined tail in the carry-over buffer.
    async fn read_response(
        &mut self,
        method: &Method,
        ctx: &mut RequestContext,
    ) -> Result<Response, HttpClientError> {
        let max_header_size = self.max_header_size;
        let stream = self.stream.as_mut().ok_or(HttpClientError::NotConnected)?;

        let mut head_block = BytesMut::with_capacity(1024);
        let (found, nr) = stream
            .read_buf_until(TWO_CRLF, max_header_size, &mut head_block)
            .await
            .map_err(HttpClientError::ReadFailed)?;
        if !found {
            return Err(if nr >= max_header_size {
                HttpClientError::TooLargeHeader(max_header_size)
            } else {
                HttpClientError::RemoteClosed
            });
        }

        if self.fault.take_response_error() {
            return Err(HttpClientError::InvalidResponseHeader(
                LineParseError::InvalidStatusCode,
            ));
        }
        if self.fault.take_header_error() {
            return Err(HttpClientError::InvalidResponseHeader(
                LineParseError::InvalidHeaderName,
            ));
        }

        let head =
            ResponseHead::parse(&head_block).map_err(HttpClientError::InvalidResponseHeader)?;

        let mut keep_alive = head.keep_alive;
        // a ranged or chunked response keeps the connection in practice,
        // whatever the header said
        if head.ranges || head.chunked {
            keep_alive = true;
        }

        let resp = if *method == Method::HEAD {
            let eof = stream.buffer().is_empty();
            Response::new(head, Bytes::new(), eof)
        } else if head.chunked {
            if self.fault.take_read_failed() {
                return Err(HttpClientError::NotConnected);
            }
            if self.fault.take_chunk_error() {
                return Err(HttpClientError::InvalidChunkSize);
            }
            let body = match &mut ctx.sink {
                Some(file) => {
                    body::read_chunked(stream, &mut BodySink::File(file)).await?;
                    Bytes::new()
                }
                None => {
                    body::read_chunked(stream, &mut BodySink::Buffer(&mut self.chunk_acc)).await?;
                    self.chunk_acc.split().freeze()
                }
            };
            Response::new(head, body, true)
        } else {
            self.redirect_uri = head.location.clone();

            let body_len = head.body_len();
            let body = if body_len == 0 {
                Bytes::new()
            } else {
                match &mut ctx.sink {
                    Some(file) if head.ranges => {
                        // ranged bodies go to the sink and stay visible as
                        // the response body
                        let mut acc = BytesMut::with_capacity(body_len.min(64 * 1024) as usize);
                        body::read_fixed(stream, body_len, &mut BodySink::Buffer(&mut acc))
                            .await?;
                        file.write_all(&acc)
                            .await
                            .map_err(HttpClientError::FileIoFailed)?;
                        file.flush()
                            .await
                            .map_err(HttpClientError::FileIoFailed)?;
                        acc.freeze()
                    }
                    Some(file) => {
                        body::read_fixed(stream, body_len, &mut BodySink::File(file)).await?;
                        Bytes::new()
                    }
                    None => {
                        let mut acc = BytesMut::with_capacity(body_len.min(64 * 1024) as usize);
                        body::read_fixed(stream, body_len, &mut BodySink::Buffer(&mut acc))
                            .await?;
                        acc.freeze()
                    }
                }
            };
            let eof = stream.buffer().is_empty();
            Response::new(head, body, eof)
        };

        if !keep_alive {
            self.close().await;
        }
        Ok(resp)
    }

    async fn upload_inner(
        &mut self,
        uri: &str,
        form: &BTreeMap<String, FormPart>,
    ) -> Result<Response, HttpClientError> {
        if form.is_empty() {
            return Err(HttpClientError::NoMultipartData);
        }

        self.chunk_acc.clear();
        let url = complete_scheme(uri).into_owned();
        let u = UriParts::parse(&url)?;

        match self.timeout {
            Some(duration) => tokio::time::timeout(duration, self.do_upload(&u, form))
                .await
                .unwrap_or(Err(HttpClientError::TimedOut)),
            None => self.do_upload(&u, form).await,
        }
    }

    async fn do_upload(
        &mut self,
        u: &UriParts,
        form: &BTreeMap<String, FormPart>,
    ) -> Result<Response, HttpClientError> {
        self.ensure_connected(u).await?;

        let content_length = multipart::content_length(form);
        let mut ctx = RequestContext {
            content_type: ContentType::Multipart,
            extra_header: format!("Content-Length: {content_length}\r\n"),
            ..Default::default()
        };

        let header = build_request_header(u, &Method::POST, &ctx, &self.user_headers, &self.proxy);
        self.stream_write(&header).await?;

        for (name, part) in form {
            self.send_single_part(name, part).await?;
        }

        self.stream_write(&multipart::closing_boundary()).await?;
        self.read_response(&Method::POST, &mut ctx).await
    }

    async fn send_single_part(
        &mut self,
        name: &str,
        part: &FormPart,
    ) -> Result<(), HttpClientError> {
        // open the file before emitting anything of this part
        let mut file = match &part.filename {
            Some(filename) => Some(
                File::open(filename)
                    .await
                    .map_err(HttpClientError::FileOpenFailed)?,
            ),
            None => None,
        };

        let header = multipart::part_header(name, part);
        self.stream_write(&header).await?;

        if let Some(file) = &mut file {
            let mut left = part.size;
            let mut chunk = vec![0u8; self.max_single_part_size.min(part.size as usize).max(1)];
            while left > 0 {
                let n = (left as usize).min(chunk.len());
                file.read_exact(&mut chunk[..n])
                    .await
                    .map_err(HttpClientError::FileIoFailed)?;
                self.stream_write(&chunk[..n]).await?;
                left -= n as u64;
            }
        } else {
            let content = part.content.clone();
            self.stream_write(&content).await?;
        }

        self.stream_write(b"\r\n").await
    }
}
