/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use tokio::runtime::{Builder, Handle};
use tokio::sync::{Mutex, oneshot};

use crate::client::HttpClient;
use crate::config::HttpClientConfig;
use crate::error::HttpClientError;
use crate::request::ContentType;
use crate::response::Response;
use crate::tls::{TlsClientConfigBuilder, TlsConfigError};

/// Worker thread driving a current-thread runtime. Requests are posted onto
/// it and awaited from the calling thread, so all socket work stays on one
/// executor.
struct EventLoop {
    handle: Handle,
    thread_id: ThreadId,
    shutdown_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl EventLoop {
    fn start() -> Self {
        let (handle_tx, handle_rx) = std::sync::mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let thread = thread::Builder::new()
            .name("http-client-loop".to_string())
            .spawn(move || {
                let rt = Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build client event loop runtime");
                let _ = handle_tx.send(rt.handle().clone());
                rt.block_on(async move {
                    let _ = shutdown_rx.await;
                });
            })
            .expect("failed to spawn client event loop thread");
        let handle = handle_rx.recv().expect("client event loop did not start");
        let thread_id = thread.thread().id();
        EventLoop {
            handle,
            thread_id,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    fn block_on<F>(&self, fut: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        self.handle.spawn(async move {
            let _ = tx.send(fut.await);
        });
        rx.recv().expect("client event loop stopped")
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread::current().id() == self.thread_id {
                // dropped from a callback running on the loop itself; a join
                // here would deadlock, hand it to a detached finalizer
                thread::spawn(move || {
                    let _ = thread.join();
                });
            } else {
                let _ = thread.join();
            }
        }
    }
}

/// Blocking facade over [`HttpClient`]. Owns a single-threaded event loop;
/// every operation synchronously awaits its suspending counterpart on that
/// loop. The WebSocket read loop keeps running on the loop thread between
/// calls.
pub struct BlockingHttpClient {
    inner: Arc<Mutex<HttpClient>>,
    event_loop: EventLoop,
}

impl Default for BlockingHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockingHttpClient {
    pub fn new() -> Self {
        BlockingHttpClient {
            inner: Arc::new(Mutex::new(HttpClient::new())),
            event_loop: EventLoop::start(),
        }
    }

    fn with_client<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut HttpClient) -> T + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        self.event_loop
            .block_on(async move { f(&mut *inner.lock().await) })
    }

    pub fn init_config(&self, config: &HttpClientConfig) -> Result<(), TlsConfigError> {
        let config = config.clone();
        self.with_client(move |c| c.init_config(&config))
    }

    pub fn init_tls(&self, builder: &TlsClientConfigBuilder) -> Result<(), TlsConfigError> {
        let builder = builder.clone();
        self.with_client(move |c| c.init_tls(&builder))
    }

    pub fn add_header(&self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        let value = value.into();
        self.with_client(move |c| c.add_header(name, value))
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.with_client(move |c| c.set_timeout(timeout))
    }

    pub fn set_proxy(&self, host: impl Into<String>, port: u16) {
        let host = host.into();
        self.with_client(move |c| c.set_proxy(host, port))
    }

    pub fn set_proxy_basic_auth(&self, user: impl Into<String>, pass: impl Into<String>) {
        let user = user.into();
        let pass = pass.into();
        self.with_client(move |c| c.set_proxy_basic_auth(user, pass))
    }

    pub fn set_proxy_bearer_auth(&self, token: impl Into<String>) {
        let token = token.into();
        self.with_client(move |c| c.set_proxy_bearer_auth(token))
    }

    pub fn enable_follow_redirect(&self, enable: bool) {
        self.with_client(move |c| c.enable_follow_redirect(enable))
    }

    pub fn redirect_uri(&self) -> Option<String> {
        self.with_client(|c| c.redirect_uri().map(|s| s.to_string()))
    }

    pub fn set_ws_sec_key(&self, key: impl Into<String>) {
        let key = key.into();
        self.with_client(move |c| c.set_ws_sec_key(key))
    }

    pub fn set_max_single_part_size(&self, size: usize) {
        self.with_client(move |c| c.set_max_single_part_size(size))
    }

    pub fn add_text_part(&self, name: impl Into<String>, content: impl Into<Bytes>) -> bool {
        let name = name.into();
        let content = content.into();
        self.with_client(move |c| c.add_text_part(name, content))
    }

    pub fn add_file_part(&self, name: impl Into<String>, filename: impl Into<String>) -> bool {
        let name = name.into();
        let filename = filename.into();
        self.with_client(move |c| c.add_file_part(name, filename))
    }

    pub fn on_ws_msg<F>(&self, callback: F)
    where
        F: FnMut(Result<Bytes, HttpClientError>) + Send + 'static,
    {
        self.with_client(move |c| c.on_ws_msg(callback))
    }

    pub fn on_ws_close<F>(&self, callback: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.with_client(move |c| c.on_ws_close(callback))
    }

    pub fn has_closed(&self) -> bool {
        self.with_client(|c| c.has_closed())
    }

    pub fn get(&self, uri: &str) -> Result<Response, HttpClientError> {
        let inner = self.inner.clone();
        let uri = uri.to_string();
        self.event_loop
            .block_on(async move { inner.lock().await.get(&uri).await })
    }

    pub fn post(
        &self,
        uri: &str,
        content: impl Into<Bytes>,
        content_type: ContentType,
    ) -> Result<Response, HttpClientError> {
        let inner = self.inner.clone();
        let uri = uri.to_string();
        let content = content.into();
        self.event_loop
            .block_on(async move { inner.lock().await.post(&uri, content, content_type).await })
    }

    pub fn put(
        &self,
        uri: &str,
        content: impl Into<Bytes>,
        content_type: ContentType,
    ) -> Result<Response, HttpClientError> {
        let inner = self.inner.clone();
        let uri = uri.to_string();
        let content = content.into();
        self.event_loop
            .block_on(async move { inner.lock().await.put(&uri, content, content_type).await })
    }

    pub fn delete(
        &self,
        uri: &str,
        content: impl Into<Bytes>,
        content_type: ContentType,
    ) -> Result<Response, HttpClientError> {
        let inner = self.inner.clone();
        let uri = uri.to_string();
        let content = content.into();
        self.event_loop
            .block_on(async move { inner.lock().await.delete(&uri, content, content_type).await })
    }

    pub fn head(&self, uri: &str) -> Result<Response, HttpClientError> {
        self.request(Method::HEAD, uri)
    }

    pub fn patch(&self, uri: &str) -> Result<Response, HttpClientError> {
        self.request(Method::PATCH, uri)
    }

    pub fn options(&self, uri: &str) -> Result<Response, HttpClientError> {
        self.request(Method::OPTIONS, uri)
    }

    pub fn trace(&self, uri: &str) -> Result<Response, HttpClientError> {
        self.request(Method::TRACE, uri)
    }

    pub fn connect(&self, uri: &str) -> Result<Response, HttpClientError> {
        self.request(Method::CONNECT, uri)
    }

    pub fn request(&self, method: Method, uri: &str) -> Result<Response, HttpClientError> {
        let inner = self.inner.clone();
        let uri = uri.to_string();
        self.event_loop
            .block_on(async move { inner.lock().await.request(method, &uri).await })
    }

    pub fn upload(&self, uri: &str) -> Result<Response, HttpClientError> {
        let inner = self.inner.clone();
        let uri = uri.to_string();
        self.event_loop
            .block_on(async move { inner.lock().await.upload(&uri).await })
    }

    pub fn upload_file(
        &self,
        uri: &str,
        name: impl Into<String>,
        filename: impl Into<String>,
    ) -> Result<Response, HttpClientError> {
        let inner = self.inner.clone();
        let uri = uri.to_string();
        let name = name.into();
        let filename = filename.into();
        self.event_loop
            .block_on(async move { inner.lock().await.upload_file(&uri, name, filename).await })
    }

    pub fn download(
        &self,
        uri: &str,
        path: impl Into<PathBuf>,
        range: Option<&str>,
    ) -> Result<Response, HttpClientError> {
        let inner = self.inner.clone();
        let uri = uri.to_string();
        let path = path.into();
        let range = range.map(|s| s.to_string());
        self.event_loop.block_on(async move {
            inner
                .lock()
                .await
                .download(&uri, path, range.as_deref())
                .await
        })
    }

    pub fn ws_connect(&self, uri: &str) -> Result<Response, HttpClientError> {
        let inner = self.inner.clone();
        let uri = uri.to_string();
        self.event_loop
            .block_on(async move { inner.lock().await.ws_connect(&uri).await })
    }

    pub fn send_ws(&self, msg: impl Into<Vec<u8>>) -> Result<(), HttpClientError> {
        let inner = self.inner.clone();
        let msg = msg.into();
        self.event_loop
            .block_on(async move { inner.lock().await.send_ws(msg).await })
    }

    pub fn send_ws_close(&self, reason: &str) -> Result<(), HttpClientError> {
        let inner = self.inner.clone();
        let reason = reason.to_string();
        self.event_loop
            .block_on(async move { inner.lock().await.send_ws_close(&reason).await })
    }

    pub fn close(&self) {
        let inner = self.inner.clone();
        self.event_loop
            .block_on(async move { inner.lock().await.close().await })
    }

    pub fn reset(&self) {
        let inner = self.inner.clone();
        self.event_loop
            .block_on(async move { inner.lock().await.reset().await })
    }

    pub fn reconnect(&self, uri: &str) -> Result<Response, HttpClientError> {
        let inner = self.inner.clone();
        let uri = uri.to_string();
        self.event_loop
            .block_on(async move { inner.lock().await.reconnect(&uri).await })
    }
}

impl Drop for BlockingHttpClient {
    fn drop(&mut self) {
        // post a close onto the loop; the loop itself is stopped and joined
        // by the EventLoop drop that follows
        let inner = self.inner.clone();
        self.event_loop.handle.spawn(async move {
            inner.lock().await.close().await;
        });
    }
}
