/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use crate::tls::TlsClientConfigBuilder;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_SINGLE_PART_SIZE: usize = 1024 * 1024;

/// Whole-client configuration. Every `None` / empty field leaves the
/// corresponding option unconfigured.
#[derive(Debug, Default, Clone)]
pub struct HttpClientConfig {
    /// Per-request deadline. Timeouts stay disabled when unset.
    pub timeout: Option<Duration>,
    /// Fixed Sec-WebSocket-Key; a random key is generated when unset.
    pub ws_sec_key: Option<String>,
    /// Upper bound for a single write while streaming a file part.
    pub max_single_part_size: Option<usize>,
    pub proxy_host: Option<String>,
    pub proxy_port: Option<u16>,
    pub proxy_basic_user: Option<String>,
    pub proxy_basic_pass: Option<String>,
    pub proxy_bearer_token: Option<String>,
    /// TLS layer options; `None` leaves TLS unconfigured and HTTPS requests
    /// failing.
    pub tls: Option<TlsClientConfigBuilder>,
}

/// Proxy settings as used by the request path.
#[derive(Debug, Default, Clone)]
pub(crate) struct ProxyConfig {
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) basic_user: Option<String>,
    pub(crate) basic_pass: Option<String>,
    pub(crate) bearer_token: Option<String>,
}

impl ProxyConfig {
    pub(crate) fn is_configured(&self) -> bool {
        self.host.is_some() && self.port.is_some()
    }
}
