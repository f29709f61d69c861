/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::borrow::Cow;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UriParseError {
    #[error("no host found")]
    NoHostFound,
    #[error("invalid port")]
    InvalidPort,
    #[error("invalid ipv6 host")]
    InvalidIpv6Host,
    #[error("unsupported scheme for this operation")]
    UnsupportedScheme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
    Ws,
    Wss,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http | Scheme::Ws => 80,
            Scheme::Https | Scheme::Wss => 443,
        }
    }

    pub fn is_ssl(&self) -> bool {
        matches!(self, Scheme::Https | Scheme::Wss)
    }

    pub fn is_websocket(&self) -> bool {
        matches!(self, Scheme::Ws | Scheme::Wss)
    }
}

/// A uri not prefixed by one of the supported schemes is taken as plain http.
pub fn complete_scheme(uri: &str) -> Cow<'_, str> {
    if uri.starts_with("http://")
        || uri.starts_with("https://")
        || uri.starts_with("ws://")
        || uri.starts_with("wss://")
    {
        Cow::Borrowed(uri)
    } else {
        Cow::Owned(format!("http://{uri}"))
    }
}

#[derive(Debug, Clone)]
pub struct UriParts {
    pub scheme: Scheme,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub query: String,
}

impl UriParts {
    pub fn parse(uri: &str) -> Result<Self, UriParseError> {
        let (scheme, left) = if let Some(left) = uri.strip_prefix("https://") {
            (Scheme::Https, left)
        } else if let Some(left) = uri.strip_prefix("http://") {
            (Scheme::Http, left)
        } else if let Some(left) = uri.strip_prefix("wss://") {
            (Scheme::Wss, left)
        } else if let Some(left) = uri.strip_prefix("ws://") {
            (Scheme::Ws, left)
        } else {
            (Scheme::Http, uri)
        };

        let (authority, path_and_query) = match memchr::memchr(b'/', left.as_bytes()) {
            Some(p) => (&left[..p], &left[p..]),
            None => (left, "/"),
        };

        let (host, port) = Self::split_authority(authority)?;
        if host.is_empty() {
            return Err(UriParseError::NoHostFound);
        }

        let (path, query) = match memchr::memchr(b'?', path_and_query.as_bytes()) {
            Some(p) => (&path_and_query[..p], &path_and_query[p + 1..]),
            None => (path_and_query, ""),
        };

        Ok(UriParts {
            scheme,
            host: host.to_string(),
            port,
            path: path.to_string(),
            query: query.to_string(),
        })
    }

    fn split_authority(authority: &str) -> Result<(&str, Option<u16>), UriParseError> {
        if let Some(left) = authority.strip_prefix('[') {
            // ipv6 literal
            let Some(p) = memchr::memchr(b']', left.as_bytes()) else {
                return Err(UriParseError::InvalidIpv6Host);
            };
            let host = &left[..p];
            let left = &left[p + 1..];
            if left.is_empty() {
                Ok((host, None))
            } else if let Some(port_s) = left.strip_prefix(':') {
                let port = u16::from_str(port_s).map_err(|_| UriParseError::InvalidPort)?;
                Ok((host, Some(port)))
            } else {
                Err(UriParseError::InvalidPort)
            }
        } else {
            match memchr::memchr(b':', authority.as_bytes()) {
                Some(p) => {
                    let port = u16::from_str(&authority[p + 1..])
                        .map_err(|_| UriParseError::InvalidPort)?;
                    Ok((&authority[..p], Some(port)))
                }
                None => Ok((authority, None)),
            }
        }
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or_else(|| self.scheme.default_port())
    }

    pub fn is_ssl(&self) -> bool {
        self.scheme.is_ssl()
    }

    pub fn is_websocket(&self) -> bool {
        self.scheme.is_websocket()
    }
}
