/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use bytes::Bytes;
use http::Method;
use tokio::fs::File;

use crate::config::ProxyConfig;
use crate::header;
use crate::multipart;
use crate::uri::{Scheme, UriParts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    #[default]
    None,
    Json,
    Text,
    FormUrlEncoded,
    OctetStream,
    Multipart,
}

impl ContentType {
    pub(crate) fn header_value(&self) -> Option<String> {
        match self {
            ContentType::None => None,
            ContentType::Json => Some("application/json".to_string()),
            ContentType::Text => Some("text/plain".to_string()),
            ContentType::FormUrlEncoded => {
                Some("application/x-www-form-urlencoded".to_string())
            }
            ContentType::OctetStream => Some("application/octet-stream".to_string()),
            ContentType::Multipart => Some(multipart::content_type_value()),
        }
    }
}

/// Everything that varies per request: the declared content type, extra
/// verbatim header text (already CRLF terminated), an inline body, and an
/// optional download sink. Dropped when the request finishes.
#[derive(Default)]
pub(crate) struct RequestContext {
    pub(crate) content_type: ContentType,
    pub(crate) extra_header: String,
    pub(crate) body: Bytes,
    pub(crate) sink: Option<File>,
}

impl RequestContext {
    pub(crate) fn with_body(content_type: ContentType, body: Bytes) -> Self {
        RequestContext {
            content_type,
            body,
            ..Default::default()
        }
    }
}

/// The request target line value: origin form normally, absolute form when a
/// forward proxy is configured.
fn request_target(u: &UriParts, proxy: &ProxyConfig) -> String {
    let mut target = String::with_capacity(u.path.len() + u.query.len() + 8);
    if proxy.is_configured() {
        match (u.scheme, u.port) {
            (Scheme::Https | Scheme::Wss, None) => {
                target.push_str("https://");
                target.push_str(&u.host);
                target.push_str(":443");
            }
            (_, None) => {
                target.push_str("http://");
                target.push_str(&u.host);
                target.push_str(":80");
            }
            (_, Some(port)) => {
                target.push_str("http://");
                target.push_str(&u.host);
                target.push(':');
                target.push_str(&port.to_string());
            }
        }
    }
    target.push_str(&u.path);
    if !u.query.is_empty() {
        target.push('?');
        target.push_str(&u.query);
    }
    target
}

/// Serialize the request line and header block. The `Host` header always
/// comes first and is never caller supplied.
pub(crate) fn build_request_header(
    u: &UriParts,
    method: &Method,
    ctx: &RequestContext,
    user_headers: &[(String, String)],
    proxy: &ProxyConfig,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    buf.extend_from_slice(method.as_str().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(request_target(u, proxy).as_bytes());
    buf.extend_from_slice(b" HTTP/1.1\r\n");

    buf.extend_from_slice(b"Host: ");
    buf.extend_from_slice(u.host.as_bytes());
    buf.extend_from_slice(b"\r\n");

    if let Some(ct) = ctx.content_type.header_value() {
        buf.extend_from_slice(b"Content-Type: ");
        buf.extend_from_slice(ct.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    let mut has_connection = false;
    for (name, value) in user_headers {
        if name == "Connection" {
            has_connection = true;
        }
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    if !has_connection {
        buf.extend_from_slice(b"Connection: keep-alive\r\n");
    }

    if let (Some(user), Some(pass)) = (&proxy.basic_user, &proxy.basic_pass) {
        buf.extend_from_slice(header::proxy_authorization_basic(user, pass).as_bytes());
    }
    if let Some(token) = &proxy.bearer_token {
        buf.extend_from_slice(header::proxy_authorization_bearer(token).as_bytes());
    }

    if !ctx.extra_header.is_empty() {
        buf.extend_from_slice(ctx.extra_header.as_bytes());
    }

    // POST always declares a length, even with an empty body; other methods
    // only when a body is present. Multipart lengths are precomputed by the
    // upload path instead.
    let should_add = !ctx.body.is_empty()
        || (*method == Method::POST && ctx.content_type != ContentType::Multipart);
    if should_add {
        buf.extend_from_slice(b"Content-Length: ");
        buf.extend_from_slice(ctx.body.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    buf.extend_from_slice(b"\r\n");
    buf
}
