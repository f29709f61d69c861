/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::borrow::Cow;
use std::str::FromStr;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::parse::{HeaderLine, LineParseError, StatusLine};

/// Parsed response head, before any body byte is consumed.
pub(crate) struct ResponseHead {
    pub(crate) code: u16,
    pub(crate) reason: String,
    pub(crate) headers: HeaderMap,
    pub(crate) keep_alive: bool,
    pub(crate) chunked: bool,
    pub(crate) has_content_length: bool,
    pub(crate) content_length: u64,
    pub(crate) ranges: bool,
    pub(crate) location: Option<String>,
}

impl ResponseHead {
    /// Parse a complete header block, up to and including the final empty
    /// line.
    pub(crate) fn parse(block: &[u8]) -> Result<Self, LineParseError> {
        let mut lines = memchr::memchr_iter(b'\n', block);

        let first_end = lines.next().ok_or(LineParseError::NotLongEnough)?;
        let status = StatusLine::parse(&block[..=first_end])?;

        let mut head = ResponseHead {
            code: status.code,
            reason: status.reason.to_string(),
            headers: HeaderMap::new(),
            keep_alive: status.version > 0,
            chunked: false,
            has_content_length: false,
            content_length: 0,
            ranges: status.code == 206,
            location: None,
        };

        let mut line_start = first_end + 1;
        for line_end in lines {
            let line = &block[line_start..=line_end];
            line_start = line_end + 1;
            if line == b"\r\n" || line == b"\n" {
                break;
            }
            head.handle_header(HeaderLine::parse(line)?)?;
        }

        Ok(head)
    }

    fn handle_header(&mut self, header: HeaderLine<'_>) -> Result<(), LineParseError> {
        let name =
            HeaderName::from_str(header.name).map_err(|_| LineParseError::InvalidHeaderName)?;

        match name.as_str() {
            "connection" => {
                let value = header.value.to_lowercase();
                for v in value.split(',') {
                    match v.trim() {
                        "keep-alive" => self.keep_alive = true,
                        "close" => self.keep_alive = false,
                        _ => {}
                    }
                }
            }
            "transfer-encoding" => {
                let value = header.value.to_lowercase();
                if value.ends_with("chunked") {
                    self.chunked = true;
                } else if value.contains("chunked") {
                    // chunked must be the final transfer coding
                    return Err(LineParseError::InvalidHeaderValue);
                }
            }
            "content-length" => {
                let content_length = u64::from_str(header.value)
                    .map_err(|_| LineParseError::InvalidHeaderValue)?;
                if self.has_content_length && self.content_length != content_length {
                    return Err(LineParseError::InvalidHeaderValue);
                }
                self.has_content_length = true;
                self.content_length = content_length;
            }
            "content-range" => self.ranges = true,
            "location" => self.location = Some(header.value.to_string()),
            _ => {}
        }

        let value =
            HeaderValue::from_str(header.value).map_err(|_| LineParseError::InvalidHeaderValue)?;
        self.headers.append(name, value);
        Ok(())
    }

    pub(crate) fn body_len(&self) -> u64 {
        if self.has_content_length {
            self.content_length
        } else {
            0
        }
    }
}

/// A finished response. The body is fully delivered by the time this is
/// handed back (downloads stream to their file sink instead and leave the
/// body empty).
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) eof: bool,
}

impl Response {
    pub(crate) fn new(head: ResponseHead, body: Bytes, eof: bool) -> Self {
        Response {
            status: head.code,
            reason: head.reason,
            headers: head.headers,
            body,
            eof,
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether any pipelined bytes were left buffered behind this response.
    pub fn eof(&self) -> bool {
        self.eof
    }

    pub fn is_redirect(&self) -> bool {
        self.status > 299 && self.status <= 399
    }
}
