/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::mime;

/// Fixed boundary used both in the Content-Type header addendum and in the
/// outbound framing.
pub(crate) const BOUNDARY: &str = "----MultipartFormBoundary29CfB3x9";

const DISPOSITION_PREFIX: &str = "Content-Disposition: form-data; name=\"";
const FILENAME_PREFIX: &str = "; filename=\"";
const CONTENT_TYPE_PREFIX: &str = "Content-Type: ";

/// One entry of the multipart form table. `filename` absent means an inline
/// string part whose bytes live in `content`; file parts are streamed from
/// disk at send time.
#[derive(Clone)]
pub(crate) struct FormPart {
    pub(crate) filename: Option<String>,
    pub(crate) content: Bytes,
    pub(crate) size: u64,
}

pub(crate) fn content_type_value() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

fn basename(path: &str) -> &str {
    match memchr::memrchr(b'/', path.as_bytes()) {
        Some(p) => &path[p + 1..],
        None => path,
    }
}

fn part_mime(filename: &str) -> Option<&'static str> {
    mime::file_extension(filename).and_then(mime::content_type_by_extension)
}

/// Byte count of one part exactly as [`part_header`] plus body framing emit
/// it. The additive model and the emitter share the framing literals, so the
/// two cannot drift apart.
fn part_len(name: &str, part: &FormPart) -> u64 {
    // "--BOUNDARY\r\n" + disposition prologue, then the quoted name
    let mut len = (2 + BOUNDARY.len() + 2 + DISPOSITION_PREFIX.len()) as u64;
    len += (name.len() + 1) as u64;
    if let Some(filename) = &part.filename {
        let short = basename(filename);
        len += (FILENAME_PREFIX.len() + short.len() + 1) as u64;
        if let Some(ct) = part_mime(short) {
            len += (2 + CONTENT_TYPE_PREFIX.len() + ct.len()) as u64;
        }
    }
    // blank line between part headers and body
    len += 4;
    // body and trailing CRLF
    len += part.size + 2;
    len
}

/// The exact Content-Length of the whole multipart body, computed before a
/// single byte is written.
pub(crate) fn content_length(form: &BTreeMap<String, FormPart>) -> u64 {
    let mut len = 0u64;
    for (name, part) in form {
        len += part_len(name, part);
    }
    // closing "--BOUNDARY--\r\n"
    len += (6 + BOUNDARY.len()) as u64;
    len
}

/// Header block of one part, up to and including the blank separator line.
pub(crate) fn part_header(name: &str, part: &FormPart) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    buf.extend_from_slice(b"--");
    buf.extend_from_slice(BOUNDARY.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(DISPOSITION_PREFIX.as_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.push(b'"');
    if let Some(filename) = &part.filename {
        let short = basename(filename);
        buf.extend_from_slice(FILENAME_PREFIX.as_bytes());
        buf.extend_from_slice(short.as_bytes());
        buf.push(b'"');
        if let Some(ct) = part_mime(short) {
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(CONTENT_TYPE_PREFIX.as_bytes());
            buf.extend_from_slice(ct.as_bytes());
        }
    }
    buf.extend_from_slice(b"\r\n\r\n");
    buf
}

pub(crate) fn closing_boundary() -> Vec<u8> {
    let mut buf = Vec::with_capacity(6 + BOUNDARY.len());
    buf.extend_from_slice(b"--");
    buf.extend_from_slice(BOUNDARY.as_bytes());
    buf.extend_from_slice(b"--\r\n");
    buf
}
