/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

/// Map a file extension (without the dot, case sensitive lower) to its
/// content type. Unknown extensions get no Content-Type header at all.
pub fn content_type_by_extension(ext: &str) -> Option<&'static str> {
    let v = match ext {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "txt" | "text" | "log" => "text/plain",
        "xml" => "text/xml",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "wasm" => "application/wasm",
        "bin" | "exe" | "img" | "iso" => "application/octet-stream",
        "gif" => "image/gif",
        "jpeg" | "jpg" => "image/jpeg",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wave",
        "ogg" => "audio/ogg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        _ => return None,
    };
    Some(v)
}

/// Extract the extension part of a file name, if any.
pub fn file_extension(filename: &str) -> Option<&str> {
    let name = match memchr::memrchr(b'/', filename.as_bytes()) {
        Some(p) => &filename[p + 1..],
        None => filename,
    };
    match memchr::memrchr(b'.', name.as_bytes()) {
        Some(0) | None => None,
        Some(p) => Some(&name[p + 1..]),
    }
}
