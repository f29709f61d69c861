/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use atoi::FromRadix10;

use super::LineParseError;

pub struct StatusLine<'a> {
    pub version: u8,
    pub code: u16,
    pub reason: &'a str,
}

impl<'a> StatusLine<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<StatusLine<'a>, LineParseError> {
        const MINIMAL_LENGTH: usize = 12; // HTTP/1.x XYZ

        if buf.len() < MINIMAL_LENGTH {
            return Err(LineParseError::NotLongEnough);
        }

        let Some(p) = memchr::memchr(b' ', buf) else {
            return Err(LineParseError::NoDelimiterFound(' '));
        };
        let version: u8 = match &buf[0..p] {
            b"HTTP/1.0" => 0,
            b"HTTP/1.1" => 1,
            _ => return Err(LineParseError::InvalidVersion),
        };

        let left = &buf[p + 1..];
        let (code, len) = u16::from_radix_10(left);
        if len != 3 {
            return Err(LineParseError::InvalidStatusCode);
        }

        let reason = if left.len() > len + 1 {
            std::str::from_utf8(&left[len + 1..])?.trim()
        } else {
            ""
        };

        Ok(StatusLine {
            version,
            code,
            reason,
        })
    }
}
