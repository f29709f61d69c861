/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use super::LineParseError;

pub struct HeaderLine<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

impl<'a> HeaderLine<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<HeaderLine<'a>, LineParseError> {
        let line = std::str::from_utf8(buf)?;
        let Some(p) = memchr::memchr(b':', line.as_bytes()) else {
            return Err(LineParseError::NoDelimiterFound(':'));
        };

        let name = line[0..p].trim();
        if name.is_empty() {
            return Err(LineParseError::InvalidHeaderName);
        }
        let value = line[p + 1..].trim();

        Ok(HeaderLine { name, value })
    }
}
