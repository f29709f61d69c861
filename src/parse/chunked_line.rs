/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use atoi::FromRadix16;

use super::LineParseError;

pub struct ChunkSizeLine<'a> {
    pub chunk_size: u64,
    pub extension: Option<&'a str>,
}

impl<'a> ChunkSizeLine<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<ChunkSizeLine<'a>, LineParseError> {
        let (chunk_size, offset) = u64::from_radix_16(buf);
        if offset == 0 {
            return Err(LineParseError::InvalidChunkSize);
        }

        if buf.len() == offset {
            return Err(LineParseError::NotLongEnough);
        }

        match buf[offset] {
            b'\r' | b'\n' => Ok(ChunkSizeLine {
                chunk_size,
                extension: None,
            }),
            b';' => {
                let extension = std::str::from_utf8(&buf[offset + 1..])
                    .map_err(LineParseError::InvalidUtf8Encoding)?
                    .trim();
                Ok(ChunkSizeLine {
                    chunk_size,
                    extension: Some(extension),
                })
            }
            _ => Err(LineParseError::InvalidChunkSize),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple() {
        let chunk = ChunkSizeLine::parse(b"5\r\n").unwrap();
        assert_eq!(chunk.chunk_size, 5);

        let chunk = ChunkSizeLine::parse(b"2a\r\n").unwrap();
        assert_eq!(chunk.chunk_size, 0x2a);
    }

    #[test]
    fn with_extension() {
        let chunk = ChunkSizeLine::parse(b"10; name=value\r\n").unwrap();
        assert_eq!(chunk.chunk_size, 0x10);
        assert_eq!(chunk.extension, Some("name=value"));
    }

    #[test]
    fn malformed() {
        assert!(ChunkSizeLine::parse(b"xyz\r\n").is_err());
        assert!(ChunkSizeLine::parse(b"5 5\r\n").is_err());
    }
}
