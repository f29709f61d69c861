/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod error;
pub use error::LineParseError;

mod header_line;
pub use header_line::HeaderLine;

mod status_line;
pub use status_line::StatusLine;

mod chunked_line;
pub use chunked_line::ChunkSizeLine;
