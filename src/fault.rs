/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

/// Per-client fault injection used by the test suite. Each armed fault fires
/// once at its stage and then disarms itself.
#[derive(Debug, Default)]
pub struct FaultPolicy {
    response_error: bool,
    header_error: bool,
    chunk_error: bool,
    write_failed: bool,
    read_failed: bool,
}

impl FaultPolicy {
    pub fn fail_next_response(&mut self) {
        self.response_error = true;
    }

    pub fn fail_next_header(&mut self) {
        self.header_error = true;
    }

    pub fn fail_next_chunk(&mut self) {
        self.chunk_error = true;
    }

    pub fn fail_next_write(&mut self) {
        self.write_failed = true;
    }

    pub fn fail_next_read(&mut self) {
        self.read_failed = true;
    }

    fn take(flag: &mut bool) -> bool {
        std::mem::replace(flag, false)
    }

    pub(crate) fn take_response_error(&mut self) -> bool {
        Self::take(&mut self.response_error)
    }

    pub(crate) fn take_header_error(&mut self) -> bool {
        Self::take(&mut self.header_error)
    }

    pub(crate) fn take_chunk_error(&mut self) -> bool {
        Self::take(&mut self.chunk_error)
    }

    pub(crate) fn take_write_failed(&mut self) -> bool {
        Self::take(&mut self.write_failed)
    }

    pub(crate) fn take_read_failed(&mut self) -> bool {
        Self::take(&mut self.read_failed)
    }
}
