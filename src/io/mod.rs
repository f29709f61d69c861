/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod ext;
pub use ext::{DelimiterReadExt, GatherWriteExt};

mod stream;
pub use stream::ClientStream;
