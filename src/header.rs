/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use base64::prelude::*;

pub fn proxy_authorization_basic(username: &str, password: &str) -> String {
    format!(
        "Proxy-Authorization: Basic {}\r\n",
        BASE64_STANDARD.encode(format!("{username}:{password}"))
    )
}

pub fn proxy_authorization_bearer(token: &str) -> String {
    format!("Proxy-Authorization: Bearer {token}\r\n")
}
