// SPDX-FileCopyrightText: © 2025 Logyard Contributors
//
// SPDX-License-Identifier: MPL-2.0

// Allow println/eprintln in CLI client - these are for direct user output, not logging
#![allow(clippy::disallowed_macros)]

pub mod client;
pub mod stream;

pub use client::{add_drain, delete_drain, list_drains, merge_uri_params};
pub use stream::run_stream;
