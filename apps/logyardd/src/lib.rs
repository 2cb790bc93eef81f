// SPDX-FileCopyrightText: © 2025 Logyard Contributors
//
// SPDX-License-Identifier: MPL-2.0

pub mod agent;
pub mod cli;
pub mod config;
pub mod identity;
pub mod logging;
pub mod server;
pub mod telemetry;

pub use config::Config;
