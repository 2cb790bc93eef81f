// SPDX-FileCopyrightText: © 2025 Logyard Contributors
//
// SPDX-License-Identifier: MPL-2.0

use clap::Parser;

mod agent;
mod cli;
mod config;
mod identity;
mod logging;
mod server;
mod telemetry;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();
    cli::handle_command(&cli).await;
}
