// SPDX-FileCopyrightText: © 2025 Logyard Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `logyard-cli stream`: register a temporary drain pointed at an ephemeral
//! UDP listener opened right here, then render every message that arrives
//! until the user hits Ctrl-C. The drain is always deleted on the way out,
//! clean exit or interrupted, so nothing lingers in the config store.

use logyard_core::render::RenderFields;
use logyard_core::types::Message;
use serde::Deserialize;

use crate::client;

#[derive(Deserialize)]
struct JsonEnvelope {
    key: String,
    value: String,
    unix_time: i64,
}

fn temp_drain_name() -> String {
    format!("cli-stream-{}", std::process::id())
}

fn render_line(envelope: &JsonEnvelope, raw: bool) -> String {
    if raw {
        return envelope.value.clone();
    }
    let message = Message::new(&envelope.key, &envelope.value);
    let fields = RenderFields::from_message(&message, "-", envelope.unix_time);
    format!("\x1b[36m{}\x1b[0m {}", fields.name, fields.text)
}

/// # Errors
///
/// Returns an error if the drain can't be registered with the agent, or if
/// the ephemeral UDP socket can't be bound. Registration failures surface
/// as a non-zero exit per the CLI's documented contract.
pub async fn run_stream(server: &str, filters: &[String], raw: bool) -> anyhow::Result<()> {
    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await?;
    let local_addr = socket.local_addr()?;
    let name = temp_drain_name();
    let uri = client::stream_drain_uri(local_addr, filters);

    client::add_drain(server, &name, &uri).await?;
    eprintln!("streaming via temporary drain {name} ({uri}); press ctrl-c to stop");

    let result = read_until_interrupted(&socket, raw).await;

    if let Err(err) = client::delete_drain(server, &name).await {
        eprintln!("warning: failed to clean up temporary drain {name}: {err}");
    }

    result
}

async fn read_until_interrupted(socket: &tokio::net::UdpSocket, raw: bool) -> anyhow::Result<()> {
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        tokio::select! {
            () = tokio_ctrl_c() => return Ok(()),
            recv = socket.recv(&mut buf) => {
                let n = recv?;
                let Ok(text) = std::str::from_utf8(&buf[..n]) else { continue };
                match serde_json::from_str::<JsonEnvelope>(text.trim_end()) {
                    Ok(envelope) => println!("{}", render_line(&envelope, raw)),
                    Err(_) => println!("{}", text.trim_end()),
                }
            }
        }
    }
}

async fn tokio_ctrl_c() {
    let _ = tokio::signal::ctrl_c().await;
}
