// SPDX-FileCopyrightText: © 2025 Logyard Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Thin HTTP client for the agent's control API. Every mutation lands in
//! the config store, not the running drain set directly — the agent's
//! watcher is what actually starts or stops anything.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct DrainSummary {
    pub name: String,
    pub uri: String,
    pub state: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct AddDrainRequest<'a> {
    uri: &'a str,
}

/// # Errors
///
/// Returns an error if the agent is unreachable or returns a non-success
/// status.
pub async fn list_drains(server: &str) -> anyhow::Result<Vec<DrainSummary>> {
    let url = format!("{server}/drains");
    let response = reqwest::get(&url).await?.error_for_status()?;
    Ok(response.json().await?)
}

/// # Errors
///
/// Returns an error if `uri` is rejected by the agent (bad scheme, missing
/// host) or the agent is unreachable.
pub async fn add_drain(server: &str, name: &str, uri: &str) -> anyhow::Result<()> {
    let url = format!("{server}/drains/{name}");
    let client = reqwest::Client::new();
    client.put(&url).json(&AddDrainRequest { uri }).send().await?.error_for_status()?;
    Ok(())
}

/// # Errors
///
/// Returns an error if the agent is unreachable or returns a non-success
/// status. Deleting an already-absent drain is not an error.
pub async fn delete_drain(server: &str, name: &str) -> anyhow::Result<()> {
    let url = format!("{server}/drains/{name}");
    let client = reqwest::Client::new();
    client.delete(&url).send().await?.error_for_status()?;
    Ok(())
}

/// Build the URI for a temporary drain the `stream` command points at its
/// own ephemeral UDP listener.
/// Folds `-filter`/`-o` flags from the `add` command into the base `-uri`
/// value, so `add -uri tcp://host:514 -filter systail. -o format=json name`
/// produces one URI carrying all three.
#[must_use]
pub fn merge_uri_params(base_uri: &str, filters: &[String], params: &[(String, String)]) -> String {
    let mut extra = Vec::new();
    if !filters.is_empty() {
        extra.push(format!("filters={}", filters.join(",")));
    }
    for (k, v) in params {
        extra.push(format!("{k}={v}"));
    }
    if extra.is_empty() {
        return base_uri.to_string();
    }
    let separator = if base_uri.contains('?') { '&' } else { '?' };
    format!("{base_uri}{separator}{}", extra.join("&"))
}

#[must_use]
pub fn stream_drain_uri(local_addr: std::net::SocketAddr, filters: &[String]) -> String {
    let mut uri = format!("udp://{local_addr}?format=json");
    if !filters.is_empty() {
        uri.push_str("&filters=");
        uri.push_str(&filters.join(","));
    }
    uri
}
