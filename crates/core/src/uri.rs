//! Drain URI encoding and decoding.
//!
//! A drain is fully described by one URI:
//!
//! ```text
//! scheme://host[:port][?filters=prefix1,prefix2&param=value&...]
//! file:///absolute/path[?format=json]
//! ```
//!
//! `scheme` selects the `DrainKind`; `filters` is a comma-separated list of
//! topic prefixes (omitted or empty means "everything"); every other query
//! parameter lands in `DrainConfig::params` verbatim (`format`, `key`,
//! `limit`, `database`, ...). `format` doubles as the template source for
//! any value other than `raw`/`json`.

use crate::error::{LogyardError, Result};
use crate::types::{DrainConfig, DrainKind};
use std::collections::HashMap;

/// Build the canonical URI for a drain config, the same string the CLI's
/// `add` command accepts and the config store persists.
#[must_use]
pub fn construct_drain_uri(config: &DrainConfig) -> String {
    let mut authority = config.host.clone();
    if let Some(port) = config.port {
        authority = format!("{authority}:{port}");
    }

    let mut query_parts = Vec::new();
    if !config.filters.is_empty() {
        query_parts.push(format!("filters={}", config.filters.join(",")));
    }
    let mut params: Vec<_> = config.params.iter().collect();
    params.sort_by(|a, b| a.0.cmp(b.0));
    for (k, v) in params {
        query_parts.push(format!("{k}={v}"));
    }

    let query = if query_parts.is_empty() { String::new() } else { format!("?{}", query_parts.join("&")) };

    if config.kind == DrainKind::File {
        format!("file://{authority}{query}")
    } else {
        format!("{}://{authority}{query}", config.kind.as_str())
    }
}

/// Parse a drain URI into a named `DrainConfig`.
///
/// # Errors
///
/// Returns `LogyardError::Configuration` for an unknown scheme, a missing
/// host (non-file schemes) or a malformed port.
pub fn drain_config_from_uri(name: &str, uri: &str) -> Result<DrainConfig> {
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| LogyardError::Configuration(format!("malformed drain uri: {uri}")))?;

    let kind = DrainKind::parse(scheme)
        .ok_or_else(|| LogyardError::Configuration(format!("unknown drain scheme: {scheme}")))?;

    let (authority, query) = rest.split_once('?').unwrap_or((rest, ""));

    let (host, port) = if kind == DrainKind::File {
        (authority.to_string(), None)
    } else {
        if authority.is_empty() {
            return Err(LogyardError::Configuration(format!("drain uri missing host: {uri}")));
        }
        match authority.split_once(':') {
            Some((h, p)) => {
                let port: u16 = p
                    .parse()
                    .map_err(|_| LogyardError::Configuration(format!("invalid port in uri: {uri}")))?;
                (h.to_string(), Some(port))
            },
            None => (authority.to_string(), None),
        }
    };

    let mut filters = Vec::new();
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (k, v) = pair
            .split_once('=')
            .ok_or_else(|| LogyardError::Configuration(format!("malformed query param: {pair}")))?;
        if k == "filters" {
            filters = v.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect();
        } else {
            params.insert(k.to_string(), v.to_string());
        }
    }

    Ok(DrainConfig { name: name.to_string(), kind, host, port, filters, params })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_tcp_with_filters_and_params() {
        let cfg = drain_config_from_uri(
            "syslog",
            "tcp://10.0.0.1:514?filters=systail.,event.&format=raw",
        )
        .unwrap();
        assert_eq!(cfg.kind, DrainKind::Tcp);
        assert_eq!(cfg.host, "10.0.0.1");
        assert_eq!(cfg.port, Some(514));
        assert_eq!(cfg.filters, vec!["systail.".to_string(), "event.".to_string()]);
        assert_eq!(cfg.params.get("format").map(String::as_str), Some("raw"));

        let uri = construct_drain_uri(&cfg);
        let reparsed = drain_config_from_uri("syslog", &uri).unwrap();
        assert_eq!(reparsed, cfg);
    }

    #[test]
    fn file_scheme_has_no_port_and_path_as_host() {
        let cfg = drain_config_from_uri("applog", "file:///var/log/app.log?format=json").unwrap();
        assert_eq!(cfg.kind, DrainKind::File);
        assert_eq!(cfg.host, "/var/log/app.log");
        assert_eq!(cfg.port, None);
    }

    #[test]
    fn redis_drain_with_ring_params() {
        let cfg =
            drain_config_from_uri("ring", "redis://stackato-core?key=logs&limit=200&database=1")
                .unwrap();
        assert_eq!(cfg.redis_key(), "logs");
        assert_eq!(cfg.redis_limit(), 200);
        assert_eq!(cfg.redis_database(), 1);
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let err = drain_config_from_uri("x", "zmq://host:1").unwrap_err();
        assert!(matches!(err, LogyardError::Configuration(_)));
    }

    #[test]
    fn missing_host_is_rejected() {
        let err = drain_config_from_uri("x", "tcp://").unwrap_err();
        assert!(matches!(err, LogyardError::Configuration(_)));
    }
}
