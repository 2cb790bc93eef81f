//! Core data types shared across the broker, drains and the manager.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single record flowing through the bus: a topic key and its payload.
///
/// `key` doubles as the topic address (e.g. `systail.web1.auth`,
/// `apptail.myapp.web.1`, `event.deploy`); drains subscribe to prefixes of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub key: String,
    pub value: String,
}

impl Message {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// A topic prefix a drain or subscriber is interested in.
///
/// Matching is a dotted-boundary prefix test, mirroring the bus's own topic
/// addressing scheme (`systail.`, `apptail.`, `event.` and their sub-levels):
/// a key matches iff it equals the filter or starts with the filter plus a
/// `.` separator, so `systail.nginx` doesn't also match `systail.nginxx.n1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicFilter(pub String);

impl TopicFilter {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }

    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        topic_matches(&self.0, key)
    }
}

/// `key` matches `filter` iff they're equal or `key` begins with `filter`
/// followed by a `.` boundary — a filter of `systail.nginx` must not match
/// `systail.nginxx.n1`. An empty filter matches every key. Filters may
/// already carry a trailing dot (`systail.`); one is not added twice.
fn topic_matches(filter: &str, key: &str) -> bool {
    if filter.is_empty() || key == filter {
        return true;
    }
    let prefix = if filter.ends_with('.') { filter.to_string() } else { format!("{filter}.") };
    key.starts_with(&prefix)
}

/// The four drain backends the registry knows how to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainKind {
    Tcp,
    Udp,
    Redis,
    File,
}

impl DrainKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Redis => "redis",
            Self::File => "file",
        }
    }

    #[must_use]
    pub fn parse(scheme: &str) -> Option<Self> {
        match scheme {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            "redis" => Some(Self::Redis),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

/// Message rendering mode, selected via the `format` drain parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageFormat {
    /// `value` verbatim, no framing.
    Raw,
    /// `{"key": ..., "value": ...}` plus standard envelope fields.
    Json,
    /// User-supplied template with named holes substituted.
    Template,
}

impl Default for MessageFormat {
    fn default() -> Self {
        Self::Raw
    }
}

/// Declarative configuration for a single drain, as read from the
/// coordinated configuration store or constructed by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainConfig {
    pub name: String,
    pub kind: DrainKind,
    pub host: String,
    pub port: Option<u16>,
    pub filters: Vec<String>,
    pub params: HashMap<String, String>,
}

impl DrainConfig {
    /// `format=raw` and `format=json` select the built-in renderers; any
    /// other value is itself the template source (e.g. `format={{Text}}`).
    #[must_use]
    pub fn format(&self) -> MessageFormat {
        match self.params.get("format").map(String::as_str) {
            None | Some("raw") => MessageFormat::Raw,
            Some("json") => MessageFormat::Json,
            Some(_) => MessageFormat::Template,
        }
    }

    #[must_use]
    pub fn template(&self) -> Option<&str> {
        match self.params.get("format").map(String::as_str) {
            None | Some("raw" | "json") => None,
            Some(template) => Some(template),
        }
    }

    /// Redis key for the `redis` drain. `None` means each message should be
    /// pushed onto a list named after its own topic key instead of a fixed one.
    #[must_use]
    pub fn redis_key(&self) -> Option<&str> {
        self.params.get("key").map(String::as_str)
    }

    /// Ring buffer cap (`LTRIM` limit) for the `redis` drain, defaulting to
    /// 1500. Zero means unbounded.
    #[must_use]
    pub fn redis_limit(&self) -> u64 {
        self.params.get("limit").and_then(|v| v.parse().ok()).unwrap_or(1500)
    }

    #[must_use]
    pub fn redis_database(&self) -> i64 {
        self.params.get("database").and_then(|v| v.parse().ok()).unwrap_or(0)
    }

    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| topic_matches(f, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_filter_matches_prefix() {
        let f = TopicFilter::new("systail.web1");
        assert!(f.matches("systail.web1.auth"));
        assert!(f.matches("systail.web1"));
        assert!(!f.matches("systail.web2.auth"));
    }

    #[test]
    fn topic_filter_respects_dotted_boundary() {
        let f = TopicFilter::new("systail.nginx");
        assert!(f.matches("systail.nginx.access"));
        assert!(f.matches("systail.nginx"));
        assert!(!f.matches("systail.nginxx.n1"));
    }

    #[test]
    fn drain_config_matches_any_filter() {
        let cfg = DrainConfig {
            name: "d1".into(),
            kind: DrainKind::Tcp,
            host: "10.0.0.1".into(),
            port: Some(514),
            filters: vec!["systail.".into(), "event.".into()],
            params: HashMap::new(),
        };
        assert!(cfg.matches("systail.web1.auth"));
        assert!(cfg.matches("event.deploy"));
        assert!(!cfg.matches("apptail.myapp.web.1"));
    }

    #[test]
    fn drain_config_respects_dotted_boundary() {
        let cfg = DrainConfig {
            name: "d1".into(),
            kind: DrainKind::Tcp,
            host: "10.0.0.1".into(),
            port: Some(514),
            filters: vec!["systail.nginx".into()],
            params: HashMap::new(),
        };
        assert!(!cfg.matches("systail.nginxx.n1"));
    }

    #[test]
    fn empty_filters_matches_everything() {
        let cfg = DrainConfig {
            name: "d1".into(),
            kind: DrainKind::Udp,
            host: "10.0.0.1".into(),
            port: Some(514),
            filters: vec![],
            params: HashMap::new(),
        };
        assert!(cfg.matches("anything.at.all"));
    }

    #[test]
    fn redis_params_have_sane_defaults() {
        let cfg = DrainConfig {
            name: "ring".into(),
            kind: DrainKind::Redis,
            host: "stackato-core".into(),
            port: None,
            filters: vec![],
            params: HashMap::new(),
        };
        assert_eq!(cfg.redis_key(), None);
        assert_eq!(cfg.redis_limit(), 1500);
        assert_eq!(cfg.redis_database(), 0);
    }

    #[test]
    fn explicit_format_value_is_its_own_template() {
        let mut params = HashMap::new();
        params.insert("format".to_string(), "[{Text}]".to_string());
        let cfg = DrainConfig {
            name: "d".into(),
            kind: DrainKind::Tcp,
            host: "h".into(),
            port: Some(1),
            filters: vec![],
            params,
        };
        assert_eq!(cfg.format(), MessageFormat::Template);
        assert_eq!(cfg.template(), Some("[{Text}]"));
    }
}
