//! Turns a `Message` into the bytes actually written to a drain, according
//! to the drain's `format` parameter: `raw`, `json`, or any other value,
//! which is treated as a template source itself.
//!
//! Parsing a message's `key`/`value` into the named fields below (app name,
//! source, instance index, ...) is the event parser's job; that component
//! lives outside this crate. `RenderFields` is the narrow contract the
//! renderer needs from it.

use crate::error::{LogyardError, Result};
use crate::types::{DrainConfig, Message, MessageFormat};
use serde::Serialize;

/// The named holes a `template`-format drain may reference as `{Name}`,
/// `{NodeID}`, etc.
#[derive(Debug, Clone, Default)]
pub struct RenderFields {
    pub name: String,
    pub node_id: String,
    pub text: String,
    pub desc: String,
    pub r#type: String,
    pub app_name: String,
    pub source: String,
    pub app_id: String,
    pub instance_index: String,
    pub unix_time: i64,
}

impl RenderFields {
    /// Best-effort derivation straight from the topic key, used when no
    /// event parser is wired in. Topics look like `apptail.<app>.<source>.
    /// <instance>`, `systail.<node>.<facility>` or `event.<name>`.
    #[must_use]
    pub fn from_message(message: &Message, node_id: &str, unix_time: i64) -> Self {
        let mut parts = message.key.splitn(4, '.');
        let kind = parts.next().unwrap_or_default().to_string();
        Self {
            name: message.key.clone(),
            node_id: node_id.to_string(),
            text: message.value.clone(),
            desc: String::new(),
            r#type: kind,
            app_name: parts.next().unwrap_or_default().to_string(),
            source: parts.next().unwrap_or_default().to_string(),
            app_id: String::new(),
            instance_index: parts.next().unwrap_or_default().to_string(),
            unix_time,
        }
    }

    fn hole(&self, name: &str) -> Option<String> {
        match name {
            "Name" => Some(self.name.clone()),
            "NodeID" => Some(self.node_id.clone()),
            "Text" => Some(self.text.clone()),
            "Desc" => Some(self.desc.clone()),
            "Type" => Some(self.r#type.clone()),
            "AppName" => Some(self.app_name.clone()),
            "Source" => Some(self.source.clone()),
            "AppID" => Some(self.app_id.clone()),
            "InstanceIndex" => Some(self.instance_index.clone()),
            "UnixTime" => Some(self.unix_time.to_string()),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct JsonEnvelope<'a> {
    key: &'a str,
    value: &'a str,
    unix_time: i64,
}

/// Render `message` for delivery through `drain`, consulting its `format`
/// parameter (defaults to `raw`). Any `format` value other than `raw`/`json`
/// is itself the template source.
///
/// # Errors
///
/// `Protocol` if the template references an unknown hole; `Fatal` (via
/// `serde_json`) should not occur since `JsonEnvelope` always serializes.
pub fn render(message: &Message, drain: &DrainConfig, fields: &RenderFields) -> Result<String> {
    match drain.format() {
        MessageFormat::Raw => Ok(message.value.clone()),
        MessageFormat::Json => {
            let envelope = JsonEnvelope { key: &message.key, value: &message.value, unix_time: fields.unix_time };
            serde_json::to_string(&envelope)
                .map_err(|e| LogyardError::Protocol(format!("failed to render json: {e}")))
        },
        MessageFormat::Template => {
            let template = drain
                .template()
                .ok_or_else(|| LogyardError::Protocol("format=template requires a template param".into()))?;
            render_template(template, fields)
        },
    }
}

fn render_template(template: &str, fields: &RenderFields) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    let bytes = template.as_bytes();

    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = template[i..].find('}') {
                let hole = &template[i + 1..i + end];
                let value = fields
                    .hole(hole)
                    .ok_or_else(|| LogyardError::Protocol(format!("unknown template hole: {{{hole}}}")))?;
                out.push_str(&value);
                i += end + 1;
                continue;
            }
            return Err(LogyardError::Protocol("unterminated template hole".into()));
        }
        let ch = template[i..].chars().next().unwrap_or('\0');
        out.push(ch);
        i += ch.len_utf8();
    }
    let _ = &mut chars;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn drain_with_format(format: &str) -> DrainConfig {
        let mut params = HashMap::new();
        params.insert("format".to_string(), format.to_string());
        DrainConfig {
            name: "d".into(),
            kind: crate::types::DrainKind::Tcp,
            host: "h".into(),
            port: Some(1),
            filters: vec![],
            params,
        }
    }

    #[test]
    fn raw_is_the_value_verbatim() {
        let drain = drain_with_format("raw");
        let msg = Message::new("systail.web1.auth", "login ok");
        let fields = RenderFields::default();
        assert_eq!(render(&msg, &drain, &fields).unwrap(), "login ok");
    }

    #[test]
    fn json_wraps_key_and_value() {
        let drain = drain_with_format("json");
        let msg = Message::new("event.deploy", "deployed v3");
        let fields = RenderFields { unix_time: 42, ..Default::default() };
        let rendered = render(&msg, &drain, &fields).unwrap();
        assert!(rendered.contains("\"key\":\"event.deploy\""));
        assert!(rendered.contains("\"value\":\"deployed v3\""));
        assert!(rendered.contains("\"unix_time\":42"));
    }

    #[test]
    fn template_substitutes_named_holes() {
        let drain = drain_with_format("[{AppName}/{InstanceIndex}] {Text}");
        let msg = Message::new("apptail.myapp.web.1", "GET / 200");
        let fields = RenderFields {
            app_name: "myapp".into(),
            instance_index: "1".into(),
            text: "GET / 200".into(),
            ..Default::default()
        };
        assert_eq!(render(&msg, &drain, &fields).unwrap(), "[myapp/1] GET / 200");
    }

    #[test]
    fn any_non_keyword_format_value_is_the_template_source() {
        let drain = drain_with_format("{Text}");
        let msg = Message::new("k", "hello");
        let fields = RenderFields { text: "hello".into(), ..Default::default() };
        assert_eq!(render(&msg, &drain, &fields).unwrap(), "hello");
    }

    #[test]
    fn fields_from_message_splits_apptail_topic() {
        let msg = Message::new("apptail.myapp.web.1", "GET / 200");
        let fields = RenderFields::from_message(&msg, "node-7", 1000);
        assert_eq!(fields.r#type, "apptail");
        assert_eq!(fields.app_name, "myapp");
        assert_eq!(fields.source, "web");
        assert_eq!(fields.instance_index, "1");
        assert_eq!(fields.node_id, "node-7");
        assert_eq!(fields.text, "GET / 200");
    }

    #[test]
    fn unknown_hole_is_a_protocol_error() {
        let drain = drain_with_format("{Bogus}");
        let msg = Message::new("k", "v");
        let err = render(&msg, &drain, &RenderFields::default()).unwrap_err();
        assert!(matches!(err, LogyardError::Protocol(_)));
    }
}
