use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::types::Zone;
use crate::variant::Form;

const TRUNCATED_BODY_CHARS: usize = 500;
const SECRET_FIELDS: &[&str] = &["password", "key"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLogMode {
    /// Response bodies are logged whole.
    Full,
    /// Response bodies are cut to their first 500 characters.
    Truncated,
}

pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
}

fn form_json(form: &Form) -> Value {
    let fields: Map<String, Value> = form
        .iter()
        .map(|(k, v)| {
            let value = if SECRET_FIELDS.contains(&k.as_str()) { "***" } else { v.as_str() };
            (k.clone(), Value::String(value.to_string()))
        })
        .collect();
    Value::Object(fields)
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { mode, file })
    }

    pub fn log_request(&mut self, call_id: &Uuid, method: &str, path: &str, form: Option<&Form>) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "call": call_id.to_string(),
            "method": method,
            "path": path,
            "form": form.map(form_json),
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, call_id: &Uuid, path: &str, status: u16, body: &str) {
        let body: String = match self.mode {
            MessageLogMode::Full => body.to_string(),
            MessageLogMode::Truncated => body.chars().take(TRUNCATED_BODY_CHARS).collect(),
        };
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "resp",
            "call": call_id.to_string(),
            "path": path,
            "status": status,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, action: &str, zone: Option<Zone>) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "action": action,
            "zone": zone.map(Zone::as_panel_str),
        });
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}
