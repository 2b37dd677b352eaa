use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;

use crate::error::{DpeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Serialize)]
pub struct RobotResponse<T> {
    pub status: RobotStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    Ok,
}

pub fn robot_ok<T: Serialize>(data: T) -> RobotResponse<T> {
    RobotResponse {
        status: RobotStatus::Ok,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
        warnings: Vec::new(),
    }
}

/// Error object printed to stdout in robot mode.
#[must_use]
pub fn robot_error(err: &DpeError) -> serde_json::Value {
    serde_json::json!({
        "error": true,
        "code": err.code(),
        "message": err.to_string(),
    })
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)?;
    println!("{payload}");
    Ok(())
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 18,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push(String::new());
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        // escape codes count toward the width, so pad first
        let padded = format!("{key:width$}", width = self.key_width);
        self.lines
            .push(format!("{} {value}", style(padded).dim()));
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: HumanLayout) {
    println!("{}", layout.build());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_error_carries_stable_code() {
        let value = robot_error(&DpeError::ConfirmationRequired("pass --yes".into()));
        assert_eq!(value["error"], true);
        assert_eq!(value["code"], "confirmation_required");
        assert!(value["message"].as_str().unwrap().contains("--yes"));
    }

    #[test]
    fn layout_keeps_line_order() {
        console::set_colors_enabled(false);
        let mut layout = HumanLayout::new();
        layout.title("Store").kv("rows", "3").push_line("done");
        let text = layout.build();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Store");
        assert!(lines[2].starts_with("rows"));
        assert!(lines[2].ends_with(" 3"));
        assert_eq!(lines[3], "done");
    }
}
