use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, CATEGORY_COMMAND, FLAG_COMMANDS, MULTI_ARG_COMMANDS, NO_ARG_COMMANDS,
    RAW_ARG_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionCommand {
    pub action: String,
    pub raw: String,
    pub args: BTreeMap<String, Value>,
}

impl SessionCommand {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: Value) -> Self {
        self.args.insert(key.to_string(), value);
        self
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn arg_list(&self, key: &str) -> Vec<String> {
        self.args
            .get(key)
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn split_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

/// `on`/`off` style switch; a bare flag command means "on".
fn parse_switch(arg: &str) -> Option<bool> {
    match arg.trim().to_ascii_lowercase().as_str() {
        "" | "on" | "yes" | "true" | "1" => Some(true),
        "off" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

pub fn parse_command(text: &str) -> SessionCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return SessionCommand::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return SessionCommand::new(action, text);
            }

            if let Some(action) = find_action(&command, RAW_ARG_COMMANDS) {
                return SessionCommand::new(action, text)
                    .with_arg("value", Value::String(arg.to_string()));
            }

            if let Some(flag) = find_action(&command, FLAG_COMMANDS) {
                let Some(enabled) = parse_switch(arg) else {
                    return unknown(text, &command, arg);
                };
                return SessionCommand::new("set_flag", text)
                    .with_arg("flag", Value::String(flag.to_string()))
                    .with_arg("enabled", Value::Bool(enabled));
            }

            if let Some(action) = find_action(&command, MULTI_ARG_COMMANDS) {
                return SessionCommand::new(action, text).with_arg(
                    "values",
                    Value::Array(split_args(arg).into_iter().map(Value::String).collect()),
                );
            }

            if command == CATEGORY_COMMAND.command {
                let parts = split_args(arg);
                let index = parts.first().and_then(|value| value.parse::<u64>().ok());
                return match (index, parts.get(1)) {
                    (Some(index), Some(category)) if parts.len() == 2 => {
                        SessionCommand::new(CATEGORY_COMMAND.action, text)
                            .with_arg("index", Value::from(index))
                            .with_arg("category", Value::String(category.clone()))
                    }
                    _ => unknown(text, &command, arg),
                };
            }

            return unknown(text, &command, arg);
        }
    }

    SessionCommand::new("generate", text)
        .with_arg("prompt", Value::String(raw_trimmed.to_string()))
}

fn unknown(text: &str, command: &str, arg: &str) -> SessionCommand {
    SessionCommand::new("unknown", text)
        .with_arg("command", Value::String(command.to_string()))
        .with_arg("arg", Value::String(arg.to_string()))
}
