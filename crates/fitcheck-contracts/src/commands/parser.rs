use std::collections::BTreeMap;

use serde_json::Value;

use super::registry::{
    CommandSpec, NO_ARG_COMMANDS, OPTIONAL_PATH_COMMANDS, OUTFIT_COMMANDS, PATH_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ChatCommand {
    pub action: String,
    pub raw: String,
    pub command_args: BTreeMap<String, Value>,
}

impl ChatCommand {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            command_args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: Value) -> Self {
        self.command_args.insert(key.to_string(), value);
        self
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
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

/// Quoted arguments (`/regen "Wrap dress"`) are shell-split and rejoined.
/// Anything else is taken verbatim, so apostrophes in `Levi's` survive.
fn single_arg(arg: &str) -> String {
    let trimmed = arg.trim();
    if trimmed.starts_with('"') || trimmed.starts_with('\'') {
        split_args(trimmed).join(" ")
    } else {
        trimmed.to_string()
    }
}

pub fn parse_command(text: &str) -> ChatCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return ChatCommand::new("noop", text);
    }

    let Some(slash_tail) = raw_trimmed.strip_prefix('/') else {
        return ChatCommand::new("unknown", text)
            .with_arg("command", Value::String(String::new()))
            .with_arg("arg", Value::String(raw_trimmed.to_string()));
    };

    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if let Some(action) = find_action(&command, PATH_COMMANDS) {
        return ChatCommand::new(action, text).with_arg("path", Value::String(single_arg(arg)));
    }

    if let Some(action) = find_action(&command, OPTIONAL_PATH_COMMANDS) {
        let path = single_arg(arg);
        let value = if path.is_empty() {
            Value::Null
        } else {
            Value::String(path)
        };
        return ChatCommand::new(action, text).with_arg("path", value);
    }

    if let Some(action) = find_action(&command, OUTFIT_COMMANDS) {
        let target = single_arg(arg);
        let mut parsed = ChatCommand::new(action, text);
        if let Ok(position) = target.parse::<u64>() {
            parsed = parsed.with_arg("position", Value::Number(position.into()));
        }
        return parsed.with_arg("outfit", Value::String(target));
    }

    if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
        return ChatCommand::new(action, text);
    }

    ChatCommand::new("unknown", text)
        .with_arg("command", Value::String(command))
        .with_arg("arg", Value::String(arg.to_string()))
}
