mod parser;
mod registry;

pub use parser::{parse_command, ChatCommand};
pub use registry::CHAT_HELP_COMMANDS;
