//! Slash-command routing.
//!
//! Text starting with [`COMMAND_MARKER`] is a command rather than a
//! generation prompt. Command names (and their shorthands) map to a
//! [`CommandKind`] through [`COMMAND_TABLE`]; anything unlisted becomes
//! [`Command::Unknown`] carrying the offending input.

use serde::Serialize;

use crate::params::ParseError;

/// Prefix that marks a message as a command.
pub const COMMAND_MARKER: char = '/';

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Help,
    Models,
    Status { task_id: String },
    Preset(PresetCommand),
    Private { enabled: bool },
    Unknown { name: String, input: String },
}

/// Sub-commands of `/preset`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PresetCommand {
    List,
    Show { name: String },
    Save { name: String, prompt: String },
    Delete { name: String },
}

/// Command families addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Help,
    Models,
    Status,
    Preset,
    Private,
}

/// Command names and shorthands.
pub const COMMAND_TABLE: &[(&str, CommandKind)] = &[
    ("help", CommandKind::Help),
    ("h", CommandKind::Help),
    ("?", CommandKind::Help),
    ("models", CommandKind::Models),
    ("status", CommandKind::Status),
    ("preset", CommandKind::Preset),
    ("presets", CommandKind::Preset),
    ("private", CommandKind::Private),
];

const STATUS_USAGE: &str = "Usage: /status <task-id>";
const PRESET_USAGE: &str =
    "Usage: /preset list | /preset show <name> | /preset save <name> <prompt> | /preset delete <name>";
const PRIVATE_USAGE: &str = "Usage: /private on|off";

/// Look up a command name (case-insensitive).
pub fn command_kind(name: &str) -> Option<CommandKind> {
    let lowered = name.to_lowercase();
    COMMAND_TABLE
        .iter()
        .find(|(n, _)| *n == lowered)
        .map(|(_, kind)| *kind)
}

/// Parse text that starts with [`COMMAND_MARKER`].
pub fn parse_command(text: &str) -> Result<Command, ParseError> {
    let body = text.trim().trim_start_matches(COMMAND_MARKER);
    let mut words = body.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let Some(kind) = command_kind(name) else {
        return Ok(Command::Unknown {
            name: name.to_string(),
            input: text.trim().to_string(),
        });
    };

    match kind {
        CommandKind::Help => Ok(Command::Help),
        CommandKind::Models => Ok(Command::Models),
        CommandKind::Status => match args.as_slice() {
            [task_id] => Ok(Command::Status {
                task_id: (*task_id).to_string(),
            }),
            _ => Err(ParseError::Usage(STATUS_USAGE.to_string())),
        },
        CommandKind::Preset => parse_preset(&args).map(Command::Preset),
        CommandKind::Private => match args.as_slice() {
            [flag] => match flag.to_lowercase().as_str() {
                "on" | "true" | "yes" => Ok(Command::Private { enabled: true }),
                "off" | "false" | "no" => Ok(Command::Private { enabled: false }),
                _ => Err(ParseError::Usage(PRIVATE_USAGE.to_string())),
            },
            _ => Err(ParseError::Usage(PRIVATE_USAGE.to_string())),
        },
    }
}

fn parse_preset(args: &[&str]) -> Result<PresetCommand, ParseError> {
    let usage = || ParseError::Usage(PRESET_USAGE.to_string());
    let (action, rest) = args.split_first().ok_or_else(usage)?;

    match action.to_lowercase().as_str() {
        "list" if rest.is_empty() => Ok(PresetCommand::List),
        "show" => match rest {
            [name] => Ok(PresetCommand::Show {
                name: (*name).to_string(),
            }),
            _ => Err(usage()),
        },
        "delete" => match rest {
            [name] => Ok(PresetCommand::Delete {
                name: (*name).to_string(),
            }),
            _ => Err(usage()),
        },
        "save" => match rest {
            [name, prompt @ ..] if !prompt.is_empty() => Ok(PresetCommand::Save {
                name: (*name).to_string(),
                prompt: prompt.join(" "),
            }),
            _ => Err(usage()),
        },
        _ => Err(usage()),
    }
}
