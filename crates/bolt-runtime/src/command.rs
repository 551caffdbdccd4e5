use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub type CommandId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Install,
    Build,
    Dev,
    Custom,
}

const KIND_SOURCES: &[(CommandKind, &str)] = &[
    (
        CommandKind::Install,
        r"^(?:(?:npm|pnpm|yarn|bun)\s+(?:install|i|add|ci)\b|(?:yarn|pnpm|bun)\s*$|pip3?\s+install\b|cargo\s+(?:add|install|fetch)\b)",
    ),
    (
        CommandKind::Build,
        r"^(?:(?:npm|pnpm|yarn|bun)\s+(?:run\s+)?build\b|cargo\s+build\b|tsc\b|vite\s+build\b)",
    ),
    (
        CommandKind::Dev,
        r"^(?:(?:npm|pnpm|yarn|bun)\s+(?:run\s+)?(?:dev|start|serve|preview)\b|cargo\s+run\b|vite\s*$)",
    ),
];

static KINDS: Lazy<Vec<(CommandKind, Regex)>> = Lazy::new(|| {
    KIND_SOURCES
        .iter()
        .map(|(kind, source)| (*kind, Regex::new(source).expect("valid command kind regex")))
        .collect()
});

impl CommandKind {
    /// Classify by the first command of a `&&`/`;`/`|` chain.
    pub fn infer(text: &str) -> Self {
        let first = text
            .split(['&', ';', '|'])
            .map(str::trim)
            .find(|segment| !segment.is_empty())
            .unwrap_or_default();
        KINDS
            .iter()
            .find(|(_, regex)| regex.is_match(first))
            .map(|(kind, _)| *kind)
            .unwrap_or(CommandKind::Custom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, CommandStatus::Completed | CommandStatus::Failed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub text: String,
    pub kind: CommandKind,
    pub status: CommandStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub enqueued_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Number of times the command has been started.
    pub attempts: u32,
}

impl Command {
    pub(crate) fn new(id: CommandId, text: String) -> Self {
        Self {
            id,
            kind: CommandKind::infer(&text),
            text,
            status: CommandStatus::Pending,
            output: None,
            error: None,
            enqueued_at_ms: unix_millis(),
            duration_ms: None,
            attempts: 0,
        }
    }
}

/// Lifecycle notifications published by the scheduler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CommandEvent {
    Queued {
        id: CommandId,
        text: String,
    },
    Started {
        id: CommandId,
    },
    Finished {
        id: CommandId,
        status: CommandStatus,
        duration_ms: u64,
    },
    Requeued {
        id: CommandId,
    },
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_kind_from_leading_command() {
        assert_eq!(CommandKind::infer("npm install"), CommandKind::Install);
        assert_eq!(CommandKind::infer("pnpm add zod"), CommandKind::Install);
        assert_eq!(CommandKind::infer("yarn"), CommandKind::Install);
        assert_eq!(CommandKind::infer("pip install -r requirements.txt"), CommandKind::Install);
        assert_eq!(CommandKind::infer("npm run build"), CommandKind::Build);
        assert_eq!(CommandKind::infer("cargo build --release"), CommandKind::Build);
        assert_eq!(CommandKind::infer("npm run dev"), CommandKind::Dev);
        assert_eq!(CommandKind::infer("bun start"), CommandKind::Dev);
        assert_eq!(CommandKind::infer("npm install && npm run dev"), CommandKind::Install);
        assert_eq!(CommandKind::infer("ls -la"), CommandKind::Custom);
        assert_eq!(CommandKind::infer(""), CommandKind::Custom);
    }

    #[test]
    fn npm_info_is_not_an_install() {
        assert_eq!(CommandKind::infer("npm info react"), CommandKind::Custom);
    }
}
