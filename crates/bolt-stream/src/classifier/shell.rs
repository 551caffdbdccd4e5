//! Deciding whether a shell-tagged code block holds runnable commands.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Fence languages treated as shell dialects.
pub const SHELL_LANGUAGES: &[&str] = &[
    "bash",
    "sh",
    "shell",
    "zsh",
    "fish",
    "console",
    "terminal",
    "shellscript",
    "shell-session",
    "powershell",
    "ps1",
    "pwsh",
    "cmd",
    "bat",
];

/// Fraction of lines that must look like commands for a multi-line block.
const COMMAND_LINE_RATIO: f64 = 0.7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandFamily {
    PackageManager,
    VersionControl,
    Container,
    BuildTool,
    Network,
    Interpreter,
    FileSystem,
    TextProcessing,
    Archive,
    System,
    Generic,
}

const FAMILY_SOURCES: &[(CommandFamily, &str)] = &[
    (
        CommandFamily::PackageManager,
        r"^(?:npm|npx|pnpm|pnpx|yarn|bun|bunx|pip3?|pipx|poetry|uv|cargo|rustup|gem|bundle|composer|go|brew|apt|apt-get|yum|dnf|pacman|apk|conda)(?:\s|$)",
    ),
    (
        CommandFamily::VersionControl,
        r"^(?:git|gh|hg|svn)(?:\s|$)",
    ),
    (
        CommandFamily::Container,
        r"^(?:docker|docker-compose|podman|kubectl|helm|minikube)(?:\s|$)",
    ),
    (
        CommandFamily::BuildTool,
        r"^(?:make|cmake|gradle|\./gradlew|mvn|ant|bazel|ninja|tsc|vite|webpack|rollup|esbuild|next|nuxt|turbo)(?:\s|$)",
    ),
    (
        CommandFamily::Network,
        r"^(?:curl|wget|ssh|scp|rsync|ping|nc|telnet|dig|nslookup)(?:\s|$)",
    ),
    (
        CommandFamily::Interpreter,
        r"^(?:node|python3?|ruby|perl|php|java|deno|rustc|dotnet)(?:\s|$)",
    ),
    (
        CommandFamily::FileSystem,
        r"^(?:cd|ls|pwd|mkdir|rmdir|rm|cp|mv|touch|chmod|chown|ln|cat|echo|printf|head|tail|find|which|clear)(?:\s|$)",
    ),
    (
        CommandFamily::TextProcessing,
        r"^(?:grep|egrep|sed|awk|sort|uniq|wc|cut|tr|xargs|jq|diff)(?:\s|$)",
    ),
    (
        CommandFamily::Archive,
        r"^(?:tar|zip|unzip|gzip|gunzip|7z)(?:\s|$)",
    ),
    (
        CommandFamily::System,
        r"^(?:ps|top|htop|kill|killall|pkill|df|du|free|uname|whoami|lsof|netstat|systemctl|service)(?:\s|$)",
    ),
];

static FAMILIES: Lazy<Vec<(CommandFamily, Regex)>> = Lazy::new(|| {
    FAMILY_SOURCES
        .iter()
        .map(|(family, source)| (*family, Regex::new(source).expect("valid family regex")))
        .collect()
});

/// An executable name optionally followed by flags.
static GENERIC_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.][\w./-]*(?:\s+--?[\w-]+(?:=\S+)?)*\s*$").expect("valid generic regex")
});

static PROMPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\$|>|PS>|%)\s+").expect("valid prompt regex"));

static WRAPPER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:sudo(?:\s+-\S+)*\s+|time\s+|nohup\s+|watch(?:\s+-\S+(?:\s+\d+)?)*\s+|env(?:\s+[A-Za-z_]\w*=\S*)+\s+)",
    )
    .expect("valid wrapper regex")
});

static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:export\s+|readonly\s+|local\s+|declare\s+)?[A-Za-z_]\w*=").expect("valid assignment regex")
});

static FUNCTION_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:function\s+[\w-]+|[\w-]+\s*\(\s*\))\s*\{?").expect("valid function regex")
});

static CONTROL_FLOW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:if|then|else|elif|fi|for|while|until|do|done|case|esac|select)(?:\s|;|$)")
        .expect("valid control-flow regex")
});

static CONTROL_FLOW_BODY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:if|elif|for|while|until|case|select)\b.*\b(?:then|do|in)\b")
        .expect("valid control-flow body regex")
});

static SCRIPT_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:source|local|declare|exit)\b|^\.\s+\S").expect("valid statement regex"));

pub fn is_shell_language(language: &str) -> bool {
    let language = language.to_ascii_lowercase();
    SHELL_LANGUAGES.contains(&language.as_str())
}

fn strip_prompt(line: &str) -> &str {
    match PROMPT.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

fn strip_wrappers(mut line: &str) -> &str {
    line = strip_prompt(line);
    while let Some(m) = WRAPPER_PREFIX.find(line) {
        line = &line[m.end()..];
    }
    line
}

/// Program-like content: shebangs, functions, assignments, control flow.
pub fn looks_like_script(content: &str) -> bool {
    let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
    if lines.clone().next().is_some_and(|first| first.starts_with("#!")) {
        return true;
    }
    lines.any(|line| {
        !line.starts_with('#')
            && (FUNCTION_DEF.is_match(line)
                || CONTROL_FLOW_BODY.is_match(line)
                || ASSIGNMENT.is_match(line)
                || SCRIPT_STATEMENT.is_match(line))
    })
}

/// Which command family a single line belongs to, if it reads as a command.
pub fn command_family(line: &str) -> Option<CommandFamily> {
    let line = strip_wrappers(line.trim());
    if line.is_empty()
        || line.starts_with('#')
        || ASSIGNMENT.is_match(line)
        || FUNCTION_DEF.is_match(line)
        || CONTROL_FLOW.is_match(line)
    {
        return None;
    }
    FAMILIES
        .iter()
        .find(|(_, regex)| regex.is_match(line))
        .map(|(family, _)| *family)
        .or_else(|| GENERIC_COMMAND.is_match(line).then_some(CommandFamily::Generic))
}

pub fn is_command_line(line: &str) -> bool {
    command_family(line).is_some()
}

/// Classify a shell block's body. Returns the runnable lines, with prompt
/// markers removed, when the block reads as a command sequence.
pub fn extract_commands(content: &str) -> Option<Vec<String>> {
    if looks_like_script(content) {
        return None;
    }
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }

    let commands: Vec<String> = lines
        .iter()
        .filter(|line| is_command_line(line))
        .map(|line| strip_prompt(line).to_string())
        .collect();

    let accepted = if lines.len() == 1 {
        commands.len() == 1
    } else {
        commands.len() as f64 / lines.len() as f64 > COMMAND_LINE_RATIO
    };
    accepted.then_some(commands)
}
