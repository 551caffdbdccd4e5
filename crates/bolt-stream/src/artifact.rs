use serde::{Deserialize, Serialize};

/// A titled group of actions produced by one model response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub title: String,
    pub actions: Vec<Action>,
}

impl Artifact {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            actions: Vec::new(),
        }
    }

    pub fn file_actions(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|action| action.kind == ActionKind::File)
    }

    pub fn shell_actions(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|action| action.kind == ActionKind::Shell)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    File,
    Shell,
}

impl ActionKind {
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "file" => Some(Self::File),
            "shell" => Some(Self::Shell),
            _ => None,
        }
    }
}

/// A single file-write or shell directive.
///
/// `content` grows while the action is open and is final only once the
/// closing tag has been seen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub kind: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub content: String,
}

impl Action {
    pub fn new(id: impl Into<String>, kind: ActionKind, file_path: Option<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            file_path,
            content: String::new(),
        }
    }

    pub(crate) fn finalize_content(&mut self) {
        self.content = match self.kind {
            ActionKind::File => normalize_file_content(&self.content),
            ActionKind::Shell => self.content.trim().to_string(),
        };
    }
}

/// Strip surrounding blank lines and trailing whitespace, then end with a
/// single newline. Indentation of the first line is kept.
pub(crate) fn normalize_file_content(raw: &str) -> String {
    let body = raw.trim_start_matches(['\n', '\r']).trim_end();
    if body.is_empty() {
        String::new()
    } else {
        format!("{body}\n")
    }
}
