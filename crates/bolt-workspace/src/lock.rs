use serde::{Deserialize, Serialize};

/// Lock state carried by every file and folder entry.
///
/// `locked_by_folder` is only ever set on files, and only while the named
/// ancestor folder is itself locked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub is_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_by_folder: Option<String>,
}

impl Lock {
    pub(crate) fn direct() -> Self {
        Self {
            is_locked: true,
            locked_by_folder: None,
        }
    }

    pub(crate) fn via_folder(folder: &str) -> Self {
        Self {
            is_locked: true,
            locked_by_folder: Some(folder.to_string()),
        }
    }
}
