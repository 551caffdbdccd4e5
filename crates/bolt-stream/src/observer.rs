//! Callbacks fired by the tag parser.

use serde::{Deserialize, Serialize};

use crate::artifact::{Action, Artifact};

/// Receives artifact and action lifecycle events. Every method defaults to a
/// no-op so implementors only override what they need.
pub trait ParserObserver {
    fn on_artifact_open(&mut self, _message_id: &str, _artifact: &Artifact) {}

    fn on_action_open(&mut self, _message_id: &str, _artifact_id: &str, _action: &Action) {}

    /// A newly accumulated slice of an open action's raw content.
    fn on_action_delta(
        &mut self,
        _message_id: &str,
        _artifact_id: &str,
        _action_id: &str,
        _chunk: &str,
    ) {
    }

    fn on_action_close(&mut self, _message_id: &str, _artifact_id: &str, _action: &Action) {}

    fn on_artifact_complete(&mut self, _message_id: &str, _artifact: Artifact) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ParserObserver for NoopObserver {}

/// Owned record of one observer callback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ParserEvent {
    ArtifactOpen {
        message_id: String,
        artifact_id: String,
        title: String,
    },
    ActionOpen {
        message_id: String,
        artifact_id: String,
        action: Action,
    },
    ActionDelta {
        message_id: String,
        artifact_id: String,
        action_id: String,
        chunk: String,
    },
    ActionClose {
        message_id: String,
        artifact_id: String,
        action: Action,
    },
    ArtifactComplete {
        message_id: String,
        artifact: Artifact,
    },
}

impl ParserEvent {
    pub fn completed_artifact(&self) -> Option<&Artifact> {
        match self {
            ParserEvent::ArtifactComplete { artifact, .. } => Some(artifact),
            _ => None,
        }
    }
}

/// Collecting observer: records every callback in order.
impl ParserObserver for Vec<ParserEvent> {
    fn on_artifact_open(&mut self, message_id: &str, artifact: &Artifact) {
        self.push(ParserEvent::ArtifactOpen {
            message_id: message_id.to_string(),
            artifact_id: artifact.id.clone(),
            title: artifact.title.clone(),
        });
    }

    fn on_action_open(&mut self, message_id: &str, artifact_id: &str, action: &Action) {
        self.push(ParserEvent::ActionOpen {
            message_id: message_id.to_string(),
            artifact_id: artifact_id.to_string(),
            action: action.clone(),
        });
    }

    fn on_action_delta(&mut self, message_id: &str, artifact_id: &str, action_id: &str, chunk: &str) {
        self.push(ParserEvent::ActionDelta {
            message_id: message_id.to_string(),
            artifact_id: artifact_id.to_string(),
            action_id: action_id.to_string(),
            chunk: chunk.to_string(),
        });
    }

    fn on_action_close(&mut self, message_id: &str, artifact_id: &str, action: &Action) {
        self.push(ParserEvent::ActionClose {
            message_id: message_id.to_string(),
            artifact_id: artifact_id.to_string(),
            action: action.clone(),
        });
    }

    fn on_artifact_complete(&mut self, message_id: &str, artifact: Artifact) {
        self.push(ParserEvent::ArtifactComplete {
            message_id: message_id.to_string(),
            artifact,
        });
    }
}
