//! One-way progress narration from the automation core to whoever renders it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::info;

/// Which workflow emitted a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Wms,
    Labels,
    StoreScan,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Wms => "wms",
            Stage::Labels => "labels",
            Stage::StoreScan => "store-scan",
        };
        f.write_str(name)
    }
}

/// A single status line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
}

/// Fire-and-forget sender handed to the workflows
#[derive(Debug, Clone)]
pub struct Progress {
    stage: Stage,
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl Progress {
    /// Create a sender and the receiver the presentation layer drains
    pub fn channel(stage: Stage) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { stage, tx: Some(tx) }, rx)
    }

    /// A sender with no listener; messages only reach the log
    pub fn silent(stage: Stage) -> Self {
        Self { stage, tx: None }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Emit a status line. A dropped receiver is ignored.
    pub fn say(&self, message: impl Into<String>) {
        let message = message.into();
        info!(stage = %self.stage, "{}", message);
        if let Some(tx) = &self.tx {
            let _ = tx.send(ProgressEvent {
                stage: self.stage,
                message,
            });
        }
    }
}
