use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HostAction {
    Open,
    Close,
}

/// One-way notification broadcast to the embedding page when the widget opens or
/// closes. Serializes as `{"type":"assistant","action":"open"}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostSignal {
    Assistant { action: HostAction },
}

impl HostSignal {
    #[must_use]
    pub const fn open() -> Self {
        Self::Assistant { action: HostAction::Open }
    }

    #[must_use]
    pub const fn close() -> Self {
        Self::Assistant { action: HostAction::Close }
    }

    #[must_use]
    pub const fn action(self) -> HostAction {
        match self {
            Self::Assistant { action } => action,
        }
    }
}
