use serde::{Deserialize, Serialize};

/// Seat a connection holds for the lifetime of a lobby, fixed by arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    First,
    Second,
}

impl Role {
    pub fn other(self) -> Role {
        match self {
            Role::First => Role::Second,
            Role::Second => Role::First,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Role::First => 0,
            Role::Second => 1,
        }
    }
}

/// Viewer-relative label used in outbound status messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perspective {
    #[serde(rename = "self")]
    Own,
    Opponent,
}

impl Perspective {
    /// Labels `subject` as seen by `viewer`.
    pub fn of(subject: Role, viewer: Role) -> Perspective {
        if subject == viewer {
            Perspective::Own
        } else {
            Perspective::Opponent
        }
    }
}
