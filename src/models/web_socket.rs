use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{GameStatus, Rank, SlapOutcome};

/// Bare text tokens a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAction {
    Pile,
    Slap,
    Restart,
}

impl ClientAction {
    pub fn token(self) -> &'static str {
        match self {
            ClientAction::Pile => "pile",
            ClientAction::Slap => "slap",
            ClientAction::Restart => "restart",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action {:?}", self.0)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for ClientAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pile" => Ok(ClientAction::Pile),
            "slap" => Ok(ClientAction::Slap),
            "restart" => Ok(ClientAction::Restart),
            other => Err(UnknownAction(other.to_owned())),
        }
    }
}

/// JSON objects sent to clients, discriminated by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerEvent {
    Full,
    State(GameStatus),
    SlapResult { result: SlapOutcome },
    BattleStart { face_card: Rank, cards_to_play: u8 },
    BattleContinue { cards_remaining: u8 },
    BattleEnd,
}

impl ServerEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
