pub mod game_manager;

pub use game_manager::{JoinRejected, JoinTicket, Lobby, LobbyCommand, LobbyPhase, Outbound};
