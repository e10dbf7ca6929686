pub mod cards;
pub mod game;
pub mod player;

pub use cards::*;
pub use game::*;
pub use player::*;
