pub mod deck;

pub use deck::{deal, init_deck, new_shuffled_deck};
