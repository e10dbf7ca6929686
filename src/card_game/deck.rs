use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::{Card, Rank, Suit};
use crate::shared::HAND_SIZE;

/// All 52 rank/suit combinations, suit-major, unshuffled.
pub fn init_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(Suit::ALL.len() * Rank::ALL.len());

    for suit in Suit::ALL {
        for rank in Rank::ALL {
            deck.push(Card::new(rank, suit));
        }
    }
    deck
}

pub fn new_shuffled_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck = init_deck();
    deck.shuffle(rng);
    deck
}

/// Deals from the back of `deck`, alternating first then second hand, up to
/// `HAND_SIZE` each. Stops quietly if the deck runs out.
pub fn deal(deck: &mut Vec<Card>) -> (VecDeque<Card>, VecDeque<Card>) {
    let mut first = VecDeque::with_capacity(HAND_SIZE);
    let mut second = VecDeque::with_capacity(HAND_SIZE);

    for _ in 0..HAND_SIZE {
        if let Some(card) = deck.pop() {
            first.push_back(card);
        }
        if let Some(card) = deck.pop() {
            second.push_back(card);
        }
    }
    (first, second)
}
