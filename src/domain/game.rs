use std::collections::VecDeque;
use std::mem;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::card_game::{deal, new_shuffled_deck};
use crate::domain::{Card, Perspective, Rank, Role};

/// An active royal-card sequence.
///
/// `remaining` counts the non-royal cards the challenged player must still
/// play. Once it reaches zero the next card played hands the pile to the
/// player who laid the royal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battle {
    pub face: Rank,
    pub remaining: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlapOutcome {
    Correct,
    Incorrect,
}

/// What a call to [`Session::play_card`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Play {
    /// Out of turn or empty hand; nothing moved.
    Ignored,
    Placed,
    BattleStarted(Battle),
    BattleContinued(Battle),
    /// The countdown ran out and the pile went to this player.
    PileAwarded(Role),
}

/// Per-viewer snapshot of a session. `turn` and the hand sizes are relative
/// to the viewer; `pile` is shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatus {
    pub turn: Perspective,
    pub self_hand: usize,
    pub op_hand: usize,
    pub pile: Vec<Card>,
    pub battle: Option<Battle>,
}

impl GameStatus {
    pub fn is_game_over(&self) -> bool {
        self.self_hand == 0 || self.op_hand == 0
    }
}

/// State of one game between the two lobby seats.
///
/// Hands are queues: cards leave from the front and won cards join at the
/// back. Index 0 of the pile is the oldest card.
#[derive(Debug, Clone)]
pub struct Session {
    hands: [VecDeque<Card>; 2],
    pile: Vec<Card>,
    turn: Role,
    battle: Option<Battle>,
}

impl Session {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = new_shuffled_deck(rng);
        let (first, second) = deal(&mut deck);

        Self {
            hands: [first, second],
            pile: Vec::new(),
            turn: Role::First,
            battle: None,
        }
    }

    /// Replaces the whole session with a fresh deal.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        *self = Session::new(rng);
    }

    pub fn turn(&self) -> Role {
        self.turn
    }

    pub fn battle(&self) -> Option<Battle> {
        self.battle
    }

    pub fn pile(&self) -> &[Card] {
        &self.pile
    }

    pub fn hand_size(&self, role: Role) -> usize {
        self.hands[role.index()].len()
    }

    pub fn total_cards(&self) -> usize {
        self.hands.iter().map(VecDeque::len).sum::<usize>() + self.pile.len()
    }

    /// Plays the front card of `player`'s hand. Does nothing when it is not
    /// `player`'s turn or their hand is empty.
    ///
    /// A royal always starts a new battle, even when the running countdown
    /// has already reached zero.
    pub fn play_card(&mut self, player: Role) -> Play {
        if player != self.turn {
            return Play::Ignored;
        }
        let Some(card) = self.hands[player.index()].pop_front() else {
            return Play::Ignored;
        };
        self.pile.push(card);

        if let Some(remaining) = card.rank.battle_countdown() {
            let battle = Battle { face: card.rank, remaining };
            self.battle = Some(battle);
            self.turn = player.other();
            return Play::BattleStarted(battle);
        }

        match self.battle {
            Some(battle) if battle.remaining > 0 => {
                let battle = Battle {
                    remaining: battle.remaining - 1,
                    ..battle
                };
                self.battle = Some(battle);
                Play::BattleContinued(battle)
            }
            Some(_) => {
                let winner = player.other();
                self.award_pile(winner);
                Play::PileAwarded(winner)
            }
            None => {
                self.turn = player.other();
                Play::Placed
            }
        }
    }

    fn award_pile(&mut self, winner: Role) {
        let pile = mem::take(&mut self.pile);
        self.hands[winner.index()].extend(pile);
        self.battle = None;
        self.turn = winner;
    }

    /// Doubles, sandwich, or top card matching the bottom card.
    pub fn is_valid_slap(&self) -> bool {
        let pile = &self.pile;
        let len = pile.len();
        if len < 2 {
            return false;
        }

        let top = pile[len - 1].rank;
        top == pile[len - 2].rank
            || (len >= 3 && top == pile[len - 3].rank)
            || top == pile[0].rank
    }

    /// A good slap takes the whole pile and ends any battle. A bad slap
    /// costs the slapper their front card, if they have one.
    pub fn slap(&mut self, player: Role) -> SlapOutcome {
        if self.is_valid_slap() {
            let pile = mem::take(&mut self.pile);
            self.hands[player.index()].extend(pile);
            self.battle = None;
            return SlapOutcome::Correct;
        }

        if let Some(card) = self.hands[player.index()].pop_front() {
            self.pile.push(card);
        }
        SlapOutcome::Incorrect
    }

    pub fn status_for(&self, viewer: Role) -> GameStatus {
        GameStatus {
            turn: Perspective::of(self.turn, viewer),
            self_hand: self.hand_size(viewer),
            op_hand: self.hand_size(viewer.other()),
            pile: self.pile.clone(),
            battle: self.battle,
        }
    }

    #[cfg(test)]
    pub(crate) fn from_parts(first: &[&str], second: &[&str], pile: &[&str], turn: Role) -> Self {
        let cards = |tokens: &[&str]| -> Vec<Card> {
            tokens.iter().map(|t| t.parse().expect("valid card token")).collect()
        };
        Self {
            hands: [cards(first).into(), cards(second).into()],
            pile: cards(pile),
            turn,
            battle: None,
        }
    }
}
