pub mod leitner;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::VocabCard;
use leitner::Recall;

const RANDOM_BATCH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    All,
    Random10,
    Due,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Next,
    /// The cursor was already on the last card. The queue position does not
    /// move; closing the session is the caller's decision.
    Exhausted,
}

/// One run through a queue of cards. The session owns a copy of each card;
/// the store stays the source of truth and is written through by the caller
/// on deletes and grades.
#[derive(Debug)]
pub struct ReviewSession {
    mode: StartMode,
    queue: Vec<VocabCard>,
    index: usize,
    flipped: bool,
}

impl ReviewSession {
    /// Builds the card queue for `mode`. Returns `None` when the selection
    /// comes up empty, leaving the caller on the menu.
    pub fn start(
        mode: StartMode,
        cards: Vec<VocabCard>,
        now_ms: i64,
        rng: &mut impl Rng,
    ) -> Option<Self> {
        let queue = match mode {
            StartMode::All => cards,
            StartMode::Random10 => {
                let mut shuffled = cards;
                shuffled.shuffle(rng);
                shuffled.truncate(RANDOM_BATCH);
                shuffled
            }
            StartMode::Due => cards
                .into_iter()
                .filter(|card| {
                    leitner::is_due(card.review_stage, card.last_reviewed_at, card.timestamp, now_ms)
                })
                .collect(),
        };
        if queue.is_empty() {
            return None;
        }
        Some(Self {
            mode,
            queue,
            index: 0,
            flipped: false,
        })
    }

    pub fn mode(&self) -> StartMode {
        self.mode
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn flipped(&self) -> bool {
        self.flipped
    }

    pub fn current(&self) -> Option<&VocabCard> {
        self.queue.get(self.index)
    }

    pub fn flip(&mut self) {
        self.flipped = !self.flipped;
    }

    /// Moves to the next card face-down. On the last card the cursor stays
    /// put and `Exhausted` is reported.
    pub fn advance(&mut self) -> Advance {
        self.flipped = false;
        if self.index + 1 < self.queue.len() {
            self.index += 1;
            Advance::Next
        } else {
            Advance::Exhausted
        }
    }

    /// Drops the current card from the queue and returns it. A cursor left
    /// past the new end wraps to the first card. An emptied queue is the
    /// caller's cue to close the session.
    pub fn remove_current(&mut self) -> Option<VocabCard> {
        if self.index >= self.queue.len() {
            return None;
        }
        let removed = self.queue.remove(self.index);
        if self.index >= self.queue.len() {
            self.index = 0;
        }
        self.flipped = false;
        Some(removed)
    }

    /// Expels a card from the queue wherever it sits. Removing the card
    /// under the cursor behaves like `remove_current`; removing an earlier
    /// card shifts the cursor so the visible card stays put.
    pub fn remove_by_id(&mut self, id: i64) -> bool {
        let Some(pos) = self.queue.iter().position(|card| card.id == id) else {
            return false;
        };
        if pos == self.index {
            self.remove_current();
            return true;
        }
        self.queue.remove(pos);
        if pos < self.index {
            self.index -= 1;
        }
        true
    }

    /// Regrades the current card and advances. The updated card is handed
    /// back for the caller to persist.
    pub fn grade_current(&mut self, recall: Recall, now_ms: i64) -> Option<(VocabCard, Advance)> {
        let card = self.queue.get_mut(self.index)?;
        card.review_stage = leitner::next_stage(card.review_stage, recall);
        card.last_reviewed_at = Some(now_ms);
        let updated = card.clone();
        let outcome = self.advance();
        Some((updated, outcome))
    }
}
