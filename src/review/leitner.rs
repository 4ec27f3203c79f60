//! Leitner-box scheduling over the card's `review_stage` field. Stages map
//! to fixed intervals; remembering promotes one stage, forgetting sends the
//! card back to stage 0.

const STAGE_INTERVALS_DAYS: [i64; 6] = [0, 1, 2, 4, 7, 15];

pub const MAX_STAGE: u32 = 5;
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recall {
    Remembered,
    Forgot,
}

pub fn next_stage(stage: u32, recall: Recall) -> u32 {
    match recall {
        Recall::Remembered => (stage + 1).min(MAX_STAGE),
        Recall::Forgot => 0,
    }
}

pub fn interval_days(stage: u32) -> i64 {
    STAGE_INTERVALS_DAYS[stage.min(MAX_STAGE) as usize]
}

/// Due check anchored on the last grading time, falling back to the card's
/// creation time for cards that were never graded.
pub fn is_due(stage: u32, last_reviewed_at: Option<i64>, created_ms: i64, now_ms: i64) -> bool {
    let anchor = last_reviewed_at.unwrap_or(created_ms);
    now_ms - anchor >= interval_days(stage) * DAY_MS
}
