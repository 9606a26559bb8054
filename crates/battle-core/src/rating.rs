use std::collections::HashMap;

use crate::model::PlayerId;

/// Fixed stake per ranked duel: winner gains it, loser drops it.
pub const RATING_DELTA: i32 = 24;

/// Build the per-player delta map for a concluded match.
///
/// This is the client's instantaneous hint; the profile service remains the
/// ground truth for the rating actually shown after a match.
pub fn rating_deltas(winner_id: &str, loser_id: &str) -> HashMap<PlayerId, i32> {
    let mut deltas = HashMap::new();
    deltas.insert(winner_id.to_string(), RATING_DELTA);
    deltas.insert(loser_id.to_string(), -RATING_DELTA);
    deltas
}
