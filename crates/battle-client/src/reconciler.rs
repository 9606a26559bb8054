use battle_core::protocol::StatusUpdatePayload;

use crate::store::MatchStore;

/// Merge a `game_state_update` payload into the store.
///
/// Records are applied in array order, so within one batch a later record
/// for the same key overrides an earlier one — except that a downgrade of
/// an already-accepted key is rejected by the store's merge rule, batch or
/// not. Records naming unknown ids are dropped (and logged) by the store
/// without touching other entries.
///
/// Returns how many records changed stored state.
pub fn reconcile(store: &mut MatchStore, payload: StatusUpdatePayload) -> usize {
    let mut applied = 0;
    for record in payload.into_vec() {
        if store.apply_authoritative(&record.player_id, &record.problem_id, record.verdict) {
            applied += 1;
        }
    }
    applied
}
