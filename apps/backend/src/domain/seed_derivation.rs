//! Deterministic seed derivation from a session's base `rng_seed`.

/// Seed for shuffling the session's board.
pub fn derive_board_seed(session_seed: i64) -> u64 {
    (session_seed as u64).wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1)
}

/// Seed for the move-decision provider driving one synthetic participant.
///
/// Distinct per (session, user) so two bots in one session do not mirror each other.
pub fn derive_provider_seed(session_seed: i64, user_id: i64) -> u64 {
    (session_seed as u64)
        .wrapping_add((user_id as u64).wrapping_mul(1_000_003))
        .wrapping_add(2)
}
