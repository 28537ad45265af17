//! Key namespace layout.
//!
//! Single source of truth for every key the service reads or writes.
//! A pending marker exists exactly while the corresponding bet or pick
//! awaits settlement; its presence is the reconciler's work queue.

/// Global bankroll scalar for house-curated picks.
pub const GLOBAL_BANKROLL: &str = "bankroll:current";

/// Bounded list of global bankroll snapshots, newest first.
pub const BANKROLL_HISTORY: &str = "bankroll:history";

/// Daily tips draft awaiting admin review.
pub const DAILY_DRAFT: &str = "draft:daily:tips";

pub const STATS_WINS: &str = "stats:wins";
pub const STATS_TOTAL: &str = "stats:total";
pub const STATS_STREAK: &str = "stats:streak";
pub const STATS_LAST_UPDATED: &str = "stats:last_updated";
pub const STATS_VIP_WINS: &str = "stats:vip:wins";
pub const STATS_VIP_TOTAL: &str = "stats:vip:total";

pub const PENDING_PICK_PREFIX: &str = "pending_pick:";
pub const PENDING_USER_BET_PREFIX: &str = "pending_user_bet:";

/// Marker for a system pick awaiting its fixture result.
pub fn pending_pick(fixture_id: u64) -> String {
    format!("{PENDING_PICK_PREFIX}{fixture_id}")
}

/// Marker for a user bet awaiting verification.
pub fn pending_user_bet(bet_id: &str) -> String {
    format!("{PENDING_USER_BET_PREFIX}{bet_id}")
}

/// Glob pattern matching every key under a prefix.
pub fn prefix_pattern(prefix: &str) -> String {
    format!("{prefix}*")
}

/// A user's bet list (JSON array, newest first).
pub fn user_bets(email: &str) -> String {
    format!("user:{email}:bets")
}

/// A user's bankroll scalar.
pub fn user_bankroll(email: &str) -> String {
    format!("user:{email}:bankroll")
}
