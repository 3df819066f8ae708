//! Deterministic bid comparator.
//!
//! Merges a foreign view of a bid into the local one. Any two agents that observe the
//! same sequence of foreign bids end with the same winner and utility for each subtask.
//!
//! Rules, in order:
//! - `performed` is sticky and propagates both ways.
//! - Same winner on both sides: the newer record wins; on equal timestamps the higher
//!   utility (then the earlier imaging time) wins.
//! - Only an agent itself can claim a subtask for itself: foreign records naming the
//!   local agent as winner never override the local record.
//! - The current winner is authoritative about giving a subtask up: a newer record
//!   sent by the agent the local table names as winner is adopted.
//! - Otherwise a claim beats a blank, and between two claims the higher utility wins,
//!   with ties going to the lexicographically smaller winner id.

use skyweave_core::Bid;
use std::cmp::Ordering;

/// What the merge did to the local record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The local record changed
    pub changed: bool,
    /// The local record was kept and differs from the foreign one; resend it
    pub rebroadcast: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Adopt,
    Keep,
}

/// Whether a claim `(utility_a, winner_a)` beats `(utility_b, winner_b)`
pub fn outbids(utility_a: f64, winner_a: &str, utility_b: f64, winner_b: &str) -> bool {
    match utility_a.total_cmp(&utility_b) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => winner_a < winner_b,
    }
}

/// Merge `theirs` into `local`, as seen by agent `me`
pub fn merge_bid(local: &mut Bid, theirs: &Bid, me: &str) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    if theirs.performed && !local.performed {
        local.performed = true;
        outcome.changed = true;
    }

    match decide(local, theirs, me) {
        Decision::Adopt => {
            if !local.same_claim(theirs) {
                outcome.changed = true;
            }
            local.winner = theirs.winner.clone();
            local.winning_bid = theirs.winning_bid;
            local.t_img = theirs.t_img;
            local.t_update = local.t_update.max(theirs.t_update);
            local.bidder = me.to_string();
        }
        Decision::Keep => {
            if !local.same_claim(theirs) {
                outcome.rebroadcast = true;
            }
        }
    }

    outcome
}

fn decide(local: &Bid, theirs: &Bid, me: &str) -> Decision {
    if local.winner == theirs.winner {
        return match theirs.t_update.total_cmp(&local.t_update) {
            Ordering::Greater => Decision::Adopt,
            Ordering::Less => Decision::Keep,
            Ordering::Equal => {
                let better = match theirs.winning_bid.total_cmp(&local.winning_bid) {
                    Ordering::Equal => earlier(theirs.t_img, local.t_img),
                    ordering => ordering == Ordering::Greater,
                };
                if better {
                    Decision::Adopt
                } else {
                    Decision::Keep
                }
            }
        };
    }

    if theirs.is_won_by(me) {
        return Decision::Keep;
    }

    match (&local.winner, &theirs.winner) {
        (Some(mine), Some(their_winner)) if mine == me => {
            if outbids(theirs.winning_bid, their_winner, local.winning_bid, mine) {
                Decision::Adopt
            } else {
                Decision::Keep
            }
        }
        (Some(mine), _) if mine == me => Decision::Keep,
        (Some(holder), None) => {
            if theirs.bidder == *holder && theirs.t_update >= local.t_update {
                Decision::Adopt
            } else {
                Decision::Keep
            }
        }
        (None, Some(_)) => Decision::Adopt,
        (Some(holder), Some(their_winner)) => {
            let holder_report = theirs.bidder == *holder && theirs.t_update >= local.t_update;
            if holder_report || outbids(theirs.winning_bid, their_winner, local.winning_bid, holder)
            {
                Decision::Adopt
            } else {
                Decision::Keep
            }
        }
        (None, None) => Decision::Keep,
    }
}

fn earlier(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a < b,
        (Some(_), None) => true,
        _ => false,
    }
}
