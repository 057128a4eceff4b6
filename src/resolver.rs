//! Winner and tie resolution
//!
//! The outcome of a round is never stored. It is derived on demand from the
//! round's result rows:
//!
//! | State          | Condition                                         |
//! |----------------|---------------------------------------------------|
//! | `NoResults`    | no row recorded                                   |
//! | `ClearWinner`  | exactly one candidate holds the maximum, max > 0  |
//! | `Tie`          | several candidates hold the maximum, max > 0      |
//! | `ZeroVotes`    | rows exist but every count is 0                   |
//!
//! `ZeroVotes` behaves like a tie among everyone, since nobody has a
//! plurality. A round holding a single row is never a tie.

use crate::tally::Tallied;
use crate::types::CandidateId;
use serde::{Deserialize, Serialize};

/// Tag of a [`RoundOutcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundState {
    NoResults,
    ClearWinner,
    Tie,
    ZeroVotes,
}

/// Derived outcome of a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundOutcome {
    NoResults,
    ClearWinner {
        candidate_id: CandidateId,
        votes: u64,
    },
    Tie {
        /// Tied leaders, ascending id
        candidates: Vec<CandidateId>,
        votes: u64,
    },
    ZeroVotes {
        /// Every candidate with a row, ascending id
        candidates: Vec<CandidateId>,
    },
}

impl RoundOutcome {
    pub fn state(&self) -> RoundState {
        match self {
            Self::NoResults => RoundState::NoResults,
            Self::ClearWinner { .. } => RoundState::ClearWinner,
            Self::Tie { .. } => RoundState::Tie,
            Self::ZeroVotes { .. } => RoundState::ZeroVotes,
        }
    }

    pub fn winner(&self) -> Option<CandidateId> {
        match self {
            Self::ClearWinner { candidate_id, .. } => Some(*candidate_id),
            _ => None,
        }
    }

    /// True for `Tie`, and for `ZeroVotes` among more than one candidate
    pub fn is_tie(&self) -> bool {
        match self {
            Self::Tie { .. } => true,
            Self::ZeroVotes { candidates } => candidates.len() > 1,
            _ => false,
        }
    }

    /// Whether the round may stand as the final word for its position
    pub fn is_authoritative(&self) -> bool {
        matches!(self, Self::ClearWinner { .. })
    }
}

/// Classify a result set
pub fn outcome<T: Tallied>(results: &[T]) -> RoundOutcome {
    let Some(max) = results.iter().map(|r| r.votes()).max() else {
        return RoundOutcome::NoResults;
    };

    if max == 0 {
        let mut candidates: Vec<_> = results.iter().map(|r| r.candidate_id()).collect();
        candidates.sort();
        candidates.dedup();
        return RoundOutcome::ZeroVotes { candidates };
    }

    let mut leaders: Vec<_> = results
        .iter()
        .filter(|r| r.votes() == max)
        .map(|r| r.candidate_id())
        .collect();
    leaders.sort();
    leaders.dedup();

    match leaders.as_slice() {
        [only] => RoundOutcome::ClearWinner {
            candidate_id: *only,
            votes: max,
        },
        _ => RoundOutcome::Tie {
            candidates: leaders,
            votes: max,
        },
    }
}

/// The single leading candidate, if the round has a clear winner
pub fn winner<T: Tallied>(results: &[T]) -> Option<CandidateId> {
    outcome(results).winner()
}

pub fn is_tie<T: Tallied>(results: &[T]) -> bool {
    outcome(results).is_tie()
}
