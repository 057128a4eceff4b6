//! Tally engine
//!
//! Pure computations over a round's result set: totals, percentages and
//! ranking. Nothing here touches storage, so any source of result rows can
//! be fed through it.
//!
//! ```rust
//! use runoff::tally::{self, Percentage};
//! use runoff::types::CandidateId;
//!
//! let rows = [(CandidateId(1), 7u64), (CandidateId(2), 3u64)];
//! let summary = tally::tally(&rows);
//!
//! assert_eq!(summary.total_votes, 10);
//! assert_eq!(summary.rows[0].candidate_id, CandidateId(1));
//! assert_eq!(summary.rows[0].percentage, Percentage::from_hundredths(7000));
//! assert_eq!(summary.rows[0].percentage.to_string(), "70.00");
//! ```

use crate::types::{CandidateId, CandidateResult, RoundResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Anything that carries a vote count for a candidate
pub trait Tallied {
    fn candidate_id(&self) -> CandidateId;
    fn votes(&self) -> u64;
}

impl Tallied for RoundResult {
    fn candidate_id(&self) -> CandidateId {
        self.candidate_id
    }

    fn votes(&self) -> u64 {
        self.votes
    }
}

impl Tallied for CandidateResult {
    fn candidate_id(&self) -> CandidateId {
        self.candidate_id
    }

    fn votes(&self) -> u64 {
        self.votes
    }
}

impl Tallied for (CandidateId, u64) {
    fn candidate_id(&self) -> CandidateId {
        self.0
    }

    fn votes(&self) -> u64 {
        self.1
    }
}

impl<T: Tallied> Tallied for &T {
    fn candidate_id(&self) -> CandidateId {
        (*self).candidate_id()
    }

    fn votes(&self) -> u64 {
        (*self).votes()
    }
}

/// A share of the total, fixed at two decimal places
///
/// Stored as hundredths of a percent so equality is exact. Serializes as a
/// plain JSON number (`70.0` for 70.00%).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percentage(u64);

impl Percentage {
    pub const ZERO: Percentage = Percentage(0);

    pub fn from_hundredths(hundredths: u64) -> Self {
        Self(hundredths)
    }

    /// `votes` as a share of `total`, rounded half-up to two decimals.
    /// A zero total yields 0%.
    pub fn of(votes: u64, total: u64) -> Self {
        if total == 0 {
            return Self::ZERO;
        }
        // floor(votes * 10000 / total + 1/2)
        let numerator = 2 * u128::from(votes) * 10_000 + u128::from(total);
        let hundredths = numerator / (2 * u128::from(total));
        Self(u64::try_from(hundredths).unwrap_or(u64::MAX))
    }

    pub fn hundredths(self) -> u64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() || value < 0.0 {
            return Err(serde::de::Error::custom("percentage must be a non-negative number"));
        }
        Ok(Self((value * 100.0).round() as u64))
    }
}

/// Sum of all votes in the result set, saturating at `u64::MAX`
pub fn total_votes<T: Tallied>(results: &[T]) -> u64 {
    results
        .iter()
        .fold(0_u64, |total, r| total.saturating_add(r.votes()))
}

/// Percentage of `candidate_votes` over `total`
pub fn percentage(candidate_votes: u64, total: u64) -> Percentage {
    Percentage::of(candidate_votes, total)
}

/// Order results by votes descending, ties broken by ascending candidate id
pub fn rank<T: Tallied>(results: &[T]) -> Vec<&T> {
    let mut ordered: Vec<&T> = results.iter().collect();
    ordered.sort_by(|a, b| {
        b.votes()
            .cmp(&a.votes())
            .then_with(|| a.candidate_id().cmp(&b.candidate_id()))
    });
    ordered
}

/// One candidate's line in a tallied round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRow {
    pub candidate_id: CandidateId,
    pub votes: u64,
    /// 1-based position in the ranking
    pub placement: usize,
    pub percentage: Percentage,
}

/// Aggregates of a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    pub total_votes: u64,
    pub rows: Vec<RankedRow>,
}

/// Compute totals, ranking and percentages in one pass
pub fn tally<T: Tallied>(results: &[T]) -> Tally {
    let total = total_votes(results);
    let rows = rank(results)
        .into_iter()
        .enumerate()
        .map(|(i, r)| RankedRow {
            candidate_id: r.candidate_id(),
            votes: r.votes(),
            placement: i + 1,
            percentage: Percentage::of(r.votes(), total),
        })
        .collect();
    Tally {
        total_votes: total,
        rows,
    }
}
