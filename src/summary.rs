//! Election summary aggregation
//!
//! For each position of an election the authoritative round is the highest
//! numbered round that has recorded results. When that round has a clear
//! winner the position appears in the summary; when it is tied (or all
//! zero) the position is left out until a runoff settles it. Rounds opened
//! but still empty are skipped, so a fresh runoff never hides the round
//! before it.

use crate::directory::{CandidateDirectory, ElectionDirectory};
use crate::resolver::{self, RoundOutcome};
use crate::results::ResultStore;
use crate::rounds::RoundStore;
use crate::tally::{self, Percentage};
use crate::types::{CandidateId, ElectionId, Position, PositionId, Round, RoundId, RoundResult};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One elected official
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub position_id: PositionId,
    /// Catalog title of the position
    pub position: String,
    pub order: u32,
    pub winner_id: CandidateId,
    pub winner: String,
    pub votes: u64,
    /// Winner's share of the round's total
    pub percentage: Percentage,
    pub round_id: RoundId,
    pub round_number: u32,
}

/// Sum of winners' votes over the summary
///
/// Only the elected candidates count, matching the "votes of elected
/// officials" figure of the published report.
pub fn election_totals(summary: &[SummaryEntry]) -> u64 {
    summary
        .iter()
        .fold(0_u64, |total, e| total.saturating_add(e.votes))
}

/// Builds final summaries from the directory and the stores
pub struct SummaryAggregator {
    elections: Arc<dyn ElectionDirectory>,
    candidates: Arc<dyn CandidateDirectory>,
    rounds: Arc<RoundStore>,
    results: Arc<ResultStore>,
}

impl SummaryAggregator {
    pub fn new(
        elections: Arc<dyn ElectionDirectory>,
        candidates: Arc<dyn CandidateDirectory>,
        rounds: Arc<RoundStore>,
        results: Arc<ResultStore>,
    ) -> Self {
        Self {
            elections,
            candidates,
            rounds,
            results,
        }
    }

    /// Winners of every settled position, in display order
    pub fn final_summary(&self, election_id: ElectionId) -> Result<Vec<SummaryEntry>> {
        self.elections.election(election_id)?;

        let mut summary = Vec::new();
        for position in self.elections.positions_in_order(election_id)? {
            if let Some(entry) = self.position_entry(&position)? {
                summary.push(entry);
            }
        }

        tracing::debug!(
            "📊 Summary computed: election={}, settled={}",
            election_id,
            summary.len()
        );
        Ok(summary)
    }

    /// The most advanced round of a position holding results, with its rows
    pub fn latest_recorded_round(
        &self,
        position_id: PositionId,
    ) -> Result<Option<(Round, Vec<RoundResult>)>> {
        for round in self.rounds.list_rounds(position_id)?.into_iter().rev() {
            let rows = self.results.results_for_round(round.id)?;
            if !rows.is_empty() {
                return Ok(Some((round, rows)));
            }
        }
        Ok(None)
    }

    fn position_entry(&self, position: &Position) -> Result<Option<SummaryEntry>> {
        let Some((round, rows)) = self.latest_recorded_round(position.id)? else {
            return Ok(None);
        };

        let RoundOutcome::ClearWinner {
            candidate_id,
            votes,
        } = resolver::outcome(&rows)
        else {
            return Ok(None);
        };

        let total = tally::total_votes(&rows);
        let winner = self.candidates.candidate(candidate_id)?;
        Ok(Some(SummaryEntry {
            position_id: position.id,
            position: self.elections.position_title(position.id)?,
            order: position.order,
            winner_id: candidate_id,
            winner: winner.full_name,
            votes,
            percentage: tally::percentage(votes, total),
            round_id: round.id,
            round_number: round.number,
        }))
    }
}
