//! Read models for the reporting and live-display consumers
//!
//! - [`DetailedResults`]: one round, ranked, with percentages and outcome
//! - [`PublicBoard`]: the latest round of every position for a projector
//! - [`ElectionReport`]: every row of every round, for export

use crate::resolver::{self, RoundOutcome};
use crate::tally::{self, Percentage};
use crate::types::{
    Candidate, CandidateId, Election, ElectionId, ElectionStatus, Position, PositionId,
    ResultId, Round, RoundResult,
};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One ranked line of a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedRow {
    pub result_id: ResultId,
    pub candidate_id: CandidateId,
    pub candidate_name: String,
    pub votes: u64,
    pub placement: usize,
    pub percentage: Percentage,
}

/// A round with its tally and derived outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedResults {
    pub round: Round,
    pub total_votes: u64,
    pub rows: Vec<DetailedRow>,
    pub outcome: RoundOutcome,
    pub is_tie: bool,
    pub winner: Option<CandidateId>,
}

impl DetailedResults {
    /// Tally `rows` of `round`, resolving names through `candidates`
    pub fn build(round: Round, rows: &[RoundResult], candidates: &[Candidate]) -> Self {
        let names: HashMap<CandidateId, &str> = candidates
            .iter()
            .map(|c| (c.id, c.full_name.as_str()))
            .collect();
        let result_ids: HashMap<CandidateId, ResultId> =
            rows.iter().map(|r| (r.candidate_id, r.id)).collect();

        let tally = tally::tally(rows);
        let outcome = resolver::outcome(rows);
        let detailed = tally
            .rows
            .into_iter()
            .filter_map(|row| {
                Some(DetailedRow {
                    result_id: *result_ids.get(&row.candidate_id)?,
                    candidate_id: row.candidate_id,
                    candidate_name: names
                        .get(&row.candidate_id)
                        .map(|n| n.to_string())
                        .unwrap_or_default(),
                    votes: row.votes,
                    placement: row.placement,
                    percentage: row.percentage,
                })
            })
            .collect();

        Self {
            round,
            total_votes: tally.total_votes,
            rows: detailed,
            is_tie: outcome.is_tie(),
            winner: outcome.winner(),
            outcome,
        }
    }
}

/// Live state of one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardPosition {
    pub position: Position,
    pub title: String,
    /// Active candidates, ascending id
    pub candidates: Vec<Candidate>,
    /// Most recent round and its tally, if a round was opened
    pub latest: Option<DetailedResults>,
}

/// What the public display shows for an election
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicBoard {
    pub election: Election,
    pub positions: Vec<BoardPosition>,
}

/// One exported line: a candidate in a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub position_id: PositionId,
    pub position: String,
    pub position_order: u32,
    pub round_number: u32,
    pub candidate_id: CandidateId,
    pub candidate: String,
    pub votes: u64,
    /// Share within the row's own round
    pub percentage: Percentage,
}

/// Full export of an election's rounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionReport {
    pub election_id: ElectionId,
    pub election: String,
    pub date: DateTime<Utc>,
    pub status: ElectionStatus,
    /// Ordered by position order, round number, then votes descending
    pub rows: Vec<ReportRow>,
    pub generated_at: DateTime<Utc>,
}

impl ElectionReport {
    pub fn new(election: &Election) -> Self {
        Self {
            election_id: election.id,
            election: election.name.clone(),
            date: election.date,
            status: election.status,
            rows: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    /// Append the rows of one round; rounds must be pushed in export order
    pub fn push_round(
        &mut self,
        position: &Position,
        title: &str,
        round: &Round,
        details: &DetailedResults,
    ) {
        for row in &details.rows {
            self.rows.push(ReportRow {
                position_id: position.id,
                position: title.to_string(),
                position_order: position.order,
                round_number: round.number,
                candidate_id: row.candidate_id,
                candidate: row.candidate_name.clone(),
                votes: row.votes,
                percentage: row.percentage,
            });
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
