//! Election service
//!
//! Entry point for the surrounding application. Wires the directory, the
//! round and result stores, the summary aggregator and the publication log
//! together, and drives the status transitions that follow from round
//! activity:
//!
//! - opening the first round of an election moves it `Draft` -> `InProgress`
//! - opening a round moves its position `Pending` -> `InProgress`
//! - closing a round with a clear winner moves its position to `Completed`
//! - finalizing the election moves it `InProgress` -> `Finalized`
//!
//! Deleting an owner checks dependents across several stores. Those deletes
//! hold the structure lock exclusively, while every other mutation holds it
//! shared, so a dependent cannot appear between the check and the removal.

use crate::config::EngineConfig;
use crate::directory::{CandidateDirectory, Directory, ElectionDirectory};
use crate::publication::{NewPublication, PublicationLog};
use crate::report::{BoardPosition, DetailedResults, ElectionReport, PublicBoard};
use crate::resolver::{self, RoundOutcome};
use crate::results::ResultStore;
use crate::rounds::RoundStore;
use crate::summary::{self, SummaryAggregator, SummaryEntry};
use crate::types::{
    Candidate, CandidateId, CandidateResult, CatalogEntry, CatalogId, Election, ElectionId,
    ElectionStatus, Position, PositionId, PositionStatus, Publication, ResultEntry, ResultId,
    Round, RoundId, RoundResult,
};
use crate::{Error, Result, conflict_error, lock_error};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// A runoff opened after a tied round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runoff {
    /// The tied round, now finalized
    pub previous: Round,
    pub round: Round,
    /// Candidates expected in the new round: the position's active set
    pub candidates: Vec<Candidate>,
}

/// Result of finalizing an election
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResults {
    pub election: Election,
    pub summary: Vec<SummaryEntry>,
    /// Sum of the winners' votes
    pub total_votes: u64,
}

/// Facade over the election engine
pub struct ElectionService {
    config: EngineConfig,
    structure: RwLock<()>,
    directory: Arc<Directory>,
    rounds: Arc<RoundStore>,
    results: Arc<ResultStore>,
    summary: SummaryAggregator,
    publications: PublicationLog,
}

impl ElectionService {
    pub fn new(config: EngineConfig) -> Self {
        let directory = Arc::new(Directory::new(&config));
        let rounds = Arc::new(RoundStore::new(directory.clone()));
        let results = Arc::new(ResultStore::new(rounds.clone(), directory.clone()));
        let summary = SummaryAggregator::new(
            directory.clone(),
            directory.clone(),
            rounds.clone(),
            results.clone(),
        );
        let publications = PublicationLog::new(config.default_publication_mode);

        Self {
            config,
            structure: RwLock::new(()),
            directory,
            rounds,
            results,
            summary,
            publications,
        }
    }

    /// Create a service with testing configuration
    pub fn for_testing() -> Self {
        Self::new(EngineConfig::for_testing())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Catalog, election, position and candidate CRUD
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    fn shared(&self) -> Result<RwLockReadGuard<'_, ()>> {
        self.structure.read().map_err(lock_error!("structure"))
    }

    fn exclusive(&self) -> Result<RwLockWriteGuard<'_, ()>> {
        self.structure.write().map_err(lock_error!("structure"))
    }

    fn ensure_complete(&self, round_id: RoundId) -> Result<()> {
        if self.config.require_complete_results && !self.results.is_complete(round_id)? {
            return Err(Error::validation(
                "results",
                format!("round {round_id} is missing results for active candidates"),
            ));
        }
        Ok(())
    }

    fn election_of_position(&self, position_id: PositionId) -> Result<(Position, Election)> {
        let position = self.directory.position(position_id)?;
        let election = self.directory.election(position.election_id)?;
        Ok((position, election))
    }

    // ---- rounds ----

    /// Open a round for a position
    ///
    /// `number` defaults to the next number after the position's last round.
    /// Fails with a conflict while another round of the position is open or
    /// when the election is already finalized.
    pub fn create_round(
        &self,
        position_id: PositionId,
        number: Option<u32>,
        observations: Option<String>,
    ) -> Result<Round> {
        let _shared = self.shared()?;
        let (position, election) = self.election_of_position(position_id)?;
        if election.status == ElectionStatus::Finalized {
            return Err(conflict_error!("election {} is already finalized", election.id));
        }

        let round = self.rounds.create_round(position_id, number, observations)?;

        if election.status == ElectionStatus::Draft {
            self.directory
                .set_election_status(election.id, ElectionStatus::InProgress)?;
        }
        if position.status == PositionStatus::Pending {
            self.directory
                .set_position_status(position_id, PositionStatus::InProgress)?;
        }
        Ok(round)
    }

    pub fn list_rounds(&self, position_id: PositionId) -> Result<Vec<Round>> {
        self.rounds.list_rounds(position_id)
    }

    pub fn active_round(&self, position_id: PositionId) -> Result<Option<Round>> {
        self.rounds.active_round(position_id)
    }

    /// Mark a round finalized without settling its position
    pub fn finalize_round(&self, round_id: RoundId) -> Result<Round> {
        let _shared = self.shared()?;
        self.results.serialized(round_id, || {
            self.ensure_complete(round_id)?;
            self.rounds.finalize(round_id)
        })
    }

    pub fn update_round(&self, round_id: RoundId, observations: Option<String>) -> Result<Round> {
        self.rounds.update_observations(round_id, observations)
    }

    /// Finalize a round and settle its position when the round has a winner
    ///
    /// With `require_complete_results` set, every active candidate must have
    /// a result row first.
    pub fn close_round(&self, round_id: RoundId) -> Result<RoundOutcome> {
        let _shared = self.shared()?;
        let (round, outcome) = self.results.serialized(round_id, || {
            self.ensure_complete(round_id)?;
            let rows = self.results.results_for_round(round_id)?;
            let round = self.rounds.finalize(round_id)?;
            Ok((round, resolver::outcome(&rows)))
        })?;

        if outcome.is_authoritative() {
            self.directory
                .set_position_status(round.position_id, PositionStatus::Completed)?;
            tracing::info!(
                "🏆 Position settled: position={}, round={}, winner={:?}",
                round.position_id,
                round.number,
                outcome.winner()
            );
        }
        Ok(outcome)
    }

    /// Close a tied round and open the next one for the same position
    ///
    /// The new round expects the position's full active candidate set; no
    /// candidate is eliminated automatically.
    pub fn start_runoff(&self, round_id: RoundId) -> Result<Runoff> {
        let _shared = self.shared()?;
        let (previous, round) = self.results.serialized(round_id, || {
            let current = self.rounds.round(round_id)?;
            let outcome = resolver::outcome(&self.results.results_for_round(round_id)?);
            if !outcome.is_tie() {
                return Err(conflict_error!(
                    "round {} of position {} is not tied ({:?})",
                    current.number,
                    current.position_id,
                    outcome.state()
                ));
            }
            let superseded = self
                .rounds
                .list_rounds(current.position_id)?
                .iter()
                .any(|r| r.number > current.number);
            if superseded {
                return Err(conflict_error!(
                    "round {} of position {} was already followed by another round",
                    current.number,
                    current.position_id
                ));
            }
            self.rounds.finalize_and_open_next(round_id)
        })?;

        let candidates = self.directory.active_candidates(round.position_id)?;
        tracing::info!(
            "🔁 Runoff opened: position={}, round={} -> {}, candidates={}",
            round.position_id,
            previous.number,
            round.number,
            candidates.len()
        );
        Ok(Runoff {
            previous,
            round,
            candidates,
        })
    }

    /// Delete a round that holds no results
    pub fn delete_round(&self, round_id: RoundId) -> Result<Round> {
        let _exclusive = self.exclusive()?;
        self.rounds.round(round_id)?;
        if self.results.has_results_for_round(round_id)? {
            return Err(Error::dependency_exists("Round", round_id, "results"));
        }
        let round = self.rounds.remove(round_id)?;
        self.results.release_round(round_id)?;
        tracing::info!("🗑️ Round deleted: position={}, round={}", round.position_id, round.number);
        Ok(round)
    }

    // ---- results ----

    /// Upsert a batch of vote counts for a round, all or nothing
    pub fn record_results(
        &self,
        round_id: RoundId,
        entries: &[ResultEntry],
    ) -> Result<Vec<RoundResult>> {
        let _shared = self.shared()?;
        self.results.record_results(round_id, entries)
    }

    /// Results of a round, ranked
    pub fn list_results(&self, round_id: RoundId) -> Result<Vec<CandidateResult>> {
        self.results.list_results(round_id)
    }

    pub fn update_result(&self, result_id: ResultId, votes: i64) -> Result<RoundResult> {
        let _shared = self.shared()?;
        self.results.update_result(result_id, votes)
    }

    pub fn delete_result(&self, result_id: ResultId) -> Result<RoundResult> {
        let _shared = self.shared()?;
        self.results.delete_result(result_id)
    }

    // ---- resolution ----

    pub fn outcome(&self, round_id: RoundId) -> Result<RoundOutcome> {
        self.rounds.round(round_id)?;
        Ok(resolver::outcome(&self.results.results_for_round(round_id)?))
    }

    pub fn is_tie(&self, round_id: RoundId) -> Result<bool> {
        Ok(self.outcome(round_id)?.is_tie())
    }

    /// The winning candidate of a round with a clear winner
    pub fn winner(&self, round_id: RoundId) -> Result<Option<Candidate>> {
        self.outcome(round_id)?
            .winner()
            .map(|id| self.directory.candidate(id))
            .transpose()
    }

    pub fn detailed_results(&self, round_id: RoundId) -> Result<DetailedResults> {
        let round = self.rounds.round(round_id)?;
        let rows = self.results.results_for_round(round_id)?;
        let candidates = self.directory.candidates_of(round.position_id)?;
        Ok(DetailedResults::build(round, &rows, &candidates))
    }

    // ---- election-wide ----

    pub fn final_summary(&self, election_id: ElectionId) -> Result<Vec<SummaryEntry>> {
        self.summary.final_summary(election_id)
    }

    /// Compute the final summary and move the election to `Finalized`
    pub fn finalize_election(&self, election_id: ElectionId) -> Result<FinalResults> {
        let _exclusive = self.exclusive()?;
        let election = self.directory.election(election_id)?;
        match election.status {
            ElectionStatus::InProgress => {}
            ElectionStatus::Draft => {
                return Err(conflict_error!("election {} has not started", election_id));
            }
            ElectionStatus::Finalized => {
                return Err(conflict_error!("election {} is already finalized", election_id));
            }
        }

        let summary = self.summary.final_summary(election_id)?;
        let total_votes = summary::election_totals(&summary);
        let election = self
            .directory
            .set_election_status(election_id, ElectionStatus::Finalized)?;

        tracing::info!(
            "✅ Election finalized: id={}, settled_positions={}, winner_votes={}",
            election_id,
            summary.len(),
            total_votes
        );
        Ok(FinalResults {
            election,
            summary,
            total_votes,
        })
    }

    /// Latest round of every position, for live display
    pub fn public_results(&self, election_id: ElectionId) -> Result<PublicBoard> {
        let election = self.directory.election(election_id)?;
        let mut positions = Vec::new();

        for position in self.directory.positions_in_order(election_id)? {
            let title = self.directory.position_title(position.id)?;
            let all = self.directory.candidates_of(position.id)?;
            let latest = match self.rounds.list_rounds(position.id)?.pop() {
                Some(round) => {
                    let rows = self.results.results_for_round(round.id)?;
                    Some(DetailedResults::build(round, &rows, &all))
                }
                None => None,
            };
            positions.push(BoardPosition {
                position,
                title,
                candidates: all.into_iter().filter(|c| c.active).collect(),
                latest,
            });
        }

        Ok(PublicBoard {
            election,
            positions,
        })
    }

    /// Every round of every position with per-round percentages
    pub fn election_report(&self, election_id: ElectionId) -> Result<ElectionReport> {
        let election = self.directory.election(election_id)?;
        let mut report = ElectionReport::new(&election);

        for position in self.directory.positions_in_order(election_id)? {
            let title = self.directory.position_title(position.id)?;
            let candidates = self.directory.candidates_of(position.id)?;
            for round in self.rounds.list_rounds(position.id)? {
                let rows = self.results.results_for_round(round.id)?;
                let details = DetailedResults::build(round.clone(), &rows, &candidates);
                report.push_round(&position, &title, &round, &details);
            }
        }

        tracing::info!(
            "📄 Report generated: election={}, rows={}",
            election_id,
            report.rows.len()
        );
        Ok(report)
    }

    // ---- publications ----

    /// Record that the current summary was exposed
    pub fn publish(&self, election_id: ElectionId, new: NewPublication) -> Result<Publication> {
        let _shared = self.shared()?;
        let summary = self.summary.final_summary(election_id)?;
        self.publications.record(election_id, new, &summary)
    }

    pub fn publications(&self) -> &PublicationLog {
        &self.publications
    }

    /// Whether a publication still reflects the election's current summary
    pub fn publication_is_current(&self, publication_id: Uuid) -> Result<bool> {
        let publication = self.publications.get(publication_id)?;
        let summary = self.summary.final_summary(publication.election_id)?;
        PublicationLog::matches_summary(&publication, &summary)
    }

    // ---- guarded deletes ----

    pub fn delete_election(&self, election_id: ElectionId) -> Result<Election> {
        let _exclusive = self.exclusive()?;
        self.directory.election(election_id)?;
        if self.publications.has_publications(election_id)? {
            return Err(Error::dependency_exists("Election", election_id, "publications"));
        }
        self.directory.delete_election(election_id)
    }

    pub fn delete_position(&self, position_id: PositionId) -> Result<Position> {
        let _exclusive = self.exclusive()?;
        self.directory.position(position_id)?;
        if self.rounds.has_rounds(position_id)? {
            return Err(Error::dependency_exists("Position", position_id, "rounds"));
        }
        self.directory.delete_position(position_id)
    }

    pub fn delete_candidate(&self, candidate_id: CandidateId) -> Result<Candidate> {
        let _exclusive = self.exclusive()?;
        self.directory.candidate(candidate_id)?;
        if self.results.has_results_for_candidate(candidate_id)? {
            return Err(Error::dependency_exists("Candidate", candidate_id, "results"));
        }
        self.directory.delete_candidate(candidate_id)
    }

    pub fn delete_catalog_entry(&self, catalog_id: CatalogId) -> Result<CatalogEntry> {
        let _exclusive = self.exclusive()?;
        self.directory.delete_catalog_entry(catalog_id)
    }
}

impl Default for ElectionService {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
