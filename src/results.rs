//! Result store
//!
//! One row per (round, candidate). Recording a batch is all-or-nothing:
//! every entry is validated before the table is touched, and the rows are
//! applied under a single write lock. Batches for the same round are
//! additionally serialized through a per-round guard, so the open/finalized
//! check and the write cannot interleave with another writer of that round.

use crate::directory::CandidateDirectory;
use crate::rounds::RoundStore;
use crate::tally;
use crate::types::{
    CandidateId, CandidateResult, IdSequence, ResultEntry, ResultId, RoundId, RoundResult,
};
use crate::{Error, Result, conflict_error, lock_error, validation_error};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

#[derive(Default)]
struct ResultTable {
    rows: HashMap<ResultId, RoundResult>,
    by_pair: HashMap<(RoundId, CandidateId), ResultId>,
}

impl ResultTable {
    fn for_round(&self, round_id: RoundId) -> Vec<RoundResult> {
        let mut rows: Vec<_> = self
            .rows
            .values()
            .filter(|r| r.round_id == round_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        rows
    }

    /// Total of a round once `replacing` overwrites the counts it names
    ///
    /// Fails when the total would not fit in a `u64`, so every stored round
    /// can be tallied.
    fn round_total_with(
        &self,
        round_id: RoundId,
        replacing: &HashMap<CandidateId, u64>,
    ) -> Result<u64> {
        let kept = self
            .rows
            .values()
            .filter(|r| r.round_id == round_id && !replacing.contains_key(&r.candidate_id))
            .map(|r| r.votes);

        kept.chain(replacing.values().copied())
            .try_fold(0_u64, |total, votes| total.checked_add(votes))
            .ok_or_else(|| {
                validation_error!("votes", "total votes of round {} would overflow", round_id)
            })
    }
}

/// In-memory result table
pub struct ResultStore {
    table: RwLock<ResultTable>,
    round_guards: Mutex<HashMap<RoundId, Arc<Mutex<()>>>>,
    ids: IdSequence,
    rounds: Arc<RoundStore>,
    directory: Arc<dyn CandidateDirectory>,
}

fn checked_votes(votes: i64) -> Result<u64> {
    u64::try_from(votes)
        .map_err(|_| validation_error!("votes", "must be a non-negative integer, got {}", votes))
}

impl ResultStore {
    pub fn new(rounds: Arc<RoundStore>, directory: Arc<dyn CandidateDirectory>) -> Self {
        Self {
            table: RwLock::new(ResultTable::default()),
            round_guards: Mutex::new(HashMap::new()),
            ids: IdSequence::new(),
            rounds,
            directory,
        }
    }

    fn round_guard(&self, round_id: RoundId) -> Result<Arc<Mutex<()>>> {
        let mut guards = self.round_guards.lock().map_err(lock_error!("round guards"))?;
        Ok(Arc::clone(guards.entry(round_id).or_default()))
    }

    /// Run `f` as the only writer of `round_id`
    pub fn serialized<T>(&self, round_id: RoundId, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let guard = self.round_guard(round_id)?;
        let _exclusive = guard.lock().map_err(lock_error!("round guard"))?;
        f()
    }

    /// Upsert the vote counts of a batch of candidates for one round
    ///
    /// Re-recording a candidate overwrites its count. Fails without writing
    /// anything when any entry is invalid: negative votes or a duplicated
    /// candidate give a validation error, an unknown candidate or one from
    /// another position a reference error, a finalized round a conflict.
    pub fn record_results(
        &self,
        round_id: RoundId,
        entries: &[ResultEntry],
    ) -> Result<Vec<RoundResult>> {
        self.serialized(round_id, || {
            let round = self.rounds.round(round_id)?;
            if round.finalized {
                return Err(conflict_error!(
                    "round {} of position {} is finalized",
                    round.number,
                    round.position_id
                ));
            }
            if entries.is_empty() {
                return Err(validation_error!("entries", "at least one result is required"));
            }

            let mut seen = HashSet::new();
            let mut checked = Vec::with_capacity(entries.len());
            for entry in entries {
                let votes = checked_votes(entry.votes)?;
                if !seen.insert(entry.candidate_id) {
                    return Err(validation_error!(
                        "entries",
                        "candidate {} appears more than once",
                        entry.candidate_id
                    ));
                }
                let candidate = self.directory.candidate(entry.candidate_id)?;
                if candidate.position_id != round.position_id {
                    return Err(Error::reference(
                        format!("Candidate of position {}", round.position_id),
                        entry.candidate_id,
                    ));
                }
                checked.push((entry.candidate_id, votes));
            }

            let now = Utc::now();
            let mut table = self.table.write().map_err(lock_error!("results"))?;
            let replacing: HashMap<CandidateId, u64> = checked.iter().copied().collect();
            table.round_total_with(round_id, &replacing)?;

            let mut written = Vec::with_capacity(checked.len());
            for (candidate_id, votes) in checked {
                let row = match table.by_pair.get(&(round_id, candidate_id)).copied() {
                    Some(existing) => {
                        let row = table
                            .rows
                            .get_mut(&existing)
                            .ok_or_else(|| Error::internal("result index out of sync"))?;
                        row.votes = votes;
                        row.updated_at = now;
                        row.clone()
                    }
                    None => {
                        let row = RoundResult {
                            id: ResultId(self.ids.next()),
                            round_id,
                            candidate_id,
                            votes,
                            updated_at: now,
                        };
                        table.by_pair.insert((round_id, candidate_id), row.id);
                        table.rows.insert(row.id, row.clone());
                        row
                    }
                };
                written.push(row);
            }

            tracing::info!(
                "📝 Results recorded: round={}, position={}, rows={}",
                round.number,
                round.position_id,
                written.len()
            );
            Ok(written)
        })
    }

    /// Raw rows of a round ordered by result id
    pub fn results_for_round(&self, round_id: RoundId) -> Result<Vec<RoundResult>> {
        Ok(self
            .table
            .read()
            .map_err(lock_error!("results"))?
            .for_round(round_id))
    }

    /// Rows of a round joined with candidate names, ranked by votes
    /// descending then candidate id ascending
    pub fn list_results(&self, round_id: RoundId) -> Result<Vec<CandidateResult>> {
        self.rounds.round(round_id)?;
        let rows = self.results_for_round(round_id)?;

        let mut joined = Vec::with_capacity(rows.len());
        for row in tally::rank(&rows) {
            let candidate = self.directory.candidate(row.candidate_id)?;
            joined.push(CandidateResult {
                result_id: row.id,
                candidate_id: row.candidate_id,
                candidate_name: candidate.full_name,
                votes: row.votes,
            });
        }
        Ok(joined)
    }

    pub fn result(&self, id: ResultId) -> Result<RoundResult> {
        self.table
            .read()
            .map_err(lock_error!("results"))?
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::reference("Result", id))
    }

    /// Correct a single row; allowed on finalized rounds
    pub fn update_result(&self, id: ResultId, votes: i64) -> Result<RoundResult> {
        let votes = checked_votes(votes)?;
        let round_id = self.result(id)?.round_id;

        self.serialized(round_id, || {
            let mut table = self.table.write().map_err(lock_error!("results"))?;
            let candidate_id = table
                .rows
                .get(&id)
                .map(|r| r.candidate_id)
                .ok_or_else(|| Error::reference("Result", id))?;
            table.round_total_with(round_id, &HashMap::from([(candidate_id, votes)]))?;

            let row = table
                .rows
                .get_mut(&id)
                .ok_or_else(|| Error::reference("Result", id))?;
            row.votes = votes;
            row.updated_at = Utc::now();
            tracing::info!("✏️ Result corrected: id={}, votes={}", id, votes);
            Ok(row.clone())
        })
    }

    pub fn delete_result(&self, id: ResultId) -> Result<RoundResult> {
        let round_id = self.result(id)?.round_id;

        self.serialized(round_id, || {
            let mut table = self.table.write().map_err(lock_error!("results"))?;
            let row = table
                .rows
                .remove(&id)
                .ok_or_else(|| Error::reference("Result", id))?;
            table.by_pair.remove(&(row.round_id, row.candidate_id));
            tracing::info!("🗑️ Result deleted: id={}, round={}", id, row.round_id);
            Ok(row)
        })
    }

    pub fn has_results_for_round(&self, round_id: RoundId) -> Result<bool> {
        Ok(self
            .table
            .read()
            .map_err(lock_error!("results"))?
            .rows
            .values()
            .any(|r| r.round_id == round_id))
    }

    pub fn has_results_for_candidate(&self, candidate_id: CandidateId) -> Result<bool> {
        Ok(self
            .table
            .read()
            .map_err(lock_error!("results"))?
            .rows
            .values()
            .any(|r| r.candidate_id == candidate_id))
    }

    /// Whether every active candidate of the round's position has a row
    pub fn is_complete(&self, round_id: RoundId) -> Result<bool> {
        let round = self.rounds.round(round_id)?;
        let active = self.directory.active_candidates(round.position_id)?;
        let recorded: HashSet<_> = self
            .results_for_round(round_id)?
            .into_iter()
            .map(|r| r.candidate_id)
            .collect();
        Ok(active.iter().all(|c| recorded.contains(&c.id)))
    }

    /// Forget the guard of a deleted round
    pub(crate) fn release_round(&self, round_id: RoundId) -> Result<()> {
        self.round_guards
            .lock()
            .map_err(lock_error!("round guards"))?
            .remove(&round_id);
        Ok(())
    }
}
