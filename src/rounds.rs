//! Round store
//!
//! Holds the voting rounds of every position. Two invariants are enforced
//! under the table's write lock, so the check and the insert are atomic:
//!
//! 1. Round numbers are unique within a position.
//! 2. At most one round per position is open (not finalized).

use crate::directory::CandidateDirectory;
use crate::types::{IdSequence, PositionId, Round, RoundId};
use crate::{Error, Result, conflict_error, lock_error, validation_error};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory round table
pub struct RoundStore {
    rounds: RwLock<HashMap<RoundId, Round>>,
    ids: IdSequence,
    directory: Arc<dyn CandidateDirectory>,
}

impl RoundStore {
    pub fn new(directory: Arc<dyn CandidateDirectory>) -> Self {
        Self {
            rounds: RwLock::new(HashMap::new()),
            ids: IdSequence::new(),
            directory,
        }
    }

    /// Open a new round for a position
    ///
    /// Without an explicit `number` the round gets the position's last round
    /// number plus one, or 1 for the first round. Fails with a conflict when
    /// the number is taken or another round of the position is still open.
    pub fn create_round(
        &self,
        position_id: PositionId,
        number: Option<u32>,
        observations: Option<String>,
    ) -> Result<Round> {
        if number == Some(0) {
            return Err(validation_error!("number", "round numbers start at 1"));
        }
        self.directory.position(position_id)?;

        let mut rounds = self.rounds.write().map_err(lock_error!("rounds"))?;
        let round = Self::insert_locked(
            &mut rounds,
            &self.ids,
            position_id,
            number,
            observations,
        )?;

        tracing::info!(
            "🗳️ Round opened: position={}, round={}, id={}",
            position_id,
            round.number,
            round.id
        );
        Ok(round)
    }

    fn insert_locked(
        rounds: &mut HashMap<RoundId, Round>,
        ids: &IdSequence,
        position_id: PositionId,
        number: Option<u32>,
        observations: Option<String>,
    ) -> Result<Round> {
        let siblings: Vec<&Round> = rounds
            .values()
            .filter(|r| r.position_id == position_id)
            .collect();

        if let Some(open) = siblings.iter().find(|r| !r.finalized) {
            return Err(conflict_error!(
                "position {} already has open round {}",
                position_id,
                open.number
            ));
        }

        let number = match number {
            Some(number) => number,
            None => {
                let last = siblings.iter().map(|r| r.number).max().unwrap_or(0);
                last.checked_add(1).ok_or_else(|| {
                    conflict_error!(
                        "position {} has no round number left after {}",
                        position_id,
                        last
                    )
                })?
            }
        };
        if siblings.iter().any(|r| r.number == number) {
            return Err(conflict_error!(
                "round {} already exists for position {}",
                number,
                position_id
            ));
        }

        let round = Round {
            id: RoundId(ids.next()),
            position_id,
            number,
            finalized: false,
            observations,
            created_at: Utc::now(),
        };
        rounds.insert(round.id, round.clone());
        Ok(round)
    }

    /// Finalize `round_id` and open the next round of its position in one step
    pub(crate) fn finalize_and_open_next(&self, round_id: RoundId) -> Result<(Round, Round)> {
        let mut rounds = self.rounds.write().map_err(lock_error!("rounds"))?;
        let (closed, was_finalized) = {
            let round = rounds
                .get_mut(&round_id)
                .ok_or_else(|| Error::reference("Round", round_id))?;
            let was_finalized = round.finalized;
            round.finalized = true;
            (round.clone(), was_finalized)
        };
        let observations = Some(format!("Runoff after round {}", closed.number));
        match Self::insert_locked(
            &mut rounds,
            &self.ids,
            closed.position_id,
            None,
            observations,
        ) {
            Ok(next) => Ok((closed, next)),
            Err(e) => {
                if let Some(round) = rounds.get_mut(&round_id) {
                    round.finalized = was_finalized;
                }
                Err(e)
            }
        }
    }

    pub fn round(&self, id: RoundId) -> Result<Round> {
        self.rounds
            .read()
            .map_err(lock_error!("rounds"))?
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::reference("Round", id))
    }

    /// Rounds of a position by ascending round number
    pub fn list_rounds(&self, position_id: PositionId) -> Result<Vec<Round>> {
        let mut list: Vec<_> = self
            .rounds
            .read()
            .map_err(lock_error!("rounds"))?
            .values()
            .filter(|r| r.position_id == position_id)
            .cloned()
            .collect();
        list.sort_by_key(|r| r.number);
        Ok(list)
    }

    /// The open round of a position, if any
    pub fn active_round(&self, position_id: PositionId) -> Result<Option<Round>> {
        Ok(self
            .rounds
            .read()
            .map_err(lock_error!("rounds"))?
            .values()
            .find(|r| r.position_id == position_id && !r.finalized)
            .cloned())
    }

    /// Mark a round finalized. There is no way back.
    pub fn finalize(&self, id: RoundId) -> Result<Round> {
        let mut rounds = self.rounds.write().map_err(lock_error!("rounds"))?;
        let round = rounds
            .get_mut(&id)
            .ok_or_else(|| Error::reference("Round", id))?;
        if !round.finalized {
            round.finalized = true;
            tracing::info!(
                "🔒 Round finalized: position={}, round={}",
                round.position_id,
                round.number
            );
        }
        Ok(round.clone())
    }

    pub fn update_observations(&self, id: RoundId, observations: Option<String>) -> Result<Round> {
        let mut rounds = self.rounds.write().map_err(lock_error!("rounds"))?;
        let round = rounds
            .get_mut(&id)
            .ok_or_else(|| Error::reference("Round", id))?;
        round.observations = observations;
        Ok(round.clone())
    }

    pub fn has_rounds(&self, position_id: PositionId) -> Result<bool> {
        Ok(self
            .rounds
            .read()
            .map_err(lock_error!("rounds"))?
            .values()
            .any(|r| r.position_id == position_id))
    }

    /// Drop a round row; dependents are checked by the caller
    pub(crate) fn remove(&self, id: RoundId) -> Result<Round> {
        self.rounds
            .write()
            .map_err(lock_error!("rounds"))?
            .remove(&id)
            .ok_or_else(|| Error::reference("Round", id))
    }
}
