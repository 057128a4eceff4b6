//! Catalog, election, position and candidate directory
//!
//! The round and result engine only needs read-only lookups from this
//! module, expressed by the [`CandidateDirectory`] and [`ElectionDirectory`]
//! traits. [`Directory`] is the in-memory implementation that also carries
//! the plain CRUD of the surrounding application.
//!
//! Tables are guarded by one `RwLock` each. When an operation needs more
//! than one table the locks are always taken in the order
//! elections, catalog, positions, candidates.

use crate::config::EngineConfig;
use crate::types::{
    CandidateId, Candidate, CatalogEntry, CatalogId, Election, ElectionId, ElectionStatus,
    IdSequence, Position, PositionId, PositionStatus,
};
use crate::{Error, Result, conflict_error, lock_error, validation_error};
use chrono::{DateTime, Datelike, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Lookups on positions and their candidates
pub trait CandidateDirectory: Send + Sync {
    /// Fetch a position, failing with a reference error when absent
    fn position(&self, id: PositionId) -> Result<Position>;

    /// Fetch a candidate, failing with a reference error when absent
    fn candidate(&self, id: CandidateId) -> Result<Candidate>;

    /// All candidates of a position ordered by id
    fn candidates_of(&self, position_id: PositionId) -> Result<Vec<Candidate>>;

    /// Active candidates of a position ordered by id
    fn active_candidates(&self, position_id: PositionId) -> Result<Vec<Candidate>> {
        Ok(self
            .candidates_of(position_id)?
            .into_iter()
            .filter(|c| c.active)
            .collect())
    }
}

/// Lookups on elections and the positions they own
pub trait ElectionDirectory: Send + Sync {
    fn election(&self, id: ElectionId) -> Result<Election>;

    /// Positions of an election in display order
    fn positions_in_order(&self, election_id: ElectionId) -> Result<Vec<Position>>;

    /// Display title of a position, taken from its catalog entry
    fn position_title(&self, position_id: PositionId) -> Result<String>;
}

/// Input for [`Directory::create_election`]
#[derive(Debug, Clone, Default)]
pub struct NewElection {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to now
    pub date: Option<DateTime<Utc>>,
}

/// Optional filters for [`Directory::list_elections`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ElectionFilter {
    pub status: Option<ElectionStatus>,
    pub year: Option<i32>,
}

/// In-memory directory
pub struct Directory {
    elections: RwLock<HashMap<ElectionId, Election>>,
    catalog: RwLock<HashMap<CatalogId, CatalogEntry>>,
    positions: RwLock<HashMap<PositionId, Position>>,
    candidates: RwLock<HashMap<CandidateId, Candidate>>,
    election_ids: IdSequence,
    catalog_ids: IdSequence,
    position_ids: IdSequence,
    candidate_ids: IdSequence,
    max_candidates_per_position: usize,
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(validation_error!(field, "is required"));
    }
    Ok(trimmed.to_string())
}

impl Directory {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            elections: RwLock::new(HashMap::new()),
            catalog: RwLock::new(HashMap::new()),
            positions: RwLock::new(HashMap::new()),
            candidates: RwLock::new(HashMap::new()),
            election_ids: IdSequence::new(),
            catalog_ids: IdSequence::new(),
            position_ids: IdSequence::new(),
            candidate_ids: IdSequence::new(),
            max_candidates_per_position: config.max_candidates_per_position,
        }
    }

    // ---- catalog ----

    /// Add a reusable position title; names are unique
    pub fn create_catalog_entry(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<CatalogEntry> {
        let name = required("name", name)?;
        let mut catalog = self.catalog.write().map_err(lock_error!("catalog"))?;

        if catalog.values().any(|entry| entry.name == name) {
            return Err(conflict_error!("catalog entry '{}' already exists", name));
        }

        let entry = CatalogEntry {
            id: CatalogId(self.catalog_ids.next()),
            name,
            description,
        };
        catalog.insert(entry.id, entry.clone());
        Ok(entry)
    }

    pub fn catalog_entry(&self, id: CatalogId) -> Result<CatalogEntry> {
        self.catalog
            .read()
            .map_err(lock_error!("catalog"))?
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::reference("CatalogEntry", id))
    }

    /// Catalog entries sorted by name
    pub fn list_catalog(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries: Vec<_> = self
            .catalog
            .read()
            .map_err(lock_error!("catalog"))?
            .values()
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    pub fn update_catalog_entry(
        &self,
        id: CatalogId,
        name: Option<&str>,
        description: Option<String>,
    ) -> Result<CatalogEntry> {
        let name = name.map(|n| required("name", n)).transpose()?;
        let mut catalog = self.catalog.write().map_err(lock_error!("catalog"))?;

        if let Some(name) = &name {
            if catalog.values().any(|e| e.id != id && &e.name == name) {
                return Err(conflict_error!("catalog entry '{}' already exists", name));
            }
        }

        let entry = catalog
            .get_mut(&id)
            .ok_or_else(|| Error::reference("CatalogEntry", id))?;
        if let Some(name) = name {
            entry.name = name;
        }
        if description.is_some() {
            entry.description = description;
        }
        Ok(entry.clone())
    }

    /// Refused while any position still references the entry
    pub fn delete_catalog_entry(&self, id: CatalogId) -> Result<CatalogEntry> {
        let mut catalog = self.catalog.write().map_err(lock_error!("catalog"))?;
        let positions = self.positions.read().map_err(lock_error!("positions"))?;

        if !catalog.contains_key(&id) {
            return Err(Error::reference("CatalogEntry", id));
        }
        if positions.values().any(|p| p.catalog_id == id) {
            return Err(Error::dependency_exists("CatalogEntry", id, "positions"));
        }

        catalog
            .remove(&id)
            .ok_or_else(|| Error::reference("CatalogEntry", id))
    }

    // ---- elections ----

    /// Create an election in `Draft`
    pub fn create_election(&self, new: NewElection) -> Result<Election> {
        let name = required("name", &new.name)?;
        let now = Utc::now();
        let election = Election {
            id: ElectionId(self.election_ids.next()),
            name,
            description: new.description,
            date: new.date.unwrap_or(now),
            status: ElectionStatus::Draft,
            created_at: now,
            updated_at: now,
        };

        self.elections
            .write()
            .map_err(lock_error!("elections"))?
            .insert(election.id, election.clone());

        tracing::info!("📋 Election created: id={}, name={}", election.id, election.name);
        Ok(election)
    }

    /// Elections matching `filter`, newest date first
    pub fn list_elections(&self, filter: ElectionFilter) -> Result<Vec<Election>> {
        let mut elections: Vec<_> = self
            .elections
            .read()
            .map_err(lock_error!("elections"))?
            .values()
            .filter(|e| filter.status.is_none_or(|s| e.status == s))
            .filter(|e| filter.year.is_none_or(|y| e.date.year() == y))
            .cloned()
            .collect();
        elections.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(elections)
    }

    pub fn update_election(
        &self,
        id: ElectionId,
        name: Option<&str>,
        description: Option<String>,
    ) -> Result<Election> {
        let name = name.map(|n| required("name", n)).transpose()?;
        let mut elections = self.elections.write().map_err(lock_error!("elections"))?;
        let election = elections
            .get_mut(&id)
            .ok_or_else(|| Error::reference("Election", id))?;

        if let Some(name) = name {
            election.name = name;
        }
        if description.is_some() {
            election.description = description;
        }
        election.updated_at = Utc::now();
        Ok(election.clone())
    }

    /// Move an election to `status`
    ///
    /// A finalized election is frozen: leaving `Finalized` is a conflict.
    /// Setting the current status again is a no-op.
    pub fn set_election_status(&self, id: ElectionId, status: ElectionStatus) -> Result<Election> {
        let mut elections = self.elections.write().map_err(lock_error!("elections"))?;
        let election = elections
            .get_mut(&id)
            .ok_or_else(|| Error::reference("Election", id))?;

        if election.status == status {
            return Ok(election.clone());
        }
        if election.status == ElectionStatus::Finalized {
            return Err(conflict_error!("election {} is already finalized", id));
        }

        tracing::info!(
            "🔁 Election status: id={}, {:?} -> {:?}",
            id,
            election.status,
            status
        );
        election.status = status;
        election.updated_at = Utc::now();
        Ok(election.clone())
    }

    /// Refused while the election still owns positions
    pub(crate) fn delete_election(&self, id: ElectionId) -> Result<Election> {
        let mut elections = self.elections.write().map_err(lock_error!("elections"))?;
        let positions = self.positions.read().map_err(lock_error!("positions"))?;

        if !elections.contains_key(&id) {
            return Err(Error::reference("Election", id));
        }
        if positions.values().any(|p| p.election_id == id) {
            return Err(Error::dependency_exists("Election", id, "positions"));
        }

        elections
            .remove(&id)
            .ok_or_else(|| Error::reference("Election", id))
    }

    // ---- positions ----

    /// Add a position to an election
    ///
    /// `order` defaults to 1 and must be unique within the election.
    pub fn add_position(
        &self,
        election_id: ElectionId,
        catalog_id: CatalogId,
        order: Option<u32>,
    ) -> Result<Position> {
        let order = order.unwrap_or(1);
        if order == 0 {
            return Err(validation_error!("order", "must be at least 1"));
        }

        let elections = self.elections.read().map_err(lock_error!("elections"))?;
        let catalog = self.catalog.read().map_err(lock_error!("catalog"))?;
        let mut positions = self.positions.write().map_err(lock_error!("positions"))?;

        let election = elections
            .get(&election_id)
            .ok_or_else(|| Error::reference("Election", election_id))?;
        if election.status == ElectionStatus::Finalized {
            return Err(conflict_error!("election {} is already finalized", election_id));
        }
        if !catalog.contains_key(&catalog_id) {
            return Err(Error::reference("CatalogEntry", catalog_id));
        }
        if positions
            .values()
            .any(|p| p.election_id == election_id && p.order == order)
        {
            return Err(conflict_error!(
                "display order {} is already used in election {}",
                order,
                election_id
            ));
        }

        let position = Position {
            id: PositionId(self.position_ids.next()),
            election_id,
            catalog_id,
            order,
            status: PositionStatus::Pending,
        };
        positions.insert(position.id, position.clone());
        Ok(position)
    }

    pub fn update_position(
        &self,
        id: PositionId,
        status: Option<PositionStatus>,
        order: Option<u32>,
    ) -> Result<Position> {
        if order == Some(0) {
            return Err(validation_error!("order", "must be at least 1"));
        }
        let mut positions = self.positions.write().map_err(lock_error!("positions"))?;
        let election_id = positions
            .get(&id)
            .map(|p| p.election_id)
            .ok_or_else(|| Error::reference("Position", id))?;

        if let Some(order) = order {
            if positions
                .values()
                .any(|p| p.id != id && p.election_id == election_id && p.order == order)
            {
                return Err(conflict_error!(
                    "display order {} is already used in election {}",
                    order,
                    election_id
                ));
            }
        }

        let position = positions
            .get_mut(&id)
            .ok_or_else(|| Error::reference("Position", id))?;
        if let Some(status) = status {
            position.status = status;
        }
        if let Some(order) = order {
            position.order = order;
        }
        Ok(position.clone())
    }

    pub(crate) fn set_position_status(&self, id: PositionId, status: PositionStatus) -> Result<()> {
        let mut positions = self.positions.write().map_err(lock_error!("positions"))?;
        let position = positions
            .get_mut(&id)
            .ok_or_else(|| Error::reference("Position", id))?;
        position.status = status;
        Ok(())
    }

    /// Refused while the position still owns candidates
    pub(crate) fn delete_position(&self, id: PositionId) -> Result<Position> {
        let mut positions = self.positions.write().map_err(lock_error!("positions"))?;
        let candidates = self.candidates.read().map_err(lock_error!("candidates"))?;

        if !positions.contains_key(&id) {
            return Err(Error::reference("Position", id));
        }
        if candidates.values().any(|c| c.position_id == id) {
            return Err(Error::dependency_exists("Position", id, "candidates"));
        }

        positions
            .remove(&id)
            .ok_or_else(|| Error::reference("Position", id))
    }

    // ---- candidates ----

    /// Register a candidate; names are unique within the position
    pub fn register_candidate(
        &self,
        position_id: PositionId,
        full_name: &str,
        active: Option<bool>,
    ) -> Result<Candidate> {
        let full_name = required("full_name", full_name)?;

        let positions = self.positions.read().map_err(lock_error!("positions"))?;
        let mut candidates = self.candidates.write().map_err(lock_error!("candidates"))?;

        if !positions.contains_key(&position_id) {
            return Err(Error::reference("Position", position_id));
        }

        let siblings: Vec<_> = candidates
            .values()
            .filter(|c| c.position_id == position_id)
            .collect();
        if siblings.iter().any(|c| c.full_name == full_name) {
            return Err(conflict_error!(
                "candidate '{}' already registered for position {}",
                full_name,
                position_id
            ));
        }
        if siblings.len() >= self.max_candidates_per_position {
            return Err(validation_error!(
                "position_id",
                "position {} already has the maximum of {} candidates",
                position_id,
                self.max_candidates_per_position
            ));
        }

        let candidate = Candidate {
            id: CandidateId(self.candidate_ids.next()),
            position_id,
            full_name,
            active: active.unwrap_or(true),
            created_at: Utc::now(),
        };
        candidates.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    /// Rename and/or (de)activate a candidate
    pub fn update_candidate(
        &self,
        id: CandidateId,
        full_name: Option<&str>,
        active: Option<bool>,
    ) -> Result<Candidate> {
        let full_name = full_name.map(|n| required("full_name", n)).transpose()?;
        let mut candidates = self.candidates.write().map_err(lock_error!("candidates"))?;
        let position_id = candidates
            .get(&id)
            .map(|c| c.position_id)
            .ok_or_else(|| Error::reference("Candidate", id))?;

        if let Some(name) = &full_name {
            if candidates
                .values()
                .any(|c| c.id != id && c.position_id == position_id && &c.full_name == name)
            {
                return Err(conflict_error!(
                    "candidate '{}' already registered for position {}",
                    name,
                    position_id
                ));
            }
        }

        let candidate = candidates
            .get_mut(&id)
            .ok_or_else(|| Error::reference("Candidate", id))?;
        if let Some(name) = full_name {
            candidate.full_name = name;
        }
        if let Some(active) = active {
            candidate.active = active;
        }
        Ok(candidate.clone())
    }

    pub(crate) fn delete_candidate(&self, id: CandidateId) -> Result<Candidate> {
        self.candidates
            .write()
            .map_err(lock_error!("candidates"))?
            .remove(&id)
            .ok_or_else(|| Error::reference("Candidate", id))
    }

    /// Candidates of a position, optionally filtered on the active flag
    pub fn list_candidates(
        &self,
        position_id: PositionId,
        active: Option<bool>,
    ) -> Result<Vec<Candidate>> {
        Ok(self
            .candidates_of(position_id)?
            .into_iter()
            .filter(|c| active.is_none_or(|a| c.active == a))
            .collect())
    }
}

impl CandidateDirectory for Directory {
    fn position(&self, id: PositionId) -> Result<Position> {
        self.positions
            .read()
            .map_err(lock_error!("positions"))?
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::reference("Position", id))
    }

    fn candidate(&self, id: CandidateId) -> Result<Candidate> {
        self.candidates
            .read()
            .map_err(lock_error!("candidates"))?
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::reference("Candidate", id))
    }

    fn candidates_of(&self, position_id: PositionId) -> Result<Vec<Candidate>> {
        let mut list: Vec<_> = self
            .candidates
            .read()
            .map_err(lock_error!("candidates"))?
            .values()
            .filter(|c| c.position_id == position_id)
            .cloned()
            .collect();
        list.sort_by_key(|c| c.id);
        Ok(list)
    }
}

impl ElectionDirectory for Directory {
    fn election(&self, id: ElectionId) -> Result<Election> {
        self.elections
            .read()
            .map_err(lock_error!("elections"))?
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::reference("Election", id))
    }

    fn positions_in_order(&self, election_id: ElectionId) -> Result<Vec<Position>> {
        let mut list: Vec<_> = self
            .positions
            .read()
            .map_err(lock_error!("positions"))?
            .values()
            .filter(|p| p.election_id == election_id)
            .cloned()
            .collect();
        list.sort_by_key(|p| (p.order, p.id));
        Ok(list)
    }

    fn position_title(&self, position_id: PositionId) -> Result<String> {
        let catalog_id = CandidateDirectory::position(self, position_id)?.catalog_id;
        Ok(self.catalog_entry(catalog_id)?.name)
    }
}
