//! Publication audit log
//!
//! Records each time an election's results were exposed (projector, PDF,
//! spreadsheet). A publication stores a blake3 digest of the summary it
//! exposed, so a later reader can tell whether results changed since.
//! Publications never feed back into tallying.

use crate::summary::SummaryEntry;
use crate::types::{ElectionId, Publication, PublicationMode};
use crate::{Error, Result, lock_error};
use chrono::Utc;
use std::sync::RwLock;
use uuid::Uuid;

/// Fields accepted when recording a publication
#[derive(Debug, Clone, Default)]
pub struct NewPublication {
    /// Falls back to the configured default mode
    pub mode: Option<PublicationMode>,
    pub published_by: Option<String>,
    pub note: Option<String>,
}

/// Hex blake3 digest of a serialized summary
pub fn summary_digest(summary: &[SummaryEntry]) -> Result<String> {
    let bytes = serde_json::to_vec(summary)?;
    Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
}

/// In-memory publication log
pub struct PublicationLog {
    records: RwLock<Vec<Publication>>,
    default_mode: PublicationMode,
}

impl PublicationLog {
    pub fn new(default_mode: PublicationMode) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            default_mode,
        }
    }

    pub fn record(
        &self,
        election_id: ElectionId,
        new: NewPublication,
        summary: &[SummaryEntry],
    ) -> Result<Publication> {
        let publication = Publication {
            id: Uuid::new_v4(),
            election_id,
            mode: new.mode.unwrap_or(self.default_mode),
            published_by: new.published_by,
            note: new.note,
            summary_digest: summary_digest(summary)?,
            published_at: Utc::now(),
        };

        self.records
            .write()
            .map_err(lock_error!("publications"))?
            .push(publication.clone());

        tracing::info!(
            "📣 Results published: election={}, mode={:?}, digest={}",
            election_id,
            publication.mode,
            &publication.summary_digest[..8]
        );
        Ok(publication)
    }

    pub fn get(&self, id: Uuid) -> Result<Publication> {
        self.records
            .read()
            .map_err(lock_error!("publications"))?
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| Error::reference("Publication", id))
    }

    /// Every publication, newest first
    pub fn list(&self) -> Result<Vec<Publication>> {
        let mut list = self
            .records
            .read()
            .map_err(lock_error!("publications"))?
            .clone();
        list.reverse();
        Ok(list)
    }

    /// Publications of one election, newest first
    pub fn list_for_election(&self, election_id: ElectionId) -> Result<Vec<Publication>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|p| p.election_id == election_id)
            .collect())
    }

    /// Edit the descriptive fields; the digest is immutable
    pub fn update(&self, id: Uuid, changes: NewPublication) -> Result<Publication> {
        let mut records = self.records.write().map_err(lock_error!("publications"))?;
        let publication = records
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::reference("Publication", id))?;

        if let Some(mode) = changes.mode {
            publication.mode = mode;
        }
        if changes.published_by.is_some() {
            publication.published_by = changes.published_by;
        }
        if changes.note.is_some() {
            publication.note = changes.note;
        }
        Ok(publication.clone())
    }

    pub fn delete(&self, id: Uuid) -> Result<Publication> {
        let mut records = self.records.write().map_err(lock_error!("publications"))?;
        let index = records
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::reference("Publication", id))?;
        Ok(records.remove(index))
    }

    pub fn has_publications(&self, election_id: ElectionId) -> Result<bool> {
        Ok(self
            .records
            .read()
            .map_err(lock_error!("publications"))?
            .iter()
            .any(|p| p.election_id == election_id))
    }

    /// Whether `summary` is still what `publication` exposed
    pub fn matches_summary(publication: &Publication, summary: &[SummaryEntry]) -> Result<bool> {
        Ok(publication.summary_digest == summary_digest(summary)?)
    }
}
