//! # Core Types for the Election Engine
//!
//! Entities follow a strict ownership tree:
//!
//! - [`Election`] owns [`Position`]s and [`Publication`]s
//! - [`Position`] owns [`Candidate`]s and [`Round`]s
//! - [`Round`] owns [`RoundResult`]s
//!
//! A [`Position`] also references one [`CatalogEntry`], which supplies its
//! title. Nothing outlives its owner, and owners with dependents cannot be
//! deleted.
//!
//! ## Identifiers
//!
//! Every entity kind has its own sequential id newtype. Ids are allocated in
//! creation order, starting at 1, so ordering by id is ordering by
//! registration. The tally engine relies on this for its deterministic
//! tie-break.
//!
//! ```rust
//! use runoff::types::CandidateId;
//!
//! assert!(CandidateId(3) < CandidateId(10));
//! assert_eq!(CandidateId(3).to_string(), "3");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

entity_id!(
    /// Identifier of an [`Election`]
    ElectionId
);
entity_id!(
    /// Identifier of a [`CatalogEntry`]
    CatalogId
);
entity_id!(
    /// Identifier of a [`Position`]
    PositionId
);
entity_id!(
    /// Identifier of a [`Candidate`]
    CandidateId
);
entity_id!(
    /// Identifier of a [`Round`]
    RoundId
);
entity_id!(
    /// Identifier of a [`RoundResult`]
    ResultId
);

/// Monotonic id allocator, one per entity table
#[derive(Debug)]
pub(crate) struct IdSequence(AtomicU64);

impl IdSequence {
    pub(crate) fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub(crate) fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle of an election
///
/// Driven by the engine: entering the first round moves `Draft` to
/// `InProgress`; computing the final summary moves `InProgress` to
/// `Finalized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElectionStatus {
    Draft,
    InProgress,
    Finalized,
}

impl std::str::FromStr for ElectionStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "FINALIZED" => Ok(Self::Finalized),
            other => Err(crate::Error::validation(
                "status",
                format!("unknown election status '{other}'"),
            )),
        }
    }
}

/// Lifecycle of a position within its election
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Pending,
    InProgress,
    Completed,
}

/// Channel through which a result set was exposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationMode {
    Projector,
    Pdf,
    Spreadsheet,
}

impl std::str::FromStr for PublicationMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PROJECTOR" => Ok(Self::Projector),
            "PDF" => Ok(Self::Pdf),
            "SPREADSHEET" => Ok(Self::Spreadsheet),
            other => Err(crate::Error::validation(
                "mode",
                format!("unknown publication mode '{other}'"),
            )),
        }
    }
}

/// An election event aggregating the positions to be filled
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Election {
    pub id: ElectionId,

    /// Human-readable name, required
    pub name: String,

    pub description: Option<String>,

    /// Date the election is held
    pub date: DateTime<Utc>,

    pub status: ElectionStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Reusable position title, e.g. "Presidente"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub id: CatalogId,

    /// Unique across the catalog
    pub name: String,

    pub description: Option<String>,
}

/// A seat to be elected within one election
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub id: PositionId,

    pub election_id: ElectionId,

    pub catalog_id: CatalogId,

    /// Display order, unique within the election
    pub order: u32,

    pub status: PositionStatus,
}

/// A person running for one position
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: CandidateId,

    pub position_id: PositionId,

    /// Unique within the position
    pub full_name: String,

    /// Inactive candidates are left out of future rounds
    pub active: bool,

    pub created_at: DateTime<Utc>,
}

/// One voting round of a position
///
/// Round numbers start at 1 and grow by one with every runoff. At most one
/// round per position is open (`finalized == false`) at any time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Round {
    pub id: RoundId,

    pub position_id: PositionId,

    pub number: u32,

    pub finalized: bool,

    /// Free-text operator note
    pub observations: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Vote count of one candidate in one round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundResult {
    pub id: ResultId,

    pub round_id: RoundId,

    pub candidate_id: CandidateId,

    pub votes: u64,

    pub updated_at: DateTime<Utc>,
}

/// A [`RoundResult`] joined with its candidate's name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateResult {
    pub result_id: ResultId,

    pub candidate_id: CandidateId,

    pub candidate_name: String,

    pub votes: u64,
}

/// One line of a `record_results` batch
///
/// Votes are signed at the boundary so that negative operator input is
/// reported as a validation error rather than silently wrapped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResultEntry {
    pub candidate_id: CandidateId,

    pub votes: i64,
}

impl ResultEntry {
    pub fn new(candidate_id: CandidateId, votes: i64) -> Self {
        Self {
            candidate_id,
            votes,
        }
    }
}

/// Audit record that a result set was exposed externally
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Publication {
    pub id: Uuid,

    pub election_id: ElectionId,

    pub mode: PublicationMode,

    pub published_by: Option<String>,

    pub note: Option<String>,

    /// Hex blake3 digest of the summary that was exposed
    pub summary_digest: String,

    pub published_at: DateTime<Utc>,
}
