//! Round, tally and runoff engine for academic elections
//!
//! Positions are contested in numbered rounds. Each round collects vote
//! counts per candidate; a round is settled when one candidate has strictly
//! more votes than every other, and a tie is resolved by opening another
//! round for the same position. The final summary reports, per position, the
//! winner of the most advanced round holding results.
//!
//! ```
//! use runoff::{ElectionService, NewElection, ResultEntry};
//!
//! let service = ElectionService::for_testing();
//! let dir = service.directory();
//! let election = dir.create_election(NewElection {
//!     name: "Consejo".to_string(),
//!     ..Default::default()
//! })?;
//! let title = dir.create_catalog_entry("Presidente", None)?;
//! let position = dir.add_position(election.id, title.id, None)?;
//! let a = dir.register_candidate(position.id, "A", None)?;
//! let b = dir.register_candidate(position.id, "B", None)?;
//!
//! let round = service.create_round(position.id, None, None)?;
//! service.record_results(round.id, &[ResultEntry::new(a.id, 7), ResultEntry::new(b.id, 3)])?;
//!
//! let summary = service.final_summary(election.id)?;
//! assert_eq!(summary[0].winner, "A");
//! assert_eq!(summary[0].percentage.to_string(), "70.00");
//! # Ok::<(), runoff::Error>(())
//! ```

pub mod config;
pub mod directory;
pub mod errors;
pub mod publication;
pub mod report;
pub mod resolver;
pub mod results;
pub mod rounds;
pub mod service;
pub mod summary;
pub mod tally;
pub mod types;

// Re-export commonly used types
pub use config::{Config, EngineConfig};
pub use directory::{CandidateDirectory, Directory, ElectionDirectory, ElectionFilter, NewElection};
pub use errors::{Error, ErrorKind, Result};
pub use publication::NewPublication;
pub use report::{DetailedResults, ElectionReport, PublicBoard};
pub use resolver::{RoundOutcome, RoundState};
pub use service::{ElectionService, FinalResults, Runoff};
pub use summary::SummaryEntry;
pub use tally::Percentage;
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging for the engine
///
/// Leaves an already installed global subscriber in place.
pub fn init() -> Result<()> {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runoff=info".into()),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("🗳️  Runoff engine v{} initialized", VERSION);
    }
    Ok(())
}
