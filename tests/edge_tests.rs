//! Edge cases across the directory, rounds, results and configuration
//!
//! - Reference and dependency errors on deletes
//! - Status transitions of elections and positions
//! - Round numbering and validation
//! - Tie and zero-vote resolution
//! - Environment configuration

use runoff::{
    CandidateDirectory, CandidateId, ElectionFilter, ElectionService, ElectionStatus, EngineConfig, Error,
    ErrorKind, NewElection, PositionStatus, PublicationMode, Result, ResultEntry, RoundId,
    RoundState,
};
use std::collections::HashMap;

fn election(service: &ElectionService, name: &str) -> Result<runoff::Election> {
    service.directory().create_election(NewElection {
        name: name.to_string(),
        ..Default::default()
    })
}

// =============================================================================
// DIRECTORY
// =============================================================================

#[tokio::test]
async fn test_blank_names_rejected() -> Result<()> {
    let service = ElectionService::for_testing();
    let err = election(&service, "   ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .directory()
        .create_catalog_entry("", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    Ok(())
}

#[tokio::test]
async fn test_catalog_entry_in_use_cannot_be_deleted() -> Result<()> {
    let service = ElectionService::for_testing();
    let e = election(&service, "Claustro")?;
    let title = service.directory().create_catalog_entry("Decano", None)?;
    let position = service.directory().add_position(e.id, title.id, None)?;

    let err = service.delete_catalog_entry(title.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyExists);

    service.delete_position(position.id)?;
    service.delete_catalog_entry(title.id)?;
    assert!(service.directory().list_catalog()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_position_order_conflicts() -> Result<()> {
    let service = ElectionService::for_testing();
    let dir = service.directory();
    let e = election(&service, "Claustro")?;
    let first = dir.create_catalog_entry("Rector", None)?;
    let second = dir.create_catalog_entry("Vicerrector", None)?;

    dir.add_position(e.id, first.id, Some(1))?;
    let err = dir.add_position(e.id, second.id, Some(1)).unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));

    let err = dir.add_position(e.id, second.id, Some(0)).unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    Ok(())
}

#[tokio::test]
async fn test_candidate_limit_from_config() -> Result<()> {
    let service = ElectionService::new(EngineConfig {
        max_candidates_per_position: 2,
        ..EngineConfig::for_testing()
    });
    let dir = service.directory();
    let e = election(&service, "Claustro")?;
    let title = dir.create_catalog_entry("Vocal", None)?;
    let position = dir.add_position(e.id, title.id, None)?;

    dir.register_candidate(position.id, "Uno", None)?;
    dir.register_candidate(position.id, "Dos", None)?;
    let err = dir.register_candidate(position.id, "Tres", None).unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let err = dir.register_candidate(position.id, "Uno", None).unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
    Ok(())
}

#[tokio::test]
async fn test_election_listing_filters() -> Result<()> {
    let service = ElectionService::for_testing();
    let older = election(&service, "Anterior")?;
    let newer = election(&service, "Actual")?;
    service
        .directory()
        .set_election_status(newer.id, ElectionStatus::InProgress)?;

    let all = service.directory().list_elections(ElectionFilter::default())?;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, newer.id);

    let drafts = service.directory().list_elections(ElectionFilter {
        status: Some(ElectionStatus::Draft),
        ..Default::default()
    })?;
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].id, older.id);
    Ok(())
}

#[tokio::test]
async fn test_finalized_election_is_frozen() -> Result<()> {
    let service = ElectionService::for_testing();
    let dir = service.directory();
    let e = election(&service, "Claustro")?;
    dir.set_election_status(e.id, ElectionStatus::InProgress)?;
    service.finalize_election(e.id)?;

    let err = dir
        .set_election_status(e.id, ElectionStatus::Draft)
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));

    let title = dir.create_catalog_entry("Tarde", None)?;
    let err = dir.add_position(e.id, title.id, None).unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));

    let err = service.finalize_election(e.id).unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));
    Ok(())
}

// =============================================================================
// ROUNDS AND RESULTS
// =============================================================================

#[tokio::test]
async fn test_round_numbering_rules() -> Result<()> {
    let service = ElectionService::for_testing();
    let dir = service.directory();
    let e = election(&service, "Claustro")?;
    let title = dir.create_catalog_entry("Vocal", None)?;
    let position = dir.add_position(e.id, title.id, None)?;

    let err = service.create_round(position.id, Some(0), None).unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let third = service.create_round(position.id, Some(3), None)?;
    service.finalize_round(third.id)?;

    let err = service.create_round(position.id, Some(3), None).unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));

    let next = service.create_round(position.id, None, Some("segunda vuelta".to_string()))?;
    assert_eq!(next.number, 4);
    assert_eq!(service.active_round(position.id)?.map(|r| r.id), Some(next.id));

    let rounds = service.list_rounds(position.id)?;
    assert_eq!(rounds.iter().map(|r| r.number).collect::<Vec<_>>(), [3, 4]);
    Ok(())
}

#[tokio::test]
async fn test_unknown_round_is_a_reference_error() -> Result<()> {
    let service = ElectionService::for_testing();
    let missing = RoundId(77);

    assert_eq!(service.outcome(missing).unwrap_err().kind(), ErrorKind::Reference);
    assert_eq!(
        service
            .record_results(missing, &[ResultEntry::new(CandidateId(1), 1)])
            .unwrap_err()
            .kind(),
        ErrorKind::Reference
    );
    assert_eq!(service.delete_round(missing).unwrap_err().kind(), ErrorKind::Reference);
    Ok(())
}

#[tokio::test]
async fn test_candidate_from_other_position_rejected() -> Result<()> {
    let service = ElectionService::for_testing();
    let dir = service.directory();
    let e = election(&service, "Claustro")?;
    let t1 = dir.create_catalog_entry("Rector", None)?;
    let t2 = dir.create_catalog_entry("Decano", None)?;
    let p1 = dir.add_position(e.id, t1.id, Some(1))?;
    let p2 = dir.add_position(e.id, t2.id, Some(2))?;
    let outsider = dir.register_candidate(p2.id, "Ajeno", None)?;

    let round = service.create_round(p1.id, None, None)?;
    let err = service
        .record_results(round.id, &[ResultEntry::new(outsider.id, 3)])
        .unwrap_err();
    assert!(matches!(err, Error::Reference { .. }));
    Ok(())
}

#[tokio::test]
async fn test_outcome_states() -> Result<()> {
    let service = ElectionService::for_testing();
    let dir = service.directory();
    let e = election(&service, "Claustro")?;
    let title = dir.create_catalog_entry("Vocal", None)?;
    let position = dir.add_position(e.id, title.id, None)?;
    let a = dir.register_candidate(position.id, "A", None)?;
    let b = dir.register_candidate(position.id, "B", None)?;
    let c = dir.register_candidate(position.id, "C", None)?;

    let round = service.create_round(position.id, None, None)?;
    assert_eq!(service.outcome(round.id)?.state(), RoundState::NoResults);
    assert!(!service.is_tie(round.id)?);

    service.record_results(round.id, &[ResultEntry::new(a.id, 0)])?;
    assert_eq!(service.outcome(round.id)?.state(), RoundState::ZeroVotes);
    assert!(!service.is_tie(round.id)?);

    service.record_results(round.id, &[ResultEntry::new(b.id, 0), ResultEntry::new(c.id, 0)])?;
    assert!(service.is_tie(round.id)?);

    service.record_results(
        round.id,
        &[
            ResultEntry::new(a.id, 10),
            ResultEntry::new(b.id, 10),
            ResultEntry::new(c.id, 5),
        ],
    )?;
    assert_eq!(service.outcome(round.id)?.state(), RoundState::Tie);

    service.record_results(round.id, &[ResultEntry::new(a.id, 12)])?;
    assert_eq!(service.winner(round.id)?.map(|w| w.id), Some(a.id));

    let details = service.detailed_results(round.id)?;
    assert_eq!(details.total_votes, 27);
    assert_eq!(details.rows[0].percentage.to_string(), "44.44");
    assert_eq!(details.rows[2].percentage.to_string(), "18.52");
    Ok(())
}

#[tokio::test]
async fn test_overflowing_round_total_rejected() -> Result<()> {
    let service = ElectionService::for_testing();
    let dir = service.directory();
    let e = election(&service, "Claustro")?;
    let title = dir.create_catalog_entry("Vocal", None)?;
    let position = dir.add_position(e.id, title.id, None)?;
    let a = dir.register_candidate(position.id, "A", None)?;
    let b = dir.register_candidate(position.id, "B", None)?;
    let c = dir.register_candidate(position.id, "C", None)?;

    let round = service.create_round(position.id, None, None)?;
    let err = service
        .record_results(
            round.id,
            &[
                ResultEntry::new(a.id, i64::MAX),
                ResultEntry::new(b.id, i64::MAX),
                ResultEntry::new(c.id, 5),
            ],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(service.list_results(round.id)?.is_empty());

    // The largest totals that fit still tally and summarize
    service.record_results(
        round.id,
        &[ResultEntry::new(a.id, i64::MAX), ResultEntry::new(b.id, i64::MAX - 1)],
    )?;
    let details = service.detailed_results(round.id)?;
    assert_eq!(details.total_votes, u64::MAX - 2);
    assert_eq!(details.winner, Some(a.id));
    assert_eq!(details.rows[0].percentage.to_string(), "50.00");

    assert_eq!(service.final_summary(e.id)?.len(), 1);
    service.public_results(e.id)?;
    service.election_report(e.id)?;
    Ok(())
}

#[tokio::test]
async fn test_inactive_candidates_do_not_block_completion() -> Result<()> {
    let service = ElectionService::new(EngineConfig {
        require_complete_results: true,
        ..EngineConfig::for_testing()
    });
    let dir = service.directory();
    let e = election(&service, "Claustro")?;
    let title = dir.create_catalog_entry("Vocal", None)?;
    let position = dir.add_position(e.id, title.id, None)?;
    let a = dir.register_candidate(position.id, "A", None)?;
    let withdrawn = dir.register_candidate(position.id, "B", None)?;
    dir.update_candidate(withdrawn.id, None, Some(false))?;

    let round = service.create_round(position.id, None, None)?;
    service.record_results(round.id, &[ResultEntry::new(a.id, 4)])?;
    let outcome = service.close_round(round.id)?;
    assert_eq!(outcome.winner(), Some(a.id));
    assert_eq!(dir.position(position.id)?.status, PositionStatus::Completed);
    Ok(())
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[tokio::test]
async fn test_engine_config_from_variables() -> Result<()> {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("RUNOFF_REQUIRE_COMPLETE_RESULTS", "true"),
        ("RUNOFF_MAX_CANDIDATES", "12"),
        ("RUNOFF_PUBLICATION_MODE", "SPREADSHEET"),
    ]);
    let config = EngineConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))?;
    assert!(config.require_complete_results);
    assert_eq!(config.max_candidates_per_position, 12);
    assert_eq!(config.default_publication_mode, PublicationMode::Spreadsheet);

    let zero = |key: &str| (key == "RUNOFF_MAX_CANDIDATES").then(|| "0".to_string());
    tokio_test::assert_err!(EngineConfig::from_lookup(zero));
    Ok(())
}

#[tokio::test]
async fn test_init_is_repeatable() -> Result<()> {
    tokio_test::assert_ok!(runoff::init());
    tokio_test::assert_ok!(runoff::init());
    Ok(())
}
