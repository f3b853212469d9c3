use std::time::Duration;

use tempfile::TempDir;

use super::*;
use crate::governor::Cost;
use crate::index::{DocumentFacts, ExtractionMethod, FactsRecord};
use crate::verify::{Usage, Verdict};

fn pair(left: &str, right: &str, similarity: Option<f64>) -> PairRecord {
    PairRecord {
        left: left.to_string(),
        right: right.to_string(),
        page_delta: 0,
        text_similarity: similarity,
    }
}

fn result(left: &str, right: &str, verdict: Verdict, micros: u64) -> VerificationRecord {
    VerificationRecord {
        left: left.to_string(),
        right: right.to_string(),
        verdict,
        confidence: 90,
        reasoning: "same header".to_string(),
        needs_review: false,
        cost: Cost::from_micros(micros),
        usage: Usage {
            input_units: 1_200,
            output_units: 80,
        },
    }
}

#[test]
fn test_fresh_run_without_file() {
    let dir = TempDir::new().unwrap();
    let manager = CheckpointManager::open(dir.path().join("checkpoint.json")).unwrap();

    assert!(!manager.resumed());
    assert!(manager.stage1().is_none());
    assert!(manager.stage2().is_none());
    assert_eq!(manager.cumulative_cost(), Cost::ZERO);
    assert!(!manager.run_id().is_empty());
}

#[test]
fn test_save_and_reload_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state/checkpoint.json");

    let manager = CheckpointManager::open(&path).unwrap();
    manager.record_facts(vec![FactsRecord {
        path: "/docs/a.pdf".to_string(),
        fingerprint: "abc".to_string(),
        facts: DocumentFacts {
            page_count: 5,
            leading_text: "quick brown fox".to_string(),
            extraction_method: ExtractionMethod::Digital,
            error: None,
        },
    }]);
    manager.record_stage1(vec![pair("A", "X", None), pair("A", "Y", None)]);
    manager.record_stage2(vec![pair("A", "X", Some(0.82))]);
    manager.record_verification(result("A", "X", Verdict::Match, 4_500), 2);
    manager.add_timing(StagePhase::Stage3, Duration::from_millis(1_500));
    manager.save().unwrap();

    let reloaded = CheckpointManager::open(&path).unwrap();
    assert!(reloaded.resumed());
    assert_eq!(reloaded.run_id(), manager.run_id());
    assert_eq!(reloaded.stage1(), manager.stage1());
    assert_eq!(reloaded.stage2(), manager.stage2());
    assert_eq!(reloaded.facts(), manager.facts());
    assert_eq!(reloaded.cumulative_cost(), Cost::from_micros(4_500));
    assert_eq!(reloaded.calls_made(), 2);
    assert_eq!(
        reloaded.verified("A", "X").map(|r| r.verdict),
        Some(Verdict::Match)
    );
    assert_eq!(reloaded.snapshot().timings.stage3_ms, 1_500);
    assert!(reloaded.snapshot().saved_at.is_some());
}

#[test]
fn test_new_stage1_invalidates_stage2() {
    let dir = TempDir::new().unwrap();
    let manager = CheckpointManager::open(dir.path().join("c.json")).unwrap();

    manager.record_stage1(vec![pair("A", "X", None)]);
    manager.record_stage2(vec![pair("A", "X", Some(0.9))]);
    manager.record_stage1(vec![pair("B", "X", None)]);

    assert!(manager.stage2().is_none());
}

#[test]
fn test_ledger_replaces_retried_pair() {
    let mut ledger = CostLedger::default();
    ledger.record(result("A", "X", Verdict::Error, 0), 4);
    ledger.record(result("B", "Y", Verdict::NoMatch, 1_000), 1);
    assert_eq!(ledger.errors, 1);

    ledger.record(result("A", "X", Verdict::Match, 2_000), 1);

    assert_eq!(ledger.results.len(), 2);
    assert_eq!(ledger.errors, 0);
    assert_eq!(ledger.matches, 1);
    assert_eq!(ledger.non_matches, 1);
    assert_eq!(ledger.calls_made, 6);
    assert_eq!(ledger.cumulative_cost, Cost::from_micros(3_000));
}

#[test]
fn test_ledger_lookup_after_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    {
        let manager = CheckpointManager::open(&path).unwrap();
        for i in 0..50 {
            manager.record_verification(result("A", &format!("X{i}"), Verdict::NoMatch, 10), 1);
        }
        manager.record_verification(result("A", "X7", Verdict::Error, 0), 3);
        manager.save().unwrap();
    }

    let manager = CheckpointManager::open(&path).unwrap();
    assert_eq!(manager.verified("A", "X7").unwrap().verdict, Verdict::Error);
    assert_eq!(manager.verified("A", "X49").unwrap().verdict, Verdict::NoMatch);
    assert!(manager.verified("B", "X7").is_none());

    manager.record_verification(result("A", "X7", Verdict::Match, 10), 1);
    let ledger = manager.snapshot().ledger;
    assert_eq!(ledger.results.len(), 50);
    assert_eq!(ledger.matches, 1);
    assert_eq!(ledger.non_matches, 49);
    assert_eq!(ledger.errors, 0);
}

#[test]
fn test_deserialized_ledger_indexes_on_first_record() {
    let mut ledger: CostLedger = serde_json::from_str(
        r#"{"results": [
            {"left": "A", "right": "X", "verdict": "error"},
            {"left": "B", "right": "Y", "verdict": "match"}
        ]}"#,
    )
    .unwrap();
    assert_eq!(ledger.get("B", "Y").unwrap().verdict, Verdict::Match);

    ledger.record(result("A", "X", Verdict::NoMatch, 5), 1);

    assert_eq!(ledger.results.len(), 2);
    assert_eq!(ledger.get("A", "X").unwrap().verdict, Verdict::NoMatch);
    assert_eq!(ledger.matches, 1);
    assert_eq!(ledger.non_matches, 1);
    assert_eq!(ledger.errors, 0);
}

#[test]
fn test_unknown_fields_are_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    std::fs::write(
        &path,
        r#"{
            "format_version": 1,
            "run_id": "r-1",
            "added_later": {"x": 1},
            "survivors": {"version": 1, "stage1": [{"left": "A", "right": "X", "page_delta": 1, "color": "red"}]},
            "ledger": {"cumulative_cost": 1500000, "unknown": true}
        }"#,
    )
    .unwrap();

    let manager = CheckpointManager::open(&path).unwrap();
    assert_eq!(manager.run_id(), "r-1");
    assert_eq!(manager.stage1().unwrap()[0].page_delta, 1);
    assert_eq!(manager.cumulative_cost(), Cost::from_micros(1_500_000));
}

#[test]
fn test_missing_sections_default_to_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    std::fs::write(&path, r#"{"run_id": "r-2"}"#).unwrap();

    let manager = CheckpointManager::open(&path).unwrap();
    let state = manager.snapshot();

    assert!(state.survivors.stage1.is_none());
    assert!(state.facts.entries.is_empty());
    assert_eq!(state.ledger.calls_made, 0);
    assert_eq!(state.ledger.version, 1);
}

#[test]
fn test_corrupt_checkpoint_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = CheckpointManager::open(&path).unwrap_err();
    assert!(matches!(err, CheckpointError::Corrupt { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_newer_format_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    std::fs::write(&path, r#"{"format_version": 99}"#).unwrap();

    assert!(matches!(
        CheckpointManager::open(&path),
        Err(CheckpointError::UnsupportedVersion { found: 99, .. })
    ));
}

#[test]
fn test_failed_save_is_counted_not_raised() {
    let dir = TempDir::new().unwrap();
    // Parent is a regular file, so the directory cannot be created.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").unwrap();
    let manager = CheckpointManager::open(blocker.join("checkpoint.json")).unwrap();

    assert!(!manager.save_or_warn());
    assert!(!manager.save_or_warn());
    assert_eq!(manager.failures(), 2);
}

#[test]
fn test_save_leaves_no_temp_files() {
    let dir = TempDir::new().unwrap();
    let manager = CheckpointManager::open(dir.path().join("checkpoint.json")).unwrap();
    manager.save().unwrap();
    manager.save().unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["checkpoint.json".to_string()]);
}
