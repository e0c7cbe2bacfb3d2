use anyhow::Result;
use eraser::report::render_outcome;
use eraser_core::config::DetectorConfig;
use eraser_core::trace::{replay, Trace};
use eraser_core::{Config, Detector, DetectorError, EventKind, NullSink};
use eraser_test::fixtures::{all_fixtures, mixed_access, ownership_errors, protected_writes};
use std::sync::Arc;

fn quiet_detector() -> Detector {
    Detector::new(DetectorConfig::default(), Arc::new(NullSink))
}

#[test]
fn fixtures_report_expected_races() {
    for fixture in all_fixtures() {
        let outcome = replay(&quiet_detector(), &fixture.trace);

        assert_eq!(
            outcome.races.len(),
            fixture.expected_races,
            "races in {}",
            fixture.name
        );
        assert_eq!(
            outcome.rejected.len(),
            fixture.expected_rejections,
            "rejections in {}",
            fixture.name
        );
        assert_eq!(
            outcome.verdict.race_ever_detected,
            fixture.expected_races > 0,
            "verdict for {}",
            fixture.name
        );
        assert_eq!(
            outcome.statistics.races_detected as usize,
            fixture.expected_races
        );
    }
}

#[test]
fn fixtures_survive_json_round_trip() -> Result<()> {
    for fixture in all_fixtures() {
        let text = fixture.trace.to_json()?;
        let parsed = Trace::from_json(&text)?;
        assert_eq!(parsed, fixture.trace, "{}", fixture.name);
    }
    Ok(())
}

#[test]
fn mixed_access_reports_each_conflict() {
    let outcome = replay(&quiet_detector(), &mixed_access().trace);

    let names: Vec<_> = outcome
        .races
        .iter()
        .map(|race| race.report.variable_name.as_str())
        .collect();
    assert_eq!(names, vec!["var1", "var2"]);

    let text = render_outcome(&outcome);
    assert!(text.contains("Races: 2"));
    assert!(text.contains("'var2'"));
    assert!(text.contains("data race detected"));
}

#[test]
fn ownership_errors_are_typed() {
    let outcome = replay(&quiet_detector(), &ownership_errors().trace);

    assert!(matches!(
        outcome.rejected[0].error,
        DetectorError::LockHeld { .. }
    ));
    assert!(matches!(
        outcome.rejected[1].error,
        DetectorError::OwnershipViolation { .. }
    ));
    assert!(matches!(
        outcome.rejected[2].error,
        DetectorError::OwnershipViolation { .. }
    ));

    // The one legitimate acquire/release pair is still counted.
    assert_eq!(outcome.statistics.acquisitions, 1);
    assert_eq!(outcome.statistics.releases, 1);
    assert!(render_outcome(&outcome).contains("Rejected steps"));
}

#[test]
fn replay_emits_session_bracketed_event_stream() {
    let detector = Detector::from_config(&Config::default());
    let outcome = replay(&detector, &protected_writes().trace);
    assert!(outcome.races.is_empty());

    let events = detector.capture().expect("events enabled by default").drain();
    assert!(matches!(
        events.first().map(|e| &e.kind),
        Some(EventKind::SessionStarted)
    ));
    assert!(matches!(
        events.last().map(|e| &e.kind),
        Some(EventKind::SessionEnded { verdict }) if !verdict.race_ever_detected
    ));

    let releases = events
        .iter()
        .filter(|e| matches!(e.kind, EventKind::LockReleased { .. }))
        .count();
    assert_eq!(releases, 4);
    assert!(!events.iter().any(|e| e.is_race()));
}

#[test]
fn detector_is_reusable_across_replays() {
    let detector = quiet_detector();
    let racy = replay(&detector, &mixed_access().trace);
    assert!(racy.verdict.race_ever_detected);

    let clean = replay(&detector, &protected_writes().trace);
    assert!(!clean.verdict.race_ever_detected);
    assert_eq!(clean.statistics.accesses, 4);
}

#[test]
fn demo_traces_replay_from_disk() -> Result<()> {
    let demos = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos");

    let bank = Trace::from_file(demos.join("bank_account.json"))?;
    assert!(bank.unresolved_variables().is_empty());
    let outcome = replay(&quiet_detector(), &bank);
    assert!(outcome.races.is_empty());
    assert!(outcome.rejected.is_empty());

    let mixed = Trace::from_file(demos.join("mixed_access.json"))?;
    assert_eq!(mixed, mixed_access().trace);
    Ok(())
}
