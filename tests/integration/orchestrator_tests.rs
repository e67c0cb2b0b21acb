//! Orchestrator integration tests.
//!
//! Fan-out, join barrier, failure isolation, and aggregation, driven
//! through the mock engine.

use crate::mocks::*;
use gpkg_verifier::engine::orchestrator::{OrchestratorConfig, VerificationOrchestrator};
use gpkg_verifier::{Severity, Subsystem, VerifierError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(engine: MockEngine) -> VerificationOrchestrator<MockEngine> {
    VerificationOrchestrator::new(engine, OrchestratorConfig::default())
}

fn all_passing() -> Vec<gpkg_verifier::engine::orchestrator::SubsystemTask<MockHandle>> {
    Subsystem::FIXED.iter().cloned().map(passing_task).collect()
}

fn section_headers(report: &str) -> Vec<&str> {
    report.lines().filter(|line| line.ends_with(" Issues:")).collect()
}

#[test]
fn test_tiles_and_schema_scenario() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut orch = orchestrator(MockEngine::new());
    orch.register_tasks(all_passing());
    orch.register_task(task_with_issues(
        Subsystem::Tiles,
        vec![issue("T001", Severity::Error)],
    ));
    orch.register_task(task_with_issues(
        Subsystem::Schema,
        vec![issue("S001", Severity::Error), issue("S000", Severity::Warning)],
    ));

    let run = orch.run_all(file.path()).unwrap();

    assert!(run.has_issues());
    assert_eq!(run.results.subsystems(), vec![&Subsystem::Tiles, &Subsystem::Schema]);
    let schema: Vec<&str> = run
        .results
        .get(&Subsystem::Schema)
        .unwrap()
        .iter()
        .map(|i| i.requirement().reference.as_str())
        .collect();
    assert_eq!(schema, vec!["S000", "S001"]);
    assert_eq!(
        run.passed,
        vec![Subsystem::Core, Subsystem::Extensions, Subsystem::Metadata]
    );

    let report = run.report();
    assert_eq!(section_headers(&report), vec!["Tiles Issues:", "Schema Issues:"]);
}

#[test]
fn test_all_empty_scenario() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut orch = orchestrator(MockEngine::new());
    orch.register_tasks(all_passing());

    let run = orch.run_all(file.path()).unwrap();

    assert!(!run.has_issues());
    assert!(run.results.is_empty());
    assert!(run.failures.is_empty());
    assert_eq!(run.passed, Subsystem::FIXED.to_vec());
    assert!(section_headers(&run.report()).is_empty());
    assert!(run.report().ends_with("\n\n\n\n"));
}

#[test]
fn test_close_happens_after_every_worker() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut orch = orchestrator(MockEngine::new());
    orch.register_tasks(all_passing());
    orch.register_task(slow_task(
        Subsystem::Extensions,
        Duration::from_millis(300),
        vec![issue("Requirement 79", Severity::Error)],
    ));

    let run = orch.run_all(file.path()).unwrap();
    assert!(run.results.contains(&Subsystem::Extensions));

    let events = orch.engine().events();
    assert_eq!(events.len(), 7);
    assert_eq!(events[0], EngineEvent::Opened(file.path().to_path_buf()));
    assert_eq!(events[5], EngineEvent::WorkerFinished(Subsystem::Extensions));
    assert_eq!(events[6], EngineEvent::Closed(file.path().to_path_buf()));
    assert_eq!(orch.engine().close_count(), 1);
}

#[test]
fn test_failing_worker_is_isolated() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut orch = orchestrator(MockEngine::new());
    orch.register_tasks(
        Subsystem::FIXED
            .iter()
            .cloned()
            .map(|s| {
                let reference = format!("{} 1", s);
                task_with_issues(s, vec![issue(&reference, Severity::Error)])
            })
            .collect(),
    );
    orch.register_task(failing_task(Subsystem::Extensions));

    let run = orch.run_all(file.path()).unwrap();

    assert!(!run.results.contains(&Subsystem::Extensions));
    assert_eq!(run.results.len(), 4);
    assert!(run.failures[&Subsystem::Extensions].contains("mock subsystem failure"));
    assert!(run.has_failures());
}

#[test]
fn test_panicking_worker_is_isolated() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut orch = orchestrator(MockEngine::new());
    orch.register_tasks(
        Subsystem::FIXED
            .iter()
            .cloned()
            .map(|s| {
                let reference = format!("{} 1", s);
                task_with_issues(s, vec![issue(&reference, Severity::Error)])
            })
            .collect(),
    );
    orch.register_task(panicking_task(Subsystem::Core));

    let run = orch.run_all(file.path()).unwrap();

    assert!(!run.results.contains(&Subsystem::Core));
    assert_eq!(
        run.results.subsystems(),
        vec![
            &Subsystem::Tiles,
            &Subsystem::Extensions,
            &Subsystem::Schema,
            &Subsystem::Metadata
        ]
    );
    assert!(run.failures[&Subsystem::Core].contains("mock checker bug"));
    // Handle is still released
    assert_eq!(orch.engine().close_count(), 1);
}

#[test]
fn test_invalid_input_never_opens() {
    let dir = tempfile::tempdir().unwrap();
    let mut orch = orchestrator(MockEngine::new());
    orch.register_tasks(all_passing());

    let missing = dir.path().join("missing.gpkg");
    for path in [Path::new(""), missing.as_path(), dir.path()] {
        let result = orch.run_all(path);
        assert!(
            matches!(result, Err(VerifierError::InvalidInput { .. })),
            "expected invalid input for {:?}",
            path
        );
    }
    assert_eq!(orch.engine().open_count(), 0);
}

#[test]
fn test_open_failure_is_fatal() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut orch = orchestrator(MockEngine::failing_open());
    orch.register_tasks(all_passing());

    let result = orch.run_all(file.path());
    assert!(matches!(result, Err(VerifierError::EngineOpen { .. })));
    assert_eq!(orch.engine().open_count(), 1);
    assert!(orch.engine().events().is_empty());
}

#[test]
fn test_close_failure_keeps_results() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut orch = orchestrator(MockEngine::failing_close());
    orch.register_task(task_with_issues(
        Subsystem::Core,
        vec![issue("Requirement 2", Severity::Error)],
    ));

    let run = orch.run_all(file.path()).unwrap();
    assert!(run.results.contains(&Subsystem::Core));
}

#[test]
fn test_spawn_delivers_over_channel() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut orch = orchestrator(MockEngine::new());
    orch.register_task(slow_task(
        Subsystem::Metadata,
        Duration::from_millis(50),
        vec![issue("Requirement 69", Severity::Error)],
    ));
    let orch = Arc::new(orch);

    let mut handle = orch.spawn(file.path());
    assert_eq!(handle.file(), file.path());

    while handle.try_result().is_none() {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(matches!(handle.try_result(), Some(Ok(_))));

    let run = handle.wait().unwrap();
    assert!(run.results.contains(&Subsystem::Metadata));
}

#[test]
fn test_spawn_reports_invalid_input() {
    let orch = Arc::new(orchestrator(MockEngine::new()));
    let result = orch.spawn("").wait();
    assert!(matches!(result, Err(VerifierError::InvalidInput { .. })));
}

#[test]
fn test_other_subsystems_sort_last() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut orch = orchestrator(MockEngine::new());
    orch.register_task(task_with_issues(
        Subsystem::Other("Features".to_string()),
        vec![issue("F1", Severity::Warning)],
    ));
    orch.register_task(task_with_issues(
        Subsystem::Metadata,
        vec![issue("M1", Severity::Error)],
    ));

    let run = orch.run_all(file.path()).unwrap();
    assert_eq!(
        section_headers(&run.report()),
        vec!["Metadata Issues:", "Features Issues:"]
    );
}
