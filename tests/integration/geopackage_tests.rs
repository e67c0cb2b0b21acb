//! End-to-end verification of real GeoPackage files.

use crate::mocks::{GeoPackageFixture, BROKEN_SCHEMA, BROKEN_TILES, CORE_SCHEMA};
use gpkg_verifier::checks;
use gpkg_verifier::engine::orchestrator::{OrchestratorConfig, SubsystemTask, VerificationOrchestrator};
use gpkg_verifier::geopackage::{GeoPackage, GeoPackageEngine};
use gpkg_verifier::{
    verify_file, verify_files, Subsystem, VerificationLevel, VerifierConfig, VerifierError,
};
use std::path::PathBuf;

fn references(run: &gpkg_verifier::VerificationRun, subsystem: &Subsystem) -> Vec<String> {
    run.results
        .get(subsystem)
        .unwrap_or(&[])
        .iter()
        .map(|issue| issue.requirement().reference.clone())
        .collect()
}

#[test]
fn test_valid_file_has_no_issues() {
    let fixture = GeoPackageFixture::valid();
    let run = verify_file(fixture.path(), &VerifierConfig::default()).unwrap();

    assert!(!run.has_issues(), "unexpected report:\n{}", run.report());
    assert!(!run.has_failures());
    assert_eq!(run.passed, Subsystem::FIXED.to_vec());
}

#[test]
fn test_tiles_and_schema_file() {
    let fixture = GeoPackageFixture::with_sql(&format!("{}\n{}", BROKEN_TILES, BROKEN_SCHEMA));
    let run = verify_file(fixture.path(), &VerifierConfig::default()).unwrap();

    assert_eq!(
        run.results.subsystems(),
        vec![&Subsystem::Tiles, &Subsystem::Schema]
    );
    assert_eq!(references(&run, &Subsystem::Tiles), vec!["Requirement 45", "Requirement 54"]);
    assert_eq!(references(&run, &Subsystem::Schema), vec!["Requirement 58", "Requirement 59"]);

    let report = run.report();
    let tiles = report.find("Tiles Issues:").unwrap();
    let schema = report.find("Schema Issues:").unwrap();
    assert!(tiles < schema);
    assert!(report.contains("File: sample.gpkg\n"));
}

#[test]
fn test_plain_sqlite_file_reports_core_issues() {
    let fixture = GeoPackageFixture::named("plain.db", "CREATE TABLE t (id INTEGER);");
    let run = verify_file(fixture.path(), &VerifierConfig::default()).unwrap();

    assert_eq!(
        references(&run, &Subsystem::Core),
        vec![
            "Requirement 10",
            "Requirement 11",
            "Requirement 13",
            "Requirement 2",
            "Requirement 3"
        ]
    );
}

#[test]
fn test_level_none_reports_nothing() {
    let fixture = GeoPackageFixture::named("plain.db", "CREATE TABLE t (id INTEGER);");
    let config = VerifierConfig {
        level: VerificationLevel::None,
        ..VerifierConfig::default()
    };
    let run = verify_file(fixture.path(), &config).unwrap();
    assert!(!run.has_issues());
}

#[test]
fn test_subsystem_selection() {
    let fixture = GeoPackageFixture::with_sql(&format!("{}\n{}", BROKEN_TILES, BROKEN_SCHEMA));
    let config = VerifierConfig {
        subsystems: Some(vec![Subsystem::Schema, Subsystem::Core]),
        ..VerifierConfig::default()
    };
    let run = verify_file(fixture.path(), &config).unwrap();

    assert_eq!(run.results.subsystems(), vec![&Subsystem::Schema]);
    assert_eq!(run.passed, vec![Subsystem::Core]);
}

#[test]
fn test_non_database_fails_to_open() {
    let fixture = GeoPackageFixture::valid();
    std::fs::write(fixture.path(), vec![b'x'; 4096]).unwrap();

    let result = verify_file(fixture.path(), &VerifierConfig::default());
    assert!(matches!(result, Err(VerifierError::EngineOpen { .. })));
}

#[test]
fn test_unreadable_subsystem_is_an_engine_failure() {
    let fixture = GeoPackageFixture::with_sql(BROKEN_TILES);
    let mut orch = VerificationOrchestrator::new(GeoPackageEngine, OrchestratorConfig::default());
    orch.register_task(SubsystemTask::new(Subsystem::Tiles, |gpkg: &GeoPackage, level| {
        // The open handle survives, but no new reader can be opened
        std::fs::remove_file(gpkg.path()).unwrap();
        checks::tiles::verify(gpkg, level)
    }));

    let run = orch.run_all(fixture.path()).unwrap();

    assert!(!run.has_issues());
    assert!(run.failures.contains_key(&Subsystem::Tiles));
    assert!(run.passed.is_empty());
}

#[test]
fn test_verify_files_keeps_argument_order() {
    let good = GeoPackageFixture::valid();
    let bad = GeoPackageFixture::with_sql(BROKEN_TILES);
    let missing = good.path().with_file_name("missing.gpkg");

    let paths = vec![bad.path().to_path_buf(), missing.clone(), good.path().to_path_buf()];
    let results = verify_files(&paths, &VerifierConfig::default());

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, paths[0]);
    assert!(results[0].1.as_ref().unwrap().has_issues());
    assert!(matches!(results[1].1, Err(VerifierError::InvalidInput { .. })));
    assert!(!results[2].1.as_ref().unwrap().has_issues());
}

#[test]
fn test_full_open_accepts_valid_file() {
    let fixture = GeoPackageFixture::named("strict.gpkg", CORE_SCHEMA);
    let gpkg = GeoPackage::open(fixture.path(), VerificationLevel::Full).unwrap();
    assert_eq!(gpkg.application_id(), 0x4750_3130);
    assert_eq!(gpkg.user_version(), 0);
    gpkg.close().unwrap();
}

#[test]
fn test_verify_files_with_job_limit_keeps_argument_order() {
    let fixtures: Vec<GeoPackageFixture> = (0..7)
        .map(|i| {
            if i % 3 == 0 {
                GeoPackageFixture::with_sql(BROKEN_TILES)
            } else {
                GeoPackageFixture::valid()
            }
        })
        .collect();
    let paths: Vec<PathBuf> = fixtures.iter().map(|f| f.path().to_path_buf()).collect();
    let config = VerifierConfig {
        jobs: Some(2),
        ..VerifierConfig::default()
    };

    let results = verify_files(&paths, &config);

    assert_eq!(results.len(), 7);
    for (i, (file, result)) in results.iter().enumerate() {
        assert_eq!(file, &paths[i]);
        let run = result.as_ref().unwrap();
        assert!(!run.has_failures());
        assert_eq!(run.has_issues(), i % 3 == 0, "file {}", i);
    }
}
