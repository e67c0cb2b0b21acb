//! Output formatter integration tests against real verification runs.

use crate::mocks::{GeoPackageFixture, BROKEN_SCHEMA, BROKEN_TILES};
use gpkg_verifier::cli::args::OutputFormat;
use gpkg_verifier::cli::output::{get_formatter, JunitFormatter, OutputFormatter, TextFormatter};
use gpkg_verifier::{verify_file, VerificationRun, VerifierConfig};

fn broken_run(fixture: &GeoPackageFixture) -> VerificationRun {
    verify_file(fixture.path(), &VerifierConfig::default()).unwrap()
}

#[test]
fn test_text_output_matches_report() {
    let fixture = GeoPackageFixture::with_sql(BROKEN_TILES);
    let run = broken_run(&fixture);

    let output = get_formatter(OutputFormat::Text, false).format(std::slice::from_ref(&run));
    assert_eq!(output, run.report());
    assert!(output.contains("Tiles Issues:\n\n(Error) Requirement 45: \""));
}

#[test]
fn test_text_output_joins_files() {
    let first = GeoPackageFixture::with_sql(BROKEN_TILES);
    let second = GeoPackageFixture::valid();
    let runs = vec![broken_run(&first), broken_run(&second)];

    let output = TextFormatter::new(false).format(&runs);
    assert_eq!(output, format!("{}\n{}", runs[0].report(), runs[1].report()));
}

#[test]
fn test_json_output_round_trips_through_serde() {
    let fixture = GeoPackageFixture::with_sql(&format!("{}\n{}", BROKEN_TILES, BROKEN_SCHEMA));
    let run = broken_run(&fixture);

    let output = get_formatter(OutputFormat::Json, false).format(&[run]);
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();

    assert_eq!(value["specification_version"], "1.0");
    let file = &value["files"][0];
    assert_eq!(file["summary"]["errors"], 4);
    assert_eq!(file["summary"]["subsystems_with_issues"], 2);
    assert_eq!(file["results"]["Tiles"].as_array().map(Vec::len), Some(2));
    assert_eq!(file["results"]["Schema"].as_array().map(Vec::len), Some(2));
    assert!(file["results"].get("Core").is_none());
}

#[test]
fn test_junit_output_counts() {
    let fixture = GeoPackageFixture::with_sql(BROKEN_TILES);
    let run = broken_run(&fixture);

    let output = JunitFormatter::new().format(&[run]);
    assert!(output.contains("failures=\"2\" errors=\"0\""));
    assert!(output.contains("<testsuite name=\"sample.gpkg.Tiles\" tests=\"2\" failures=\"2\" errors=\"0\">"));
    assert!(output.contains("<testcase name=\"Core requirements\" classname=\"sample.gpkg.Core\" />"));
}

#[test]
fn test_summary_line() {
    let fixture = GeoPackageFixture::valid();
    let run = broken_run(&fixture);
    let line = TextFormatter::new(false).summary(&run);
    assert!(line.starts_with("[PASS] sample.gpkg: 0 errors, 0 warnings"));
}
