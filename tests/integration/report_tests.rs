//! Report rendering integration tests.

use crate::mocks::issue;
use gpkg_verifier::{render, ReportHeader, ResultSet, Severity, Subsystem};
use std::path::Path;

fn header() -> ReportHeader {
    ReportHeader::for_file(Path::new("/srv/maps/world.gpkg"))
}

#[test]
fn test_header_names_tool_and_standard() {
    let text = header().to_string();
    assert_eq!(
        text,
        format!(
            "GeoPackage Verifier Tool Version {}.\nGeoPackage Encoding Standard Specification Version 1.0.\nFile: world.gpkg\n\n\n",
            env!("CARGO_PKG_VERSION")
        )
    );
}

#[test]
fn test_two_sections_exact_layout() {
    let mut results = ResultSet::new();
    results.insert(Subsystem::Schema, vec![issue("S1", Severity::Warning)]);
    results.insert(
        Subsystem::Core,
        vec![issue("C2", Severity::Error), issue("C1", Severity::Error)],
    );

    let expected = format!(
        "{}\n\
         Core Issues:\n\n\
         (Error) C1: \"text of C1\"\n\nreason for C1\n\n\
         (Error) C2: \"text of C2\"\n\nreason for C2\n\n\
         Schema Issues:\n\n\
         (Warning) S1: \"text of S1\"\n\nreason for S1\n",
        header()
    );
    assert_eq!(render(&header(), &results), expected);
}

#[test]
fn test_insertion_order_does_not_matter() {
    let mut forward = ResultSet::new();
    let mut backward = ResultSet::new();
    let batches = vec![
        (Subsystem::Core, vec![issue("A", Severity::Error)]),
        (Subsystem::Tiles, vec![issue("B", Severity::Error)]),
        (Subsystem::Extensions, vec![issue("C", Severity::Warning)]),
        (Subsystem::Schema, vec![issue("D", Severity::Error)]),
        (Subsystem::Metadata, vec![issue("E", Severity::Error)]),
    ];
    for (subsystem, issues) in batches.iter().cloned() {
        forward.insert(subsystem, issues);
    }
    for (subsystem, issues) in batches.into_iter().rev() {
        backward.insert(subsystem, issues);
    }

    assert_eq!(render(&header(), &forward), render(&header(), &backward));
}

#[test]
fn test_equal_references_keep_insertion_order() {
    let mut results = ResultSet::new();
    let first = gpkg_verifier::VerificationIssue::new(
        gpkg_verifier::Requirement::new("R", "t", Severity::Error),
        "first",
    );
    let second = gpkg_verifier::VerificationIssue::new(
        gpkg_verifier::Requirement::new("R", "t", Severity::Error),
        "second",
    );
    results.insert(Subsystem::Tiles, vec![first, second]);

    let report = render(&header(), &results);
    assert!(report.find("first").unwrap() < report.find("second").unwrap());
}

#[test]
fn test_empty_insert_adds_no_section() {
    let mut results = ResultSet::new();
    assert!(!results.insert(Subsystem::Core, Vec::new()));
    assert!(results.is_empty());
    assert_eq!(render(&header(), &results), format!("{}\n", header()));
}
