//! Property-based tests for result aggregation and report rendering.
//!
//! These cover render determinism, fixed section order regardless of
//! insertion order, stable per-section sorting, and the absence of empty
//! sections.

use proptest::prelude::*;

use gpkg_verifier::{
    render, ReportHeader, Requirement, ResultSet, Severity, Subsystem, VerificationIssue,
};
use std::path::Path;

// ============================================================================
// Strategies
// ============================================================================

fn subsystem_strategy() -> impl Strategy<Value = Subsystem> {
    prop_oneof![
        Just(Subsystem::Core),
        Just(Subsystem::Tiles),
        Just(Subsystem::Extensions),
        Just(Subsystem::Schema),
        Just(Subsystem::Metadata),
        prop::string::string_regex("[A-Z][a-z]{2,8}")
            .expect("valid regex")
            .prop_map(|name| Subsystem::from_name(&name)),
    ]
}

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![Just(Severity::Warning), Just(Severity::Error)]
}

/// Issues with a small reference alphabet so ties are common
fn issue_strategy() -> impl Strategy<Value = VerificationIssue> {
    (
        prop::sample::select(vec!["R1", "R10", "R2", "R3", "R20"]),
        severity_strategy(),
        "[a-z ]{0,20}",
    )
        .prop_map(|(reference, severity, reason)| {
            VerificationIssue::new(Requirement::new(reference, "requirement text", severity), reason)
        })
}

fn batches_strategy() -> impl Strategy<Value = Vec<(Subsystem, Vec<VerificationIssue>)>> {
    prop::collection::vec(
        (subsystem_strategy(), prop::collection::vec(issue_strategy(), 0..6)),
        0..8,
    )
}

fn build(batches: &[(Subsystem, Vec<VerificationIssue>)]) -> ResultSet {
    let mut results = ResultSet::new();
    for (subsystem, issues) in batches {
        results.insert(subsystem.clone(), issues.clone());
    }
    results
}

fn header() -> ReportHeader {
    ReportHeader::for_file(Path::new("property.gpkg"))
}

fn section_names(report: &str) -> Vec<String> {
    report
        .lines()
        .filter_map(|line| line.strip_suffix(" Issues:"))
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn render_is_deterministic(batches in batches_strategy()) {
        let results = build(&batches);
        let again = build(&batches);
        prop_assert_eq!(render(&header(), &results), render(&header(), &again));
    }

    #[test]
    fn sections_follow_priority_order(batches in batches_strategy()) {
        let results = build(&batches);
        let keys: Vec<&Subsystem> = results.subsystems();
        let mut sorted = keys.clone();
        sorted.sort();
        prop_assert_eq!(&keys, &sorted);

        let names: Vec<String> = keys.iter().map(|s| s.name().to_string()).collect();
        prop_assert_eq!(section_names(&render(&header(), &results)), names);
    }

    #[test]
    fn insertion_order_is_irrelevant_for_distinct_subsystems(batches in batches_strategy()) {
        // One batch per subsystem, so merging order cannot change issue order
        let mut seen = Vec::new();
        let distinct: Vec<_> = batches
            .into_iter()
            .filter(|(subsystem, _)| {
                if seen.contains(subsystem) {
                    false
                } else {
                    seen.push(subsystem.clone());
                    true
                }
            })
            .collect();

        let forward = build(&distinct);
        let mut reversed = distinct.clone();
        reversed.reverse();
        let backward = build(&reversed);

        prop_assert_eq!(render(&header(), &forward), render(&header(), &backward));
    }

    #[test]
    fn issues_sorted_and_stable(issues in prop::collection::vec(issue_strategy(), 1..12)) {
        let mut results = ResultSet::new();
        results.insert(Subsystem::Core, issues.clone());

        let stored = results.get(&Subsystem::Core).unwrap();
        let mut expected = issues;
        expected.sort_by(|a, b| a.requirement().reference.cmp(&b.requirement().reference));
        prop_assert_eq!(stored, expected.as_slice());
    }

    #[test]
    fn empty_batches_never_become_sections(batches in batches_strategy()) {
        let results = build(&batches);
        for (subsystem, issues) in results.iter() {
            prop_assert!(!issues.is_empty(), "{} has an empty entry", subsystem);
        }

        let non_empty: Vec<&Subsystem> = batches
            .iter()
            .filter(|(_, issues)| !issues.is_empty())
            .map(|(subsystem, _)| subsystem)
            .collect();
        for (subsystem, _) in &batches {
            prop_assert_eq!(results.contains(subsystem), non_empty.contains(&subsystem));
        }
    }
}
