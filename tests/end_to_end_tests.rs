//! End-to-end runs of the full engine against small hand-built graphs, covering
//! the canonical behaviors a host integration would exercise: a linear chat
//! render, branch selection, bounded repetition, parallel fan-out, cycle
//! rejection, and the duplicate-variable failure mode.

use cannoli_engine::graph::{RawEdge, RawVertex};
use cannoli_engine::status::Status;
use cannoli_engine::{mock, run, ObjectId, RunSettings, StopReason};

fn vertex(id: &str, x: f64, y: f64, w: f64, h: f64, text: &str, color: Option<&str>) -> RawVertex {
    RawVertex {
        id: ObjectId::new(id),
        x,
        y,
        w,
        h,
        text: text.to_string(),
        color: color.map(str::to_string),
    }
}

fn edge(id: &str, source: &str, target: &str, label: &str, color: Option<&str>) -> RawEdge {
    RawEdge {
        id: ObjectId::new(id),
        source: ObjectId::new(source),
        target: ObjectId::new(target),
        label: label.to_string(),
        color: color.map(str::to_string),
    }
}

fn id(s: &str) -> ObjectId {
    ObjectId::new(s)
}

fn mock_settings() -> RunSettings {
    RunSettings {
        mock_mode: true,
        ..RunSettings::default()
    }
}

#[tokio::test]
async fn linear_call_renders_mock_response_into_content() {
    let vertices = vec![
        vertex("input", 0.0, 0.0, 120.0, 60.0, "[q]\nHello", None),
        vertex("call", 300.0, 0.0, 120.0, 60.0, "{{q}}", Some("1")),
        vertex("content", 600.0, 0.0, 120.0, 60.0, "", Some("2")),
    ];
    let edges = vec![
        edge("e-var", "input", "call", "q", None),
        edge("e-write", "call", "content", "", None),
    ];

    let summary = run(&vertices, &edges, mock::mock_capabilities(), mock_settings()).await;

    assert_eq!(summary.reason, StopReason::Complete);
    assert_eq!(summary.output_text.get(&id("content")).map(String::as_str), Some("Mock response"));
}

#[tokio::test]
async fn choice_rejects_every_branch_but_the_selected_one() {
    // distinct_outgoing_names sorts alphabetically and the mock picks the first
    // option absent a forced override, so "no" (< "yes") is always chosen.
    let vertices = vec![
        vertex("call", 0.0, 0.0, 120.0, 60.0, "Pick a branch.", Some("1")),
        vertex("yes-content", 400.0, -150.0, 120.0, 60.0, "", Some("2")),
        vertex("no-content", 400.0, 150.0, 120.0, 60.0, "", Some("2")),
    ];
    let edges = vec![
        edge("e-yes", "call", "yes-content", "?yes", None),
        edge("e-no", "call", "no-content", "?no", None),
    ];

    let summary = run(&vertices, &edges, mock::mock_capabilities(), mock_settings()).await;

    assert_eq!(summary.reason, StopReason::Complete);
    assert_eq!(summary.statuses.get(&id("e-no")), Some(&Status::Complete));
    assert_eq!(summary.statuses.get(&id("e-yes")), Some(&Status::Rejected));
    assert_eq!(summary.statuses.get(&id("no-content")), Some(&Status::Complete));
    assert_eq!(summary.statuses.get(&id("yes-content")), Some(&Status::Rejected));
    assert!(summary.output_text.contains_key(&id("no-content")));
    assert!(!summary.output_text.contains_key(&id("yes-content")));
}

#[tokio::test]
async fn repeat_group_drives_its_call_node_exactly_three_times() {
    // The group's own rect encloses both members; the Content -> Call back-edge
    // shares the same enclosing group as both endpoints, so it's reflexive and
    // isn't itself a dependency of either node.
    let vertices = vec![
        vertex("loop", 0.0, 0.0, 800.0, 300.0, "3", None),
        vertex("call", 50.0, 50.0, 150.0, 100.0, "Summarize the running total.", Some("1")),
        vertex("content", 400.0, 50.0, 150.0, 100.0, "", Some("2")),
    ];
    let edges = vec![
        edge("e-out", "call", "content", "", None),
        edge("e-back", "content", "call", "running", None),
    ];

    let summary = run(&vertices, &edges, mock::mock_capabilities(), mock_settings()).await;

    assert_eq!(summary.reason, StopReason::Complete);
    assert_eq!(summary.executing_counts.get(&id("call")), Some(&3));
    assert_eq!(summary.statuses.get(&id("loop")), Some(&Status::Complete));
}

#[tokio::test]
async fn foreach_group_completes_both_clones_and_aggregates_their_output() {
    let vertices = vec![
        vertex("fanout", 0.0, 0.0, 400.0, 300.0, "<2", None),
        vertex("worker", 50.0, 50.0, 150.0, 100.0, "clone-output", Some("2")),
        vertex("collector", 700.0, 0.0, 150.0, 100.0, "", Some("2")),
    ];
    let edges = vec![edge("e-list", "fanout", "collector", "<", None)];

    let summary = run(&vertices, &edges, mock::mock_capabilities(), mock_settings()).await;

    assert_eq!(summary.reason, StopReason::Complete);
    assert_eq!(summary.statuses.get(&id("worker")), Some(&Status::Complete));
    assert_eq!(summary.statuses.get(&id("worker#1")), Some(&Status::Complete));
    let collected = summary.output_text.get(&id("collector")).expect("collector rendered");
    assert_eq!(collected.matches("clone-output").count(), 2);
}

#[tokio::test]
async fn a_cycle_between_two_plain_vertices_fails_validation() {
    let vertices = vec![
        vertex("a", 0.0, 0.0, 120.0, 60.0, "", Some("2")),
        vertex("b", 300.0, 0.0, 120.0, 60.0, "", Some("2")),
    ];
    let edges = vec![edge("e-ab", "a", "b", "", None), edge("e-ba", "b", "a", "", None)];

    let summary = run(&vertices, &edges, mock::mock_capabilities(), mock_settings()).await;

    assert_eq!(summary.reason, StopReason::Error);
    let message = summary.message.expect("error run carries a message");
    assert!(message.contains("Cycle detected"), "unexpected message: {message}");
}

#[tokio::test]
async fn a_single_choice_resolves_the_duplicate_named_variable_cleanly() {
    // Two branches both emit a variable named "x" into the same consumer, but
    // only one branch is ever selected, so the consumer's disjunctive cluster
    // sees exactly one completed member.
    let vertices = vec![
        vertex("call", 0.0, 0.0, 120.0, 60.0, "Pick a branch.", Some("1")),
        vertex("branch-a", 400.0, -150.0, 120.0, 60.0, "A", Some("2")),
        vertex("branch-b", 400.0, 150.0, 120.0, 60.0, "B", Some("2")),
        vertex("consumer", 800.0, 0.0, 120.0, 60.0, "{{x}}", Some("2")),
    ];
    let edges = vec![
        edge("e-branch-a", "call", "branch-a", "?branch-a", None),
        edge("e-branch-b", "call", "branch-b", "?branch-b", None),
        edge("e-x-a", "branch-a", "consumer", "x", None),
        edge("e-x-b", "branch-b", "consumer", "x", None),
    ];

    let summary = run(&vertices, &edges, mock::mock_capabilities(), mock_settings()).await;

    assert_eq!(summary.reason, StopReason::Complete);
    assert_eq!(summary.output_text.get(&id("consumer")).map(String::as_str), Some("A"));
}

#[tokio::test]
async fn two_unconditional_sources_naming_the_same_variable_is_a_configuration_error() {
    // Neither source is gated by a Choose node, so both reach Complete in the
    // same superstep and the consumer's cluster sees two simultaneous members.
    let vertices = vec![
        vertex("source-a", 0.0, -150.0, 120.0, 60.0, "[a]\nFoo", None),
        vertex("source-b", 0.0, 150.0, 120.0, 60.0, "[b]\nBar", None),
        vertex("consumer", 400.0, 0.0, 120.0, 60.0, "{{x}}", Some("2")),
    ];
    let edges = vec![
        edge("e-x-a", "source-a", "consumer", "x", None),
        edge("e-x-b", "source-b", "consumer", "x", None),
    ];

    let summary = run(&vertices, &edges, mock::mock_capabilities(), mock_settings()).await;

    assert_eq!(summary.reason, StopReason::Error);
    let message = summary.message.expect("error run carries a message");
    assert!(message.contains("duplicate variable"), "unexpected message: {message}");
}
