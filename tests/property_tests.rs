//! Property tests for the universal structural invariants of spec.md §8: a
//! graph's DAG-ness is checked the same way no matter how it was assembled,
//! validation is idempotent, and a bounded loop drives its members exactly
//! as many times as it's told to, never more and never fewer.

use cannoli_engine::graph::{RawEdge, RawVertex};
use cannoli_engine::{loader, mock, run, validate, ObjectId, RunSettings, StopReason};
use proptest::prelude::*;

fn plain_content_vertex(id: String, x: f64) -> RawVertex {
    RawVertex {
        id: ObjectId::new(id),
        x,
        y: 0.0,
        w: 100.0,
        h: 50.0,
        text: String::new(),
        color: Some("2".to_string()),
    }
}

fn forward_edge(id: String, source: String, target: String) -> RawEdge {
    RawEdge {
        id: ObjectId::new(id),
        source: ObjectId::new(source),
        target: ObjectId::new(target),
        label: String::new(),
        color: None,
    }
}

proptest! {
    /// Any graph whose edges all run from a lower index to a higher one is
    /// acyclic by construction; no subset of such edges should ever trip the
    /// cycle check, regardless of how densely connected it is.
    #[test]
    fn acyclic_forward_graphs_never_report_a_cycle(
        n in 2usize..8,
        present in prop::collection::vec(any::<bool>(), 0..28),
    ) {
        let vertices: Vec<RawVertex> = (0..n)
            .map(|i| plain_content_vertex(format!("v{i}"), i as f64 * 300.0))
            .collect();

        let mut edges = Vec::new();
        let mut idx = 0;
        for i in 0..n {
            for j in (i + 1)..n {
                if present.get(idx).copied().unwrap_or(false) {
                    edges.push(forward_edge(format!("e{i}-{j}"), format!("v{i}"), format!("v{j}")));
                }
                idx += 1;
            }
        }

        let (graph, _) = loader::load(&vertices, &edges);
        let errors = validate::validate(&graph);
        prop_assert!(!errors.iter().any(|e| e.message.contains("Cycle detected")));
    }

    /// Closing a forward chain into a cycle is always caught, and checking the
    /// same graph twice reports the identical set of errors both times.
    #[test]
    fn a_closed_cycle_is_always_detected_and_detection_is_idempotent(n in 3usize..6) {
        let vertices: Vec<RawVertex> = (0..n)
            .map(|i| plain_content_vertex(format!("v{i}"), i as f64 * 300.0))
            .collect();

        let mut edges: Vec<RawEdge> = (0..n - 1)
            .map(|i| forward_edge(format!("e{i}"), format!("v{i}"), format!("v{}", i + 1)))
            .collect();
        edges.push(forward_edge("e-close".to_string(), format!("v{}", n - 1), "v0".to_string()));

        let (graph, _) = loader::load(&vertices, &edges);
        let first = validate::validate(&graph);
        let second = validate::validate(&graph);

        prop_assert!(first.iter().any(|e| e.message.contains("Cycle detected")));
        let first_messages: Vec<&str> = first.iter().map(|e| e.message.as_str()).collect();
        let second_messages: Vec<&str> = second.iter().map(|e| e.message.as_str()).collect();
        prop_assert_eq!(first_messages, second_messages);
    }

    /// A Repeat(N) group drives its single Call member exactly N times for any
    /// small N: each pass through the loop is one status change, never replayed
    /// and never skipped.
    #[test]
    fn repeat_group_executes_its_member_exactly_n_times(n in 1u32..6) {
        let vertices = vec![
            RawVertex { id: ObjectId::new("loop"), x: 0.0, y: 0.0, w: 800.0, h: 300.0, text: n.to_string(), color: None },
            RawVertex { id: ObjectId::new("call"), x: 50.0, y: 50.0, w: 150.0, h: 100.0, text: "Summarize.".to_string(), color: Some("1".to_string()) },
            RawVertex { id: ObjectId::new("content"), x: 400.0, y: 50.0, w: 150.0, h: 100.0, text: String::new(), color: Some("2".to_string()) },
        ];
        let edges = vec![
            RawEdge { id: ObjectId::new("e-out"), source: ObjectId::new("call"), target: ObjectId::new("content"), label: String::new(), color: None },
            RawEdge { id: ObjectId::new("e-back"), source: ObjectId::new("content"), target: ObjectId::new("call"), label: "running".to_string(), color: None },
        ];

        let settings = RunSettings { mock_mode: true, ..RunSettings::default() };
        let rt = tokio::runtime::Runtime::new().unwrap();
        let summary = rt.block_on(run(&vertices, &edges, mock::mock_capabilities(), settings));

        prop_assert_eq!(summary.reason, StopReason::Complete);
        prop_assert_eq!(summary.executing_counts.get(&ObjectId::new("call")).copied(), Some(n));
    }
}
