//! Cannoli CLI - standalone driver for running a graph fixture.
//!
//! Main entry point for the cannoli-run command-line tool.

use cannoli_engine::graph::{RawEdge, RawVertex};
use cannoli_engine::{mock, run, RunSettings};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cannoli-run")]
#[command(about = "Runs a Cannoli graph fixture against the engine", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a graph fixture file (JSON: `{"vertices": [...], "edges": [...]}`)
    Run {
        /// Path to the graph fixture
        graph: PathBuf,
        /// Optional run settings file (TOML or YAML)
        #[arg(short, long)]
        settings: Option<PathBuf>,
        /// Force mock mode regardless of what the settings file says
        #[arg(long)]
        mock: bool,
    },
    /// Run the built-in linear-call demo fixture under mock mode
    Demo,
    /// Show version information
    Version,
}

#[derive(serde::Deserialize)]
struct GraphFixture {
    vertices: Vec<RawVertex>,
    edges: Vec<RawEdge>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Demo) {
        Commands::Version => {
            println!("cannoli-run {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Demo => {
            let (vertices, edges) = demo_fixture();
            let settings = RunSettings {
                mock_mode: true,
                ..RunSettings::default()
            };
            let summary = run(&vertices, &edges, mock::mock_capabilities(), settings).await;
            print_summary(&summary);
            Ok(())
        }
        Commands::Run { graph, settings, mock: force_mock } => {
            let raw = std::fs::read_to_string(&graph)?;
            let fixture: GraphFixture = serde_json::from_str(&raw)?;

            let mut run_settings = match settings {
                Some(path) => RunSettings::from_file(path)?,
                None => RunSettings::default(),
            };
            if force_mock {
                run_settings.mock_mode = true;
            }

            // This binary only ships `MockLlmProvider`/`MockVault`/
            // `MockHttpTemplateExecutor`; a real run needs a host to construct
            // `Capabilities` with its own provider (spec §6, "capabilities are
            // the engine's only door to the outside world"). Refuse rather than
            // silently running a non-mock settings file against mocked calls.
            if !run_settings.mock_mode {
                anyhow::bail!(
                    "no live Capabilities wired into cannoli-run; pass --mock or set mock_mode: true"
                );
            }
            let caps = mock::mock_capabilities();
            let summary = run(&fixture.vertices, &fixture.edges, caps, run_settings).await;
            print_summary(&summary);
            if matches!(summary.reason, cannoli_engine::StopReason::Error) {
                anyhow::bail!("run ended in error: {:?}", summary.message);
            }
            Ok(())
        }
    }
}

fn print_summary(summary: &cannoli_engine::RunSummary) {
    println!("reason: {:?}", summary.reason);
    println!(
        "usage: {} prompt + {} completion tokens across {} calls (${:.4})",
        summary.usage.prompt_tokens, summary.usage.completion_tokens, summary.usage.call_count, summary.total_cost
    );
    if let Some(message) = &summary.message {
        println!("message: {}", message);
    }
    for (id, text) in &summary.output_text {
        println!("output[{}]: {}", id, text);
    }
    for (id, warnings) in &summary.warnings {
        for warning in warnings {
            println!("warning[{}]: {}", id, warning);
        }
    }
}

/// A single Call node rendering a constant prompt straight into a Content node,
/// used to sanity-check a fresh build without needing an external fixture file.
fn demo_fixture() -> (Vec<RawVertex>, Vec<RawEdge>) {
    let vertices = vec![
        RawVertex {
            id: "call-1".into(),
            x: 0.0,
            y: 0.0,
            w: 200.0,
            h: 100.0,
            text: "Say hello to the class.".to_string(),
            color: Some("1".to_string()),
        },
        RawVertex {
            id: "content-1".into(),
            x: 300.0,
            y: 0.0,
            w: 200.0,
            h: 100.0,
            text: String::new(),
            color: Some("2".to_string()),
        },
    ];
    let edges = vec![RawEdge {
        id: "edge-1".into(),
        source: "call-1".into(),
        target: "content-1".into(),
        label: String::new(),
        color: None,
    }];
    (vertices, edges)
}
