//! dbviz command line.
//!
//! Runs operations and scenarios offline through the same producers the
//! server uses, and prints the resulting traces as text or JSON.

use std::process;

use clap::{Parser, Subcommand};
use serde_json::Value;

use dbviz_core::Trace;
use dbviz_engines::scenarios;

/// Database internals trace visualizer.
#[derive(Parser)]
#[command(name = "dbviz", about = "Run database-internals simulations and print their traces")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List projects and their operations.
    Projects,

    /// List built-in scenarios.
    Scenarios,

    /// Run a built-in scenario.
    Scenario {
        /// Scenario id, e.g. `split-demo`.
        id: String,

        /// Print traces as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run a single operation against a freshly configured structure.
    Run {
        /// Project id: btree, mvcc or query-parser.
        #[arg(short, long)]
        project: String,

        /// Operation kind, e.g. `insert`.
        #[arg(short, long)]
        op: String,

        /// Operation parameters as a JSON object.
        #[arg(long, default_value = "{}")]
        params: String,

        /// Project configuration as a JSON object.
        #[arg(long)]
        config: Option<String>,

        /// Print the trace as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Projects => list_projects(),
        Commands::Scenarios => list_scenarios(),
        Commands::Scenario { id, json } => run_scenario(&id, json),
        Commands::Run {
            project,
            op,
            params,
            config,
            json,
        } => run_operation(&project, &op, &params, config.as_deref(), json),
    };
    process::exit(exit_code);
}

fn list_projects() -> i32 {
    for project in dbviz_engines::projects() {
        let info = project.info;
        println!("{:<14} {}", info.id, info.description);
        println!("{:<14} operations: {}", "", info.operations.join(", "));
    }
    0
}

fn list_scenarios() -> i32 {
    for scenario in scenarios::all() {
        println!("{:<16} {:<14} {}", scenario.id, scenario.project, scenario.name);
    }
    0
}

fn parse_json(label: &str, raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid {label} JSON: {e}"))
}

/// Returns exit code: 0 = success, 1 = bad input, 2 = a trace ended in an
/// error step.
fn run_operation(project: &str, op: &str, params: &str, config: Option<&str>, json: bool) -> i32 {
    let inputs = parse_json("params", params).and_then(|params| {
        let config = config.map_or(Ok(Value::Null), |c| parse_json("config", c))?;
        Ok((params, config))
    });
    let (params, config) = match inputs {
        Ok(inputs) => inputs,
        Err(msg) => {
            eprintln!("Error: {msg}");
            return 1;
        }
    };

    let Some(entry) = dbviz_engines::find_project(project) else {
        eprintln!("Error: unknown project '{project}'");
        return 1;
    };
    let trace = entry
        .create(&config)
        .and_then(|mut sim| sim.execute(op, &params));
    match trace {
        Ok(trace) => print_traces(std::slice::from_ref(&trace), json),
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

fn run_scenario(id: &str, json: bool) -> i32 {
    let Some(scenario) = scenarios::find(id) else {
        eprintln!("Error: unknown scenario '{id}'");
        return 1;
    };
    if !json {
        println!("{} ({})", scenario.name, scenario.project);
        println!("{}", scenario.description);
        println!();
    }
    match scenario.run() {
        Ok(traces) => print_traces(&traces, json),
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

fn print_traces(traces: &[Trace], json: bool) -> i32 {
    if json {
        let out = serde_json::to_string_pretty(traces)
            .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize traces: {e}\"}}"));
        println!("{out}");
    } else {
        for trace in traces {
            println!("== {} {} ({} steps)", trace.project, trace.operation, trace.len());
            for step in trace.steps() {
                let marker = if step.error { "!" } else { " " };
                println!("{marker}[{:>3}] {}: {}", step.index, step.title, step.description);
            }
            println!();
        }
    }
    if traces.iter().any(Trace::failed) {
        2
    } else {
        0
    }
}
