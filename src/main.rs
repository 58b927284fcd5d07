//! isel command-line entry point.

mod cli;

use std::path::Path;

use clap::Parser;
use cli::{Cli, Command};
use isel_ir::{Graph, node_name, parse_graph, validate};
use isel_match::{PassOptions, PassStats, RuleSet, RuleTable, Selection, SelectionPass, parse_pattern};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Parse { pattern } => parse_command(&pattern),
        Command::Check { rules } => check_command(&rules),
        Command::Select {
            rules,
            graph,
            no_retry,
        } => select_command(&rules, &graph, no_retry),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

fn parse_command(source: &str) {
    match parse_pattern(source) {
        Ok(pattern) => {
            println!("{pattern}");
            println!("specificity: {}", pattern.node_count());
        }
        Err(e) => {
            eprintln!("{source}");
            eprintln!("{:>width$}", "^", width = e.offset + 1);
            fail(e);
        }
    }
}

fn load_rules(path: &Path) -> RuleSet {
    let table = RuleTable::load(path).unwrap_or_else(|e| fail(e));
    table.compile().unwrap_or_else(|e| fail(e))
}

fn check_command(path: &Path) {
    let rules = load_rules(path);
    let registry = rules.registry();
    for kind in rules.kinds() {
        if registry.contains(kind) {
            println!("{kind}:");
        } else {
            println!("{kind} (unregistered):");
        }
        for (rank, rule) in rules.rules_for(kind).iter().enumerate() {
            println!(
                "  {rank}. {} {} (specificity {})",
                rule.action, rule.pattern, rule.specificity
            );
        }
    }
    let mode = if registry.is_open() { "open" } else { "closed" };
    println!(
        "{} rules, {} registered kinds ({mode})",
        rules.len(),
        registry.len()
    );
}

fn select_command(rules_path: &Path, graph_path: &Path, no_retry: bool) {
    let rules = load_rules(rules_path);
    let text = std::fs::read_to_string(graph_path)
        .unwrap_or_else(|e| fail(format!("cannot read {}: {e}", graph_path.display())));
    let parsed = parse_graph(&text).unwrap_or_else(|e| fail(e));
    tracing::debug!(
        blocks = parsed.graph.num_blocks(),
        nodes = parsed.graph.num_nodes(),
        "graph loaded"
    );
    if let Err(errors) = validate(&parsed.graph) {
        for e in &errors {
            eprintln!("{e}");
        }
        fail(format!("{} graph invariant violations", errors.len()));
    }

    let pass = SelectionPass::new(&rules).with_options(PassOptions {
        retry_on_conflict: !no_retry,
    });
    let mut total = PassStats::default();
    for block in pass.run_graph(&parsed.graph) {
        println!("^{}:", parsed.graph.block(block.block).label);
        for selection in &block.selections {
            println!("  {}", describe(&parsed.graph, selection));
        }
        total += block.stats;
    }
    println!(
        "fused {}, absorbed {}, standalone {}, conflicts {}, attempts {}",
        total.fused, total.absorbed, total.standalone, total.conflicts, total.attempts
    );
}

fn describe(graph: &Graph, selection: &Selection) -> String {
    match selection {
        Selection::Fused(m) => {
            let bindings: Vec<String> = m
                .bindings
                .iter()
                .map(|(name, n)| format!("{name}={}", node_name(graph, n)))
                .collect();
            let consumed: Vec<String> = m.consumed.iter().map(|&n| node_name(graph, n)).collect();
            format!(
                "{} => {} {{{}}} [{}]",
                node_name(graph, m.root),
                m.action,
                bindings.join(", "),
                consumed.join(", ")
            )
        }
        Selection::Standalone(n) => format!("{} standalone", node_name(graph, *n)),
    }
}
