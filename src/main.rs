//! MEWCP Solver - Command Line Interface
//!
//! Exact solver for the Maximum Edge-Weighted Clique Problem with partition
//! constraints.

use clap::{Parser, Subcommand};
use mewcp_solver::benchmark::{load_instances_from_dir, Benchmark, BenchmarkConfig};
use mewcp_solver::exact::{
    combinatorial_bound, residual_space_within, BlockedSet, CombinatorialRelaxation, SearchConfig, SearchResult,
    SearchTree, Subproblem,
};
use mewcp_solver::heuristics::{TabuConfig, TabuResult, TabuSearch};
use mewcp_solver::instance::WeightModel;
use mewcp_solver::EPSILON;

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mewcp-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Branch-and-bound solver for the Maximum Edge-Weighted Clique Problem")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance: tabu search, then branch-and-bound
    Solve {
        /// Tabu search iterations
        iterations: usize,

        /// Path to the .dat instance
        instance: PathBuf,

        /// Append the result line to this file
        output: Option<PathBuf>,

        /// Time limit in seconds
        #[arg(short, long, default_value = "3600")]
        time_limit: f64,

        /// Disable the combinatorial bound
        #[arg(long)]
        no_combinatorial: bool,

        /// Disable root preprocessing
        #[arg(long)]
        no_preprocessing: bool,

        /// Disable explicit enumeration of small subproblems
        #[arg(long)]
        no_enumeration: bool,

        /// Largest residual space solved by enumeration
        #[arg(long, default_value = "500000")]
        enumeration_limit: u64,

        /// Only bound the root node
        #[arg(long)]
        root_only: bool,

        /// Write the full result as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run benchmarks on a directory of instances
    Benchmark {
        /// Directory containing .dat files
        #[arg(short, long)]
        dir: PathBuf,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Tabu search iterations per instance
        #[arg(short, long, default_value = "10000")]
        iterations: usize,

        /// Time limit per instance
        #[arg(short, long, default_value = "600")]
        time_limit: f64,

        /// Solve instances one at a time
        #[arg(long)]
        sequential: bool,

        /// Maximum instance size
        #[arg(long)]
        max_size: Option<usize>,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the .dat instance
        #[arg(short, long)]
        instance: PathBuf,
    },

    /// Generate a random instance
    Generate {
        /// Number of vertices
        #[arg(short, long)]
        n: usize,

        /// Number of partitions
        #[arg(short, long)]
        m: usize,

        /// Weights are drawn from 0..=max_weight
        #[arg(long, default_value = "100")]
        max_weight: u32,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Output .dat file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct JsonReport<'a> {
    instance: &'a str,
    n: usize,
    m: usize,
    tabu: &'a TabuResult,
    search: &'a SearchResult,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            iterations,
            instance,
            output,
            time_limit,
            no_combinatorial,
            no_preprocessing,
            no_enumeration,
            enumeration_limit,
            root_only,
            json,
            verbose,
        } => {
            let config = SearchConfig {
                time_limit,
                enumeration_limit,
                use_combinatorial: !no_combinatorial,
                use_preprocessing: !no_preprocessing,
                use_enumeration: !no_enumeration,
                verbose,
                ..Default::default()
            };
            solve_instance(&instance, iterations, config, root_only, output, json, verbose);
        }

        Commands::Benchmark {
            dir,
            output,
            iterations,
            time_limit,
            sequential,
            max_size,
        } => {
            run_benchmark(&dir, &output, iterations, time_limit, sequential, max_size);
        }

        Commands::Analyze { instance } => {
            analyze_instance(&instance);
        }

        Commands::Generate {
            n,
            m,
            max_weight,
            seed,
            output,
        } => {
            generate_instance(n, m, max_weight, seed, &output);
        }
    }
}

fn load_or_exit(path: &Path) -> WeightModel {
    match WeightModel::from_file(path) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Error loading instance: {}", e);
            std::process::exit(1);
        }
    }
}

fn solve_instance(
    path: &Path,
    iterations: usize,
    config: SearchConfig,
    root_only: bool,
    output: Option<PathBuf>,
    json: Option<PathBuf>,
    verbose: bool,
) {
    println!("Loading instance from {:?}...", path);
    let model = load_or_exit(path);

    if verbose {
        println!("{}", model.statistics());
    }

    let tabu_config = TabuConfig {
        max_iterations: iterations,
        ..Default::default()
    };
    let tabu = TabuSearch::with_config(tabu_config).run(&model);
    println!(
        "Tabu search: {:.2} (last improvement at iteration {}, {:.4}s)",
        tabu.best_value, tabu.last_improvement_iteration, tabu.elapsed
    );

    let time_limit = if root_only {
        Duration::ZERO
    } else {
        config.time_limit_duration()
    };
    let oracle = CombinatorialRelaxation::new(&model, config.epsilon);
    let mut tree = SearchTree::new(&model, oracle, config);
    let result = match tree.run(
        Subproblem::root(model.n),
        tabu.best_value,
        tabu.best_selection.clone(),
        time_limit,
    ) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Search failed: {}", e);
            std::process::exit(1);
        }
    };

    let line = if root_only {
        format!(
            "{}\tRoot_node DB_comb: {}\tDB_relax: {}\tPB: {:.2}\tt_root: {:.2}",
            model.name,
            result
                .root_combinatorial_bound
                .map(|b| format!("{:.2}", b))
                .unwrap_or_else(|| "-".to_string()),
            result
                .root_relaxation_bound
                .map(|b| format!("{:.2}", b))
                .unwrap_or_else(|| "-".to_string()),
            result.root_primal,
            result.root_time
        )
    } else {
        result.summary_line(&model.name)
    };

    println!("\n========== Results ==========");
    println!("{}", line);
    match result.solution(&model) {
        Ok(solution) => println!("\n{}", solution),
        Err(e) => println!("\nNo solution: {}", e),
    }
    if verbose {
        println!("Nodes pruned: {}", result.nodes_pruned);
        println!("Nodes enumerated: {}", result.nodes_enumerated);
        println!("Oracle calls: {}", result.oracle_calls);
        println!("Incumbent updates: {}", result.incumbent_updates);
        println!("Vertices blocked by preprocessing: {}", result.preprocessing_blocked);
    }

    if let Some(out_path) = output {
        let appended = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&out_path)
            .and_then(|mut file| writeln!(file, "{}", line));
        if let Err(e) = appended {
            eprintln!("Cannot write {:?}: {}", out_path, e);
            std::process::exit(1);
        }
        println!("\nResult appended to {:?}", out_path);
    }

    if let Some(json_path) = json {
        let report = JsonReport {
            instance: &model.name,
            n: model.n,
            m: model.m,
            tabu: &tabu,
            search: &result,
        };
        let written = serde_json::to_string_pretty(&report)
            .map_err(|e| e.to_string())
            .and_then(|text| std::fs::write(&json_path, text).map_err(|e| e.to_string()));
        if let Err(e) = written {
            eprintln!("Cannot write {:?}: {}", json_path, e);
            std::process::exit(1);
        }
        println!("JSON report saved to {:?}", json_path);
    }
}

fn run_benchmark(
    dir: &Path,
    output: &Path,
    iterations: usize,
    time_limit: f64,
    sequential: bool,
    max_size: Option<usize>,
) {
    println!("Loading instances from {:?}...", dir);

    let mut instances = load_instances_from_dir(dir);

    if let Some(max) = max_size {
        instances.retain(|i| i.n <= max);
    }

    println!("Found {} instances", instances.len());

    if instances.is_empty() {
        eprintln!("No instances found!");
        return;
    }

    let config = BenchmarkConfig {
        tabu_iterations: iterations,
        search: SearchConfig::default().with_time_limit(time_limit),
        parallel: !sequential,
        output_dir: output.to_string_lossy().to_string(),
        ..Default::default()
    };

    let mut benchmark = Benchmark::new(config);
    benchmark.run_on_instances(&instances);

    println!("\n{}", benchmark.generate_report());

    match benchmark.export_all() {
        Ok((results_path, report_path)) => {
            println!("Results exported to {:?}", results_path);
            println!("Report saved to {:?}", report_path);
        }
        Err(e) => {
            eprintln!("Failed to export results: {}", e);
            std::process::exit(1);
        }
    }
}

fn analyze_instance(path: &Path) {
    let model = load_or_exit(path);

    println!("========== Instance Analysis ==========\n");
    println!("{}", model.statistics());

    let blocked = BlockedSet::new(model.n);
    let bound = combinatorial_bound(&model, &blocked, EPSILON);
    let tabu = TabuSearch::with_params(1000, 8, 1, 1000).run(&model);

    println!("Quick Estimates:");
    println!("  Combinatorial bound: {:.2}", bound.dual_bound);
    println!("  Combinatorial rounding: {:.2}", bound.primal_value);
    println!("  Tabu search (1000 it.): {:.2}", tabu.best_value);
    let gap = 100.0 * (bound.dual_bound - tabu.best_value) / tabu.best_value.abs().max(1.0);
    println!("  Root gap estimate: {:.2}%", gap);
    println!(
        "  Enumerable at root: {}",
        residual_space_within(&model, &blocked, SearchConfig::default().enumeration_limit)
    );
}

fn generate_instance(n: usize, m: usize, max_weight: u32, seed: u64, output: &Path) {
    let model = match WeightModel::random(n, m, max_weight, seed) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Cannot generate instance: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = model.write_dat(output) {
        eprintln!("Cannot write {:?}: {}", output, e);
        std::process::exit(1);
    }
    println!("Instance {} (n={}, m={}) saved to {:?}", model.name, n, m, output);
}
