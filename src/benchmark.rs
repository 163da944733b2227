//! Benchmarking module for MEWCP.
//!
//! Runs tabu search plus branch-and-bound on every instance of a directory,
//! collects per-instance records and summarizes them.

use crate::error::Result;
use crate::exact::{solve_with_tabu, SearchConfig, SearchStatus};
use crate::heuristics::TabuConfig;
use crate::instance::WeightModel;

use indicatif::{ProgressBar, ProgressStyle};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Result of solving a single instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceResult {
    /// Instance name
    pub instance: String,
    pub n: usize,
    pub m: usize,
    /// Best value found by tabu search
    pub tabu_value: f64,
    pub tabu_time: f64,
    /// Gap between tabu value and final value, in percent
    pub tabu_gap: f64,
    /// Final incumbent
    pub value: f64,
    /// `optimal` or `time-limit`
    pub status: String,
    pub best_bound_left: Option<f64>,
    pub root_bound: f64,
    pub root_gap: f64,
    pub nodes_explored: u64,
    pub max_depth: usize,
    /// Search time in seconds
    pub time: f64,
    /// Set when the run failed
    pub error: Option<String>,
}

/// Aggregated statistics over all instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkStatistics {
    pub num_instances: usize,
    pub num_optimal: usize,
    pub num_failed: usize,
    pub avg_time: f64,
    pub std_time: f64,
    pub max_time: f64,
    pub avg_nodes: f64,
    pub avg_root_gap: f64,
    pub avg_tabu_gap: f64,
    /// Instances where tabu search already found the final value
    pub tabu_hits: usize,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Tabu iterations per instance
    pub tabu_iterations: usize,
    /// Search settings shared by every instance
    pub search: SearchConfig,
    /// Solve instances in parallel
    pub parallel: bool,
    /// Show a progress bar
    pub progress: bool,
    /// Output directory
    pub output_dir: String,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            tabu_iterations: 10_000,
            search: SearchConfig::default().with_time_limit(600.0),
            parallel: true,
            progress: true,
            output_dir: "results".to_string(),
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<InstanceResult>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
        }
    }

    /// Solve every instance and record the results
    pub fn run_on_instances(&mut self, instances: &[WeightModel]) {
        let bar = if self.config.progress {
            let bar = ProgressBar::new(instances.len() as u64);
            if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}") {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let config = &self.config;
        let solve = |model: &WeightModel| {
            let record = run_instance(model, config);
            bar.set_message(model.name.clone());
            bar.inc(1);
            record
        };

        let mut records: Vec<InstanceResult> = if config.parallel {
            instances.par_iter().map(solve).collect()
        } else {
            instances.iter().map(solve).collect()
        };
        bar.finish_with_message("done");

        self.results.append(&mut records);
    }

    /// Compute statistics over the recorded results
    pub fn compute_statistics(&self) -> BenchmarkStatistics {
        let solved: Vec<&InstanceResult> = self.results.iter().filter(|r| r.error.is_none()).collect();

        let times: Vec<f64> = solved.iter().map(|r| r.time).collect();
        let nodes: Vec<f64> = solved.iter().map(|r| r.nodes_explored as f64).collect();
        let root_gaps: Vec<f64> = solved.iter().map(|r| r.root_gap).collect();
        let tabu_gaps: Vec<f64> = solved.iter().map(|r| r.tabu_gap).collect();

        let average = |values: &[f64]| if values.is_empty() { 0.0 } else { values.mean() };
        let std_time = if times.len() > 1 { times.iter().std_dev() } else { 0.0 };
        let max_time = Iterator::max(times.iter().map(|&t| OrderedFloat(t)))
            .map(|t| t.0)
            .unwrap_or(0.0);

        BenchmarkStatistics {
            num_instances: self.results.len(),
            num_optimal: solved.iter().filter(|r| r.status == SearchStatus::Optimal.to_string()).count(),
            num_failed: self.results.len() - solved.len(),
            avg_time: average(&times),
            std_time,
            max_time,
            avg_nodes: average(&nodes),
            avg_root_gap: average(&root_gaps),
            avg_tabu_gap: average(&tabu_gaps),
            tabu_hits: solved.iter().filter(|r| r.tabu_gap.abs() < 1e-9).count(),
        }
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Write `results.csv` and `report.txt` into the output directory,
    /// creating it if needed. Returns both paths.
    pub fn export_all(&self) -> Result<(PathBuf, PathBuf)> {
        let dir = Path::new(&self.config.output_dir);
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("results.csv");
        self.export_to_csv(&csv_path)?;

        let report_path = dir.join("report.txt");
        fs::write(&report_path, self.generate_report())?;
        log::info!("Benchmark results written to {:?}", dir);
        Ok((csv_path, report_path))
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("        MEWCP Benchmark Report\n");
        report.push_str("========================================\n");
        report.push_str(&format!("Generated: {}\n\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));

        let stats = self.compute_statistics();
        report.push_str(&format!(
            "Instances: {} ({} optimal, {} failed)\n",
            stats.num_instances, stats.num_optimal, stats.num_failed
        ));
        report.push_str(&format!(
            "Time: avg {:.2}s, std {:.2}s, max {:.2}s\n",
            stats.avg_time, stats.std_time, stats.max_time
        ));
        report.push_str(&format!("Avg explored nodes: {:.1}\n", stats.avg_nodes));
        report.push_str(&format!("Avg root gap: {:.2}%\n", stats.avg_root_gap));
        report.push_str(&format!(
            "Avg tabu gap: {:.2}% (tabu optimal on {} instances)\n\n",
            stats.avg_tabu_gap, stats.tabu_hits
        ));

        report.push_str("-".repeat(96).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<24} {:>5} {:>4} {:>12} {:>12} {:>10} {:>10} {:>10} {:>12}\n",
            "Instance", "n", "m", "Tabu", "Value", "Root gap", "Nodes", "Time", "Status"
        ));
        report.push_str("-".repeat(96).as_str());
        report.push('\n');

        let mut sorted: Vec<&InstanceResult> = self.results.iter().collect();
        sorted.sort_by_key(|r| (r.n, OrderedFloat(r.time)));

        for r in sorted {
            match &r.error {
                Some(e) => report.push_str(&format!("{:<24} {:>5} {:>4} error: {}\n", r.instance, r.n, r.m, e)),
                None => report.push_str(&format!(
                    "{:<24} {:>5} {:>4} {:>12.2} {:>12.2} {:>9.2}% {:>10} {:>10.2} {:>12}\n",
                    r.instance, r.n, r.m, r.tabu_value, r.value, r.root_gap, r.nodes_explored, r.time, r.status
                )),
            }
        }
        report.push_str("-".repeat(96).as_str());
        report.push('\n');

        report
    }

    /// Get all results
    pub fn results(&self) -> &[InstanceResult] {
        &self.results
    }
}

/// Solve one instance; failures are recorded in the result rather than returned
pub fn run_instance(model: &WeightModel, config: &BenchmarkConfig) -> InstanceResult {
    log::info!("Running benchmark on instance: {}", model.name);

    let tabu_config = TabuConfig {
        max_iterations: config.tabu_iterations,
        ..Default::default()
    };

    let mut record = InstanceResult {
        instance: model.name.clone(),
        n: model.n,
        m: model.m,
        tabu_value: f64::NEG_INFINITY,
        tabu_time: 0.0,
        tabu_gap: 0.0,
        value: f64::NEG_INFINITY,
        status: String::new(),
        best_bound_left: None,
        root_bound: f64::INFINITY,
        root_gap: 0.0,
        nodes_explored: 0,
        max_depth: 0,
        time: 0.0,
        error: None,
    };

    match solve_with_tabu(model, tabu_config, config.search.clone()) {
        Ok((tabu, result)) => {
            record.tabu_value = tabu.best_value;
            record.tabu_time = tabu.elapsed;
            record.tabu_gap = 100.0 * (result.optimal_value - tabu.best_value) / result.optimal_value.abs().max(1.0);
            record.value = result.optimal_value;
            record.status = result.status.to_string();
            record.best_bound_left = result.best_bound_left;
            record.root_bound = result.root_bound;
            record.root_gap = result.root_gap;
            record.nodes_explored = result.nodes_explored;
            record.max_depth = result.max_depth;
            record.time = result.elapsed;
        }
        Err(e) => {
            log::error!("Search on {} failed: {}", model.name, e);
            record.error = Some(e.to_string());
        }
    }

    record
}

/// Helper function to load instances from a directory
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P) -> Vec<WeightModel> {
    let mut instances = Vec::new();

    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "dat").unwrap_or(false) {
                match WeightModel::from_file(&path) {
                    Ok(instance) => instances.push(instance),
                    Err(e) => log::warn!("Skipping {:?}: {}", path, e),
                }
            }
        }
    }

    // Sort by size, then name
    instances.sort_by(|a, b| a.n.cmp(&b.n).then_with(|| a.name.cmp(&b.name)));

    instances
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> BenchmarkConfig {
        BenchmarkConfig {
            tabu_iterations: 200,
            parallel: false,
            progress: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.tabu_iterations, 10_000);
        assert!(config.search.use_combinatorial);
    }

    #[test]
    fn test_run_and_summarize() {
        let instances: Vec<WeightModel> = (0..3)
            .map(|seed| WeightModel::random(12, 3, 20, seed).unwrap())
            .collect();
        let mut benchmark = Benchmark::new(quiet_config());
        benchmark.run_on_instances(&instances);

        assert_eq!(benchmark.results().len(), 3);
        for r in benchmark.results() {
            assert!(r.error.is_none());
            assert_eq!(r.status, "optimal");
            assert!(r.value + 1e-9 >= r.tabu_value);
            assert!(r.tabu_gap >= -1e-9);
        }

        let stats = benchmark.compute_statistics();
        assert_eq!(stats.num_instances, 3);
        assert_eq!(stats.num_optimal, 3);
        assert_eq!(stats.num_failed, 0);

        let report = benchmark.generate_report();
        assert!(report.contains("MEWCP Benchmark Report"));
        assert!(report.contains("random_n12_m3_s0"));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let instances: Vec<WeightModel> = (0..4)
            .map(|seed| WeightModel::random(10, 2, 30, seed).unwrap())
            .collect();

        let mut sequential = Benchmark::new(quiet_config());
        sequential.run_on_instances(&instances);
        let mut parallel = Benchmark::new(BenchmarkConfig {
            parallel: true,
            ..quiet_config()
        });
        parallel.run_on_instances(&instances);

        for (a, b) in sequential.results().iter().zip(parallel.results()) {
            assert_eq!(a.instance, b.instance);
            assert_eq!(a.value, b.value);
        }
    }

    #[test]
    fn test_export_all_writes_into_output_dir() {
        let dir = std::env::temp_dir().join(format!("mewcp_bench_{}", std::process::id()));
        let instances = vec![WeightModel::random(8, 2, 10, 1).unwrap()];
        let mut benchmark = Benchmark::new(BenchmarkConfig {
            output_dir: dir.to_string_lossy().to_string(),
            ..quiet_config()
        });
        benchmark.run_on_instances(&instances);

        let (csv_path, report_path) = benchmark.export_all().unwrap();
        assert_eq!(csv_path, dir.join("results.csv"));
        assert_eq!(report_path, dir.join("report.txt"));

        let csv_text = fs::read_to_string(&csv_path).unwrap();
        assert_eq!(csv_text.lines().count(), 2);
        assert!(csv_text.starts_with("instance,"));
        let report = fs::read_to_string(&report_path).unwrap();
        assert!(report.contains("random_n8_m2_s1"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_statistics() {
        let benchmark = Benchmark::new(quiet_config());
        let stats = benchmark.compute_statistics();
        assert_eq!(stats.num_instances, 0);
        assert_eq!(stats.avg_time, 0.0);
    }
}
