//! Module for parsing and representing MEWCP instances.
//!
//! An instance is a symmetric weight matrix over `n` vertices split into `m`
//! partitions of equal size `c = n / m`. Vertex `i` belongs to partition `i / c`.
//! Diagonal entries are vertex weights, off-diagonal entries edge weights.
//!
//! Instances are read from AMPL-style `.dat` files:
//!
//! ```text
//! param n := 6 ;
//! param m := 2 ;
//! set V[1] := 1 2 3 ;
//! set V[2] := 4 5 6 ;
//! param w :=
//! [1,1] 3
//! [2,1] 0   [2,2] 1
//! ...
//! ;
//! ```
//!
//! Only the `param n`, `param m` and bracketed `[i,j] w` entries (1-based, lower
//! triangle) are interpreted; every other token is ignored.

use std::fs;
use std::ops::Range;
use std::path::Path;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{MewcpError, Result};

/// Symmetric weight matrix together with its partition metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightModel {
    /// Name of the instance (file stem when loaded from disk)
    pub name: String,
    /// Number of vertices
    pub n: usize,
    /// Number of partitions
    pub m: usize,
    /// Partition size
    pub c: usize,
    weights: Vec<Vec<f64>>,
}

impl WeightModel {
    /// Build a model from a full square matrix.
    ///
    /// Fails when the matrix is not square, not symmetric, or when `n` is not a
    /// positive multiple of `m`.
    pub fn from_matrix(name: &str, m: usize, weights: Vec<Vec<f64>>) -> Result<Self> {
        let n = weights.len();
        if n == 0 || m == 0 {
            return Err(MewcpError::InvalidInstance(format!(
                "n and m must be positive (n={}, m={})",
                n, m
            )));
        }
        if n % m != 0 {
            return Err(MewcpError::InvalidInstance(format!(
                "n={} is not a multiple of m={}",
                n, m
            )));
        }
        for (i, row) in weights.iter().enumerate() {
            if row.len() != n {
                return Err(MewcpError::InvalidInstance(format!(
                    "row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
        }
        for i in 0..n {
            for j in 0..i {
                if (weights[i][j] - weights[j][i]).abs() > 1e-9 {
                    return Err(MewcpError::InvalidInstance(format!(
                        "asymmetric weights at ({}, {}): {} vs {}",
                        i, j, weights[i][j], weights[j][i]
                    )));
                }
            }
        }

        Ok(WeightModel {
            name: name.to_string(),
            n,
            m,
            c: n / m,
            weights,
        })
    }

    /// Parse an instance from an AMPL `.dat` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "instance".to_string());
        Self::from_dat_str(&name, &text)
    }

    /// Parse an instance from the textual content of a `.dat` file
    pub fn from_dat_str(name: &str, text: &str) -> Result<Self> {
        let tokens = tokenize(text);

        let mut n: Option<usize> = None;
        let mut m: Option<usize> = None;
        let mut entries: Vec<(usize, usize, usize, f64)> = Vec::new();

        let mut pos = 0;
        while pos < tokens.len() {
            let (line, tok) = (tokens[pos].0, tokens[pos].1.as_str());

            if tok == "param" && pos + 3 < tokens.len() && tokens[pos + 2].1 == ":=" {
                let target = match tokens[pos + 1].1.as_str() {
                    "n" => Some(&mut n),
                    "m" => Some(&mut m),
                    _ => None,
                };
                if let Some(slot) = target {
                    let (value_line, value) = &tokens[pos + 3];
                    let parsed: usize = value.parse().map_err(|_| {
                        MewcpError::parse(*value_line, format!("invalid integer '{}'", value))
                    })?;
                    *slot = Some(parsed);
                    pos += 4;
                    continue;
                }
            }

            if tok.starts_with('[') {
                let (i, j) = parse_index_pair(line, tok)?;
                let (value_line, value) = tokens
                    .get(pos + 1)
                    .ok_or_else(|| MewcpError::parse(line, format!("missing weight after {}", tok)))?;
                let w: f64 = value.parse().map_err(|_| {
                    MewcpError::parse(*value_line, format!("invalid weight '{}'", value))
                })?;
                entries.push((line, i, j, w));
                pos += 2;
                continue;
            }

            pos += 1;
        }

        let n = n.ok_or_else(|| MewcpError::InvalidInstance("missing 'param n'".to_string()))?;
        let m = m.ok_or_else(|| MewcpError::InvalidInstance("missing 'param m'".to_string()))?;

        let mut weights = vec![vec![0.0; n]; n];
        let mut seen = vec![vec![false; n]; n];
        for (line, i, j, w) in entries {
            if i == 0 || j == 0 || i > n || j > n {
                return Err(MewcpError::parse(
                    line,
                    format!("index [{},{}] outside 1..={}", i, j, n),
                ));
            }
            let (a, b) = (i - 1, j - 1);
            if seen[a][b] && (weights[a][b] - w).abs() > 1e-9 {
                return Err(MewcpError::InvalidInstance(format!(
                    "asymmetric weights at [{},{}]: {} vs {}",
                    i, j, weights[a][b], w
                )));
            }
            weights[a][b] = w;
            weights[b][a] = w;
            seen[a][b] = true;
            seen[b][a] = true;
        }

        Self::from_matrix(name, m, weights)
    }

    /// Generate a random instance with integer weights in `0..=max_weight`.
    /// Deterministic via seed.
    pub fn random(n: usize, m: usize, max_weight: u32, seed: u64) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut weights = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..=i {
                let w = rng.gen_range(0..=max_weight) as f64;
                weights[i][j] = w;
                weights[j][i] = w;
            }
        }
        Self::from_matrix(&format!("random_n{}_m{}_s{}", n, m, seed), m, weights)
    }

    /// Weight between `i` and `j` (vertex weight when `i == j`)
    #[inline]
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.weights[i][j]
    }

    /// Row of weights incident to `i`
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.weights[i]
    }

    #[inline]
    pub fn partition_of(&self, vertex: usize) -> usize {
        vertex / self.c
    }

    /// Vertex range `[k*c, k*c + c)` of partition `k`
    #[inline]
    pub fn partition_range(&self, k: usize) -> Range<usize> {
        k * self.c..(k + 1) * self.c
    }

    /// Objective of a selection: vertex weights plus every edge among selected
    /// vertices, each pair counted once.
    pub fn evaluate(&self, selection: &[usize]) -> f64 {
        let mut value = 0.0;
        for (a, &u) in selection.iter().enumerate() {
            value += self.weights[u][u];
            for &v in &selection[..a] {
                value += self.weights[u][v];
            }
        }
        value
    }

    /// Check that `selection[k]` is a vertex of partition `k` for every `k`
    pub fn check_selection(&self, selection: &[usize]) -> Result<()> {
        if selection.len() != self.m {
            return Err(MewcpError::InvalidSelection(format!(
                "expected {} vertices, got {}",
                self.m,
                selection.len()
            )));
        }
        for (k, &v) in selection.iter().enumerate() {
            if v >= self.n || self.partition_of(v) != k {
                return Err(MewcpError::InvalidSelection(format!(
                    "vertex {} is not in partition {}",
                    v, k
                )));
            }
        }
        Ok(())
    }

    /// Render the instance in the `.dat` format read by [`WeightModel::from_dat_str`]
    pub fn to_dat_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("param n := {} ;\n", self.n));
        out.push_str(&format!("param m := {} ;\n", self.m));
        for k in 0..self.m {
            let members: Vec<String> = self
                .partition_range(k)
                .map(|v| (v + 1).to_string())
                .collect();
            out.push_str(&format!("set V[{}] := {} ;\n", k + 1, members.join(" ")));
        }
        out.push_str("param w :=\n");
        for i in 0..self.n {
            let row: Vec<String> = (0..=i)
                .map(|j| format!("[{},{}] {}", i + 1, j + 1, self.weights[i][j]))
                .collect();
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        out.push_str(";\n");
        out
    }

    /// Write the instance to a `.dat` file
    pub fn write_dat<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_dat_string())?;
        Ok(())
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let vertex_weights: Vec<f64> = (0..self.n).map(|i| self.weights[i][i]).collect();

        let mut edge_weights: Vec<f64> = Vec::new();
        for i in 0..self.n {
            for j in 0..i {
                if self.partition_of(i) != self.partition_of(j) {
                    edge_weights.push(self.weights[i][j]);
                }
            }
        }

        let (min_vertex, max_vertex, avg_vertex) = summarize(&vertex_weights);
        let (min_edge, max_edge, avg_edge) = summarize(&edge_weights);
        let nonzero = edge_weights.iter().filter(|w| w.abs() > 0.0).count();
        let density = if edge_weights.is_empty() {
            0.0
        } else {
            nonzero as f64 / edge_weights.len() as f64
        };

        InstanceStatistics {
            name: self.name.clone(),
            n: self.n,
            m: self.m,
            c: self.c,
            search_space: (self.c as f64).powi(self.m as i32),
            min_vertex_weight: min_vertex,
            max_vertex_weight: max_vertex,
            avg_vertex_weight: avg_vertex,
            min_edge_weight: min_edge,
            max_edge_weight: max_edge,
            avg_edge_weight: avg_edge,
            edge_density: density,
        }
    }
}

/// Split the text into `(line, token)` pairs. `;` always stands alone and
/// whitespace inside brackets is dropped so `[1, 2]` reads as `[1,2]`.
fn tokenize(text: &str) -> Vec<(usize, String)> {
    let mut tokens = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let content = raw.split('#').next().unwrap_or("");
        let mut current = String::new();
        let mut in_brackets = false;
        for ch in content.chars() {
            match ch {
                '[' => {
                    in_brackets = true;
                    current.push(ch);
                }
                ']' => {
                    in_brackets = false;
                    current.push(ch);
                }
                ';' => {
                    if !current.is_empty() {
                        tokens.push((line, std::mem::take(&mut current)));
                    }
                    tokens.push((line, ";".to_string()));
                }
                c if c.is_whitespace() => {
                    if !in_brackets && !current.is_empty() {
                        tokens.push((line, std::mem::take(&mut current)));
                    }
                }
                _ => current.push(ch),
            }
        }
        if !current.is_empty() {
            tokens.push((line, current));
        }
    }
    tokens
}

fn parse_index_pair(line: usize, token: &str) -> Result<(usize, usize)> {
    let inner = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| MewcpError::parse(line, format!("malformed index '{}'", token)))?;
    let mut parts = inner.split(',');
    let mut next_index = || -> Result<usize> {
        parts
            .next()
            .and_then(|p| p.trim().parse().ok())
            .ok_or_else(|| MewcpError::parse(line, format!("malformed index '{}'", token)))
    };
    let i = next_index()?;
    let j = next_index()?;
    Ok((i, j))
}

fn summarize(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    (min, max, avg)
}

/// Statistics about a MEWCP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub n: usize,
    pub m: usize,
    pub c: usize,
    /// Number of feasible selections, `c^m`
    pub search_space: f64,
    pub min_vertex_weight: f64,
    pub max_vertex_weight: f64,
    pub avg_vertex_weight: f64,
    /// Edge figures only cover pairs in different partitions
    pub min_edge_weight: f64,
    pub max_edge_weight: f64,
    pub avg_edge_weight: f64,
    pub edge_density: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Vertices: {} ({} partitions of {})", self.n, self.m, self.c)?;
        writeln!(f, "  Feasible selections: {:.3e}", self.search_space)?;
        writeln!(
            f,
            "  Vertex weights: min {:.2}, max {:.2}, avg {:.2}",
            self.min_vertex_weight, self.max_vertex_weight, self.avg_vertex_weight
        )?;
        writeln!(
            f,
            "  Edge weights: min {:.2}, max {:.2}, avg {:.2}",
            self.min_edge_weight, self.max_edge_weight, self.avg_edge_weight
        )?;
        writeln!(f, "  Edge density: {:.2}%", self.edge_density * 100.0)
    }
}
