use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One config file queued for a batch.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub job_id: String,
    pub config_path: PathBuf,
}

impl BatchJob {
    pub fn new(index: usize, config_path: PathBuf) -> Self {
        let stem = config_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("config");
        BatchJob {
            job_id: format!("{index:04}:{stem}"),
            config_path,
        }
    }
}

/// Outcome of one job as it appears in the batch manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJobRecord {
    pub job_id: String,
    pub config_path: String,
    pub config_name: Option<String>,
    pub config_id: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub exit_code: i32,
    pub objective: Option<f64>,
    pub solve_status: Option<String>,
    #[serde(default)]
    pub best_bound: Option<f64>,
    #[serde(default)]
    pub gap: Option<f64>,
    pub output: Option<String>,
}

impl BatchJobRecord {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    /// Finished, but the solver stopped at its time limit.
    pub fn timed_out(&self) -> bool {
        self.is_ok() && self.solve_status.as_deref() == Some("Timed Out")
    }
}

fn is_config_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Expands directories into their `*.yaml`/`*.yml` files (sorted); files pass through.
pub fn collect_config_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(input)
                .with_context(|| format!("listing config folder '{}'", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_config_file(p))
                .collect();
            found.sort();
            paths.extend(found);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}
