use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::Path;

use crate::job::BatchJobRecord;

/// How the finished jobs' solves ended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveTally {
    pub optimal: usize,
    pub timed_out: usize,
    /// Largest relative gap over the finished jobs
    pub max_gap: Option<f64>,
    pub mean_gap: Option<f64>,
    /// Sum of the finished jobs' objectives
    pub total_objective: f64,
}

impl SolveTally {
    pub fn from_jobs(jobs: &[BatchJobRecord]) -> Self {
        let mut tally = SolveTally::default();
        let mut gaps = Vec::new();
        for job in jobs.iter().filter(|j| j.is_ok()) {
            if job.timed_out() {
                tally.timed_out += 1;
            } else {
                tally.optimal += 1;
            }
            tally.total_objective += job.objective.unwrap_or(0.0);
            gaps.extend(job.gap);
        }
        tally.max_gap = gaps.iter().copied().reduce(f64::max);
        if !gaps.is_empty() {
            tally.mean_gap = Some(gaps.iter().sum::<f64>() / gaps.len() as f64);
        }
        tally
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchManifest {
    pub created_at: DateTime<Utc>,
    pub sink: String,
    pub num_jobs: usize,
    pub success: usize,
    pub failure: usize,
    #[serde(default)]
    pub solves: SolveTally,
    pub jobs: Vec<BatchJobRecord>,
}

impl BatchManifest {
    pub fn new(sink: &str, jobs: Vec<BatchJobRecord>) -> Self {
        let success = jobs.iter().filter(|job| job.is_ok()).count();
        BatchManifest {
            created_at: Utc::now(),
            sink: sink.to_string(),
            num_jobs: jobs.len(),
            success,
            failure: jobs.len() - success,
            solves: SolveTally::from_jobs(&jobs),
            jobs,
        }
    }
}

pub fn write_batch_manifest(path: &Path, manifest: &BatchManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(manifest).context("serializing batch manifest to JSON")?;
    fs::write(path, json)
        .with_context(|| format!("writing batch manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_batch_manifest(path: &Path) -> Result<BatchManifest> {
    let file = File::open(path)
        .with_context(|| format!("opening batch manifest '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing batch manifest '{}'", path.display()))
}
