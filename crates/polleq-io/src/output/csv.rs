use anyhow::{Context, Result};
use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use polleq_core::{ResultTables, RunConfig, RunRecord};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::frames::{edes_frame, results_frame, summary_frame};
use super::{ResultSink, TABLE_NAMES};
use crate::paths::ensure_dir;

/// Writes `{root}/{config_set}/{config_name}_{table}.csv`.
#[derive(Debug, Clone)]
pub struct CsvSink {
    root: PathBuf,
}

impl CsvSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn run_dir(&self, config: &RunConfig) -> PathBuf {
        self.root.join(&config.config_set)
    }

    pub fn table_path(&self, config: &RunConfig, table: &str) -> PathBuf {
        self.run_dir(config)
            .join(format!("{}_{table}.csv", config.config_name))
    }
}

fn write_frame(path: &Path, df: &mut DataFrame) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("creating '{}'", path.display()))?;
    CsvWriter::new(&mut file)
        .finish(df)
        .map_err(|e| anyhow::anyhow!("Failed to write CSV '{}': {}", path.display(), e))
}

impl ResultSink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn write(&self, record: &RunRecord, tables: &ResultTables) -> Result<String> {
        let config = &record.config;
        let dir = self.run_dir(config);
        ensure_dir(&dir)?;

        let mut frames = [
            results_frame(&tables.results)?,
            summary_frame("id_dest", &tables.precinct_distances)?,
            summary_frame("id_orig", &tables.residence_distances)?,
            edes_frame(&tables.edes)?,
        ];

        let mut staged = Vec::with_capacity(TABLE_NAMES.len());
        for (table, df) in TABLE_NAMES.iter().zip(frames.iter_mut()) {
            let target = self.table_path(config, table);
            let tmp = target.with_extension("csv.tmp");
            if let Err(err) = write_frame(&tmp, df) {
                for (tmp, _) in &staged {
                    let _ = fs::remove_file(tmp);
                }
                let _ = fs::remove_file(&tmp);
                return Err(err);
            }
            staged.push((tmp, target));
        }
        for (tmp, target) in staged {
            fs::rename(&tmp, &target)
                .with_context(|| format!("moving '{}' into place", target.display()))?;
        }
        info!(dir = %dir.display(), config = %config.config_name, "wrote result tables");
        Ok(dir.display().to_string())
    }

    fn record_failure(&self, config: &RunConfig, error: &str) -> Result<()> {
        warn!(config = %config.config_name, error, "run failed; no CSV tables written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polleq_core::{DistanceSummaryRow, EdeRow};
    use tempfile::tempdir;

    fn config() -> RunConfig {
        RunConfig::from_str_any(
            "location: testing\nyear: [2020]\nbeta: 0\ntime_limit: 10\ncapacity: 1.5\n\
             precincts_open: 2\nmaxpctnew: 1\nminpctold: 0\nmax_min_mult: 1\n\
             config_set: testing_configs\nconfig_name: testing_base\n",
        )
        .unwrap()
    }

    #[test]
    fn writes_four_tables_into_config_set_folder() {
        let dir = tempdir().unwrap();
        let sink = CsvSink::new(dir.path());
        let cfg = config();
        let record = RunRecord {
            config_id: cfg.config_id(),
            config: cfg.clone(),
            solve_status: "Optimal".into(),
            objective: 1.0,
            best_bound: Some(1.0),
            gap: Some(0.0),
            alpha: 0.001,
            penalty: None,
            elapsed_secs: 0.1,
        };
        let tables = ResultTables {
            precinct_distances: vec![DistanceSummaryRow {
                id: "Library".into(),
                demographic: "population".into(),
                weighted_dist: 10.0,
                demo_pop: 2.0,
                avg_dist: Some(5.0),
                source: "haversine distance".into(),
            }],
            edes: vec![EdeRow {
                demographic: "population".into(),
                weighted_dist: 10.0,
                demo_pop: 2.0,
                avg_dist: Some(5.0),
                avg_kp_weight: None,
                y_ede: Some(5.0),
                source: "haversine distance".into(),
            }],
            ..ResultTables::default()
        };

        sink.write(&record, &tables).unwrap();
        for table in TABLE_NAMES {
            let path = sink.table_path(&cfg, table);
            assert!(path.is_file(), "{} missing", path.display());
            assert!(!path.with_extension("csv.tmp").exists());
        }
        let precincts =
            fs::read_to_string(sink.table_path(&cfg, "precinct_distances")).unwrap();
        assert!(precincts.starts_with("id_dest,demographic,weighted_dist,demo_pop,avg_dist,source"));
        assert!(precincts.contains("Library"));
        assert!(dir
            .path()
            .join("testing_configs/testing_base_edes.csv")
            .is_file());
    }
}
