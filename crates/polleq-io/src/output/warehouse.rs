//! DuckDB results warehouse.
//!
//! `model_configs` holds one row per distinct parameter set (keyed by the content hash),
//! `model_runs` one row per attempt. Result rows reference the run through
//! `model_run_id`; a run's rows are only present when its `success` flag is true.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use duckdb::{params, Connection};
use polleq_core::{DistanceSummaryRow, ResultTables, RunConfig, RunRecord};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::ResultSink;
use crate::paths::ensure_dir;

/// Serializes bulk inserts across every sink in the process.
static WRITE_LOCK: Mutex<()> = Mutex::new(());

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS model_configs (
    id TEXT PRIMARY KEY,
    config_set TEXT NOT NULL,
    config_name TEXT NOT NULL,
    location TEXT NOT NULL,
    config_json TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS model_runs (
    id TEXT PRIMARY KEY,
    model_config_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    success BOOLEAN NOT NULL,
    error TEXT,
    solve_status TEXT,
    objective DOUBLE,
    best_bound DOUBLE,
    gap DOUBLE,
    alpha DOUBLE,
    penalty DOUBLE,
    elapsed_secs DOUBLE
);
CREATE TABLE IF NOT EXISTS results (
    model_run_id TEXT NOT NULL,
    id_orig TEXT NOT NULL,
    id_dest TEXT NOT NULL,
    distance_m DOUBLE,
    address TEXT,
    dest_lat DOUBLE,
    dest_lon DOUBLE,
    orig_lat DOUBLE,
    orig_lon DOUBLE,
    location_type TEXT,
    dest_type TEXT,
    population DOUBLE,
    white DOUBLE,
    black DOUBLE,
    native DOUBLE,
    asian DOUBLE,
    pacific_islander DOUBLE,
    other DOUBLE,
    multiple_races DOUBLE,
    hispanic DOUBLE,
    non_hispanic DOUBLE,
    weighted_dist DOUBLE,
    kp_factor DOUBLE,
    new_location BOOLEAN,
    matching BIGINT,
    source TEXT
);
CREATE TABLE IF NOT EXISTS precinct_distances (
    model_run_id TEXT NOT NULL,
    id_dest TEXT NOT NULL,
    demographic TEXT NOT NULL,
    weighted_dist DOUBLE,
    demo_pop DOUBLE,
    avg_dist DOUBLE,
    source TEXT
);
CREATE TABLE IF NOT EXISTS residence_distances (
    model_run_id TEXT NOT NULL,
    id_orig TEXT NOT NULL,
    demographic TEXT NOT NULL,
    weighted_dist DOUBLE,
    demo_pop DOUBLE,
    avg_dist DOUBLE,
    source TEXT
);
CREATE TABLE IF NOT EXISTS edes (
    model_run_id TEXT NOT NULL,
    demographic TEXT NOT NULL,
    weighted_dist DOUBLE,
    demo_pop DOUBLE,
    avg_dist DOUBLE,
    avg_kp_weight DOUBLE,
    y_EDE DOUBLE,
    source TEXT
);
";

pub struct WarehouseSink {
    conn: Mutex<Connection>,
}

impl WarehouseSink {
    /// Opens (or creates) the warehouse database file and its tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening warehouse '{}'", path.display()))?;
        conn.execute_batch(SCHEMA)
            .context("creating warehouse tables")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of rows in `table`.
    pub fn count(&self, table: &str) -> Result<i64> {
        let conn = self.lock()?;
        let sql = format!("SELECT COUNT(*) FROM {table}");
        conn.query_row(&sql, [], |row| row.get::<_, i64>(0))
            .with_context(|| format!("counting rows of '{table}'"))
    }

    /// `(success, error)` of a recorded run.
    pub fn run_status(&self, model_run_id: &str) -> Result<(bool, Option<String>)> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT success, error FROM model_runs WHERE id = ?",
            [model_run_id],
            |row| Ok((row.get::<_, bool>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .with_context(|| format!("looking up model run '{model_run_id}'"))
    }

    /// `(solve_status, best_bound, gap)` of a recorded run.
    pub fn run_solve(&self, model_run_id: &str) -> Result<(Option<String>, Option<f64>, Option<f64>)> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT solve_status, best_bound, gap FROM model_runs WHERE id = ?",
            [model_run_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .with_context(|| format!("looking up model run '{model_run_id}'"))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("warehouse connection lock poisoned"))
    }

    fn insert_config(conn: &Connection, config: &RunConfig, config_id: &str) -> Result<()> {
        let json = serde_json::to_string(config).context("serializing run config")?;
        conn.execute(
            "INSERT OR IGNORE INTO model_configs (id, config_set, config_name, location, config_json)
             VALUES (?, ?, ?, ?, ?)",
            params![
                config_id,
                config.config_set,
                config.config_name,
                config.location,
                json
            ],
        )
        .context("inserting model config")?;
        Ok(())
    }

    fn insert_tables(conn: &Connection, run_id: &str, tables: &ResultTables) -> Result<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO results VALUES
             (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for row in &tables.results {
            let d = row.demographics;
            stmt.execute(params![
                run_id,
                row.id_orig,
                row.id_dest,
                row.distance_m,
                row.address.as_deref(),
                row.dest_lat,
                row.dest_lon,
                row.orig_lat,
                row.orig_lon,
                row.location_type,
                row.dest_type.as_str(),
                d.population,
                d.white,
                d.black,
                d.native,
                d.asian,
                d.pacific_islander,
                d.other,
                d.multiple_races,
                d.hispanic,
                d.non_hispanic,
                row.weighted_dist,
                row.kp_factor,
                row.new_location,
                row.matching,
                row.source,
            ])
            .context("inserting results row")?;
        }

        Self::insert_summary(conn, "precinct_distances", run_id, &tables.precinct_distances)?;
        Self::insert_summary(conn, "residence_distances", run_id, &tables.residence_distances)?;

        let mut stmt = conn.prepare("INSERT INTO edes VALUES (?, ?, ?, ?, ?, ?, ?, ?)")?;
        for row in &tables.edes {
            stmt.execute(params![
                run_id,
                row.demographic,
                row.weighted_dist,
                row.demo_pop,
                row.avg_dist,
                row.avg_kp_weight,
                row.y_ede,
                row.source,
            ])
            .context("inserting edes row")?;
        }
        Ok(())
    }

    fn insert_summary(
        conn: &Connection,
        table: &str,
        run_id: &str,
        rows: &[DistanceSummaryRow],
    ) -> Result<()> {
        let mut stmt = conn.prepare(&format!("INSERT INTO {table} VALUES (?, ?, ?, ?, ?, ?, ?)"))?;
        for row in rows {
            stmt.execute(params![
                run_id,
                row.id,
                row.demographic,
                row.weighted_dist,
                row.demo_pop,
                row.avg_dist,
                row.source,
            ])
            .with_context(|| format!("inserting {table} row"))?;
        }
        Ok(())
    }
}

impl ResultSink for WarehouseSink {
    fn name(&self) -> &'static str {
        "warehouse"
    }

    fn write(&self, record: &RunRecord, tables: &ResultTables) -> Result<String> {
        let _guard = WRITE_LOCK
            .lock()
            .map_err(|_| anyhow!("warehouse write lock poisoned"))?;
        let mut conn = self.lock()?;
        let run_id = Uuid::new_v4().to_string();

        let tx = conn.transaction().context("starting warehouse transaction")?;
        let outcome = Self::insert_config(&tx, &record.config, &record.config_id)
            .and_then(|_| {
                tx.execute(
                    "INSERT INTO model_runs (id, model_config_id, created_at, success, error,
                         solve_status, objective, best_bound, gap, alpha, penalty, elapsed_secs)
                     VALUES (?, ?, ?, TRUE, NULL, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        run_id,
                        record.config_id,
                        Utc::now().to_rfc3339(),
                        record.solve_status,
                        record.objective,
                        record.best_bound,
                        record.gap,
                        record.alpha,
                        record.penalty,
                        record.elapsed_secs,
                    ],
                )
                .context("inserting model run")
                .map(|_| ())
            })
            .and_then(|_| Self::insert_tables(&tx, &run_id, tables));
        match outcome {
            Ok(()) => {
                tx.commit().context("committing warehouse transaction")?;
                info!(model_run_id = %run_id, config = %record.config.config_name, "stored run in warehouse");
                Ok(run_id)
            }
            Err(err) => {
                // dropping the transaction rolls it back
                drop(tx);
                let message = format!("{err:#}");
                warn!(config = %record.config.config_name, error = %message, "warehouse insert failed");
                insert_failed_run(&conn, &record.config, &record.config_id, &message)?;
                Err(err)
            }
        }
    }

    fn record_failure(&self, config: &RunConfig, error: &str) -> Result<()> {
        let _guard = WRITE_LOCK
            .lock()
            .map_err(|_| anyhow!("warehouse write lock poisoned"))?;
        let conn = self.lock()?;
        insert_failed_run(&conn, config, &config.config_id(), error)?;
        Ok(())
    }
}

fn insert_failed_run(conn: &Connection, config: &RunConfig, config_id: &str, error: &str) -> Result<String> {
    let run_id = Uuid::new_v4().to_string();
    WarehouseSink::insert_config(conn, config, config_id)?;
    conn.execute(
        "INSERT INTO model_runs (id, model_config_id, created_at, success, error)
         VALUES (?, ?, ?, FALSE, ?)",
        params![run_id, config_id, Utc::now().to_rfc3339(), error],
    )
    .context("recording failed model run")?;
    Ok(run_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polleq_core::{Demographics, DestType, EdeRow, ResultRow};
    use tempfile::tempdir;

    fn config(name: &str) -> RunConfig {
        RunConfig::from_str_any(&format!(
            "location: testing\nyear: [2020]\nbeta: -1\ntime_limit: 10\ncapacity: 1.5\n\
             precincts_open: 2\nmaxpctnew: 1\nminpctold: 0\nmax_min_mult: 1\n\
             config_set: testing_configs\nconfig_name: {name}\n"
        ))
        .unwrap()
    }

    fn record(cfg: &RunConfig) -> RunRecord {
        RunRecord {
            config_id: cfg.config_id(),
            config: cfg.clone(),
            solve_status: "Optimal".into(),
            objective: 1.2,
            best_bound: Some(1.18),
            gap: Some(0.0166),
            alpha: 0.0004,
            penalty: None,
            elapsed_secs: 0.5,
        }
    }

    fn tables() -> ResultTables {
        ResultTables {
            results: vec![ResultRow {
                id_orig: "b1".into(),
                id_dest: "Library".into(),
                distance_m: 850.0,
                address: Some("1 Main St".into()),
                dest_lat: 33.7,
                dest_lon: -84.4,
                orig_lat: 33.71,
                orig_lon: -84.41,
                location_type: "polling_2020".into(),
                dest_type: DestType::Polling,
                demographics: Demographics {
                    population: 10.0,
                    ..Demographics::default()
                },
                weighted_dist: 8500.0,
                kp_factor: 1.4,
                new_location: false,
                matching: 1,
                source: "haversine distance".into(),
            }],
            edes: vec![EdeRow {
                demographic: "population".into(),
                weighted_dist: 8500.0,
                demo_pop: 10.0,
                avg_dist: Some(850.0),
                avg_kp_weight: Some(1.4),
                y_ede: Some(850.0),
                source: "haversine distance".into(),
            }],
            ..ResultTables::default()
        }
    }

    #[test]
    fn successful_run_is_stored_with_config() {
        let dir = tempdir().unwrap();
        let sink = WarehouseSink::open(&dir.path().join("polleq.duckdb")).unwrap();
        let cfg = config("testing_base");

        let run_id = sink.write(&record(&cfg), &tables()).unwrap();
        assert_eq!(sink.count("results").unwrap(), 1);
        assert_eq!(sink.count("edes").unwrap(), 1);
        assert_eq!(sink.run_status(&run_id).unwrap(), (true, None));
        assert_eq!(
            sink.run_solve(&run_id).unwrap(),
            (Some("Optimal".to_string()), Some(1.18), Some(0.0166))
        );

        // identical parameters share one config row
        sink.write(&record(&cfg), &tables()).unwrap();
        assert_eq!(sink.count("model_configs").unwrap(), 1);
        assert_eq!(sink.count("model_runs").unwrap(), 2);
    }

    #[test]
    fn failures_are_recorded() {
        let dir = tempdir().unwrap();
        let sink = WarehouseSink::open(&dir.path().join("polleq.duckdb")).unwrap();
        sink.record_failure(&config("broken"), "model infeasible")
            .unwrap();
        assert_eq!(sink.count("model_runs").unwrap(), 1);
        let conn = sink.lock().unwrap();
        let bound: Option<f64> = conn
            .query_row("SELECT best_bound FROM model_runs", [], |row| row.get(0))
            .unwrap();
        assert_eq!(bound, None);
        assert_eq!(sink.count("results").unwrap(), 0);
    }
}
