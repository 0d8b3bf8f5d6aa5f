//! Decennial census P3 (race) and P4 (Hispanic origin) block tables.
//!
//! The files carry two header rows: variable codes (`GEO_ID`, `P3_001N`, ...) followed
//! by human-readable labels. Only the first is used.

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use polleq_core::{Demographics, PollError};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Prefix in front of the 15-digit block GEOID.
pub const GEO_ID_PREFIX: &str = "1000000US";

const P3_COLUMNS: [(&str, &str); 8] = [
    ("P3_001N", "population"),
    ("P3_003N", "white"),
    ("P3_004N", "black"),
    ("P3_005N", "native"),
    ("P3_006N", "asian"),
    ("P3_007N", "pacific_islander"),
    ("P3_008N", "other"),
    ("P3_009N", "multiple_races"),
];

const P4_COLUMNS: [(&str, &str); 3] = [
    ("P4_001N", "population"),
    ("P4_002N", "hispanic"),
    ("P4_003N", "non_hispanic"),
];

type Table = BTreeMap<String, BTreeMap<&'static str, f64>>;

fn read_table(path: &Path, columns: &[(&'static str, &'static str)]) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening census table '{}'", path.display()))?;
    let headers = rdr
        .headers()
        .with_context(|| format!("reading header of '{}'", path.display()))?
        .clone();
    let index_of = |code: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim() == code)
            .ok_or_else(|| anyhow!("column '{code}' missing from '{}'", path.display()))
    };
    let geo_idx = index_of("GEO_ID")?;
    let indices: Vec<(usize, &'static str)> = columns
        .iter()
        .map(|(code, name)| index_of(code).map(|idx| (idx, *name)))
        .collect::<Result<_>>()?;

    let mut table = Table::new();
    // skip the label row under the codes
    for (row, result) in rdr.records().enumerate().skip(1) {
        let record: StringRecord = result
            .with_context(|| format!("reading row {} of '{}'", row + 2, path.display()))?;
        let geo_id = record.get(geo_idx).unwrap_or_default().trim();
        let block = geo_id.strip_prefix(GEO_ID_PREFIX).unwrap_or(geo_id).to_string();
        let mut values = BTreeMap::new();
        for (idx, name) in &indices {
            let raw = record.get(*idx).unwrap_or_default().trim();
            let value: f64 = raw.parse().with_context(|| {
                format!("non-numeric '{raw}' for block {block} in '{}'", path.display())
            })?;
            values.insert(*name, value);
        }
        table.insert(block, values);
    }
    debug!(path = %path.display(), blocks = table.len(), "read census table");
    Ok(table)
}

/// Reads P3 and P4 and joins them on block id.
///
/// Fails with [`PollError::IntegrityViolation`] when a block's P3 and P4 totals differ
/// or a block appears in only one of the tables.
pub fn read_block_demographics(p3: &Path, p4: &Path) -> Result<BTreeMap<String, Demographics>> {
    let race = read_table(p3, &P3_COLUMNS)?;
    let ethnicity = read_table(p4, &P4_COLUMNS)?;

    let mut blocks = BTreeMap::new();
    for (block, r) in &race {
        let e = ethnicity.get(block).ok_or_else(|| {
            PollError::IntegrityViolation(format!("block {block} is in P3 but not in P4"))
        })?;
        let total = r["population"];
        if total != e["population"] {
            return Err(PollError::IntegrityViolation(format!(
                "block {block}: P3 total {total} differs from P4 total {}",
                e["population"]
            ))
            .into());
        }
        blocks.insert(
            block.clone(),
            Demographics {
                population: total,
                white: r["white"],
                black: r["black"],
                native: r["native"],
                asian: r["asian"],
                pacific_islander: r["pacific_islander"],
                other: r["other"],
                multiple_races: r["multiple_races"],
                hispanic: e["hispanic"],
                non_hispanic: e["non_hispanic"],
            },
        );
    }
    if let Some(block) = ethnicity.keys().find(|b| !race.contains_key(*b)) {
        return Err(PollError::IntegrityViolation(format!(
            "block {block} is in P4 but not in P3"
        ))
        .into());
    }
    Ok(blocks)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    pub(crate) const P3: &str = "GEO_ID,NAME,P3_001N,P3_002N,P3_003N,P3_004N,P3_005N,P3_006N,P3_007N,P3_008N,P3_009N\n\
        Geography,Geographic Area Name,!!Total:,!!Total:!!One race,White,Black,Native,Asian,Pacific,Other,Two or more\n\
        1000000US131350501051000,Block 1000,10,9,5,3,0,1,0,0,1\n\
        1000000US131350501051001,Block 1001,0,0,0,0,0,0,0,0,0\n";

    pub(crate) const P4: &str = "GEO_ID,NAME,P4_001N,P4_002N,P4_003N\n\
        Geography,Geographic Area Name,!!Total:,!!Total:!!Hispanic,!!Total:!!Not Hispanic\n\
        1000000US131350501051000,Block 1000,10,2,8\n\
        1000000US131350501051001,Block 1001,0,0,0\n";

    #[test]
    fn joins_p3_and_p4() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("p3.csv"), P3).unwrap();
        fs::write(dir.path().join("p4.csv"), P4).unwrap();

        let blocks =
            read_block_demographics(&dir.path().join("p3.csv"), &dir.path().join("p4.csv"))
                .unwrap();
        assert_eq!(blocks.len(), 2);
        let demo = blocks["131350501051000"];
        assert_eq!(demo.population, 10.0);
        assert_eq!(demo.black, 3.0);
        assert_eq!(demo.multiple_races, 1.0);
        assert_eq!(demo.hispanic, 2.0);
        assert_eq!(demo.non_hispanic, 8.0);
    }

    #[test]
    fn total_mismatch_is_integrity_violation() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("p3.csv"), P3).unwrap();
        fs::write(
            dir.path().join("p4.csv"),
            P4.replace("Block 1000,10,2,8", "Block 1000,11,3,8"),
        )
        .unwrap();

        let err = read_block_demographics(&dir.path().join("p3.csv"), &dir.path().join("p4.csv"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PollError>(),
            Some(PollError::IntegrityViolation(_))
        ));
    }
}
