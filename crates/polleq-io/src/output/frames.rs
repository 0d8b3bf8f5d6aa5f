//! Column-major views of the result tables.

use polars::prelude::{DataFrame, NamedFrom, PolarsResult, Series};
use polleq_core::{DistanceSummaryRow, EdeRow, ResultRow, DEMOGRAPHIC_COLUMNS};

pub fn results_frame(rows: &[ResultRow]) -> PolarsResult<DataFrame> {
    let mut columns = vec![
        Series::new("id_orig", rows.iter().map(|r| r.id_orig.clone()).collect::<Vec<_>>()),
        Series::new("id_dest", rows.iter().map(|r| r.id_dest.clone()).collect::<Vec<_>>()),
        Series::new("distance_m", rows.iter().map(|r| r.distance_m).collect::<Vec<_>>()),
        Series::new("address", rows.iter().map(|r| r.address.clone()).collect::<Vec<_>>()),
        Series::new("dest_lat", rows.iter().map(|r| r.dest_lat).collect::<Vec<_>>()),
        Series::new("dest_lon", rows.iter().map(|r| r.dest_lon).collect::<Vec<_>>()),
        Series::new("orig_lat", rows.iter().map(|r| r.orig_lat).collect::<Vec<_>>()),
        Series::new("orig_lon", rows.iter().map(|r| r.orig_lon).collect::<Vec<_>>()),
        Series::new(
            "location_type",
            rows.iter().map(|r| r.location_type.clone()).collect::<Vec<_>>(),
        ),
        Series::new(
            "dest_type",
            rows.iter().map(|r| r.dest_type.as_str()).collect::<Vec<_>>(),
        ),
    ];
    for (k, name) in DEMOGRAPHIC_COLUMNS.iter().enumerate() {
        columns.push(Series::new(
            name,
            rows.iter().map(|r| r.demographics.values()[k]).collect::<Vec<_>>(),
        ));
    }
    columns.extend([
        Series::new("weighted_dist", rows.iter().map(|r| r.weighted_dist).collect::<Vec<_>>()),
        Series::new("kp_factor", rows.iter().map(|r| r.kp_factor).collect::<Vec<_>>()),
        Series::new("new_location", rows.iter().map(|r| r.new_location).collect::<Vec<_>>()),
        Series::new("matching", rows.iter().map(|r| r.matching).collect::<Vec<_>>()),
        Series::new("source", rows.iter().map(|r| r.source.clone()).collect::<Vec<_>>()),
    ]);
    DataFrame::new(columns)
}

/// Summary table keyed by `key` (`id_dest` for precincts, `id_orig` for residences).
pub fn summary_frame(key: &str, rows: &[DistanceSummaryRow]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(key, rows.iter().map(|r| r.id.clone()).collect::<Vec<_>>()),
        Series::new(
            "demographic",
            rows.iter().map(|r| r.demographic.clone()).collect::<Vec<_>>(),
        ),
        Series::new("weighted_dist", rows.iter().map(|r| r.weighted_dist).collect::<Vec<_>>()),
        Series::new("demo_pop", rows.iter().map(|r| r.demo_pop).collect::<Vec<_>>()),
        Series::new("avg_dist", rows.iter().map(|r| r.avg_dist).collect::<Vec<_>>()),
        Series::new("source", rows.iter().map(|r| r.source.clone()).collect::<Vec<_>>()),
    ])
}

pub fn edes_frame(rows: &[EdeRow]) -> PolarsResult<DataFrame> {
    DataFrame::new(vec![
        Series::new(
            "demographic",
            rows.iter().map(|r| r.demographic.clone()).collect::<Vec<_>>(),
        ),
        Series::new("weighted_dist", rows.iter().map(|r| r.weighted_dist).collect::<Vec<_>>()),
        Series::new("demo_pop", rows.iter().map(|r| r.demo_pop).collect::<Vec<_>>()),
        Series::new("avg_dist", rows.iter().map(|r| r.avg_dist).collect::<Vec<_>>()),
        Series::new(
            "avg_kp_weight",
            rows.iter().map(|r| r.avg_kp_weight).collect::<Vec<_>>(),
        ),
        Series::new("y_EDE", rows.iter().map(|r| r.y_ede).collect::<Vec<_>>()),
        Series::new("source", rows.iter().map(|r| r.source.clone()).collect::<Vec<_>>()),
    ])
}
