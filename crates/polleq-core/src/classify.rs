//! Site classification from free-text `location_type` strings.
//!
//! Input files encode categories inside the type name (`polling_2020`,
//! `Elec Day Fire - Potential`, `bg_centroid`). All matching on those strings happens
//! here; the rest of the workspace works with [`DestType`].

use crate::types::DestType;

const POTENTIAL_MARKER: &str = "Potential";
const CENTROID_MARKER: &str = "centroid";

/// True when the type names a candidate site that was never a polling place.
pub fn is_potential_type(location_type: &str) -> bool {
    location_type.contains(POTENTIAL_MARKER)
}

/// True for block-group centroid rows.
pub fn is_centroid_type(location_type: &str) -> bool {
    location_type.contains(CENTROID_MARKER)
}

/// True when the type mentions at least one of the given years.
pub fn mentions_any_year<S: AsRef<str>>(location_type: &str, years: &[S]) -> bool {
    years
        .iter()
        .any(|year| location_type.contains(year.as_ref()))
}

/// Category used when the candidate-site file is first loaded, before any year list
/// is known.
pub fn classify_raw(location_type: &str) -> DestType {
    if is_centroid_type(location_type) {
        DestType::BgCentroid
    } else if is_potential_type(location_type) {
        DestType::Potential
    } else {
        DestType::Polling
    }
}

/// Category of a site for a run over `years`.
///
/// Centroids stay centroids; any other type is `polling` when it mentions a configured
/// year and `potential` otherwise.
pub fn classify_site<S: AsRef<str>>(location_type: &str, years: &[S]) -> DestType {
    if is_centroid_type(location_type) {
        DestType::BgCentroid
    } else if mentions_any_year(location_type, years) {
        DestType::Polling
    } else {
        DestType::Potential
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_classification_uses_markers() {
        assert_eq!(classify_raw("polling_2020"), DestType::Polling);
        assert_eq!(classify_raw("Elec Day Fire - Potential"), DestType::Potential);
        assert_eq!(classify_raw("bg_centroid"), DestType::BgCentroid);
    }

    #[test]
    fn year_list_decides_polling() {
        let years = ["2020", "2022"];
        assert_eq!(classify_site("polling_2020", &years), DestType::Polling);
        assert_eq!(
            classify_site("EV_2022_2024 polling", &years),
            DestType::Polling
        );
        assert_eq!(classify_site("polling_2018", &years), DestType::Potential);
        assert_eq!(
            classify_site("Elec Day Church - Potential", &years),
            DestType::Potential
        );
        assert_eq!(classify_site("bg_centroid", &years), DestType::BgCentroid);
    }

    #[test]
    fn year_match_accepts_owned_strings() {
        let years = vec!["2016".to_string()];
        assert!(mentions_any_year("polling_2016", &years));
        assert!(!mentions_any_year("polling_2020", &years));
        assert!(!mentions_any_year("polling_2020", &Vec::<String>::new()));
    }
}
