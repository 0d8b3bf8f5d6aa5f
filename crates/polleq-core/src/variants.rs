//! Config variant generation: one base config, one varied field, many runs.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::error::PollError;

/// Fields that identify a config rather than parameterize it.
const IDENTITY_FIELDS: [&str; 2] = ["config_set", "config_name"];

/// Builds one config per value of `field`, each named `{base_name}_{field}_{value}`.
///
/// Values are written the way they would appear in YAML (`-2`, `true`, `[2016, 2020]`).
/// A scalar given for `year` becomes a one-element list.
pub fn generate_variants(
    base: &RunConfig,
    field: &str,
    values: &[String],
) -> std::result::Result<Vec<RunConfig>, PollError> {
    if IDENTITY_FIELDS.contains(&field) {
        return Err(PollError::ConfigInvalid(format!(
            "'{field}' names the config and cannot be varied"
        )));
    }
    let base_value = serde_json::to_value(base)
        .map_err(|e| PollError::ConfigInvalid(format!("serializing base config: {e}")))?;
    if base_value.get(field).is_none() {
        return Err(PollError::ConfigInvalid(format!(
            "unknown config field '{field}'"
        )));
    }

    let mut variants = Vec::with_capacity(values.len());
    for raw in values {
        let mut parsed: serde_json::Value = serde_yaml::from_str(raw).map_err(|e| {
            PollError::ConfigInvalid(format!("value '{raw}' for '{field}' is not valid: {e}"))
        })?;
        if field == "year" && !parsed.is_array() {
            parsed = serde_json::Value::Array(vec![parsed]);
        }

        let mut value = base_value.clone();
        value[field] = parsed;
        value["config_name"] = serde_json::Value::String(format!(
            "{}_{}_{}",
            base.config_name,
            field,
            name_fragment(raw)
        ));
        let variant: RunConfig = serde_json::from_value(value)
            .map_err(|e| PollError::ConfigInvalid(format!("variant {field}={raw}: {e}")))?;
        variant.validate()?;
        variants.push(variant);
    }
    Ok(variants)
}

fn name_fragment(raw: &str) -> String {
    let fragment: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '"' | '\''))
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    fragment.trim_matches('_').to_string()
}

/// Writes each config as `{dir}/{config_name}.yaml` and returns the paths written.
pub fn write_variants(dir: &Path, configs: &[RunConfig]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("creating config folder '{}'", dir.display()))?;
    let mut written = Vec::with_capacity(configs.len());
    for config in configs {
        let path = dir.join(format!("{}.yaml", config.config_name));
        let yaml = config.to_yaml()?;
        fs::write(&path, yaml)
            .with_context(|| format!("writing config '{}'", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::SAMPLE;
    use crate::config::load_config;
    use tempfile::tempdir;

    fn base() -> RunConfig {
        RunConfig::from_str_any(SAMPLE).unwrap()
    }

    #[test]
    fn varies_one_field() {
        let values = vec!["0".to_string(), "-0.5".to_string(), "-2".to_string()];
        let variants = generate_variants(&base(), "beta", &values).unwrap();
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[1].beta, -0.5);
        assert_eq!(variants[2].config_name, "testing_config_base_beta_-2");
        assert_eq!(variants[0].capacity, base().capacity);
        assert_ne!(variants[0].config_id(), variants[1].config_id());
    }

    #[test]
    fn scalar_year_becomes_list() {
        let variants = generate_variants(&base(), "year", &["2016".to_string()]).unwrap();
        assert_eq!(variants[0].year, vec!["2016".to_string()]);

        let variants =
            generate_variants(&base(), "year", &["[2016, 2020]".to_string()]).unwrap();
        assert_eq!(variants[0].year.len(), 2);
        assert_eq!(variants[0].config_name, "testing_config_base_year_2016_2020");
    }

    #[test]
    fn rejects_bad_fields_and_values() {
        assert!(generate_variants(&base(), "config_name", &["x".into()]).is_err());
        assert!(generate_variants(&base(), "nonsense", &["1".into()]).is_err());
        assert!(generate_variants(&base(), "beta", &["3".into()]).is_err());
    }

    #[test]
    fn written_variants_load_back() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("testing_configs");
        let variants =
            generate_variants(&base(), "capacity", &["1.2".into(), "2".into()]).unwrap();
        let paths = write_variants(&folder, &variants).unwrap();
        assert_eq!(paths.len(), 2);
        let loaded = load_config(&paths[0]).unwrap();
        assert_eq!(loaded, variants[0]);
    }
}
