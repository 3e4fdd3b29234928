use crate::analysis::aggregate::Direction;
use crate::analysis::group_key::GroupBy;
use crate::config::AnalysisConfig;
use color_eyre::eyre::{Context, Result};
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and validate analysis settings from a YAML file
pub fn load_config(config_path: &Path) -> Result<AnalysisConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .with_context(|| format!("Failed to open config file {}", config_path.display()))?;

    // An empty file parses as YAML null; treat it as "all defaults"
    let value: serde_yaml::Value = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse YAML in {}", config_path.display()))?;
    let config: AnalysisConfig = if value.is_null() {
        AnalysisConfig::default()
    } else {
        serde_yaml::from_value(value)
            .with_context(|| format!("Invalid analysis config in {}", config_path.display()))?
    };

    config.validate()?;

    Ok(config)
}

/// Load `config_path` when given, else the defaults
pub fn load_or_default(config_path: Option<&Path>) -> Result<AnalysisConfig> {
    match config_path {
        Some(path) => load_config(path),
        None => Ok(AnalysisConfig::default()),
    }
}

/// CLI arguments that take precedence over the YAML settings
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub group_by: Option<GroupBy>,
    pub best_metric: Option<String>,
    pub lowest: bool,
}

/// Apply CLI overrides to an analysis configuration
pub fn apply_overrides(config: &mut AnalysisConfig, overrides: &ConfigOverrides) -> Result<()> {
    if let Some(group_by) = &overrides.group_by {
        info!("Grouping override: {}", group_by);
        config.group_by = group_by.clone();
    }

    if let Some(metric) = &overrides.best_metric {
        config.best_metric = metric.clone();
    }

    if overrides.lowest {
        config.best_direction = Direction::Lowest;
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::SectionName;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
required_sections:
  - OVERALL_STATS
group_by: gateways
file_suffix: ".txt"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.required_sections, vec![SectionName::OverallStats]);
        assert_eq!(config.group_by, GroupBy::GatewayCount);
        assert_eq!(config.file_suffix, ".txt");
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let temp_file = NamedTempFile::new().unwrap();
        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "file_suffix: \"\"\n").unwrap();
        assert!(load_config(temp_file.path()).is_err());

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "required_sections: [NOT_A_SECTION]\n").unwrap();
        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = AnalysisConfig::default();
        let overrides = ConfigOverrides {
            group_by: Some(GroupBy::PacketInterval),
            best_metric: Some("CollisionRate_percent".to_string()),
            lowest: true,
        };
        apply_overrides(&mut config, &overrides).unwrap();

        assert_eq!(config.group_by, GroupBy::PacketInterval);
        assert_eq!(config.best_metric, "CollisionRate_percent");
        assert_eq!(config.best_direction, Direction::Lowest);

        let bad = ConfigOverrides {
            best_metric: Some(String::new()),
            ..Default::default()
        };
        assert!(apply_overrides(&mut config, &bad).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(load_config(Path::new("/nonexistent/analysis.yaml")).is_err());
        assert!(load_or_default(None).is_ok());
    }
}
