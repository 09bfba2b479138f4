use std::env;
use std::time::Duration;

use crate::cache_probe::prelude::*;

use super::error::ConfigError;
use super::probe_config::Config;

/// A fully resolved probe target, ready to run.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub name: String,
    pub endpoint: String,
    pub cases: Vec<RequestCase>,
    pub options: ProbeOptions,
    pub polling_interval: Option<Duration>,
    pub organisation_id: Option<String>,
}

pub struct AppConfig {
    pub targets: Vec<ProbeTarget>,
    pub mimir_endpoint: Option<String>,
    pub max_target_width: usize,
}

/// Load the application configuration from a YAML file and environment variables.
/// The file location is taken from `CONFIG_FILE` (default `config.yml`); metrics are
/// pushed only when `MIMIR_ENDPOINT` is set.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let config_file_location =
        env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yml".to_string());
    let config_str =
        std::fs::read_to_string(&config_file_location).map_err(|source| ConfigError::Read {
            path: config_file_location.clone(),
            source,
        })?;

    let targets = parse_targets(&config_str, &config_file_location)?;

    let mimir_endpoint = env::var("MIMIR_ENDPOINT")
        .ok()
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty());
    match &mimir_endpoint {
        Some(endpoint) => log::info!("Using Mimir endpoint: {endpoint}"),
        None => log::info!("MIMIR_ENDPOINT not set, metrics will not be pushed"),
    }

    let max_target_width = targets.iter().map(|t| t.name.len()).max().unwrap_or(10);

    Ok(AppConfig {
        targets,
        mimir_endpoint,
        max_target_width,
    })
}

/// Parses and resolves every target in a YAML document, ordered by name.
pub fn parse_targets(config_str: &str, path: &str) -> Result<Vec<ProbeTarget>, ConfigError> {
    let config: Config = serde_yaml::from_str(config_str).map_err(|source| ConfigError::Yaml {
        path: path.to_string(),
        source,
    })?;
    if config.is_empty() {
        return Err(ConfigError::NoTargets);
    }

    let mut targets = config
        .into_iter()
        .map(|(name, target)| {
            let in_target = |source: ConfigError| ConfigError::Target {
                target: name.clone(),
                source: Box::new(source),
            };
            Ok(ProbeTarget {
                cases: target.request_cases().map_err(in_target)?,
                options: target.probe_options().map_err(in_target)?,
                polling_interval: target
                    .polling_interval_seconds
                    .filter(|s| *s > 0)
                    .map(Duration::from_secs),
                endpoint: target.endpoint,
                organisation_id: target.organisation_id,
                name,
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    targets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets_sorted_and_resolved() {
        let yaml = r#"
            zeta:
                endpoint: http://localhost:8000/estimate
                polling_interval_seconds: 30
                cases:
                    - label: a
                      payload: {architecture: monolith}
                    - label: a-again
                      repeat_of: a
            alpha:
                endpoint: http://localhost:8001/estimate
                timeout_seconds: 2.5
                cases:
                    - label: b
                      payload: {architecture: serverless}
        "#;

        let targets = parse_targets(yaml, "inline").unwrap();
        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);

        assert_eq!(targets[0].options.timeout, Duration::from_millis(2500));
        assert_eq!(targets[0].polling_interval, None);
        assert_eq!(targets[1].polling_interval, Some(Duration::from_secs(30)));
        assert_eq!(targets[1].cases.len(), 2);
    }

    #[test]
    fn test_example_config_parses() {
        let targets = parse_targets(
            include_str!("../../config.example.yml"),
            "config.example.yml",
        )
        .unwrap();

        assert_eq!(targets.len(), 1);
        let archcost = &targets[0];
        assert_eq!(archcost.name, "archcost");
        assert_eq!(archcost.cases.len(), 3);
        assert_eq!(archcost.cases[0].fingerprint(), archcost.cases[2].fingerprint());
        assert_eq!(
            archcost.cases[1].payload()["traffic"]["security"]["compliance"][0],
            "SOC2"
        );
        assert!(archcost.options.numeric_field.is_some());
    }

    #[test]
    fn test_target_errors_name_the_target() {
        let yaml = r#"
            broken:
                endpoint: http://localhost:8000/estimate
                cases: []
        "#;
        let err = parse_targets(yaml, "inline").err().expect("should fail");
        assert_eq!(err.to_string(), "target broken: no cases configured");
    }

    #[test]
    fn test_empty_and_invalid_documents() {
        assert!(matches!(parse_targets("{}", "inline"), Err(ConfigError::NoTargets)));
        assert!(matches!(
            parse_targets("- not a map", "inline"),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
