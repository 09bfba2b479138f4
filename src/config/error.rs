use crate::cache_probe::prelude::ProbeError;

/// Configuration errors, reported before any target is probed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no targets configured")]
    NoTargets,

    #[error("no cases configured")]
    NoCases,

    #[error("duplicate case label {0}")]
    DuplicateLabel(String),

    #[error("case {label} repeats unknown or later case {original}")]
    UnknownRepeat { label: String, original: String },

    #[error("case {0} must set exactly one of payload or repeat_of")]
    AmbiguousCase(String),

    #[error("timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),

    #[error("numeric_field must be a JSON pointer starting with '/', got {0}")]
    InvalidPointer(String),

    #[error("target {target}: {source}")]
    Target {
        target: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error(transparent)]
    Probe(#[from] ProbeError),
}
