use crate::report::ValidationReport;
use mixweave_kernel::CompositionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml at {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid json at {path}: {source}")]
    ParseJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported manifest format: {path} (expected .toml or .json)")]
    UnsupportedFormat { path: String },

    #[error("manifest rejected: {}", .0.failure_classes.join(", "))]
    Rejected(ValidationReport),

    #[error(transparent)]
    Composition(#[from] CompositionError),
}
