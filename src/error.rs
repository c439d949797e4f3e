//! Error types for caravel

use thiserror::Error;

/// Result type for caravel operations
pub type Result<T> = std::result::Result<T, CaravelError>;

/// Caravel error types
#[derive(Error, Debug)]
pub enum CaravelError {
    #[error("Missing required config value: {0}")]
    MissingConfig(String),

    #[error("Invalid config value '{key}': {message}")]
    InvalidConfig { key: String, message: String },

    #[error("Config file error: {0}")]
    ConfigFile(String),

    #[error("Image not found in stack: {0}")]
    ImageNotFound(String),

    #[error("Container not found in stack: {0}")]
    ContainerNotFound(String),

    #[error("Container already declared: {0}")]
    DuplicateContainer(String),

    #[error("Container '{container}' depends on undeclared container '{dependency}'")]
    UnknownDependency { container: String, dependency: String },

    #[error("Circular dependency detected for container: {0}")]
    CircularDependency(String),

    #[error("Unknown stack output: {0}")]
    UnknownOutput(String),

    #[error("Build context not found: {0}")]
    BuildContextMissing(String),

    #[error("Seed data error: {0}")]
    SeedData(String),

    #[error("No container engine available (tried docker, podman)")]
    NoEngine,

    #[error("Engine command failed ({operation}): {stderr}")]
    Engine { operation: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
