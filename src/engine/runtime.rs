//! Engine runtime detection

use crate::error::{CaravelError, Result};
use std::process::{Command, Stdio};

/// Container engine runtimes caravel can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineRuntime {
    /// Docker engine
    Docker,
    /// Podman engine (Docker-compatible CLI)
    Podman,
}

impl EngineRuntime {
    /// CLI command for this runtime
    pub fn command(&self) -> &'static str {
        match self {
            EngineRuntime::Docker => "docker",
            EngineRuntime::Podman => "podman",
        }
    }
}

impl std::fmt::Display for EngineRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Detect an available runtime, preferring Docker
pub fn detect() -> Result<EngineRuntime> {
    for runtime in [EngineRuntime::Docker, EngineRuntime::Podman] {
        if probe(runtime) {
            tracing::debug!("using container engine: {}", runtime);
            return Ok(runtime);
        }
    }
    Err(CaravelError::NoEngine)
}

fn probe(runtime: EngineRuntime) -> bool {
    Command::new(runtime.command())
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_command() {
        assert_eq!(EngineRuntime::Docker.command(), "docker");
        assert_eq!(EngineRuntime::Podman.command(), "podman");
    }

    #[test]
    fn test_detect_reports_missing_engine() {
        // The test environment may or may not have an engine; only the
        // error shape is asserted when there is none.
        match detect() {
            Ok(runtime) => assert!(matches!(
                runtime,
                EngineRuntime::Docker | EngineRuntime::Podman
            )),
            Err(err) => assert!(matches!(err, CaravelError::NoEngine)),
        }
    }
}
