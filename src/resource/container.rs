//! Container descriptors

use crate::config::{Secret, SECRET_MASK};
use std::path::PathBuf;

/// A string field that may carry a secret
#[derive(Debug, Clone)]
pub enum MaybeSecret {
    /// Plain value, safe to print
    Plain(String),
    /// Secret value, masked everywhere except the engine boundary
    Secret(Secret),
}

impl MaybeSecret {
    /// Masked rendering for plans and logs
    pub fn masked(&self) -> &str {
        match self {
            MaybeSecret::Plain(value) => value,
            MaybeSecret::Secret(_) => SECRET_MASK,
        }
    }

    /// Plaintext rendering. Engine boundary only.
    pub fn revealed(&self) -> &str {
        match self {
            MaybeSecret::Plain(value) => value,
            MaybeSecret::Secret(secret) => secret.reveal(),
        }
    }

    /// Whether this value carries a secret
    pub fn is_secret(&self) -> bool {
        matches!(self, MaybeSecret::Secret(_))
    }
}

impl From<&str> for MaybeSecret {
    fn from(value: &str) -> Self {
        MaybeSecret::Plain(value.to_string())
    }
}

impl From<String> for MaybeSecret {
    fn from(value: String) -> Self {
        MaybeSecret::Plain(value)
    }
}

impl From<Secret> for MaybeSecret {
    fn from(value: Secret) -> Self {
        MaybeSecret::Secret(value)
    }
}

/// Environment variable on a container
#[derive(Debug, Clone)]
pub struct EnvVar {
    /// Variable name
    pub key: String,
    /// Plain or secret value
    pub value: MaybeSecret,
}

impl EnvVar {
    /// `KEY=value` with secrets masked
    pub fn render_masked(&self) -> String {
        format!("{}={}", self.key, self.value.masked())
    }

    /// `KEY=value` in plaintext. Engine boundary only.
    pub fn render_revealed(&self) -> String {
        format!("{}={}", self.key, self.value.revealed())
    }
}

/// Network protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// Port mapping from container to host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// Port inside the container
    pub internal: u16,
    /// Published port on the host
    pub external: u16,
    /// Protocol
    pub protocol: Protocol,
}

/// Bind mount of a host path into the container
#[derive(Debug, Clone)]
pub struct BindMount {
    /// Host path
    pub source: PathBuf,
    /// Path inside the container
    pub target: String,
    /// Mount read-only
    pub read_only: bool,
}

/// Container descriptor
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Container name
    pub name: String,
    /// Logical name of the image in the stack graph
    pub image: String,
    /// Environment variables
    pub env: Vec<EnvVar>,
    /// Port mappings
    pub ports: Vec<PortMapping>,
    /// Bind mounts
    pub mounts: Vec<BindMount>,
    /// Aliases on the stack network
    pub network_aliases: Vec<String>,
    /// Command override, empty for the image default
    pub command: Vec<MaybeSecret>,
    /// Containers that must exist before this one
    pub depends_on: Vec<String>,
    /// One-shot jobs set this false; their exit is not a failure
    pub must_run: bool,
}

impl ContainerSpec {
    /// Create a new container descriptor
    pub fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            env: Vec::new(),
            ports: Vec::new(),
            mounts: Vec::new(),
            network_aliases: Vec::new(),
            command: Vec::new(),
            depends_on: Vec::new(),
            must_run: true,
        }
    }

    /// Add an environment variable
    pub fn env(mut self, key: &str, value: impl Into<MaybeSecret>) -> Self {
        self.env.push(EnvVar {
            key: key.to_string(),
            value: value.into(),
        });
        self
    }

    /// Add a port mapping
    pub fn port(mut self, internal: u16, external: u16) -> Self {
        self.ports.push(PortMapping {
            internal,
            external,
            protocol: Protocol::Tcp,
        });
        self
    }

    /// Add a bind mount
    pub fn mount(mut self, source: PathBuf, target: &str) -> Self {
        self.mounts.push(BindMount {
            source,
            target: target.to_string(),
            read_only: false,
        });
        self
    }

    /// Add a network alias
    pub fn alias(mut self, alias: &str) -> Self {
        self.network_aliases.push(alias.to_string());
        self
    }

    /// Set the command
    pub fn command(mut self, command: Vec<MaybeSecret>) -> Self {
        self.command = command;
        self
    }

    /// Declare an explicit dependency on another container
    pub fn depends_on(mut self, container: &str) -> Self {
        self.depends_on.push(container.to_string());
        self
    }

    /// Mark whether the container must stay running
    pub fn must_run(mut self, must_run: bool) -> Self {
        self.must_run = must_run;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let spec = ContainerSpec::new("mongo-dev", "mongo")
            .alias("mongo")
            .env("MONGO_INITDB_ROOT_USERNAME", "admin")
            .env("MONGO_INITDB_ROOT_PASSWORD", Secret::new("hunter2"))
            .port(27017, 27017);

        assert_eq!(spec.name, "mongo-dev");
        assert_eq!(spec.network_aliases, vec!["mongo"]);
        assert_eq!(spec.env.len(), 2);
        assert!(spec.must_run);
    }

    #[test]
    fn test_env_rendering_masks_secrets() {
        let var = EnvVar {
            key: "MONGO_INITDB_ROOT_PASSWORD".to_string(),
            value: Secret::new("hunter2").into(),
        };

        assert_eq!(
            var.render_masked(),
            "MONGO_INITDB_ROOT_PASSWORD=[secret]"
        );
        assert_eq!(
            var.render_revealed(),
            "MONGO_INITDB_ROOT_PASSWORD=hunter2"
        );
    }

    #[test]
    fn test_plain_env_renders_value() {
        let var = EnvVar {
            key: "NODE_ENV".to_string(),
            value: "production".into(),
        };
        assert_eq!(var.render_masked(), "NODE_ENV=production");
    }

    #[test]
    fn test_maybe_secret_debug_is_masked() {
        let value: MaybeSecret = Secret::new("hunter2").into();
        assert!(!format!("{:?}", value).contains("hunter2"));
    }
}
