//! Stack config store
//!
//! Each stack has a key-value config file under `stacks/<name>.yaml`.
//! Values are plain scalars or secret-flagged entries; string values
//! support `${VAR}` / `${VAR:-default}` environment interpolation.
//! Process environment variables prefixed `CARAVEL_CONFIG_` override or
//! supply entries.

use super::secret::Secret;
use crate::error::{CaravelError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment prefix for config overrides
pub const ENV_PREFIX: &str = "CARAVEL_CONFIG_";

/// Candidate config file names for a stack
fn stack_file_candidates(project_dir: &Path, stack: &str) -> [PathBuf; 2] {
    let dir = project_dir.join("stacks");
    [
        dir.join(format!("{}.yaml", stack)),
        dir.join(format!("{}.yml", stack)),
    ]
}

/// On-disk stack config file
#[derive(Debug, Deserialize)]
struct StackFile {
    #[serde(default)]
    config: HashMap<String, ConfigEntry>,
}

/// A single config file entry
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConfigEntry {
    /// Secret-flagged entry
    Flagged { secret: bool, value: String },
    /// Plain scalar
    Scalar(serde_yaml::Value),
}

/// Resolved config value
#[derive(Debug, Clone)]
enum Entry {
    Plain(String),
    Secret(Secret),
}

/// Stack-scoped key-value config store
#[derive(Debug, Clone)]
pub struct ConfigStore {
    stack: String,
    values: HashMap<String, Entry>,
}

impl ConfigStore {
    /// Create an empty store for a stack
    pub fn new(stack: &str) -> Self {
        Self {
            stack: stack.to_string(),
            values: HashMap::new(),
        }
    }

    /// Load the store for a stack from `project_dir/stacks/<stack>.yaml`
    pub fn load(project_dir: &Path, stack: &str) -> Result<Self> {
        let candidates = stack_file_candidates(project_dir, stack);
        let path = candidates.iter().find(|p| p.exists()).ok_or_else(|| {
            CaravelError::ConfigFile(format!(
                "no config file for stack '{}' (looked for {})",
                stack,
                candidates[0].display()
            ))
        })?;

        let content = std::fs::read_to_string(path)?;
        let file: StackFile = serde_yaml::from_str(&content)?;

        let env: HashMap<String, String> = std::env::vars().collect();
        let mut store = Self::new(stack);

        for (key, entry) in file.config {
            let resolved = match entry {
                ConfigEntry::Flagged { secret, value } => {
                    let value = interpolate_string(&value, &env);
                    if secret {
                        Entry::Secret(Secret::new(value))
                    } else {
                        Entry::Plain(value)
                    }
                }
                ConfigEntry::Scalar(value) => Entry::Plain(scalar_to_string(&key, &value, &env)?),
            };
            store.values.insert(key, resolved);
        }

        store.apply_env_overrides(&env);
        Ok(store)
    }

    /// Stack name this store belongs to
    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Set a plain value
    pub fn set(&mut self, key: &str, value: &str) {
        self.values
            .insert(key.to_string(), Entry::Plain(value.to_string()));
    }

    /// Set a secret value
    pub fn set_secret(&mut self, key: &str, value: Secret) {
        self.values.insert(key.to_string(), Entry::Secret(value));
    }

    /// Require a plain string value
    pub fn require(&self, key: &str) -> Result<String> {
        match self.values.get(key) {
            Some(Entry::Plain(value)) => Ok(value.clone()),
            Some(Entry::Secret(_)) => Err(CaravelError::InvalidConfig {
                key: key.to_string(),
                message: "value is marked secret, read it with require_secret".to_string(),
            }),
            None => Err(CaravelError::MissingConfig(key.to_string())),
        }
    }

    /// Require a numeric value
    pub fn require_number(&self, key: &str) -> Result<u16> {
        let raw = self.require(key)?;
        raw.parse().map_err(|_| CaravelError::InvalidConfig {
            key: key.to_string(),
            message: format!("expected a port number, got '{}'", raw),
        })
    }

    /// Require a value and wrap it as a secret
    pub fn require_secret(&self, key: &str) -> Result<Secret> {
        match self.values.get(key) {
            Some(Entry::Secret(secret)) => Ok(secret.clone()),
            Some(Entry::Plain(value)) => Ok(Secret::new(value.clone())),
            None => Err(CaravelError::MissingConfig(key.to_string())),
        }
    }

    /// Apply `CARAVEL_CONFIG_*` environment overrides. A key that the file
    /// flagged secret stays secret; new keys fall back to a name heuristic.
    fn apply_env_overrides(&mut self, env: &HashMap<String, String>) {
        for (name, value) in env {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let key = key.to_lowercase();

            let secret = match self.values.get(&key) {
                Some(Entry::Secret(_)) => true,
                Some(Entry::Plain(_)) => false,
                None => is_secret_key(&key),
            };

            tracing::debug!("config override from environment: {}", key);
            let entry = if secret {
                Entry::Secret(Secret::new(value.clone()))
            } else {
                Entry::Plain(value.clone())
            };
            self.values.insert(key, entry);
        }
    }
}

/// Convert a scalar YAML value to its string form
fn scalar_to_string(
    key: &str,
    value: &serde_yaml::Value,
    env: &HashMap<String, String>,
) -> Result<String> {
    match value {
        serde_yaml::Value::String(s) => Ok(interpolate_string(s, env)),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(CaravelError::InvalidConfig {
            key: key.to_string(),
            message: "expected a scalar value".to_string(),
        }),
    }
}

/// Check whether a config key names a secret by convention
fn is_secret_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower.contains("password")
        || lower.contains("secret")
        || lower.contains("token")
        || lower.contains("api_key")
        || lower.contains("credential")
}

/// Interpolate `${VAR}` and `${VAR:-default}` in a string
fn interpolate_string(s: &str, env: &HashMap<String, String>) -> String {
    let re = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").unwrap();
    re.replace_all(s, |caps: &regex::Captures| {
        let var = &caps[1];
        match env.get(var) {
            Some(value) => value.clone(),
            None => match caps.get(2) {
                Some(default) => default.as_str().to_string(),
                None => {
                    tracing::warn!("undefined variable '{}' in config value", var);
                    String::new()
                }
            },
        }
    })
    .to_string()
}

/// Typed stack configuration, built once at startup and passed by
/// reference to the topology declaration.
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Stack name (suffix for resource names)
    pub stack: String,
    /// External port the frontend publishes
    pub frontend_port: u16,
    /// Port the backend listens on inside the network
    pub backend_port: u16,
    /// Port the database listens on
    pub mongo_port: u16,
    /// Database hostname (network alias)
    pub mongo_host: String,
    /// Database name
    pub database: String,
    /// NODE_ENV for the backend
    pub node_environment: String,
    /// Database root username
    pub mongo_username: String,
    /// Database root password
    pub mongo_password: Secret,
}

impl StackConfig {
    /// Resolve all required keys from the store. Fails on the first
    /// missing key, before any resource is declared.
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        Ok(Self {
            stack: store.stack().to_string(),
            frontend_port: store.require_number("frontend_port")?,
            backend_port: store.require_number("backend_port")?,
            mongo_port: store.require_number("mongo_port")?,
            mongo_host: store.require("mongo_host")?,
            database: store.require("database")?,
            node_environment: store.require("node_environment")?,
            mongo_username: store.require("mongo_username")?,
            mongo_password: store.require_secret("mongo_password")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn full_store() -> ConfigStore {
        let mut store = ConfigStore::new("dev");
        store.set("frontend_port", "3000");
        store.set("backend_port", "3000");
        store.set("mongo_port", "27017");
        store.set("mongo_host", "mongo");
        store.set("database", "cart");
        store.set("node_environment", "production");
        store.set("mongo_username", "admin");
        store.set_secret("mongo_password", Secret::new("hunter2"));
        store
    }

    #[test]
    fn test_require_missing_key() {
        let store = ConfigStore::new("dev");
        let result = store.require("frontend_port");
        assert!(matches!(result, Err(CaravelError::MissingConfig(key)) if key == "frontend_port"));
    }

    #[test]
    fn test_require_number() {
        let mut store = ConfigStore::new("dev");
        store.set("frontend_port", "3000");
        assert_eq!(store.require_number("frontend_port").unwrap(), 3000);

        store.set("frontend_port", "not-a-port");
        assert!(matches!(
            store.require_number("frontend_port"),
            Err(CaravelError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_require_refuses_secret_entries() {
        let mut store = ConfigStore::new("dev");
        store.set_secret("mongo_password", Secret::new("hunter2"));
        assert!(matches!(
            store.require("mongo_password"),
            Err(CaravelError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_require_secret_wraps_plain_values() {
        let mut store = ConfigStore::new("dev");
        store.set("mongo_password", "hunter2");
        let secret = store.require_secret("mongo_password").unwrap();
        assert_eq!(secret.reveal(), "hunter2");
        assert_eq!(secret.to_string(), crate::config::SECRET_MASK);
    }

    #[test]
    fn test_stack_config_from_store() {
        let config = StackConfig::from_store(&full_store()).unwrap();
        assert_eq!(config.frontend_port, 3000);
        assert_eq!(config.mongo_host, "mongo");
        assert_eq!(config.mongo_password.reveal(), "hunter2");
    }

    #[test]
    fn test_stack_config_fails_on_any_missing_key() {
        let keys = [
            "frontend_port",
            "backend_port",
            "mongo_port",
            "mongo_host",
            "database",
            "node_environment",
            "mongo_username",
            "mongo_password",
        ];

        for missing in keys {
            let mut store = full_store();
            store.values.remove(missing);
            assert!(
                StackConfig::from_store(&store).is_err(),
                "expected failure without '{}'",
                missing
            );
        }
    }

    #[test]
    fn test_load_stack_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("stacks")).unwrap();
        let mut file = std::fs::File::create(dir.path().join("stacks/dev.yaml")).unwrap();
        writeln!(
            file,
            "config:\n  frontend_port: 3000\n  mongo_host: mongo\n  mongo_password:\n    secret: true\n    value: hunter2"
        )
        .unwrap();

        let store = ConfigStore::load(dir.path(), "dev").unwrap();
        assert_eq!(store.require_number("frontend_port").unwrap(), 3000);
        assert_eq!(store.require("mongo_host").unwrap(), "mongo");
        assert_eq!(
            store.require_secret("mongo_password").unwrap().reveal(),
            "hunter2"
        );
        assert!(store.require("mongo_password").is_err());
    }

    #[test]
    fn test_load_missing_stack_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConfigStore::load(dir.path(), "dev");
        assert!(matches!(result, Err(CaravelError::ConfigFile(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut store = ConfigStore::new("dev");
        store.set("mongo_host", "localhost");

        let mut env = HashMap::new();
        env.insert("CARAVEL_CONFIG_MONGO_HOST".to_string(), "mongo".to_string());
        env.insert(
            "CARAVEL_CONFIG_MONGO_PASSWORD".to_string(),
            "hunter2".to_string(),
        );
        store.apply_env_overrides(&env);

        assert_eq!(store.require("mongo_host").unwrap(), "mongo");
        // The name heuristic marks the new key secret
        assert!(store.require("mongo_password").is_err());
        assert_eq!(
            store.require_secret("mongo_password").unwrap().reveal(),
            "hunter2"
        );
    }

    #[test]
    fn test_interpolate_string() {
        let mut env = HashMap::new();
        env.insert("TAG".to_string(), "bionic".to_string());

        assert_eq!(interpolate_string("mongo:${TAG}", &env), "mongo:bionic");
        assert_eq!(
            interpolate_string("mongo:${MISSING:-latest}", &env),
            "mongo:latest"
        );
        assert_eq!(interpolate_string("mongo:${MISSING}", &env), "mongo:");
    }

    #[test]
    fn test_is_secret_key() {
        assert!(is_secret_key("mongo_password"));
        assert!(is_secret_key("api_key"));
        assert!(!is_secret_key("mongo_host"));
        assert!(!is_secret_key("database"));
    }
}
